#![doc = include_str!("../README.md")]

pub mod ast;
pub mod build;
pub mod fold;

pub use ast::*;
pub use fold::ConstFold;
