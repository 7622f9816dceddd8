//! Constant-folding query over already-folded expressions.

use crate::ast::{BinOp, Expr, ExprId, Program, UnaryOp};

/// Constant-folding collaborator.
///
/// Booleans fold to `0`/`1`. An expression whose value depends on run-time
/// state, overflows, or divides by zero is not constant.
pub trait ConstFold {
    fn constant_value(&self, expr: ExprId) -> Option<i64>;

    fn is_constant(&self, expr: ExprId) -> bool {
        self.constant_value(expr).is_some()
    }

    /// Statically known truth value of a guard, if any.
    fn constant_truth(&self, expr: ExprId) -> Option<bool> {
        self.constant_value(expr).map(|v| v != 0)
    }
}

impl ConstFold for Program {
    fn constant_value(&self, expr: ExprId) -> Option<i64> {
        match self.expr(expr) {
            Expr::Int(v) => Some(*v),
            Expr::Bool(b) => Some(i64::from(*b)),
            Expr::Name(_) | Expr::Subscript { .. } | Expr::Opaque => None,
            Expr::Decorated { inner, .. } => self.constant_value(*inner),
            Expr::Unary { op, operand } => {
                let v = self.constant_value(*operand)?;
                match op {
                    UnaryOp::Neg => v.checked_neg(),
                    UnaryOp::Not => Some(i64::from(v == 0)),
                }
            }
            Expr::Binary { op, lhs, rhs } => fold_binary(self, *op, *lhs, *rhs),
        }
    }
}

fn fold_binary(program: &Program, op: BinOp, lhs: ExprId, rhs: ExprId) -> Option<i64> {
    // `FALSE AND x` and `TRUE OR x` are constant whatever `x` is.
    match op {
        BinOp::And => {
            let l = program.constant_value(lhs);
            if l == Some(0) {
                return Some(0);
            }
            let r = program.constant_value(rhs)?;
            return Some(i64::from(l? != 0 && r != 0));
        }
        BinOp::Or => {
            let l = program.constant_value(lhs);
            if matches!(l, Some(v) if v != 0) {
                return Some(1);
            }
            let r = program.constant_value(rhs)?;
            return Some(i64::from(l? != 0 || r != 0));
        }
        _ => {}
    }

    let l = program.constant_value(lhs)?;
    let r = program.constant_value(rhs)?;
    match op {
        BinOp::Add => l.checked_add(r),
        BinOp::Sub => l.checked_sub(r),
        BinOp::Mul => l.checked_mul(r),
        BinOp::Div => l.checked_div(r),
        BinOp::Rem => l.checked_rem(r),
        BinOp::Eq => Some(i64::from(l == r)),
        BinOp::Ne => Some(i64::from(l != r)),
        BinOp::Lt => Some(i64::from(l < r)),
        BinOp::Le => Some(i64::from(l <= r)),
        BinOp::Gt => Some(i64::from(l > r)),
        BinOp::Ge => Some(i64::from(l >= r)),
        BinOp::And | BinOp::Or => None,
    }
}
