//! Per-scope checker state.

use std::fmt;

use tracesem_ast::{DeclId, NameId, NodeId, Program};

use crate::bucket::Bucket;
use crate::diagnostics::{Diagnostic, Severity};
use crate::substitute::Substitution;
use crate::trace::{Atom, TraceNode};

/// What a [`CheckerState`] was pushed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOwner {
    Proc(DeclId),
    Process(NodeId),
}

impl fmt::Display for ScopeOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeOwner::Proc(d) => write!(f, "proc {d}"),
            ScopeOwner::Process(n) => write!(f, "process {n}"),
        }
    }
}

/// State for one procedure body or top-level process being checked.
#[derive(Debug)]
pub struct CheckerState {
    owner: ScopeOwner,
    interface: Vec<NameId>,
    buckets: Vec<Bucket>,
    diagnostics: Vec<Diagnostic>,
    /// Binder for recursive instances of the owning procedure, minted on
    /// first use.
    recursion_atom: Option<Atom>,
    /// Formal-to-actual mapping of the instance that opened this scope.
    entry: Option<Substitution>,
    /// A recursive instance did not pass its channels through, so the
    /// computed trace is only an approximation.
    approximate: bool,
}

impl CheckerState {
    pub fn new(owner: ScopeOwner) -> Self {
        Self {
            owner,
            interface: Vec::new(),
            buckets: Vec::new(),
            diagnostics: Vec::new(),
            recursion_atom: None,
            entry: None,
            approximate: false,
        }
    }

    pub fn with_entry(mut self, entry: Substitution) -> Self {
        self.entry = Some(entry);
        self
    }

    pub fn entry(&self) -> Option<&Substitution> {
        self.entry.as_ref()
    }

    pub fn mark_approximate(&mut self) {
        self.approximate = true;
    }

    pub fn is_approximate(&self) -> bool {
        self.approximate
    }

    pub fn owner(&self) -> ScopeOwner {
        self.owner
    }

    pub fn decl(&self) -> Option<DeclId> {
        match self.owner {
            ScopeOwner::Proc(d) => Some(d),
            ScopeOwner::Process(_) => None,
        }
    }

    pub fn add_interface(&mut self, name: NameId) {
        if !self.interface.contains(&name) {
            self.interface.push(name);
        }
    }

    pub fn interface(&self) -> &[NameId] {
        &self.interface
    }

    pub fn is_interface(&self, name: NameId) -> bool {
        self.interface.contains(&name)
    }

    pub fn push_bucket(&mut self) {
        self.buckets.push(Bucket::new());
    }

    pub fn pop_bucket(&mut self) -> Option<Bucket> {
        self.buckets.pop()
    }

    /// Add a fragment to the innermost bucket.
    pub fn emit(&mut self, fragment: TraceNode) -> Option<()> {
        self.buckets.last_mut().map(|b| b.push(fragment))
    }

    pub fn depth(&self) -> usize {
        self.buckets.len()
    }

    pub fn report(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.decl.is_none() {
            diagnostic.decl = self.decl();
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn recursion_atom(&self) -> Option<Atom> {
        self.recursion_atom
    }

    /// Binder for recursive instances, minting it with `mint` on first use.
    pub fn recursion_atom_or_insert(&mut self, mint: impl FnOnce() -> Atom) -> Atom {
        *self.recursion_atom.get_or_insert_with(mint)
    }

    /// Render with channel names taken from `program`.
    pub fn dump(&self, program: &Program) -> String {
        let mut out = format!("state {} (depth {})\n", self.owner, self.depth());
        let names: Vec<&str> = self
            .interface
            .iter()
            .map(|n| program.name(*n).name.as_str())
            .collect();
        out.push_str(&format!("  interface: [{}]\n", names.join(", ")));
        for (i, bucket) in self.buckets.iter().enumerate() {
            let frags: Vec<String> = bucket
                .fragments()
                .iter()
                .map(|n| n.display_with(program).to_string())
                .collect();
            out.push_str(&format!("  bucket {i}: [{}]\n", frags.join(", ")));
        }
        out.push_str(&self.diagnostic_summary());
        out
    }

    fn diagnostic_summary(&self) -> String {
        let errors = self
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        let warnings = self.diagnostics.len() - errors;
        format!("  diagnostics: {errors} error(s), {warnings} warning(s)\n")
    }
}

impl fmt::Display for CheckerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "state {} (depth {})", self.owner, self.depth())?;
        let names: Vec<String> = self.interface.iter().map(|n| n.to_string()).collect();
        writeln!(f, "  interface: [{}]", names.join(", "))?;
        for (i, bucket) in self.buckets.iter().enumerate() {
            let frags: Vec<String> = bucket.fragments().iter().map(|n| n.to_string()).collect();
            writeln!(f, "  bucket {i}: [{}]", frags.join(", "))?;
        }
        f.write_str(&self.diagnostic_summary())
    }
}
