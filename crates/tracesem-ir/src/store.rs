//! Declaration-trace attribute store.

use indexmap::IndexMap;
use tracesem_ast::DeclId;

use crate::trace::TraceSet;

/// Trace sets attached to procedure declarations, in attachment order.
///
/// Callers see a declaration's trace only after it has been checked, so the
/// store fills bottom-up: callees before callers.
#[derive(Debug, Clone, Default)]
pub struct DeclTraces {
    traces: IndexMap<DeclId, TraceSet>,
}

impl DeclTraces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, decl: DeclId) -> Option<&TraceSet> {
        self.traces.get(&decl)
    }

    pub fn contains(&self, decl: DeclId) -> bool {
        self.traces.contains_key(&decl)
    }

    /// Attach (or replace) the trace set of `decl`.
    pub fn attach(&mut self, decl: DeclId, traces: TraceSet) {
        self.traces.insert(decl, traces);
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &TraceSet)> + '_ {
        self.traces.iter().map(|(d, t)| (*d, t))
    }
}
