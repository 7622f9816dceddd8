//! Shorthand constructors for assembling process trees.
//!
//! Front ends attach real spans through [`Program::add_expr`] and
//! [`Program::add_process`]; these helpers use an empty span and exist for
//! synthesized code, tests and fuzzing.

use crate::ast::*;

impl Program {
    /// Declare a channel and return an expression naming it.
    pub fn channel(&mut self, name: impl Into<String>) -> ExprId {
        let name = self.add_name(name, NameKind::Channel, Span::default());
        self.name_ref(name)
    }

    pub fn variable(&mut self, name: impl Into<String>) -> ExprId {
        let name = self.add_name(name, NameKind::Variable, Span::default());
        self.name_ref(name)
    }

    pub fn name_ref(&mut self, name: NameId) -> ExprId {
        self.add_expr(Expr::Name(name), Span::default())
    }

    pub fn int(&mut self, value: i64) -> ExprId {
        self.add_expr(Expr::Int(value), Span::default())
    }

    pub fn boolean(&mut self, value: bool) -> ExprId {
        self.add_expr(Expr::Bool(value), Span::default())
    }

    pub fn opaque(&mut self) -> ExprId {
        self.add_expr(Expr::Opaque, Span::default())
    }

    pub fn decorate(&mut self, inner: ExprId, decoration: Decoration) -> ExprId {
        self.add_expr(Expr::Decorated { inner, decoration }, Span::default())
    }

    pub fn subscript(&mut self, base: ExprId, index: ExprId) -> ExprId {
        self.add_expr(Expr::Subscript { base, index }, Span::default())
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ExprId) -> ExprId {
        self.add_expr(Expr::Unary { op, operand }, Span::default())
    }

    pub fn binary(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId) -> ExprId {
        self.add_expr(Expr::Binary { op, lhs, rhs }, Span::default())
    }

    pub fn skip(&mut self) -> NodeId {
        self.add_process(Process::Skip, Span::default())
    }

    pub fn stop(&mut self) -> NodeId {
        self.add_process(Process::Stop, Span::default())
    }

    pub fn input(&mut self, chan: ExprId) -> NodeId {
        self.add_process(Process::Input { chan }, Span::default())
    }

    pub fn output(&mut self, chan: ExprId) -> NodeId {
        self.add_process(Process::Output { chan }, Span::default())
    }

    pub fn assign(&mut self, target: ExprId, value: ExprId) -> NodeId {
        self.add_process(Process::Assign { target, value }, Span::default())
    }

    pub fn seq(&mut self, children: Vec<NodeId>) -> NodeId {
        self.add_process(Process::Seq(children), Span::default())
    }

    pub fn par(&mut self, children: Vec<NodeId>) -> NodeId {
        self.add_process(Process::Par(children), Span::default())
    }

    pub fn repl_seq(&mut self, count: ExprId, body: NodeId) -> NodeId {
        self.add_process(Process::ReplSeq { count, body }, Span::default())
    }

    pub fn repl_par(&mut self, count: ExprId, body: NodeId) -> NodeId {
        self.add_process(Process::ReplPar { count, body }, Span::default())
    }

    pub fn while_loop(&mut self, guard: ExprId, body: NodeId) -> NodeId {
        self.add_process(Process::While { guard, body }, Span::default())
    }

    /// Single-armed conditional.
    pub fn if_then(&mut self, guard: ExprId, body: NodeId) -> NodeId {
        self.if_arms(vec![CondArm { guard, body }])
    }

    pub fn if_arms(&mut self, arms: Vec<CondArm>) -> NodeId {
        self.add_process(Process::If { arms }, Span::default())
    }

    pub fn alt(&mut self, arms: Vec<AltArm>) -> NodeId {
        self.add_process(Process::Alt { arms }, Span::default())
    }

    /// Instance with only user-written arguments.
    pub fn call(&mut self, decl: DeclId, args: Vec<ExprId>) -> NodeId {
        let args = args
            .into_iter()
            .map(|expr| Arg {
                expr,
                hidden: false,
            })
            .collect();
        self.call_with_args(decl, args)
    }

    pub fn call_with_args(&mut self, decl: DeclId, args: Vec<Arg>) -> NodeId {
        self.add_process(Process::Call { decl, args }, Span::default())
    }

    pub fn block(&mut self, locals: Vec<NameId>, body: NodeId) -> NodeId {
        self.add_process(Process::Block { locals, body }, Span::default())
    }

    /// Register a top-level process unit.
    pub fn add_unit(&mut self, unit: Unit) {
        self.units.push(unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_record_position_and_hidden_flag() {
        let mut p = Program::new("params");
        let d = p.declare_proc("worker", Span::default());
        let c = p.add_param(d, "c", true, false, Span::default());
        let dim = p.add_param(d, "c.dim", false, true, Span::default());
        assert_eq!(
            p.name(dim).kind,
            NameKind::Param {
                decl: d,
                position: 1,
                hidden: true
            }
        );
        let visible: Vec<NameId> = p.decl(d).visible_params().map(|x| x.name).collect();
        assert_eq!(visible, vec![c]);
    }

    #[test]
    fn decorations_resolve_to_underlying_name() {
        let mut p = Program::new("resolve");
        let c = p.channel("c");
        let out_end = p.decorate(c, Decoration::OutputEnd);
        let paren = p.decorate(out_end, Decoration::Paren);
        assert_eq!(p.strip_decorations(paren), c);
        assert_eq!(p.resolve_name(paren), p.resolve_name(c));
        assert_eq!(p.describe_expr(paren), "c");
    }

    #[test]
    fn process_exposes_kind_children_and_guard() {
        let mut p = Program::new("shape");
        let a = p.skip();
        let b = p.stop();
        let g = p.boolean(true);
        let body = p.seq(vec![a, b]);
        let w = p.while_loop(g, body);
        assert_eq!(p.process(w).kind(), ProcessKind::While);
        assert_eq!(p.process(w).children(), vec![body]);
        assert_eq!(p.process(w).guard(), Some(g));
        assert_eq!(p.process(body).children(), vec![a, b]);
        assert_eq!(p.process(body).guard(), None);
    }
}
