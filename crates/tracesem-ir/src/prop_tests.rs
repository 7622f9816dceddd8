use proptest::prelude::*;

use tracesem_ast::{DeclId, ExprId, NodeId, Program, Span, Unit};

use crate::checking::check;
use crate::options::CheckerOptions;
use crate::proptest_generators::{arb_proc_shape, arb_skip_tree, arb_trace, ProcShape};
use crate::refinement::{refines, Verdict};
use crate::store::DeclTraces;
use crate::substitute::Substitution;
use crate::trace::{Atom, AtomId, AtomOrigin, ChanRef, CompilationContext, TraceNode};

fn channels(program: &mut Program) -> Vec<ExprId> {
    ["a", "b", "c"].iter().map(|n| program.channel(*n)).collect()
}

fn run(program: &Program, node: NodeId, options: &CheckerOptions) -> TraceNode {
    let mut ctx = CompilationContext::new();
    let mut store = DeclTraces::new();
    let outcome = check(program, Unit::Process(node), &mut ctx, &mut store, options).unwrap();
    outcome.traces.alternatives[0].clone()
}

fn formals_fixture() -> (Program, DeclId, Vec<ExprId>) {
    let mut program = Program::new("formals");
    let decl = program.declare_proc("worker", Span::default());
    let refs = (0..3)
        .map(|i| {
            let name = program.add_param(decl, format!("f{i}"), true, false, Span::default());
            program.name_ref(name)
        })
        .collect();
    (program, decl, refs)
}

proptest! {
    #[test]
    fn skip_only_trees_simplify_to_skip(shape in arb_skip_tree()) {
        let mut program = Program::new("skips");
        let root = shape.build(&mut program, &[]);
        prop_assert_eq!(run(&program, root, &CheckerOptions::default()), TraceNode::Skip);
    }

    #[test]
    fn true_loop_wraps_body_in_fixpoint(shape in arb_proc_shape(3)) {
        let mut program = Program::new("loop");
        let chans = channels(&mut program);
        let body = ProcShape::Seq(vec![shape]).build(&mut program, &chans);
        let guard = program.boolean(true);
        let looped = program.while_loop(guard, body);

        let mut ctx = CompilationContext::new();
        let mut store = DeclTraces::new();
        let raw = CheckerOptions::raw();
        let alone = check(&program, Unit::Process(body), &mut ctx, &mut store, &raw).unwrap();
        let body_trace = alone.traces.alternatives[0].clone();
        let binder = Atom {
            id: AtomId(ctx.atoms_minted()),
            origin: AtomOrigin::Loop(looped),
        };

        prop_assert_eq!(
            run(&program, looped, &raw),
            TraceNode::fixpoint(binder, TraceNode::Seq(vec![body_trace, TraceNode::AtomRef(binder.id)]))
        );
    }

    #[test]
    fn false_loop_contributes_nothing(shape in arb_proc_shape(3)) {
        let mut program = Program::new("never");
        let chans = channels(&mut program);
        let looped = ProcShape::While(
            crate::proptest_generators::GuardShape::False,
            Box::new(shape),
        );
        let root = ProcShape::Seq(vec![looped]).build(&mut program, &chans);
        prop_assert_eq!(run(&program, root, &CheckerOptions::raw()), TraceNode::Seq(vec![]));
    }

    #[test]
    fn arbitrary_trees_never_fail_internally(shape in arb_proc_shape(3)) {
        let mut program = Program::new("total");
        let chans = channels(&mut program);
        let root = shape.build(&mut program, &chans);
        let mut ctx = CompilationContext::new();
        let mut store = DeclTraces::new();
        let outcome = check(&program, Unit::Process(root), &mut ctx, &mut store, &CheckerOptions::default());
        prop_assert!(outcome.is_ok());
        prop_assert_eq!(outcome.unwrap().traces.len(), 1);
    }

    #[test]
    fn atom_numbering_is_reproducible(shape in arb_proc_shape(2)) {
        let mut program = Program::new("repeat");
        let chans = channels(&mut program);
        let root = shape.build(&mut program, &chans);
        let options = CheckerOptions::default();
        prop_assert_eq!(run(&program, root, &options), run(&program, root, &options));
    }

    #[test]
    fn substitution_maps_each_formal_to_its_actual(
        order in proptest::collection::vec(0usize..4, 1..6),
    ) {
        let mut program = Program::new("inject");
        let decl = program.declare_proc("worker", Span::default());
        let formals: Vec<_> = (0..4)
            .map(|i| program.add_param(decl, format!("f{i}"), true, false, Span::default()))
            .collect();
        let outputs: Vec<NodeId> = order
            .iter()
            .map(|&i| {
                let chan = program.name_ref(formals[i]);
                program.output(chan)
            })
            .collect();
        let body = program.seq(outputs);
        program.set_body(decl, body);

        let actuals: Vec<ExprId> = (0..4).map(|i| program.channel(format!("x{i}"))).collect();
        let call = program.call(decl, actuals.clone());
        let trace = run(&program, call, &CheckerOptions::default());

        let seen: Vec<ExprId> = trace.channels().iter().map(|c| c.root).collect();
        let expected: Vec<ExprId> = order.iter().map(|&i| actuals[i]).collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn identity_substitution_is_structural_identity(
        trace in arb_trace(formals_fixture().2.into_iter().map(ChanRef::new).collect()),
    ) {
        let (mut program, decl, refs) = formals_fixture();
        let mut subst = Substitution::new();
        for param in program.decl(decl).params.clone() {
            let own = program.name_ref(param.name);
            subst.insert(param.name, own);
        }
        prop_assert_eq!(refs.len(), subst.len());
        prop_assert_eq!(subst.apply(&program, &trace), trace);
    }

    #[test]
    fn refinement_is_reflexive(
        trace in arb_trace(formals_fixture().2.into_iter().map(ChanRef::new).collect()),
    ) {
        let (program, _, _) = formals_fixture();
        let report = refines(&program, &trace, &trace, 10_000);
        prop_assert!(!matches!(report.verdict, Verdict::Violated(_)), "{:?}", report.verdict);
        if report.holds() {
            prop_assert!(report.restrictive.is_empty());
        }
    }
}
