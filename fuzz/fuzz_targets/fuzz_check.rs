#![no_main]
use libfuzzer_sys::fuzz_target;

use tracesem_ast::{AltArm, AltTrigger, CondArm, ExprId, NodeId, Program, Span, Unit};
use tracesem_ir::{check, CheckerOptions, CompilationContext, DeclTraces};

/// Decodes a byte stream into a process tree, one construct per byte.
struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    chans: Vec<ExprId>,
}

impl Decoder<'_> {
    fn next(&mut self) -> u8 {
        let b = self.data.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        b
    }

    fn chan(&mut self) -> ExprId {
        let i = self.next() as usize % self.chans.len();
        self.chans[i]
    }

    fn guard(&mut self, p: &mut Program) -> ExprId {
        match self.next() % 3 {
            0 => p.boolean(true),
            1 => p.boolean(false),
            _ => p.opaque(),
        }
    }

    fn count(&mut self, p: &mut Program) -> ExprId {
        match self.next() % 6 {
            5 => p.opaque(),
            n => p.int(i64::from(n) - 1),
        }
    }

    fn children(&mut self, p: &mut Program, depth: u32) -> Vec<NodeId> {
        let n = self.next() % 4;
        (0..n).map(|_| self.node(p, depth + 1)).collect()
    }

    fn node(&mut self, p: &mut Program, depth: u32) -> NodeId {
        let op = if depth > 6 || self.pos >= self.data.len() {
            self.next() % 4
        } else {
            self.next() % 12
        };
        match op {
            0 => p.skip(),
            1 => p.stop(),
            2 => {
                let c = self.chan();
                p.input(c)
            }
            3 => {
                let c = self.chan();
                p.output(c)
            }
            4 => {
                let children = self.children(p, depth);
                p.seq(children)
            }
            5 => {
                let children = self.children(p, depth);
                p.par(children)
            }
            6 => {
                let guard = self.guard(p);
                let body = self.node(p, depth + 1);
                p.while_loop(guard, body)
            }
            7 => {
                let arms = (0..1 + self.next() % 3)
                    .map(|_| CondArm {
                        guard: self.guard(p),
                        body: self.node(p, depth + 1),
                    })
                    .collect();
                p.if_arms(arms)
            }
            8 => {
                let count = self.count(p);
                let body = self.node(p, depth + 1);
                p.repl_seq(count, body)
            }
            9 => {
                let count = self.count(p);
                let body = self.node(p, depth + 1);
                p.repl_par(count, body)
            }
            10 => {
                let arms = (0..self.next() % 3)
                    .map(|_| {
                        let precondition = match self.next() % 3 {
                            0 => None,
                            _ => Some(self.guard(p)),
                        };
                        let trigger = if self.next() % 2 == 0 {
                            AltTrigger::Input(self.chan())
                        } else {
                            AltTrigger::Skip
                        };
                        AltArm {
                            precondition,
                            trigger,
                            body: self.node(p, depth + 1),
                        }
                    })
                    .collect();
                p.alt(arms)
            }
            _ => {
                let v = p.variable("v");
                let one = p.int(1);
                p.assign(v, one)
            }
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let mut program = Program::new("fuzz");
    let chans = ["a", "b", "c"].iter().map(|n| program.channel(*n)).collect();
    let mut decoder = Decoder { data, pos: 0, chans };
    let root = decoder.node(&mut program, 0);

    let worker = program.declare_proc("worker", Span::default());
    let param = program.add_param(worker, "out", true, false, Span::default());
    let out = program.name_ref(param);
    let send = program.output(out);
    let body = program.seq(vec![root, send]);
    program.set_body(worker, body);

    let mut ctx = CompilationContext::new();
    let mut store = DeclTraces::new();
    for unit in [Unit::Process(root), Unit::Proc(worker)] {
        let _ = check(&program, unit, &mut ctx, &mut store, &CheckerOptions::default());
    }
});
