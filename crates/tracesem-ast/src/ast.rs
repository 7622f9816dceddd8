use std::fmt;

/// Source span for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A spanned tree node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

macro_rules! arena_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serialize", derive(serde::Serialize))]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }

            fn from_len(len: usize) -> Self {
                Self(u32::try_from(len).unwrap_or(u32::MAX))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_handle!(
    /// Handle to a name (channel, variable or formal parameter) declaration.
    NameId,
    "n"
);
arena_handle!(
    /// Handle to an expression in the program arena.
    ExprId,
    "#"
);
arena_handle!(
    /// Handle to a process node in the program arena.
    NodeId,
    "p"
);
arena_handle!(
    /// Handle to a procedure declaration.
    DeclId,
    "d"
);

/// What a declared name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum NameKind {
    Channel,
    Variable,
    /// Formal parameter of `decl`; `position` counts every parameter,
    /// compiler-synthesized hidden ones included.
    Param {
        decl: DeclId,
        position: usize,
        hidden: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct NameDecl {
    pub name: String,
    pub kind: NameKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Wrappers that carry no meaning for channel identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Decoration {
    /// `c?` direction specifier.
    InputEnd,
    /// `c!` direction specifier.
    OutputEnd,
    TypeAnnotation,
    Paren,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Expr {
    Int(i64),
    Bool(bool),
    Name(NameId),
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Binary {
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Decorated {
        inner: ExprId,
        decoration: Decoration,
    },
    /// Element of a channel (or variable) array.
    Subscript {
        base: ExprId,
        index: ExprId,
    },
    /// A value only known at run time.
    Opaque,
}

/// One arm of a (possibly multi-armed) conditional.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct CondArm {
    pub guard: ExprId,
    pub body: NodeId,
}

/// What makes an ALT arm ready.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum AltTrigger {
    Input(ExprId),
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct AltArm {
    /// Boolean pre-condition (`cond & c ? x`); `None` means always enabled.
    pub precondition: Option<ExprId>,
    pub trigger: AltTrigger,
    pub body: NodeId,
}

/// An actual argument at a call site.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Arg {
    pub expr: ExprId,
    pub hidden: bool,
}

/// A process construct.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Process {
    Skip,
    Stop,
    Input {
        chan: ExprId,
    },
    Output {
        chan: ExprId,
    },
    Assign {
        target: ExprId,
        value: ExprId,
    },
    Seq(Vec<NodeId>),
    Par(Vec<NodeId>),
    ReplSeq {
        count: ExprId,
        body: NodeId,
    },
    ReplPar {
        count: ExprId,
        body: NodeId,
    },
    While {
        guard: ExprId,
        body: NodeId,
    },
    If {
        arms: Vec<CondArm>,
    },
    Alt {
        arms: Vec<AltArm>,
    },
    Call {
        decl: DeclId,
        args: Vec<Arg>,
    },
    Block {
        locals: Vec<NameId>,
        body: NodeId,
    },
}

/// Tag of a [`Process`], used for dispatch and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum ProcessKind {
    Skip,
    Stop,
    Input,
    Output,
    Assign,
    Seq,
    Par,
    ReplSeq,
    ReplPar,
    While,
    If,
    Alt,
    Call,
    Block,
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessKind::Skip => "SKIP",
            ProcessKind::Stop => "STOP",
            ProcessKind::Input => "input",
            ProcessKind::Output => "output",
            ProcessKind::Assign => "assignment",
            ProcessKind::Seq => "SEQ",
            ProcessKind::Par => "PAR",
            ProcessKind::ReplSeq => "replicated SEQ",
            ProcessKind::ReplPar => "replicated PAR",
            ProcessKind::While => "WHILE",
            ProcessKind::If => "IF",
            ProcessKind::Alt => "ALT",
            ProcessKind::Call => "instance",
            ProcessKind::Block => "block",
        };
        f.write_str(s)
    }
}

impl Process {
    pub fn kind(&self) -> ProcessKind {
        match self {
            Process::Skip => ProcessKind::Skip,
            Process::Stop => ProcessKind::Stop,
            Process::Input { .. } => ProcessKind::Input,
            Process::Output { .. } => ProcessKind::Output,
            Process::Assign { .. } => ProcessKind::Assign,
            Process::Seq(_) => ProcessKind::Seq,
            Process::Par(_) => ProcessKind::Par,
            Process::ReplSeq { .. } => ProcessKind::ReplSeq,
            Process::ReplPar { .. } => ProcessKind::ReplPar,
            Process::While { .. } => ProcessKind::While,
            Process::If { .. } => ProcessKind::If,
            Process::Alt { .. } => ProcessKind::Alt,
            Process::Call { .. } => ProcessKind::Call,
            Process::Block { .. } => ProcessKind::Block,
        }
    }

    /// Child process nodes in source order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Process::Skip
            | Process::Stop
            | Process::Input { .. }
            | Process::Output { .. }
            | Process::Assign { .. }
            | Process::Call { .. } => Vec::new(),
            Process::Seq(children) | Process::Par(children) => children.clone(),
            Process::ReplSeq { body, .. }
            | Process::ReplPar { body, .. }
            | Process::While { body, .. }
            | Process::Block { body, .. } => vec![*body],
            Process::If { arms } => arms.iter().map(|arm| arm.body).collect(),
            Process::Alt { arms } => arms.iter().map(|arm| arm.body).collect(),
        }
    }

    /// Guard of a loop or single-armed conditional.
    pub fn guard(&self) -> Option<ExprId> {
        match self {
            Process::While { guard, .. } => Some(*guard),
            Process::If { arms } if arms.len() == 1 => Some(arms[0].guard),
            _ => None,
        }
    }
}

/// A formal parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Param {
    pub name: NameId,
    pub is_channel: bool,
    /// Synthesized by the compiler (e.g. array dimensions); never matched
    /// against user-written arguments.
    pub hidden: bool,
}

/// Declared behavioural contract on a procedure interface.
///
/// Channels name the procedure's own formal parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum TraceSpec {
    Skip,
    Stop,
    Div,
    Chaos,
    Input(ExprId),
    Output(ExprId),
    Seq(Vec<TraceSpec>),
    Par(Vec<TraceSpec>),
    Det(Vec<TraceSpec>),
    Ndet(Vec<TraceSpec>),
    /// `rec X. body`
    Rec {
        var: String,
        body: Box<TraceSpec>,
    },
    Var(String),
}

/// A procedure declaration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ProcDecl {
    pub name: String,
    pub params: Vec<Param>,
    /// `None` for intrinsics and separately compiled procedures.
    pub body: Option<NodeId>,
    pub contract: Option<Spanned<TraceSpec>>,
    pub span: Span,
}

impl ProcDecl {
    /// Parameters a caller writes explicitly, in order.
    pub fn visible_params(&self) -> impl Iterator<Item = &Param> + '_ {
        self.params.iter().filter(|p| !p.hidden)
    }
}

/// A top-level unit of checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Unit {
    Proc(DeclId),
    Process(NodeId),
}

/// Source text attached to a program for diagnostic rendering.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SourceText {
    pub filename: String,
    pub text: String,
}

/// A typed, scoped, constant-folded compilation unit.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Program {
    pub name: String,
    pub source: Option<SourceText>,
    names: Vec<NameDecl>,
    exprs: Vec<Spanned<Expr>>,
    nodes: Vec<Spanned<Process>>,
    decls: Vec<ProcDecl>,
    pub units: Vec<Unit>,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, filename: impl Into<String>, text: impl Into<String>) -> Self {
        self.source = Some(SourceText {
            filename: filename.into(),
            text: text.into(),
        });
        self
    }

    pub fn add_name(&mut self, name: impl Into<String>, kind: NameKind, span: Span) -> NameId {
        let id = NameId::from_len(self.names.len());
        self.names.push(NameDecl {
            name: name.into(),
            kind,
            span,
        });
        id
    }

    pub fn add_expr(&mut self, expr: Expr, span: Span) -> ExprId {
        let id = ExprId::from_len(self.exprs.len());
        self.exprs.push(Spanned::new(expr, span));
        id
    }

    pub fn add_process(&mut self, process: Process, span: Span) -> NodeId {
        let id = NodeId::from_len(self.nodes.len());
        self.nodes.push(Spanned::new(process, span));
        id
    }

    /// Declare a procedure with no parameters and no body yet.
    pub fn declare_proc(&mut self, name: impl Into<String>, span: Span) -> DeclId {
        let id = DeclId::from_len(self.decls.len());
        self.decls.push(ProcDecl {
            name: name.into(),
            params: Vec::new(),
            body: None,
            contract: None,
            span,
        });
        id
    }

    /// Append a formal parameter to `decl`, returning its name handle.
    pub fn add_param(
        &mut self,
        decl: DeclId,
        name: impl Into<String>,
        is_channel: bool,
        hidden: bool,
        span: Span,
    ) -> NameId {
        let position = self.decls[decl.index()].params.len();
        let name = self.add_name(
            name,
            NameKind::Param {
                decl,
                position,
                hidden,
            },
            span,
        );
        self.decls[decl.index()].params.push(Param {
            name,
            is_channel,
            hidden,
        });
        name
    }

    pub fn set_body(&mut self, decl: DeclId, body: NodeId) {
        self.decls[decl.index()].body = Some(body);
    }

    pub fn set_contract(&mut self, decl: DeclId, contract: TraceSpec, span: Span) {
        self.decls[decl.index()].contract = Some(Spanned::new(contract, span));
    }

    pub fn name(&self, id: NameId) -> &NameDecl {
        &self.names[id.index()]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()].node
    }

    pub fn expr_span(&self, id: ExprId) -> Span {
        self.exprs[id.index()].span
    }

    pub fn process(&self, id: NodeId) -> &Process {
        &self.nodes[id.index()].node
    }

    pub fn process_span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn decl(&self, id: DeclId) -> &ProcDecl {
        &self.decls[id.index()]
    }

    pub fn decls(&self) -> impl Iterator<Item = (DeclId, &ProcDecl)> + '_ {
        self.decls
            .iter()
            .enumerate()
            .map(|(i, d)| (DeclId::from_len(i), d))
    }

    pub fn find_decl(&self, name: &str) -> Option<DeclId> {
        self.decls()
            .find(|(_, d)| d.name == name)
            .map(|(id, _)| id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn contains_decl(&self, id: DeclId) -> bool {
        id.index() < self.decls.len()
    }

    /// Strip purely decorative wrappers until reaching the real target.
    pub fn strip_decorations(&self, mut expr: ExprId) -> ExprId {
        while let Expr::Decorated { inner, .. } = self.expr(expr) {
            expr = *inner;
        }
        expr
    }

    /// The name an expression denotes once decorations are removed.
    pub fn resolve_name(&self, expr: ExprId) -> Option<NameId> {
        match self.expr(self.strip_decorations(expr)) {
            Expr::Name(name) => Some(*name),
            _ => None,
        }
    }

    /// Human-readable rendering of a channel-like expression.
    pub fn describe_expr(&self, expr: ExprId) -> String {
        match self.expr(expr) {
            Expr::Int(v) => v.to_string(),
            Expr::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Expr::Name(name) => self.name(*name).name.clone(),
            Expr::Decorated { inner, .. } => self.describe_expr(*inner),
            Expr::Subscript { base, index } => {
                format!("{}[{}]", self.describe_expr(*base), self.describe_expr(*index))
            }
            Expr::Unary { .. } | Expr::Binary { .. } | Expr::Opaque => format!("{expr}"),
        }
    }
}
