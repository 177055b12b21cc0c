use kernel::ast::BinderInfo;

/// Source location info
#[derive(Debug, Clone, PartialEq, Eq, Copy, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syntax {
    pub kind: SyntaxKind,
    pub span: Span,
}

impl Syntax {
    pub fn pretty_print(&self) -> String {
        match &self.kind {
            SyntaxKind::List(list) => {
                let inner: Vec<String> = list.iter().map(|s| s.pretty_print()).collect();
                format!("({})", inner.join(" "))
            }
            SyntaxKind::BracedList(list) => {
                let inner: Vec<String> = list.iter().map(|s| s.pretty_print()).collect();
                format!("{{{}}}", inner.join(" "))
            }
            SyntaxKind::Symbol(s) => s.clone(),
            SyntaxKind::Int(n) => n.to_string(),
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            SyntaxKind::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxKind {
    List(Vec<Syntax>),
    BracedList(Vec<Syntax>), // { ... }
    Symbol(String),
    Int(u32),
}

/// High-level Surface Term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceTerm {
    pub kind: SurfaceTermKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceTermKind {
    Var(String),
    Sort(u32),
    App(Box<SurfaceTerm>, Box<SurfaceTerm>),
    Lam(String, BinderInfo, Box<SurfaceTerm>, Box<SurfaceTerm>), // Name, Info, Type, Body
    Pi(String, BinderInfo, Box<SurfaceTerm>, Box<SurfaceTerm>),  // Name, Info, Type, Body
    Arrow(Box<SurfaceTerm>, Box<SurfaceTerm>),
    /// `(= a b)`; the carrier type is inferred from `a`.
    Eq(Box<SurfaceTerm>, Box<SurfaceTerm>),
}

/// A transformation named in a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tactic {
    Identity,
    Assumption,
    Apply(SurfaceTerm),
    Rewrite { equation: SurfaceTerm, reverse: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverChoice {
    None,
    Assumption,
}

/// Per-command overrides of the session defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Options {
    /// `Some(true)` for `:deferred`, `Some(false)` for `:eager`.
    pub deferred: Option<bool>,
    pub solver: Option<SolverChoice>,
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Axiom { name: String, ty: SurfaceTerm },
    Def { name: String, ty: SurfaceTerm, val: SurfaceTerm },
    Hyp { name: String, ty: SurfaceTerm },
    Have { name: String, ty: SurfaceTerm, val: SurfaceTerm },
    Goal(SurfaceTerm),
    /// Run on the main goal, or in place on the fact `at`.
    Run { tactic: Tactic, at: Option<String>, options: Options },
    CanApply { tactic: Tactic, at: Option<String>, options: Options },
    Eval { tactic: Tactic, expr: SurfaceTerm, options: Options },
    Traverse { tactic: Tactic, expr: SurfaceTerm, options: Options },
    Show,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandItem {
    pub command: Command,
    pub span: Span,
}
