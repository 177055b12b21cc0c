use kernel::context::{Context, ContextError, Fact};
use kernel::{Printer, Term, TypeError};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Failure payload: what went wrong, the goal being worked on, and every
/// fact that was in scope when it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub goal: Option<Rc<Term>>,
    pub context: Vec<Fact>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            goal: None,
            context: Vec::new(),
        }
    }

    pub fn with_goal(mut self, goal: Rc<Term>) -> Self {
        self.goal = Some(goal);
        self
    }

    pub fn with_context(mut self, context: Vec<Fact>) -> Self {
        self.context = context;
        self
    }

    /// Multi-line report: message, context facts, then the goal.
    pub fn render(&self) -> String {
        let ctx = Context::from_facts(self.context.clone());
        let mut out = self.message.clone();
        for fact in &self.context {
            let mut printer = Printer::with_context(&ctx);
            out.push_str(&format!("\n  {} : {}", fact.name, printer.print(&fact.statement)));
            if let Some(value) = &fact.value {
                out.push_str(&format!(" := {}", Printer::with_context(&ctx).print(value)));
            }
        }
        if let Some(goal) = &self.goal {
            out.push_str(&format!("\n  ⊢ {}", Printer::with_context(&ctx).print(goal)));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TacticError {
    #[error("transformation failed: {0}")]
    TransformationFailed(Diagnostic),
    #[error("unsolved side condition: {0}")]
    UnsolvedSideCondition(Diagnostic),
    #[error("cannot re-close binder: {0}")]
    ReclosureFailure(Diagnostic),
    #[error("{0}")]
    UserAbort(Diagnostic),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error("no goals")]
    NoGoals,
}

impl TacticError {
    /// Fatal errors end a depth search instead of moving on to the next depth.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TacticError::ReclosureFailure(_))
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            TacticError::TransformationFailed(d)
            | TacticError::UnsolvedSideCondition(d)
            | TacticError::ReclosureFailure(d)
            | TacticError::UserAbort(d) => Some(d),
            _ => None,
        }
    }

    /// Full report, including context and goal when the error carries them.
    pub fn render(&self) -> String {
        match self.diagnostic() {
            Some(diag) => {
                let head = self.to_string();
                let rendered = diag.render();
                match rendered.split_once('\n') {
                    Some((_, rest)) => format!("{}\n{}", head, rest),
                    None => head,
                }
            }
            None => self.to_string(),
        }
    }
}

pub type TacticResult<T> = Result<T, TacticError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::FVarId;

    #[test]
    fn render_lists_context_then_goal() {
        let x = FVarId(0);
        let diag = Diagnostic::new("solver `none` could not close side condition")
            .with_goal(Term::app(Term::cnst("B"), Term::fvar(x)))
            .with_context(vec![Fact::new(x, "x", Term::cnst("A"))]);
        let err = TacticError::UnsolvedSideCondition(diag);
        insta::assert_snapshot!(err.render(), @r"
        unsolved side condition: solver `none` could not close side condition
          x : A
          ⊢ B x
        ");
    }

    #[test]
    fn only_reclosure_is_fatal() {
        assert!(TacticError::ReclosureFailure(Diagnostic::new("x")).is_fatal());
        assert!(!TacticError::TransformationFailed(Diagnostic::new("x")).is_fatal());
        assert!(!TacticError::UnsolvedSideCondition(Diagnostic::new("x")).is_fatal());
        assert!(!TacticError::NoGoals.is_fatal());
    }
}
