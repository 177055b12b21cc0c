use crate::error::TacticError;
use crate::transform::{Identity, Mode, Transformation};
use std::fmt;
use std::rc::Rc;

/// Turns the last failure into the message reported when no depth works.
pub type FailHandler = Rc<dyn Fn(&TacticError) -> String>;

/// Options shared by every engine entry point.
#[derive(Clone)]
pub struct ApplyConfig {
    pub mode: Mode,
    /// Discharges side conditions. Defaults to [`Identity`], which only
    /// succeeds when there is nothing to discharge.
    pub solver: Rc<dyn Transformation>,
    pub fail_handler: Option<FailHandler>,
    /// Deepest number of binders the search may strip; unbounded if `None`.
    pub max_depth: Option<usize>,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        ApplyConfig {
            mode: Mode::Eager,
            solver: Rc::new(Identity),
            fail_handler: None,
            max_depth: None,
        }
    }
}

impl ApplyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eager() -> Self {
        Self::default().with_mode(Mode::Eager)
    }

    pub fn deferred() -> Self {
        Self::default().with_mode(Mode::Deferred)
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_solver(mut self, solver: impl Transformation + 'static) -> Self {
        self.solver = Rc::new(solver);
        self
    }

    pub fn with_fail_handler(mut self, handler: impl Fn(&TacticError) -> String + 'static) -> Self {
        self.fail_handler = Some(Rc::new(handler));
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl fmt::Debug for ApplyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyConfig")
            .field("mode", &self.mode)
            .field("solver", &self.solver.name())
            .field("fail_handler", &self.fail_handler.is_some())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
