//! Binder-aware term transformation.
//!
//! Runs a transformation that only understands quantifier-free statements
//! on statements wrapped in any number of leading `∀`s, either on the main
//! goal, in place on a named fact, or on a free-standing expression.

pub mod config;
pub mod depth;
pub mod error;
pub mod evaluate;
pub mod lemma;
pub mod session;
pub mod transform;
pub mod traverse;

pub use config::{ApplyConfig, FailHandler};
pub use depth::{apply_under_binders, apply_under_binders_at, can_apply, CommitResult, Target};
pub use error::{Diagnostic, TacticError, TacticResult};
pub use evaluate::evaluate;
pub use lemma::{ApplyLemma, RewriteBy};
pub use session::{Opened, Session};
pub use transform::{Assumption, Identity, Mode, Outcome, Transformation};
pub use traverse::traverse_apply;
