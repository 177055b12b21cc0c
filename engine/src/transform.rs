//! The protocol every transformation (and every solver) speaks.

use crate::error::{TacticError, TacticResult};
use crate::session::Session;
use kernel::context::Fact;
use kernel::meta::{MetaKind, MetaMark};
use kernel::{MetaId, Term};

/// Result of running a transformation forward on a fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// The rewritten fact; its payload (or reference) proves its statement.
    pub fact: Fact,
    /// Auxiliary obligations the caller must discharge.
    pub side_conditions: Vec<MetaId>,
}

impl Outcome {
    pub fn new(fact: Fact) -> Self {
        Outcome {
            fact,
            side_conditions: Vec::new(),
        }
    }
}

/// How underdetermined parameters are treated once a transformation returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Every parameter must be pinned down before commit.
    #[default]
    Eager,
    /// Unsolved parameters stay behind as new obligations.
    Deferred,
}

/// A rule that can refine a goal (backward) or rewrite a fact (forward).
///
/// Both directions may create placeholders and push facts; the engine
/// owns scoping and undoes whatever a failed attempt left behind.
pub trait Transformation {
    fn name(&self) -> String;

    /// Solve `goal` (by assigning it) and return the obligations left open.
    fn refine(&self, session: &mut Session, goal: MetaId) -> TacticResult<Vec<MetaId>>;

    fn rewrite(&self, session: &mut Session, fact: &Fact) -> TacticResult<Outcome>;
}

/// Leaves goals open and facts unchanged. As a solver it only succeeds when
/// there is nothing to solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transformation for Identity {
    fn name(&self) -> String {
        "id".to_string()
    }

    fn refine(&self, _session: &mut Session, goal: MetaId) -> TacticResult<Vec<MetaId>> {
        Ok(vec![goal])
    }

    fn rewrite(&self, _session: &mut Session, fact: &Fact) -> TacticResult<Outcome> {
        Ok(Outcome::new(fact.clone()))
    }
}

/// Closes a goal with a fact of the context whose statement unifies with it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Assumption;

impl Transformation for Assumption {
    fn name(&self) -> String {
        "assumption".to_string()
    }

    fn refine(&self, session: &mut Session, goal: MetaId) -> TacticResult<Vec<MetaId>> {
        let target = session.goal_type(goal)?;
        let facts: Vec<Fact> = session.ctx().iter().rev().cloned().collect();
        for fact in facts {
            let closed = session.scoped(|s| {
                let unified = s
                    .unify(&fact.statement, &target)
                    .and_then(|_| s.unify(&Term::meta(goal), &Term::fvar(fact.id)));
                unified.or_else(|e| s.fail(e.to_string(), None))
            });
            if closed.is_ok() {
                return Ok(Vec::new());
            }
        }
        session.fail("no fact in the context matches the goal", Some(target))
    }

    fn rewrite(&self, session: &mut Session, fact: &Fact) -> TacticResult<Outcome> {
        session.fail(
            format!("assumption cannot rewrite `{}`", fact.name),
            Some(fact.statement.clone()),
        )
    }
}

/// Run `solver` on each obligation. Returns the ones it could not close.
pub fn discharge(
    session: &mut Session,
    solver: &dyn Transformation,
    obligations: &[MetaId],
) -> Vec<MetaId> {
    let mut unsolved = Vec::new();
    for &ob in obligations {
        if session.metas().is_assigned(ob) {
            continue;
        }
        let solved = session.scoped(|s| {
            let rest = solver.refine(s, ob)?;
            if rest.iter().all(|m| s.metas().is_assigned(*m)) {
                Ok(())
            } else {
                s.fail(format!("{} left obligations open", solver.name()), None)
            }
        });
        if solved.is_err() {
            unsolved.push(ob);
        }
    }
    unsolved
}

/// Discharge `explicit` plus every side condition created since `mark`,
/// failing on the first one `solver` leaves open.
pub fn require_discharged(
    session: &mut Session,
    solver: &dyn Transformation,
    mark: MetaMark,
    explicit: &[MetaId],
) -> TacticResult<()> {
    let mut obligations = explicit.to_vec();
    for id in session.metas().unassigned_since(mark) {
        let is_side = session
            .metas()
            .decl(id)
            .is_some_and(|d| d.kind == MetaKind::SideCondition);
        if is_side && !obligations.contains(&id) {
            obligations.push(id);
        }
    }
    let unsolved = discharge(session, solver, &obligations);
    match unsolved.first() {
        None => Ok(()),
        Some(&open) => {
            let message = format!(
                "solver `{}` could not close side condition ?m.{}",
                solver.name(),
                open.0
            );
            let goal = session.goal_type(open)?;
            Err(TacticError::UnsolvedSideCondition(
                session.diagnostic(message, Some(goal)),
            ))
        }
    }
}

/// In eager mode, reject parameters created since `mark` that are still unassigned.
pub fn check_determined(session: &Session, mark: MetaMark, mode: Mode) -> TacticResult<()> {
    if mode == Mode::Deferred {
        return Ok(());
    }
    let open = session
        .metas()
        .unassigned_since(mark)
        .into_iter()
        .find(|id| session.metas().decl(*id).is_some_and(|d| d.kind == MetaKind::Param));
    match open {
        None => Ok(()),
        Some(param) => {
            let ty = session.goal_type(param)?;
            session.fail(
                format!("could not determine parameter ?m.{}", param.0),
                Some(ty),
            )
        }
    }
}

/// Errors raised while running a transformation, reported as its failure.
pub fn as_failure(session: &Session, err: TacticError) -> TacticError {
    match err {
        TacticError::Context(_) | TacticError::Type(_) => {
            TacticError::TransformationFailed(session.diagnostic(err.to_string(), None))
        }
        other => other,
    }
}
