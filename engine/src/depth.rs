//! Depth search: find the fewest leading binders to strip from a goal or a
//! fact before a transformation applies, then commit and re-close them.

use crate::config::ApplyConfig;
use crate::error::{TacticError, TacticResult};
use crate::lemma::pi_arity;
use crate::session::{Opened, Session};
use crate::transform::{as_failure, check_determined, discharge, require_discharged, Transformation};
use kernel::context::Fact;
use kernel::meta::MetaKind;
use kernel::{BinderKind, MetaId, Term};
use std::rc::Rc;
use tracing::{debug, trace};

/// What a depth search works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The main goal of the session.
    Goal,
    /// A fact of the context, by name.
    Fact(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    /// Number of binders stripped before the transformation applied.
    pub depth: usize,
    /// The rewritten fact, for [`Target::Fact`].
    pub fact: Option<Fact>,
    /// Obligations left open by the commit, already re-closed.
    pub goals: Vec<MetaId>,
}

// Errors that do not depend on how many binders were stripped.
fn ends_search(err: &TacticError) -> bool {
    !matches!(err, TacticError::TransformationFailed(_) | TacticError::Type(_))
}

fn statement(session: &Session, target: &Target) -> TacticResult<Rc<Term>> {
    match target {
        Target::Goal => session.goal_type(session.main_goal()?),
        Target::Fact(name) => Ok(session.instantiate(&session.find_fact(name)?.statement)),
    }
}

/// Probe pass: the shallowest depth at which `transformation` applies and
/// commits cleanly. Nothing is changed.
pub fn can_apply(
    session: &mut Session,
    transformation: &dyn Transformation,
    target: &Target,
    config: &ApplyConfig,
) -> TacticResult<usize> {
    let stmt = statement(session, target)?;
    let limit = config
        .max_depth
        .map_or(pi_arity(&stmt), |max| max.min(pi_arity(&stmt)));

    let mut last = None;
    for depth in 0..=limit {
        trace!(depth, transformation = %transformation.name(), "probing");
        match session.probe(|s| commit(s, transformation, target, depth, config)) {
            Ok(_) => {
                debug!(depth, transformation = %transformation.name(), "probe succeeded");
                return Ok(depth);
            }
            Err(err) if ends_search(&err) => return Err(err),
            Err(err) => last = Some(err),
        }
    }
    Err(give_up(session, transformation, &stmt, last, limit, config))
}

fn give_up(
    session: &Session,
    transformation: &dyn Transformation,
    stmt: &Rc<Term>,
    last: Option<TacticError>,
    limit: usize,
    config: &ApplyConfig,
) -> TacticError {
    let last = last.unwrap_or(TacticError::NoGoals);
    match &config.fail_handler {
        Some(handler) => {
            TacticError::UserAbort(session.diagnostic(handler(&last), Some(stmt.clone())))
        }
        None => {
            let reason = last
                .diagnostic()
                .map_or_else(|| last.to_string(), |d| d.message.clone());
            let message = format!(
                "`{}` does not apply under any of the first {} binders: {}",
                transformation.name(),
                limit,
                reason
            );
            TacticError::TransformationFailed(session.diagnostic(message, Some(stmt.clone())))
        }
    }
}

/// Refine the main goal with `transformation` under as few binders as possible.
pub fn apply_under_binders(
    session: &mut Session,
    transformation: &dyn Transformation,
    config: &ApplyConfig,
) -> TacticResult<CommitResult> {
    apply_to(session, transformation, &Target::Goal, config)
}

/// Rewrite the fact `name` in place with `transformation`, under as few of its
/// binders as possible. The fact keeps its identifier and name.
pub fn apply_under_binders_at(
    session: &mut Session,
    transformation: &dyn Transformation,
    name: &str,
    config: &ApplyConfig,
) -> TacticResult<CommitResult> {
    apply_to(session, transformation, &Target::Fact(name.to_string()), config)
}

fn apply_to(
    session: &mut Session,
    transformation: &dyn Transformation,
    target: &Target,
    config: &ApplyConfig,
) -> TacticResult<CommitResult> {
    let depth = can_apply(session, transformation, target, config)?;
    let result = session.scoped(|s| commit(s, transformation, target, depth, config))?;
    debug!(
        depth,
        transformation = %transformation.name(),
        goals = result.goals.len(),
        "committed"
    );
    Ok(result)
}

/// Commit pass at a fixed depth.
fn commit(
    session: &mut Session,
    transformation: &dyn Transformation,
    target: &Target,
    depth: usize,
    config: &ApplyConfig,
) -> TacticResult<CommitResult> {
    match target {
        Target::Goal => commit_goal(session, transformation, depth, config),
        Target::Fact(name) => commit_fact(session, transformation, name, depth, config),
    }
}

/// Strip `depth` leading `∀`s off `stmt` into the context.
fn strip(
    session: &mut Session,
    mut stmt: Rc<Term>,
    depth: usize,
) -> TacticResult<(Vec<Opened>, Rc<Term>)> {
    let mut opened = Vec::with_capacity(depth);
    for _ in 0..depth {
        let Some(binder) = stmt.as_binder().filter(|b| b.kind == BinderKind::Pi) else {
            return session.fail(
                format!("no binder left to strip at depth {}", opened.len()),
                Some(stmt),
            );
        };
        let (o, body) = session.intro(&binder)?;
        opened.push(o);
        stmt = body;
    }
    Ok((opened, stmt))
}

fn commit_goal(
    session: &mut Session,
    transformation: &dyn Transformation,
    depth: usize,
    config: &ApplyConfig,
) -> TacticResult<CommitResult> {
    let goal = session.main_goal()?;
    let mark = session.mark();
    let stmt = session.goal_type(goal)?;
    let (opened, inner_stmt) = strip(session, stmt, depth)?;

    let inner = session.new_meta(inner_stmt, MetaKind::Goal);
    let obligations = transformation
        .refine(session, inner)
        .map_err(|err| as_failure(session, err))?;
    // whatever the solver leaves open stays a goal
    discharge(session, config.solver.as_ref(), &obligations);
    check_determined(session, mark, config.mode)?;

    let mut proof = Term::meta(inner);
    for o in opened.iter().rev() {
        let fact = session.reclose_binder(o, mark)?;
        proof = session.close_term(o, &fact, BinderKind::Lam, &proof);
    }
    let proof = session.instantiate(&proof);
    if !session.assign(goal, proof) {
        return session.fail("the goal was already solved", None);
    }

    let goals = session.metas().unassigned_since(mark);
    session.replace_goal(goal, &goals);
    Ok(CommitResult {
        depth,
        fact: None,
        goals,
    })
}

fn commit_fact(
    session: &mut Session,
    transformation: &dyn Transformation,
    name: &str,
    depth: usize,
    config: &ApplyConfig,
) -> TacticResult<CommitResult> {
    let original = session.find_fact(name)?;
    let mark = session.mark();
    let stmt = session.instantiate(&original.statement);
    let (opened, inner_stmt) = strip(session, stmt, depth)?;

    let value = Term::apps(
        Term::fvar(original.id),
        opened.iter().map(|o| Term::fvar(o.id)),
    );
    let working = Fact {
        id: original.id,
        name: original.name.clone(),
        statement: inner_stmt,
        value: Some(value),
    };
    let outcome = transformation
        .rewrite(session, &working)
        .map_err(|err| as_failure(session, err))?;
    require_discharged(session, config.solver.as_ref(), mark, &outcome.side_conditions)?;
    check_determined(session, mark, config.mode)?;

    let mut statement = outcome.fact.statement.clone();
    let mut value = outcome.fact.reference();
    for o in opened.iter().rev() {
        let fact = session.reclose_binder(o, mark)?;
        statement = session.close_term(o, &fact, BinderKind::Pi, &statement);
        value = session.close_term(o, &fact, BinderKind::Lam, &value);
    }
    let statement = session.instantiate(&statement);
    let value = session.instantiate(&value);
    let fact = reinsert(session, &original, statement, value)?;

    let goals = session.metas().unassigned_since(mark);
    session.prepend_goals(&goals);
    Ok(CommitResult {
        depth,
        fact: Some(fact),
        goals,
    })
}

/// Put the rewritten fact back under its identifier: at its old position, or
/// just after the last fact it now depends on.
fn reinsert(
    session: &mut Session,
    original: &Fact,
    statement: Rc<Term>,
    value: Rc<Term>,
) -> TacticResult<Fact> {
    if statement.has_fvar(original.id) {
        let message = format!("the rewritten statement of `{}` mentions itself", original.name);
        return Err(TacticError::ReclosureFailure(
            session.diagnostic(message, Some(statement)),
        ));
    }
    // later facts were typed against the old statement
    if !statement.alpha_eq(&session.instantiate(&original.statement)) {
        if let Some(dependent) = session.ctx().dependents(original.id).first() {
            let message = format!(
                "`{}` cannot change while `{}` depends on it",
                original.name, dependent.name
            );
            return Err(TacticError::ReclosureFailure(
                session.diagnostic(message, Some(statement)),
            ));
        }
    }
    let (pos, old) = session.remove_fact(original.id)?;
    let value = old
        .value
        .as_ref()
        .map(|payload| value.replace_fvar(original.id, payload));

    let mut deps = statement.fvars();
    if let Some(v) = &value {
        deps.extend(v.fvars());
    }
    let after = deps
        .iter()
        .filter_map(|id| session.ctx().position(*id))
        .max()
        .map_or(0, |p| p + 1);
    let at = pos.max(after);
    if let Some(blocker) = session.ctx().facts()[pos..at]
        .iter()
        .find(|f| f.mentions(original.id))
    {
        let message = format!(
            "`{}` would have to move after `{}`, which depends on it",
            original.name, blocker.name
        );
        return Err(TacticError::ReclosureFailure(session.diagnostic(message, None)));
    }

    let fact = Fact {
        id: original.id,
        name: original.name.clone(),
        statement,
        value,
    };
    trace!(fact = %fact.name, from = pos, to = at, "reinserted");
    session.insert_fact(at, fact.clone())?;
    Ok(fact)
}
