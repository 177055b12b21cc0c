use crate::ast::{MetaId, Term};
use crate::checker::{whnf, Env};
use crate::context::Context;
use crate::meta::MetaCtx;
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnifyError {
    #[error("cannot unify {0} with {1}")]
    Mismatch(Rc<Term>, Rc<Term>),
    #[error("placeholder ?m.{} occurs in its own solution", .0.0)]
    Occurs(MetaId),
    #[error("solution for ?m.{} mentions facts outside its scope", .0.0)]
    Scope(MetaId),
}

/// First-order unification over placeholders.
///
/// Assignments are recorded in the borrowed [`MetaCtx`] as they are found; a
/// failed call may leave partial assignments behind, so callers that need to
/// back out run it inside a checkpoint.
pub struct Unifier<'a> {
    env: &'a Env,
    ctx: &'a Context,
    metas: &'a mut MetaCtx,
}

impl<'a> Unifier<'a> {
    pub fn new(env: &'a Env, ctx: &'a Context, metas: &'a mut MetaCtx) -> Self {
        Unifier { env, ctx, metas }
    }

    pub fn unify(&mut self, a: &Rc<Term>, b: &Rc<Term>) -> Result<(), UnifyError> {
        let a = self.metas.instantiate(a);
        let b = self.metas.instantiate(b);
        if a.alpha_eq(&b) {
            return Ok(());
        }
        match (&*a, &*b) {
            (Term::Meta(m), _) if !self.metas.is_assigned(*m) => return self.assign(*m, &b),
            (_, Term::Meta(m)) if !self.metas.is_assigned(*m) => return self.assign(*m, &a),
            _ => {}
        }
        if self.unify_structural(&a, &b).is_ok() {
            return Ok(());
        }
        let a_whnf = whnf(self.env, self.metas, &a);
        let b_whnf = whnf(self.env, self.metas, &b);
        if a_whnf == a && b_whnf == b {
            return Err(UnifyError::Mismatch(a, b));
        }
        self.unify(&a_whnf, &b_whnf)
    }

    fn unify_structural(&mut self, a: &Rc<Term>, b: &Rc<Term>) -> Result<(), UnifyError> {
        match (&**a, &**b) {
            (Term::App(f1, x1), Term::App(f2, x2)) => {
                self.unify(f1, f2)?;
                self.unify(x1, x2)
            }
            (Term::Lam(_, _, d1, b1), Term::Lam(_, _, d2, b2))
            | (Term::Pi(_, _, d1, b1), Term::Pi(_, _, d2, b2)) => {
                self.unify(d1, d2)?;
                self.unify(b1, b2)
            }
            _ => Err(UnifyError::Mismatch(a.clone(), b.clone())),
        }
    }

    fn assign(&mut self, m: MetaId, val: &Rc<Term>) -> Result<(), UnifyError> {
        if val.metas().contains(&m) {
            return Err(UnifyError::Occurs(m));
        }
        // a placeholder cannot capture variables bound inside the term being matched
        if val.has_loose_bvars() {
            return Err(UnifyError::Mismatch(Term::meta(m), val.clone()));
        }
        let depth = self.metas.decl(m).map(|d| d.depth).unwrap_or(0);
        let in_scope = val
            .fvars()
            .into_iter()
            .all(|id| self.ctx.position(id).is_some_and(|pos| pos < depth));
        if !in_scope {
            return Err(UnifyError::Scope(m));
        }
        // placeholders in the solution must not see more than `m` does
        for other in val.metas() {
            self.metas.lower_depth(other, depth);
        }
        if self.metas.assign(m, val.clone()) {
            Ok(())
        } else {
            Err(UnifyError::Mismatch(Term::meta(m), val.clone()))
        }
    }
}
