use crate::error::{Diagnostic, TacticError, TacticResult};
use kernel::checker::{infer, Env};
use kernel::context::{Context, ContextError, Fact};
use kernel::meta::{MetaCtx, MetaKind, MetaMark};
use kernel::{Binder, BinderInfo, BinderKind, FVarId, MetaId, Term, UnifyError, Unifier};
use std::rc::Rc;
use tracing::{debug, trace};

/// A binder that was opened into the context by [`Session::intro`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub id: FVarId,
    /// Name of the binder as written, before alpha-renaming.
    pub name: String,
    pub info: BinderInfo,
    pub kind: BinderKind,
}

#[derive(Debug, Clone)]
struct Checkpoint {
    ctx: Context,
    metas: MetaCtx,
    goals: Vec<MetaId>,
}

/// Ambient reasoning state owned by one engine invocation.
///
/// The fresh-identifier counter is never rolled back, so a fact identifier
/// is never handed out twice even across abandoned branches.
#[derive(Debug, Clone)]
pub struct Session {
    env: Env,
    ctx: Context,
    metas: MetaCtx,
    goals: Vec<MetaId>,
    next_fvar: u64,
}

impl Session {
    pub fn new(env: Env) -> Self {
        Session {
            env,
            ctx: Context::new(),
            metas: MetaCtx::new(),
            goals: Vec::new(),
            next_fvar: 0,
        }
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Env {
        &mut self.env
    }

    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    pub fn metas(&self) -> &MetaCtx {
        &self.metas
    }

    pub fn goals(&self) -> &[MetaId] {
        &self.goals
    }

    pub fn main_goal(&self) -> TacticResult<MetaId> {
        self.goals.first().copied().ok_or(TacticError::NoGoals)
    }

    /// Instantiated statement of a placeholder.
    pub fn goal_type(&self, goal: MetaId) -> TacticResult<Rc<Term>> {
        self.metas
            .ty(goal)
            .map(|ty| self.metas.instantiate(&ty))
            .ok_or_else(|| {
                let message = format!("unknown goal ?m.{}", goal.0);
                TacticError::TransformationFailed(Diagnostic::new(message))
            })
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            ctx: self.ctx.clone(),
            metas: self.metas.clone(),
            goals: self.goals.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.ctx = checkpoint.ctx;
        self.metas = checkpoint.metas;
        self.goals = checkpoint.goals;
    }

    /// Run `f` and roll everything back, whatever the result.
    pub fn probe<T>(&mut self, f: impl FnOnce(&mut Self) -> TacticResult<T>) -> TacticResult<T> {
        let saved = self.checkpoint();
        let result = f(self);
        self.restore(saved);
        result
    }

    /// Run `f`, rolling back only if it fails.
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> TacticResult<T>) -> TacticResult<T> {
        let saved = self.checkpoint();
        let result = f(self);
        if result.is_err() {
            self.restore(saved);
        }
        result
    }

    /// Run `f` in a private scope: the context always comes back unchanged,
    /// placeholders and goals are kept only on success.
    pub fn isolated<T>(&mut self, f: impl FnOnce(&mut Self) -> TacticResult<T>) -> TacticResult<T> {
        let saved = self.checkpoint();
        let mark = self.metas.mark();
        let result = f(self);
        match &result {
            Ok(_) => {
                self.ctx = saved.ctx;
                let depth = self.ctx.len();
                for id in self.metas.unassigned_since(mark) {
                    self.metas.lower_depth(id, depth);
                }
            }
            Err(_) => self.restore(saved),
        }
        result
    }

    pub fn mark(&self) -> MetaMark {
        self.metas.mark()
    }

    fn fresh_fvar(&mut self) -> FVarId {
        let id = FVarId(self.next_fvar);
        self.next_fvar += 1;
        id
    }

    pub fn instantiate(&self, term: &Rc<Term>) -> Rc<Term> {
        self.metas.instantiate(term)
    }

    pub fn infer(&self, term: &Rc<Term>) -> TacticResult<Rc<Term>> {
        Ok(infer(&self.env, &self.ctx, &self.metas, term)?)
    }

    /// Unify two terms; assignments made before a failure are not undone.
    pub fn unify(&mut self, a: &Rc<Term>, b: &Rc<Term>) -> Result<(), UnifyError> {
        Unifier::new(&self.env, &self.ctx, &mut self.metas).unify(a, b)
    }

    /// New placeholder seeing the whole current context.
    pub fn new_meta(&mut self, ty: Rc<Term>, kind: MetaKind) -> MetaId {
        self.metas.fresh(ty, self.ctx.len(), kind)
    }

    pub fn assign(&mut self, id: MetaId, val: Rc<Term>) -> bool {
        self.metas.assign(id, val)
    }

    pub fn add_goal(&mut self, statement: Rc<Term>) -> MetaId {
        let goal = self.new_meta(statement, MetaKind::Goal);
        self.goals.push(goal);
        goal
    }

    /// Replace `old` in the goal list by `new`, in place.
    pub fn replace_goal(&mut self, old: MetaId, new: &[MetaId]) {
        if let Some(pos) = self.goals.iter().position(|g| *g == old) {
            self.goals.splice(pos..=pos, new.iter().copied());
        }
    }

    pub fn prepend_goals(&mut self, new: &[MetaId]) {
        self.goals.splice(0..0, new.iter().copied());
    }

    pub fn prune_goals(&mut self) {
        let metas = &self.metas;
        self.goals.retain(|g| !metas.is_assigned(*g));
    }

    pub fn find_fact(&self, name: &str) -> TacticResult<Fact> {
        self.ctx
            .find(name)
            .cloned()
            .ok_or_else(|| ContextError::UnknownFact(name.to_string()).into())
    }

    /// Add a hypothesis under exactly `name`.
    pub fn assume(&mut self, name: &str, statement: Rc<Term>) -> TacticResult<FVarId> {
        let id = self.fresh_fvar();
        self.ctx.push(Fact::new(id, name, statement))?;
        Ok(id)
    }

    /// Add a fact carrying a payload under exactly `name`.
    pub fn define(&mut self, name: &str, statement: Rc<Term>, value: Rc<Term>) -> TacticResult<FVarId> {
        let id = self.fresh_fvar();
        self.ctx.push(Fact::new(id, name, statement).with_value(value))?;
        Ok(id)
    }

    /// Open a binder: push a fact for its variable under an alpha-renamed
    /// name and return the body instantiated at that fact.
    pub fn intro(&mut self, binder: &Binder) -> TacticResult<(Opened, Rc<Term>)> {
        let id = self.fresh_fvar();
        let name = self.ctx.fresh_name(&binder.name);
        let domain = self.instantiate(&binder.domain);
        trace!(binder = %binder.name, fact = %name, "intro");
        self.ctx.push(Fact::new(id, name, domain))?;
        let opened = Opened {
            id,
            name: binder.name.clone(),
            info: binder.info,
            kind: binder.kind,
        };
        Ok((opened, binder.body.instantiate(&Term::fvar(id))))
    }

    pub fn remove_fact(&mut self, id: FVarId) -> TacticResult<(usize, Fact)> {
        let (pos, fact) = self
            .ctx
            .remove(id)
            .ok_or_else(|| ContextError::UnknownFact(format!("_fvar.{}", id.0)))?;
        self.metas.fact_removed(pos);
        Ok((pos, fact))
    }

    pub fn insert_fact(&mut self, pos: usize, fact: Fact) -> TacticResult<()> {
        let pos = pos.min(self.ctx.len());
        self.ctx.insert_at(pos, fact)?;
        self.metas.fact_inserted(pos);
        Ok(())
    }

    /// Undo one [`intro`](Self::intro).
    ///
    /// Every placeholder created since `mark` that can still see the fact is
    /// raised over it (`?m := ?n x` with `?n : ∀ x : A, T`), then the fact is
    /// removed. Refuses if a remaining later fact depends on it.
    pub fn reclose_binder(&mut self, opened: &Opened, mark: MetaMark) -> TacticResult<Fact> {
        let pos = self
            .ctx
            .position(opened.id)
            .ok_or_else(|| ContextError::UnknownFact(opened.name.clone()))?;
        if let Some(dependent) = self.ctx.dependents(opened.id).first() {
            let message = format!("`{}` depends on `{}`", dependent.name, self.ctx.facts()[pos].name);
            return Err(TacticError::ReclosureFailure(self.diagnostic(message, None)));
        }
        let fact = self.ctx.facts()[pos].clone();
        let domain = self.instantiate(&fact.statement);

        let raised: Vec<MetaId> = self
            .metas
            .unassigned_since(mark)
            .into_iter()
            .filter(|m| self.metas.decl(*m).is_some_and(|d| d.depth > pos))
            .collect();
        for m in raised {
            let Some(decl) = self.metas.decl(m).cloned() else {
                continue;
            };
            let ty = self.instantiate(&decl.ty);
            let raised_ty = Rc::new(Term::Pi(
                opened.name.clone(),
                opened.info,
                domain.clone(),
                ty.abstract_fvar(opened.id),
            ));
            let n = self.metas.fresh(raised_ty, pos, decl.kind);
            self.metas.assign(m, Term::app(Term::meta(n), Term::fvar(opened.id)));
            if let Some(slot) = self.goals.iter_mut().find(|g| **g == m) {
                *slot = n;
            }
            trace!(from = m.0, to = n.0, binder = %opened.name, "raised placeholder");
        }

        self.remove_fact(opened.id)?;
        debug!(binder = %opened.name, "re-closed");
        Ok(fact)
    }

    /// Abstract a re-closed fact out of `term` and wrap it in a binder with
    /// the original name.
    pub fn close_term(&self, opened: &Opened, fact: &Fact, kind: BinderKind, term: &Rc<Term>) -> Rc<Term> {
        let body = self.instantiate(term).abstract_fvar(opened.id);
        Term::binder(kind, opened.name.clone(), opened.info, self.instantiate(&fact.statement), body)
    }

    /// Diagnostic carrying the current context.
    pub fn diagnostic(&self, message: impl Into<String>, goal: Option<Rc<Term>>) -> Diagnostic {
        let diag = Diagnostic::new(message).with_context(self.ctx.snapshot());
        match goal {
            Some(goal) => diag.with_goal(self.instantiate(&goal)),
            None => diag,
        }
    }

    pub fn fail<T>(&self, message: impl Into<String>, goal: Option<Rc<Term>>) -> TacticResult<T> {
        Err(TacticError::TransformationFailed(self.diagnostic(message, goal)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let mut env = Env::with_equality();
        env.add_axiom("A", Term::sort(1)).unwrap();
        env.add_axiom("B", Term::arrow(Term::cnst("A"), Term::prop())).unwrap();
        Session::new(env)
    }

    fn forall_b() -> Rc<Term> {
        Term::pi("x", Term::cnst("A"), Term::app(Term::cnst("B"), Term::bvar(0)))
    }

    #[test]
    fn intro_renames_on_clash() {
        let mut s = session();
        s.assume("x", Term::cnst("A")).unwrap();
        let binder = forall_b().as_binder().unwrap();
        let (opened, body) = s.intro(&binder).unwrap();
        assert_eq!(opened.name, "x");
        assert_eq!(s.ctx().facts()[1].name, "x_1");
        assert_eq!(body, Term::app(Term::cnst("B"), Term::fvar(opened.id)));
    }

    #[test]
    fn probe_always_rolls_back() {
        let mut s = session();
        let binder = forall_b().as_binder().unwrap();
        let result = s.probe(|s| {
            s.intro(&binder)?;
            Ok(s.ctx().len())
        });
        assert_eq!(result, Ok(1));
        assert!(s.ctx().is_empty());
    }

    #[test]
    fn scoped_keeps_success() {
        let mut s = session();
        s.scoped(|s| s.assume("h", Term::cnst("A"))).unwrap();
        assert_eq!(s.ctx().len(), 1);
        let failed: TacticResult<()> = s.scoped(|s| {
            s.assume("k", Term::cnst("A"))?;
            s.fail("no", None)
        });
        assert!(failed.is_err());
        assert_eq!(s.ctx().len(), 1);
    }

    #[test]
    fn identifiers_are_not_reused_after_rollback() {
        let mut s = session();
        let first = s.probe(|s| s.assume("h", Term::cnst("A"))).unwrap();
        let second = s.assume("h", Term::cnst("A")).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn reclose_raises_open_placeholders() {
        let mut s = session();
        let mark = s.mark();
        let binder = forall_b().as_binder().unwrap();
        let (opened, body) = s.intro(&binder).unwrap();
        let m = s.new_meta(body, MetaKind::Goal);
        s.goals.push(m);
        let fact = s.reclose_binder(&opened, mark).unwrap();
        assert!(s.ctx().is_empty());
        assert!(s.metas().is_assigned(m));
        let raised = s.main_goal().unwrap();
        assert_eq!(s.goal_type(raised).unwrap(), forall_b());
        let closed = s.close_term(&opened, &fact, BinderKind::Lam, &Term::meta(m));
        assert_eq!(
            closed,
            Term::lam("x", Term::cnst("A"), Term::app(Term::meta(raised), Term::bvar(0)))
        );
    }

    #[test]
    fn reclose_refuses_when_a_later_fact_depends() {
        let mut s = session();
        let mark = s.mark();
        let binder = forall_b().as_binder().unwrap();
        let (opened, body) = s.intro(&binder).unwrap();
        s.assume("h", body).unwrap();
        let err = s.reclose_binder(&opened, mark).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(s.ctx().len(), 2);
    }
}
