pub mod ast;
pub mod checker;
pub mod context;
pub mod meta;
pub mod pretty;
pub mod unify;

pub use ast::*;
pub use checker::{Env, TypeError};
pub use context::{Context, ContextError, Fact};
pub use meta::{MetaCtx, MetaKind, MetaMark};
pub use pretty::Printer;
pub use unify::{UnifyError, Unifier};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{infer, whnf};
    use std::rc::Rc;

    fn env() -> Env {
        let mut env = Env::with_equality();
        env.add_axiom("A", Term::sort(1)).expect("fresh name");
        env.add_axiom("B", Term::arrow(Term::cnst("A"), Term::prop()))
            .expect("fresh name");
        env
    }

    #[test]
    fn test_open_infer_close() {
        // ∀ x : A, B x  opened at a fact, inferred, closed again
        let env = env();
        let mut ctx = Context::new();
        let metas = MetaCtx::new();
        let stmt = Term::pi("x", Term::cnst("A"), Term::app(Term::cnst("B"), Term::bvar(0)));
        let binder = stmt.as_binder().expect("quantified");

        let x = FVarId(0);
        let name = ctx.fresh_name(&binder.name);
        ctx.push(Fact::new(x, name, binder.domain.clone()))
            .expect("fresh name");
        let body = binder.body.instantiate(&Term::fvar(x));
        assert_eq!(infer(&env, &ctx, &metas, &body), Ok(Term::prop()));

        let closed = binder.rebuild(body.abstract_fvar(x));
        assert_eq!(closed, stmt);
    }

    #[test]
    fn test_placeholder_solution_is_seen_by_whnf() {
        let env = env();
        let ctx = Context::new();
        let mut metas = MetaCtx::new();
        let f = metas.fresh(
            Term::arrow(Term::cnst("A"), Term::prop()),
            0,
            MetaKind::Param,
        );
        let applied: Rc<Term> = Term::app(Term::meta(f), Term::cnst("a"));
        Unifier::new(&env, &ctx, &mut metas)
            .unify(&Term::meta(f), &Term::cnst("B"))
            .expect("unify");
        assert_eq!(
            whnf(&env, &metas, &applied),
            Term::app(Term::cnst("B"), Term::cnst("a"))
        );
    }
}
