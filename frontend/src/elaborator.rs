use crate::surface::{Span, SurfaceTerm, SurfaceTermKind};
use kernel::ast::{BinderKind, Term};
use kernel::checker::{eq_term, infer_under, Env};
use kernel::context::Context;
use kernel::meta::MetaCtx;
use kernel::TypeError;
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElabError {
    #[error("{1}: unbound name `{0}`")]
    UnboundName(String, Span),
    #[error("{1}: {0}")]
    Type(TypeError, Span),
}

impl ElabError {
    pub fn span(&self) -> Span {
        match self {
            ElabError::UnboundName(_, span) | ElabError::Type(_, span) => *span,
        }
    }
}

/// Turns surface terms into kernel terms.
///
/// Names resolve to enclosing binders first, then to facts of the context,
/// then to global constants.
pub struct Elaborator<'a> {
    env: &'a Env,
    ctx: Option<&'a Context>,
    metas: MetaCtx,
    // binder names and domains, innermost last
    locals: Vec<(String, Rc<Term>)>,
}

impl<'a> Elaborator<'a> {
    pub fn new(env: &'a Env) -> Self {
        Elaborator {
            env,
            ctx: None,
            metas: MetaCtx::new(),
            locals: Vec::new(),
        }
    }

    pub fn with_context(env: &'a Env, ctx: &'a Context) -> Self {
        Elaborator {
            ctx: Some(ctx),
            ..Elaborator::new(env)
        }
    }

    fn resolve_name(&self, name: &str) -> Option<Rc<Term>> {
        if let Some(i) = self.locals.iter().rev().position(|(local, _)| local == name) {
            return Some(Term::bvar(i));
        }
        if let Some(fact) = self.ctx.and_then(|ctx| ctx.find(name)) {
            return Some(Term::fvar(fact.id));
        }
        if self.env.contains(name) {
            return Some(Term::cnst(name));
        }
        None
    }

    pub fn elaborate(&mut self, term: &SurfaceTerm) -> Result<Rc<Term>, ElabError> {
        let span = term.span;
        match &term.kind {
            SurfaceTermKind::Var(name) => self
                .resolve_name(name)
                .ok_or_else(|| ElabError::UnboundName(name.clone(), span)),
            SurfaceTermKind::Sort(level) => Ok(Term::sort(*level)),
            SurfaceTermKind::App(f, x) => {
                let f = self.elaborate(f)?;
                let x = self.elaborate(x)?;
                Ok(Term::app(f, x))
            }
            SurfaceTermKind::Lam(name, info, ty, body) => {
                self.binder(BinderKind::Lam, name, *info, ty, body)
            }
            SurfaceTermKind::Pi(name, info, ty, body) => {
                self.binder(BinderKind::Pi, name, *info, ty, body)
            }
            SurfaceTermKind::Arrow(dom, cod) => {
                let dom = self.elaborate(dom)?;
                let cod = self.elaborate(cod)?;
                Ok(Term::arrow(dom, cod))
            }
            SurfaceTermKind::Eq(lhs, rhs) => {
                let lhs = self.elaborate(lhs)?;
                let rhs = self.elaborate(rhs)?;
                let ty = self.infer(&lhs, span)?;
                Ok(eq_term(ty, lhs, rhs))
            }
        }
    }

    fn binder(
        &mut self,
        kind: BinderKind,
        name: &str,
        info: kernel::ast::BinderInfo,
        ty: &SurfaceTerm,
        body: &SurfaceTerm,
    ) -> Result<Rc<Term>, ElabError> {
        let ty = self.elaborate(ty)?;
        self.locals.push((name.to_string(), ty.clone()));
        let body = self.elaborate(body);
        self.locals.pop();
        Ok(Term::binder(kind, name.to_string(), info, ty, body?))
    }

    fn infer(&self, term: &Rc<Term>, span: Span) -> Result<Rc<Term>, ElabError> {
        let empty = Context::new();
        let ctx = self.ctx.unwrap_or(&empty);
        let locals: Vec<Rc<Term>> = self.locals.iter().map(|(_, ty)| ty.clone()).collect();
        infer_under(self.env, ctx, &self.metas, &locals, term).map_err(|err| ElabError::Type(err, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expander::Expander;
    use crate::parser::Parser;
    use kernel::ast::FVarId;
    use kernel::context::Fact;

    fn env() -> Env {
        let mut env = Env::with_equality();
        env.add_axiom("A", Term::sort(1)).unwrap();
        env.add_axiom("a", Term::cnst("A")).unwrap();
        env.add_axiom("P", Term::arrow(Term::cnst("A"), Term::prop())).unwrap();
        env
    }

    fn surface(input: &str) -> SurfaceTerm {
        let syntax = Parser::new(input).parse().expect("parse");
        Expander::new().expand(&syntax[0]).expect("expand")
    }

    #[test]
    fn binders_shadow_facts_and_constants() {
        let env = env();
        let mut ctx = Context::new();
        ctx.push(Fact::new(FVarId(7), "a", Term::cnst("A"))).unwrap();
        let mut elab = Elaborator::with_context(&env, &ctx);

        let term = elab.elaborate(&surface("(forall (a A) (P a))")).unwrap();
        assert_eq!(term, Term::pi("a", Term::cnst("A"), Term::app(Term::cnst("P"), Term::bvar(0))));

        let term = elab.elaborate(&surface("(P a)")).unwrap();
        assert_eq!(term, Term::app(Term::cnst("P"), Term::fvar(FVarId(7))));
    }

    #[test]
    fn equation_takes_its_type_from_the_left_side() {
        let env = env();
        let term = Elaborator::new(&env)
            .elaborate(&surface("(forall (x A) (= x a))"))
            .unwrap();
        assert_eq!(
            term,
            Term::pi("x", Term::cnst("A"), eq_term(Term::cnst("A"), Term::bvar(0), Term::cnst("a")))
        );
    }

    #[test]
    fn arrows_do_not_capture() {
        let env = env();
        let term = Elaborator::new(&env)
            .elaborate(&surface("(forall (x A) (-> (P x) (P x)))"))
            .unwrap();
        insta::assert_snapshot!(term.to_string(), @"∀ x : A, P x → P x");
    }

    #[test]
    fn unbound_names_are_reported_with_their_span() {
        let env = env();
        let err = Elaborator::new(&env).elaborate(&surface("(P\n  zz)")).unwrap_err();
        assert_eq!(err.to_string(), "2:3: unbound name `zz`");
    }
}
