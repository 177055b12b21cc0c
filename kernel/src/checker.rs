use crate::ast::{FVarId, MetaId, Term};
use crate::context::Context;
use crate::meta::MetaCtx;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("unbound variable #{0}")]
    UnknownVariable(usize),
    #[error("unknown fact _fvar.{}", .0.0)]
    UnknownFact(FVarId),
    #[error("unknown placeholder ?m.{}", .0.0)]
    UnknownMeta(MetaId),
    #[error("unknown constant `{0}`")]
    UnknownConst(String),
    #[error("constant `{0}` is already declared")]
    DuplicateConst(String),
    #[error("expected a function, got {0}")]
    ExpectedFunction(Rc<Term>),
    #[error("expected a sort, got {0}")]
    ExpectedSort(Rc<Term>),
}

/// A global constant: an axiom (no value) or a transparent definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    pub name: String,
    pub ty: Rc<Term>,
    pub value: Option<Rc<Term>>,
}

/// Global environment of constants.
#[derive(Debug, Clone, Default)]
pub struct Env {
    constants: HashMap<String, Constant>,
}

impl Env {
    pub fn new() -> Self {
        Env {
            constants: HashMap::new(),
        }
    }

    /// Environment with equality and the transport lemmas used by rewriting.
    pub fn with_equality() -> Self {
        let mut env = Env::new();
        for (name, ty) in equality_prelude() {
            env.constants.insert(
                name.to_string(),
                Constant {
                    name: name.to_string(),
                    ty,
                    value: None,
                },
            );
        }
        env
    }

    pub fn add_axiom(&mut self, name: impl Into<String>, ty: Rc<Term>) -> Result<(), TypeError> {
        self.add(Constant {
            name: name.into(),
            ty,
            value: None,
        })
    }

    pub fn add_def(
        &mut self,
        name: impl Into<String>,
        ty: Rc<Term>,
        value: Rc<Term>,
    ) -> Result<(), TypeError> {
        self.add(Constant {
            name: name.into(),
            ty,
            value: Some(value),
        })
    }

    fn add(&mut self, constant: Constant) -> Result<(), TypeError> {
        if self.constants.contains_key(&constant.name) {
            return Err(TypeError::DuplicateConst(constant.name));
        }
        self.constants.insert(constant.name.clone(), constant);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Constant> {
        self.constants.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constants.contains_key(name)
    }
}

pub fn eq_term(ty: Rc<Term>, lhs: Rc<Term>, rhs: Rc<Term>) -> Rc<Term> {
    Term::apps(Term::cnst("Eq"), [ty, lhs, rhs])
}

/// Recognise `Eq α a b`, returning `(α, a, b)`.
pub fn as_eq(term: &Rc<Term>) -> Option<(Rc<Term>, Rc<Term>, Rc<Term>)> {
    let (head, args) = term.app_spine();
    match (&*head, args.as_slice()) {
        (Term::Const(name), [ty, lhs, rhs]) if name == "Eq" => {
            Some((ty.clone(), lhs.clone(), rhs.clone()))
        }
        _ => None,
    }
}

fn equality_prelude() -> Vec<(&'static str, Rc<Term>)> {
    let ty = || Term::sort(1);
    let b = Term::bvar;
    vec![
        // Eq : ∀ α : Type, α → α → Prop
        (
            "Eq",
            Term::pi("α", ty(), Term::pi("a", b(0), Term::pi("b", b(1), Term::prop()))),
        ),
        // Eq.refl : ∀ α a, a = a
        (
            "Eq.refl",
            Term::pi("α", ty(), Term::pi("a", b(0), eq_term(b(1), b(0), b(0)))),
        ),
        // Eq.symm : ∀ α a b, a = b → b = a
        (
            "Eq.symm",
            Term::pi(
                "α",
                ty(),
                Term::pi(
                    "a",
                    b(0),
                    Term::pi(
                        "b",
                        b(1),
                        Term::pi("h", eq_term(b(2), b(1), b(0)), eq_term(b(3), b(1), b(2))),
                    ),
                ),
            ),
        ),
        // Eq.mp : ∀ a b : Prop, a = b → a → b
        (
            "Eq.mp",
            Term::pi(
                "a",
                Term::prop(),
                Term::pi(
                    "b",
                    Term::prop(),
                    Term::pi("h", eq_term(Term::prop(), b(1), b(0)), Term::pi("x", b(2), b(2))),
                ),
            ),
        ),
        // congrArg : ∀ α β (f : α → β) a b, a = b → f a = f b
        (
            "congrArg",
            Term::pi(
                "α",
                ty(),
                Term::pi(
                    "β",
                    ty(),
                    Term::pi(
                        "f",
                        Term::arrow(b(1), b(0)),
                        Term::pi(
                            "a",
                            b(2),
                            Term::pi(
                                "b",
                                b(3),
                                Term::pi(
                                    "h",
                                    eq_term(b(4), b(1), b(0)),
                                    eq_term(
                                        b(4),
                                        Term::app(b(3), b(2)),
                                        Term::app(b(3), b(1)),
                                    ),
                                ),
                            ),
                        ),
                    ),
                ),
            ),
        ),
    ]
}

/// Weak head normal form: placeholder instantiation, beta and delta reduction at the head.
pub fn whnf(env: &Env, metas: &MetaCtx, t: &Rc<Term>) -> Rc<Term> {
    match &**t {
        Term::App(f, a) => {
            let f_norm = whnf(env, metas, f);
            if let Term::Lam(_, _, _, body) = &*f_norm {
                whnf(env, metas, &body.instantiate(a))
            } else {
                Term::app(f_norm, a.clone())
            }
        }
        Term::Meta(id) => match metas.assignment(*id) {
            Some(val) => whnf(env, metas, &val),
            None => t.clone(),
        },
        Term::Const(name) => match env.get(name).and_then(|c| c.value.clone()) {
            Some(val) => whnf(env, metas, &val),
            None => t.clone(),
        },
        _ => t.clone(),
    }
}

/// Synthesize the type of `term`. Arguments are trusted, not checked.
pub fn infer(
    env: &Env,
    ctx: &Context,
    metas: &MetaCtx,
    term: &Rc<Term>,
) -> Result<Rc<Term>, TypeError> {
    infer_under(env, ctx, metas, &[], term)
}

/// [`infer`] for a term under binders whose domains are `locals`, outermost
/// first. The result may mention those binders as bound variables.
pub fn infer_under(
    env: &Env,
    ctx: &Context,
    metas: &MetaCtx,
    locals: &[Rc<Term>],
    term: &Rc<Term>,
) -> Result<Rc<Term>, TypeError> {
    Infer {
        env,
        ctx,
        metas,
        locals: locals.to_vec(),
    }
    .infer(term)
}

struct Infer<'a> {
    env: &'a Env,
    ctx: &'a Context,
    metas: &'a MetaCtx,
    // types of the binders crossed so far, innermost last
    locals: Vec<Rc<Term>>,
}

impl Infer<'_> {
    fn infer(&mut self, term: &Rc<Term>) -> Result<Rc<Term>, TypeError> {
        match &**term {
            Term::BVar(idx) => {
                let pos = self
                    .locals
                    .len()
                    .checked_sub(idx + 1)
                    .ok_or(TypeError::UnknownVariable(*idx))?;
                Ok(self.locals[pos].shift(0, idx + 1))
            }
            Term::FVar(id) => self
                .ctx
                .get(*id)
                .map(|fact| fact.statement.clone())
                .ok_or(TypeError::UnknownFact(*id)),
            Term::Meta(id) => self.metas.ty(*id).ok_or(TypeError::UnknownMeta(*id)),
            Term::Sort(level) => Ok(Term::sort(level + 1)),
            Term::Const(name) => self
                .env
                .get(name)
                .map(|c| c.ty.clone())
                .ok_or_else(|| TypeError::UnknownConst(name.clone())),
            Term::App(f, a) => {
                let f_ty = self.infer(f)?;
                match &*whnf(self.env, self.metas, &f_ty) {
                    Term::Pi(_, _, _, body) => Ok(body.instantiate(a)),
                    _ => Err(TypeError::ExpectedFunction(f_ty)),
                }
            }
            Term::Lam(name, info, domain, body) => {
                self.locals.push(domain.clone());
                let body_ty = self.infer(body);
                self.locals.pop();
                Ok(Rc::new(Term::Pi(name.clone(), *info, domain.clone(), body_ty?)))
            }
            Term::Pi(_, _, domain, body) => {
                let l1 = self.sort_of(domain)?;
                self.locals.push(domain.clone());
                let l2 = self.sort_of(body);
                self.locals.pop();
                let l2 = l2?;
                // imax: a Pi into Prop is a Prop
                Ok(Term::sort(if l2 == 0 { 0 } else { l1.max(l2) }))
            }
        }
    }

    fn sort_of(&mut self, term: &Rc<Term>) -> Result<u32, TypeError> {
        let ty = self.infer(term)?;
        match &*whnf(self.env, self.metas, &ty) {
            Term::Sort(level) => Ok(*level),
            _ => Err(TypeError::ExpectedSort(ty)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FVarId;
    use crate::context::Fact;

    fn env() -> Env {
        let mut env = Env::with_equality();
        env.add_axiom("A", Term::sort(1)).unwrap();
        env.add_axiom("a", Term::cnst("A")).unwrap();
        env.add_axiom("P", Term::arrow(Term::cnst("A"), Term::prop())).unwrap();
        env
    }

    #[test]
    fn forall_into_prop_is_prop() {
        let env = env();
        let stmt = Term::pi("x", Term::cnst("A"), Term::app(Term::cnst("P"), Term::bvar(0)));
        let ty = infer(&env, &Context::new(), &MetaCtx::new(), &stmt).expect("infer");
        assert_eq!(ty, Term::prop());
    }

    #[test]
    fn application_instantiates_codomain() {
        let env = env();
        let refl = Term::apps(Term::cnst("Eq.refl"), [Term::cnst("A"), Term::cnst("a")]);
        let ty = infer(&env, &Context::new(), &MetaCtx::new(), &refl).expect("infer");
        assert_eq!(ty, eq_term(Term::cnst("A"), Term::cnst("a"), Term::cnst("a")));
        assert!(as_eq(&ty).is_some());
    }

    #[test]
    fn facts_are_typed_by_their_statement() {
        let env = env();
        let mut ctx = Context::new();
        let stmt = Term::app(Term::cnst("P"), Term::cnst("a"));
        ctx.push(Fact::new(FVarId(3), "h", stmt.clone())).unwrap();
        let ty = infer(&env, &ctx, &MetaCtx::new(), &Term::fvar(FVarId(3))).expect("infer");
        assert_eq!(ty, stmt);
    }

    #[test]
    fn lambda_type_is_pi() {
        let env = env();
        let id = Term::lam("x", Term::cnst("A"), Term::bvar(0));
        let ty = infer(&env, &Context::new(), &MetaCtx::new(), &id).expect("infer");
        assert_eq!(ty, Term::pi("x", Term::cnst("A"), Term::cnst("A")));
    }

    #[test]
    fn bound_variables_take_their_binder_domain() {
        let env = env();
        let locals = [Term::cnst("A"), Term::app(Term::cnst("P"), Term::bvar(0))];
        let ty = infer_under(&env, &Context::new(), &MetaCtx::new(), &locals, &Term::bvar(0))
            .expect("infer");
        assert_eq!(ty, Term::app(Term::cnst("P"), Term::bvar(1)));
        assert!(infer_under(&env, &Context::new(), &MetaCtx::new(), &locals, &Term::bvar(2)).is_err());
    }

    #[test]
    fn unknown_constant_is_reported() {
        let err = infer(&Env::new(), &Context::new(), &MetaCtx::new(), &Term::cnst("nope"))
            .unwrap_err();
        assert_eq!(err, TypeError::UnknownConst("nope".into()));
    }

    #[test]
    fn whnf_beta_reduces_head() {
        let env = env();
        let redex = Term::app(
            Term::lam("x", Term::cnst("A"), Term::app(Term::cnst("P"), Term::bvar(0))),
            Term::cnst("a"),
        );
        assert_eq!(
            whnf(&env, &MetaCtx::new(), &redex),
            Term::app(Term::cnst("P"), Term::cnst("a"))
        );
    }
}
