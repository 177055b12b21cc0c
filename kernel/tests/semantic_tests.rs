//! Kernel semantic tests: binding structure, placeholder scopes and the
//! typing rules the engine relies on.

use kernel::checker::{as_eq, eq_term, infer, whnf};
use kernel::{
    BinderInfo, BinderKind, Context, Env, FVarId, Fact, MetaCtx, MetaKind, Printer, Term,
    TypeError, UnifyError, Unifier,
};
use insta::assert_snapshot;
use proptest::prelude::*;
use std::rc::Rc;

fn a() -> Rc<Term> {
    Term::cnst("A")
}

fn env() -> Env {
    let mut env = Env::with_equality();
    env.add_axiom("A", Term::sort(1)).unwrap();
    env.add_axiom("a", a()).unwrap();
    env.add_axiom("b", a()).unwrap();
    env.add_axiom("P", Term::arrow(a(), Term::prop())).unwrap();
    env.add_def(
        "Q",
        Term::arrow(a(), Term::prop()),
        Term::lam("y", a(), Term::app(Term::cnst("P"), Term::bvar(0))),
    )
    .unwrap();
    env
}

/// `[x : A, y : A]` with ids 0 and 1.
fn two_facts() -> Context {
    Context::from_facts(vec![
        Fact::new(FVarId(0), "x", a()),
        Fact::new(FVarId(1), "y", a()),
    ])
}

#[test]
fn definitions_unfold_at_the_head() {
    let env = env();
    let applied = Term::app(Term::cnst("Q"), Term::cnst("a"));
    assert_eq!(
        whnf(&env, &MetaCtx::new(), &applied),
        Term::app(Term::cnst("P"), Term::cnst("a"))
    );
}

#[test]
fn equality_is_recognised_and_printed_infix() {
    let eq = eq_term(a(), Term::cnst("a"), Term::cnst("b"));
    let (ty, lhs, rhs) = as_eq(&eq).expect("an equation");
    assert_eq!((ty, lhs, rhs), (a(), Term::cnst("a"), Term::cnst("b")));
    assert_eq!(Printer::new().print(&eq), "a = b");
    assert_eq!(infer(&env(), &Context::new(), &MetaCtx::new(), &eq), Ok(Term::prop()));
}

#[test]
fn ill_formed_terms_report_readable_errors() {
    let env = env();
    let ctx = Context::new();
    let metas = MetaCtx::new();

    let err = infer(&env, &ctx, &metas, &Term::app(Term::cnst("a"), Term::cnst("b"))).unwrap_err();
    assert_eq!(err, TypeError::ExpectedFunction(a()));
    assert_eq!(err.to_string(), "expected a function, got A");

    let err = infer(&env, &ctx, &metas, &Term::pi("x", Term::cnst("a"), Term::prop())).unwrap_err();
    assert_eq!(err.to_string(), "expected a sort, got A");

    let err = infer(&env, &ctx, &metas, &Term::fvar(FVarId(9))).unwrap_err();
    assert_eq!(err.to_string(), "unknown fact _fvar.9");

    let err = env.clone().add_axiom("a", a()).unwrap_err();
    assert_eq!(err.to_string(), "constant `a` is already declared");
}

#[test]
fn placeholders_only_see_facts_in_their_scope() {
    let env = env();
    let ctx = two_facts();
    let mut metas = MetaCtx::new();
    let m = metas.fresh(a(), 1, MetaKind::Param);

    let err = Unifier::new(&env, &ctx, &mut metas)
        .unify(&Term::meta(m), &Term::fvar(FVarId(1)))
        .unwrap_err();
    assert_eq!(err, UnifyError::Scope(m));
    assert_eq!(err.to_string(), "solution for ?m.0 mentions facts outside its scope");
    assert!(!metas.is_assigned(m));

    Unifier::new(&env, &ctx, &mut metas)
        .unify(&Term::meta(m), &Term::fvar(FVarId(0)))
        .expect("x is in scope");
    assert_eq!(metas.instantiate(&Term::meta(m)), Term::fvar(FVarId(0)));
}

#[test]
fn solutions_narrow_the_scope_of_nested_placeholders() {
    let env = env();
    let ctx = two_facts();
    let mut metas = MetaCtx::new();
    let outer = metas.fresh(a(), 0, MetaKind::Param);
    let inner = metas.fresh(a(), 2, MetaKind::Param);
    let f = Term::cnst("f");

    Unifier::new(&env, &ctx, &mut metas)
        .unify(&Term::meta(outer), &Term::app(f, Term::meta(inner)))
        .expect("no facts mentioned");
    assert_eq!(metas.decl(inner).map(|d| d.depth), Some(0));

    let err = Unifier::new(&env, &ctx, &mut metas)
        .unify(&Term::meta(inner), &Term::fvar(FVarId(0)))
        .unwrap_err();
    assert_eq!(err, UnifyError::Scope(inner));
}

#[test]
fn placeholder_depths_follow_context_edits() {
    let mut metas = MetaCtx::new();
    let shallow = metas.fresh(a(), 1, MetaKind::Goal);
    let deep = metas.fresh(a(), 2, MetaKind::Goal);
    let solved = metas.fresh(a(), 2, MetaKind::Param);
    assert!(metas.assign(solved, Term::cnst("a")));

    metas.fact_removed(1);
    assert_eq!(metas.decl(shallow).map(|d| d.depth), Some(1));
    assert_eq!(metas.decl(deep).map(|d| d.depth), Some(1));
    assert_eq!(metas.decl(solved).map(|d| d.depth), Some(2));

    metas.fact_inserted(0);
    assert_eq!(metas.decl(shallow).map(|d| d.depth), Some(2));
    assert_eq!(metas.decl(deep).map(|d| d.depth), Some(2));
}

#[test]
fn unsolved_placeholders_are_listed_since_a_mark() {
    let mut metas = MetaCtx::new();
    let before = metas.fresh(a(), 0, MetaKind::Goal);
    let mark = metas.mark();
    let solved = metas.fresh(a(), 0, MetaKind::Param);
    let open = metas.fresh(a(), 0, MetaKind::SideCondition);
    assert!(metas.assign(solved, Term::cnst("a")));
    assert_eq!(metas.unassigned_since(mark), vec![open]);
    assert!(!metas.unassigned_since(mark).contains(&before));
}

#[test]
fn printer_primes_binders_that_clash_with_facts() {
    let ctx = two_facts();
    let stmt = Term::pi(
        "x",
        a(),
        Term::apps(Term::cnst("R"), [Term::bvar(0), Term::fvar(FVarId(0))]),
    );
    assert_snapshot!(Printer::with_context(&ctx).print(&stmt), @"∀ x' : A, R x' x");
    let implicit = Rc::new(Term::Pi(
        "z".to_string(),
        BinderInfo::Implicit,
        a(),
        Term::app(Term::cnst("P"), Term::bvar(0)),
    ));
    assert_snapshot!(Printer::new().print(&implicit), @"∀ {z : A}, P z");
}

const NAMES: [&str; 4] = ["x", "y", "z", "_"];

/// Terms with loose variables up to 2 and a foreign fact, under nested binders.
fn body() -> impl Strategy<Value = Rc<Term>> {
    let leaf = prop_oneof![
        (0usize..3).prop_map(Term::bvar),
        Just(Term::cnst("a")),
        Just(Term::fvar(FVarId(1))),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(f, x)| Term::app(f, x)),
            (any::<bool>(), 0usize..NAMES.len(), inner).prop_map(|(pi, name, body)| {
                let kind = if pi { BinderKind::Pi } else { BinderKind::Lam };
                Term::binder(kind, NAMES[name].to_string(), BinderInfo::Default, a(), body)
            }),
        ]
    })
}

fn rename(term: &Rc<Term>) -> Rc<Term> {
    match &**term {
        Term::App(f, x) => Term::app(rename(f), rename(x)),
        Term::Lam(_, info, ty, body) => {
            Rc::new(Term::Lam("w".to_string(), *info, rename(ty), rename(body)))
        }
        Term::Pi(_, info, ty, body) => {
            Rc::new(Term::Pi("w".to_string(), *info, rename(ty), rename(body)))
        }
        _ => term.clone(),
    }
}

proptest! {
    #[test]
    fn opening_then_closing_is_identity(t in body()) {
        let x = FVarId(7);
        let opened = t.instantiate(&Term::fvar(x));
        prop_assert_eq!(opened.abstract_fvar(x), t);
    }

    #[test]
    fn binder_names_do_not_affect_identity(t in body()) {
        let renamed = rename(&t);
        prop_assert!(t.alpha_eq(&renamed));
        prop_assert!(renamed.alpha_eq(&t));
    }
}
