use std::rc::Rc;

/// Identifier of a fact living in a [`Context`](crate::context::Context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FVarId(pub u64);

/// Identifier of a placeholder living in a [`MetaCtx`](crate::meta::MetaCtx).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaId(pub usize);

/// Binder information (explicit or implicit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinderInfo {
    Default,
    Implicit,
}

/// Which quantified node a [`Binder`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinderKind {
    /// `∀ x : A, B` (statements)
    Pi,
    /// `fun x : A => b` (values)
    Lam,
}

/// Core terms in locally-nameless form.
///
/// Bound variables are de Bruijn indices; variables that have been opened into
/// the context are `FVar`s. Binder names are kept for presentation and for
/// re-closing, never for identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// Bound variable (de Bruijn index)
    BVar(usize),
    /// Fact of the ambient context
    FVar(FVarId),
    /// Placeholder to be solved by unification
    Meta(MetaId),
    /// Universe: 0 is Prop, 1 is Type
    Sort(u32),
    /// Global constant
    Const(String),
    /// Application: (f a)
    App(Rc<Term>, Rc<Term>),
    /// Lambda abstraction: fun x : A => b
    Lam(String, BinderInfo, Rc<Term>, Rc<Term>),
    /// Pi type: ∀ x : A, B
    Pi(String, BinderInfo, Rc<Term>, Rc<Term>),
}

/// Top-level view of a quantified node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binder {
    pub kind: BinderKind,
    pub name: String,
    pub info: BinderInfo,
    pub domain: Rc<Term>,
    pub body: Rc<Term>,
}

impl Binder {
    /// Rebuild a node of the same kind, name and domain around `body`.
    pub fn rebuild(&self, body: Rc<Term>) -> Rc<Term> {
        Term::binder(self.kind, self.name.clone(), self.info, self.domain.clone(), body)
    }
}

// Helper constructors for convenience
impl Term {
    pub fn bvar(n: usize) -> Rc<Self> {
        Rc::new(Term::BVar(n))
    }

    pub fn fvar(id: FVarId) -> Rc<Self> {
        Rc::new(Term::FVar(id))
    }

    pub fn meta(id: MetaId) -> Rc<Self> {
        Rc::new(Term::Meta(id))
    }

    pub fn sort(level: u32) -> Rc<Self> {
        Rc::new(Term::Sort(level))
    }

    pub fn prop() -> Rc<Self> {
        Term::sort(0)
    }

    pub fn cnst(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Term::Const(name.into()))
    }

    pub fn app(f: Rc<Term>, a: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::App(f, a))
    }

    pub fn apps(f: Rc<Term>, args: impl IntoIterator<Item = Rc<Term>>) -> Rc<Self> {
        args.into_iter().fold(f, Term::app)
    }

    pub fn lam(name: impl Into<String>, ty: Rc<Term>, body: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::Lam(name.into(), BinderInfo::Default, ty, body))
    }

    pub fn pi(name: impl Into<String>, ty: Rc<Term>, body: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::Pi(name.into(), BinderInfo::Default, ty, body))
    }

    pub fn binder(
        kind: BinderKind,
        name: String,
        info: BinderInfo,
        ty: Rc<Term>,
        body: Rc<Term>,
    ) -> Rc<Self> {
        match kind {
            BinderKind::Pi => Rc::new(Term::Pi(name, info, ty, body)),
            BinderKind::Lam => Rc::new(Term::Lam(name, info, ty, body)),
        }
    }

    /// Non-dependent Pi: `a → b` where `b` does not mention the bound variable.
    pub fn arrow(a: Rc<Term>, b: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::Pi("_".to_string(), BinderInfo::Default, a, b.shift(0, 1)))
    }

    /// Split off a top-level quantifier. Never looks below the top node.
    pub fn as_binder(&self) -> Option<Binder> {
        match self {
            Term::Pi(name, info, domain, body) => Some(Binder {
                kind: BinderKind::Pi,
                name: name.clone(),
                info: *info,
                domain: domain.clone(),
                body: body.clone(),
            }),
            Term::Lam(name, info, domain, body) => Some(Binder {
                kind: BinderKind::Lam,
                name: name.clone(),
                info: *info,
                domain: domain.clone(),
                body: body.clone(),
            }),
            _ => None,
        }
    }

    pub fn is_pi(&self) -> bool {
        matches!(self, Term::Pi(..))
    }

    /// Head and arguments of an application spine.
    pub fn app_spine(self: &Rc<Self>) -> (Rc<Term>, Vec<Rc<Term>>) {
        let mut args = Vec::new();
        let mut current = self.clone();
        while let Term::App(f, a) = &*current {
            args.push(a.clone());
            let next = f.clone();
            current = next;
        }
        args.reverse();
        (current, args)
    }

    /// Shift indices in a term by `d` above cutoff `c`.
    pub fn shift(&self, c: usize, d: usize) -> Rc<Term> {
        match self {
            Term::BVar(k) => {
                if *k < c {
                    Rc::new(Term::BVar(*k))
                } else {
                    Rc::new(Term::BVar(k + d))
                }
            }
            Term::App(f, a) => Rc::new(Term::App(f.shift(c, d), a.shift(c, d))),
            Term::Lam(n, info, ty, body) => Rc::new(Term::Lam(
                n.clone(),
                *info,
                ty.shift(c, d),
                body.shift(c + 1, d),
            )),
            Term::Pi(n, info, ty, body) => Rc::new(Term::Pi(
                n.clone(),
                *info,
                ty.shift(c, d),
                body.shift(c + 1, d),
            )),
            other => Rc::new(other.clone()),
        }
    }

    /// Substitute `s` for variable `k` in `t`.
    pub fn subst(&self, k: usize, s: &Rc<Term>) -> Rc<Term> {
        match self {
            Term::BVar(i) => {
                if *i == k {
                    s.clone()
                } else if *i > k {
                    Rc::new(Term::BVar(i - 1))
                } else {
                    Rc::new(Term::BVar(*i))
                }
            }
            Term::App(f, a) => Rc::new(Term::App(f.subst(k, s), a.subst(k, s))),
            Term::Lam(n, info, ty, body) => Rc::new(Term::Lam(
                n.clone(),
                *info,
                ty.subst(k, s),
                body.subst(k + 1, &s.shift(0, 1)),
            )),
            Term::Pi(n, info, ty, body) => Rc::new(Term::Pi(
                n.clone(),
                *info,
                ty.subst(k, s),
                body.subst(k + 1, &s.shift(0, 1)),
            )),
            other => Rc::new(other.clone()),
        }
    }

    /// Open the body of a binder with `val` for the outermost bound variable.
    pub fn instantiate(&self, val: &Rc<Term>) -> Rc<Term> {
        self.subst(0, val)
    }

    /// Rebuild the term bottom-up; `f` may replace any subterm, receiving the
    /// number of binders crossed so far.
    pub fn map_subterms<F>(&self, depth: usize, f: &mut F) -> Rc<Term>
    where
        F: FnMut(&Term, usize) -> Option<Rc<Term>>,
    {
        if let Some(replaced) = f(self, depth) {
            return replaced;
        }
        match self {
            Term::App(g, a) => Rc::new(Term::App(
                g.map_subterms(depth, f),
                a.map_subterms(depth, f),
            )),
            Term::Lam(n, info, ty, body) => Rc::new(Term::Lam(
                n.clone(),
                *info,
                ty.map_subterms(depth, f),
                body.map_subterms(depth + 1, f),
            )),
            Term::Pi(n, info, ty, body) => Rc::new(Term::Pi(
                n.clone(),
                *info,
                ty.map_subterms(depth, f),
                body.map_subterms(depth + 1, f),
            )),
            other => Rc::new(other.clone()),
        }
    }

    /// True if some subterm satisfies `pred` (which also receives the binder depth).
    pub fn any_subterm<F>(&self, depth: usize, pred: &mut F) -> bool
    where
        F: FnMut(&Term, usize) -> bool,
    {
        if pred(self, depth) {
            return true;
        }
        match self {
            Term::App(g, a) => g.any_subterm(depth, pred) || a.any_subterm(depth, pred),
            Term::Lam(_, _, ty, body) | Term::Pi(_, _, ty, body) => {
                ty.any_subterm(depth, pred) || body.any_subterm(depth + 1, pred)
            }
            _ => false,
        }
    }

    /// Replace `FVar(id)` with a bound variable, turning the term into the body
    /// of a binder for that fact.
    pub fn abstract_fvar(&self, id: FVarId) -> Rc<Term> {
        self.map_subterms(0, &mut |t, depth| match t {
            Term::FVar(fid) if *fid == id => Some(Term::bvar(depth)),
            Term::BVar(idx) if *idx >= depth => Some(Term::bvar(idx + 1)),
            _ => None,
        })
    }

    /// Substitute `val` for every occurrence of the fact `id`.
    pub fn replace_fvar(&self, id: FVarId, val: &Rc<Term>) -> Rc<Term> {
        self.abstract_fvar(id).instantiate(val)
    }

    pub fn has_fvar(&self, id: FVarId) -> bool {
        self.any_subterm(0, &mut |t, _| matches!(t, Term::FVar(fid) if *fid == id))
    }

    /// True if bound variable `idx` (relative to this term) occurs free.
    pub fn has_loose_bvar(&self, idx: usize) -> bool {
        self.any_subterm(0, &mut |t, depth| matches!(t, Term::BVar(k) if *k == idx + depth))
    }

    pub fn has_loose_bvars(&self) -> bool {
        self.any_subterm(0, &mut |t, depth| matches!(t, Term::BVar(k) if *k >= depth))
    }

    pub fn has_metas(&self) -> bool {
        self.any_subterm(0, &mut |t, _| matches!(t, Term::Meta(_)))
    }

    /// Placeholders occurring in the term, in order of first occurrence.
    pub fn metas(&self) -> Vec<MetaId> {
        let mut found = Vec::new();
        self.any_subterm(0, &mut |t, _| {
            if let Term::Meta(id) = t {
                if !found.contains(id) {
                    found.push(*id);
                }
            }
            false
        });
        found
    }

    /// Facts occurring in the term, in order of first occurrence.
    pub fn fvars(&self) -> Vec<FVarId> {
        let mut found = Vec::new();
        self.any_subterm(0, &mut |t, _| {
            if let Term::FVar(id) = t {
                if !found.contains(id) {
                    found.push(*id);
                }
            }
            false
        });
        found
    }

    /// Structural equality up to binder names and binder info.
    pub fn alpha_eq(&self, other: &Term) -> bool {
        match (self, other) {
            (Term::App(f1, a1), Term::App(f2, a2)) => f1.alpha_eq(f2) && a1.alpha_eq(a2),
            (Term::Lam(_, _, t1, b1), Term::Lam(_, _, t2, b2))
            | (Term::Pi(_, _, t1, b1), Term::Pi(_, _, t2, b2)) => {
                t1.alpha_eq(t2) && b1.alpha_eq(b2)
            }
            (Term::Lam(..), _) | (Term::Pi(..), _) | (Term::App(..), _) => false,
            (a, b) => a == b,
        }
    }

    /// Turn every occurrence of `from` into the variable of a new outer binder.
    pub fn abstract_subterm(&self, from: &Term) -> Rc<Term> {
        self.map_subterms(0, &mut |t, depth| match t {
            _ if t.alpha_eq(from) => Some(Term::bvar(depth)),
            Term::BVar(idx) if *idx >= depth => Some(Term::bvar(idx + 1)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a() -> Rc<Term> {
        Term::cnst("A")
    }

    #[test]
    fn abstract_then_instantiate_restores_fact() {
        let x = FVarId(7);
        let body = Term::app(Term::cnst("P"), Term::fvar(x));
        let closed = body.abstract_fvar(x);
        assert_eq!(closed, Term::app(Term::cnst("P"), Term::bvar(0)));
        assert_eq!(closed.instantiate(&Term::fvar(x)), body);
    }

    #[test]
    fn abstract_under_binder_uses_binder_depth() {
        let x = FVarId(1);
        // ∀ y : A, R x y
        let t = Term::pi(
            "y",
            a(),
            Term::apps(Term::cnst("R"), [Term::fvar(x), Term::bvar(0)]),
        );
        let closed = t.abstract_fvar(x);
        assert_eq!(
            closed,
            Term::pi("y", a(), Term::apps(Term::cnst("R"), [Term::bvar(1), Term::bvar(0)]))
        );
        assert!(closed.has_loose_bvar(0));
    }

    #[test]
    fn arrow_is_non_dependent_pi() {
        let t = Term::arrow(Term::cnst("B"), Term::cnst("C"));
        let binder = t.as_binder().expect("arrow is a binder");
        assert_eq!(binder.kind, BinderKind::Pi);
        assert!(!binder.body.has_loose_bvar(0));
    }

    #[test]
    fn alpha_eq_ignores_binder_names() {
        let p = |n: &str| Term::pi(n, a(), Term::app(Term::cnst("P"), Term::bvar(0)));
        assert!(p("x").alpha_eq(&p("y")));
        assert_ne!(p("x"), p("y"));
    }

    #[test]
    fn abstract_subterm_binds_every_occurrence() {
        let t = Term::apps(Term::cnst("R"), [Term::cnst("a"), Term::bvar(0)]);
        let motive = t.abstract_subterm(&Term::Const("a".into()));
        assert_eq!(motive, Term::apps(Term::cnst("R"), [Term::bvar(0), Term::bvar(1)]));
    }

    #[test]
    fn app_spine_collects_arguments_in_order() {
        let t = Term::apps(Term::cnst("f"), [Term::cnst("a"), Term::cnst("b")]);
        let (head, args) = t.app_spine();
        assert_eq!(head, Term::cnst("f"));
        assert_eq!(args, vec![Term::cnst("a"), Term::cnst("b")]);
    }
}
