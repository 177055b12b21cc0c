use crate::ast::{BinderInfo, Term};
use crate::checker::as_eq;
use crate::context::Context;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Top,
    Arrow,
    Eq,
    App,
    Arg,
}

/// Renders terms in Lean-like notation.
///
/// Facts are shown by their context name when a [`Context`] is supplied;
/// bound variables by their binder name, primed when it would shadow
/// something already visible.
pub struct Printer<'a> {
    ctx: Option<&'a Context>,
    names: Vec<String>,
}

impl<'a> Printer<'a> {
    pub fn new() -> Self {
        Printer {
            ctx: None,
            names: Vec::new(),
        }
    }

    pub fn with_context(ctx: &'a Context) -> Self {
        Printer {
            ctx: Some(ctx),
            names: Vec::new(),
        }
    }

    pub fn print(&mut self, term: &Term) -> String {
        let mut out = String::new();
        self.write(term, Prec::Top, &mut out);
        out
    }

    fn visible(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
            || self.ctx.is_some_and(|ctx| ctx.contains_name(name))
    }

    fn binder_name(&self, name: &str) -> String {
        let mut name = if name.is_empty() || name == "_" {
            "x".to_string()
        } else {
            name.to_string()
        };
        while self.visible(&name) {
            name.push('\'');
        }
        name
    }

    fn write(&mut self, term: &Term, prec: Prec, out: &mut String) {
        match term {
            Term::BVar(idx) => match self.names.len().checked_sub(idx + 1) {
                Some(pos) => out.push_str(&self.names[pos]),
                None => out.push_str(&format!("#{}", idx)),
            },
            Term::FVar(id) => match self.ctx.and_then(|ctx| ctx.get(*id)) {
                Some(fact) => out.push_str(&fact.name),
                None => out.push_str(&format!("_fvar.{}", id.0)),
            },
            Term::Meta(id) => out.push_str(&format!("?m.{}", id.0)),
            Term::Sort(0) => out.push_str("Prop"),
            Term::Sort(1) => out.push_str("Type"),
            Term::Sort(level) => out.push_str(&format!("Sort {}", level)),
            Term::Const(name) => out.push_str(name),
            Term::App(..) => {
                let rc = Rc::new(term.clone());
                if let Some((_, lhs, rhs)) = as_eq(&rc) {
                    paren(prec > Prec::Eq, out, |out| {
                        self.write(&lhs, Prec::App, out);
                        out.push_str(" = ");
                        self.write(&rhs, Prec::App, out);
                    });
                    return;
                }
                let (head, args) = rc.app_spine();
                paren(prec >= Prec::Arg, out, |out| {
                    self.write(&head, Prec::App, out);
                    for arg in &args {
                        out.push(' ');
                        self.write(arg, Prec::Arg, out);
                    }
                });
            }
            Term::Pi(_, info, domain, body)
                if *info == BinderInfo::Default && !body.has_loose_bvar(0) =>
            {
                paren(prec > Prec::Arrow, out, |out| {
                    self.write(domain, Prec::Eq, out);
                    out.push_str(" → ");
                    // placeholder name, never printed
                    self.names.push(String::new());
                    self.write(body, Prec::Arrow, out);
                    self.names.pop();
                });
            }
            Term::Pi(name, info, domain, body) => {
                paren(prec > Prec::Top, out, |out| {
                    out.push_str("∀ ");
                    self.write_binder(name, *info, domain, out);
                    out.push_str(", ");
                    self.write(body, Prec::Top, out);
                    self.names.pop();
                });
            }
            Term::Lam(name, info, domain, body) => {
                paren(prec > Prec::Top, out, |out| {
                    out.push_str("fun ");
                    self.write_binder(name, *info, domain, out);
                    out.push_str(" => ");
                    self.write(body, Prec::Top, out);
                    self.names.pop();
                });
            }
        }
    }

    // leaves the binder's display name pushed; the caller pops it
    fn write_binder(&mut self, name: &str, info: BinderInfo, domain: &Term, out: &mut String) {
        let shown = self.binder_name(name);
        let (open, close) = match info {
            BinderInfo::Default => ("", ""),
            BinderInfo::Implicit => ("{", "}"),
        };
        out.push_str(open);
        out.push_str(&shown);
        out.push_str(" : ");
        self.write(domain, Prec::Top, out);
        out.push_str(close);
        self.names.push(shown);
    }
}

impl Default for Printer<'_> {
    fn default() -> Self {
        Printer::new()
    }
}

fn paren(needed: bool, out: &mut String, body: impl FnOnce(&mut String)) {
    if needed {
        out.push('(');
    }
    body(out);
    if needed {
        out.push(')');
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Printer::new().print(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FVarId;
    use crate::checker::eq_term;
    use crate::context::Fact;

    fn a() -> Rc<Term> {
        Term::cnst("A")
    }

    #[test]
    fn prints_dependent_and_arrow_forms() {
        let t = Term::pi(
            "x",
            a(),
            Term::arrow(
                Term::app(Term::cnst("B"), Term::bvar(0)),
                Term::app(Term::cnst("C"), Term::bvar(0)),
            ),
        );
        assert_eq!(t.to_string(), "∀ x : A, B x → C x");
    }

    #[test]
    fn prints_equality_sugar() {
        let t = eq_term(a(), Term::cnst("a"), Term::app(Term::cnst("f"), Term::cnst("b")));
        assert_eq!(t.to_string(), "a = f b");
    }

    #[test]
    fn nested_arguments_are_parenthesised() {
        let t = Term::apps(
            Term::cnst("f"),
            [Term::app(Term::cnst("g"), Term::cnst("a")), Term::meta(crate::ast::MetaId(3))],
        );
        assert_eq!(t.to_string(), "f (g a) ?m.3");
    }

    #[test]
    fn binder_names_avoid_context_clashes() {
        let mut ctx = Context::new();
        ctx.push(Fact::new(FVarId(0), "x", a())).unwrap();
        let t = Term::lam(
            "x",
            a(),
            Term::apps(Term::cnst("R"), [Term::bvar(0), Term::fvar(FVarId(0))]),
        );
        assert_eq!(Printer::with_context(&ctx).print(&t), "fun x' : A => R x' x");
    }

    #[test]
    fn arrow_domain_that_is_a_forall_gets_parens() {
        let t = Term::arrow(
            Term::pi("y", a(), Term::app(Term::cnst("P"), Term::bvar(0))),
            Term::cnst("Q"),
        );
        assert_eq!(t.to_string(), "(∀ y : A, P y) → Q");
    }
}
