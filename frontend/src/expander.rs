use crate::surface::{Span, SurfaceTerm, SurfaceTermKind, Syntax, SyntaxKind};
use kernel::ast::BinderInfo;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpansionError {
    #[error("{1}: {0}")]
    Malformed(String, Span),
}

fn malformed<T>(message: impl Into<String>, span: Span) -> Result<T, ExpansionError> {
    Err(ExpansionError::Malformed(message.into(), span))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BinderForm {
    Forall,
    Fun,
}

/// Expands reader syntax into surface terms: binder groups, arrows,
/// equations and left-nested application.
#[derive(Debug, Default)]
pub struct Expander;

impl Expander {
    pub fn new() -> Self {
        Expander
    }

    pub fn expand(&self, syntax: &Syntax) -> Result<SurfaceTerm, ExpansionError> {
        let span = syntax.span;
        let kind = match &syntax.kind {
            SyntaxKind::Symbol(s) => match s.as_str() {
                "Prop" => SurfaceTermKind::Sort(0),
                "Type" => SurfaceTermKind::Sort(1),
                _ => SurfaceTermKind::Var(s.clone()),
            },
            SyntaxKind::Int(n) => return malformed(format!("unexpected number {}", n), span),
            SyntaxKind::BracedList(_) => {
                return malformed("braces are only allowed around binders", span)
            }
            SyntaxKind::List(items) => return self.expand_list(items, span),
        };
        Ok(SurfaceTerm { kind, span })
    }

    fn expand_list(&self, items: &[Syntax], span: Span) -> Result<SurfaceTerm, ExpansionError> {
        let Some((head, args)) = items.split_first() else {
            return malformed("empty application", span);
        };
        match head.as_symbol() {
            Some("forall") | Some("∀") => self.expand_binders(BinderForm::Forall, args, span),
            Some("fun") | Some("λ") => self.expand_binders(BinderForm::Fun, args, span),
            Some("->") | Some("→") => {
                if args.len() < 2 {
                    return malformed("`->` needs at least two arguments", span);
                }
                let mut parts = args
                    .iter()
                    .map(|a| self.expand(a))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut result = parts.pop().ok_or(ExpansionError::Malformed(
                    "`->` needs at least two arguments".into(),
                    span,
                ))?;
                while let Some(dom) = parts.pop() {
                    result = SurfaceTerm {
                        kind: SurfaceTermKind::Arrow(Box::new(dom), Box::new(result)),
                        span,
                    };
                }
                Ok(result)
            }
            Some("=") => match args {
                [lhs, rhs] => Ok(SurfaceTerm {
                    kind: SurfaceTermKind::Eq(Box::new(self.expand(lhs)?), Box::new(self.expand(rhs)?)),
                    span,
                }),
                _ => malformed("`=` takes exactly two arguments", span),
            },
            Some("Sort") => match args {
                [Syntax {
                    kind: SyntaxKind::Int(level),
                    ..
                }] => Ok(SurfaceTerm {
                    kind: SurfaceTermKind::Sort(*level),
                    span,
                }),
                _ => malformed("`Sort` takes a universe level", span),
            },
            _ => {
                let mut f = self.expand(head)?;
                if args.is_empty() {
                    return Ok(f);
                }
                for arg in args {
                    f = SurfaceTerm {
                        kind: SurfaceTermKind::App(Box::new(f), Box::new(self.expand(arg)?)),
                        span,
                    };
                }
                Ok(f)
            }
        }
    }

    /// `(forall (x y A) {z B} body)`: one or more binder groups, then the body.
    fn expand_binders(
        &self,
        form: BinderForm,
        args: &[Syntax],
        span: Span,
    ) -> Result<SurfaceTerm, ExpansionError> {
        let Some((body, groups)) = args.split_last() else {
            return malformed("binder form without a body", span);
        };
        if groups.is_empty() {
            return malformed("binder form without binders", span);
        }

        let mut binders = Vec::new();
        for group in groups {
            let (items, info) = match &group.kind {
                SyntaxKind::List(items) => (items, BinderInfo::Default),
                SyntaxKind::BracedList(items) => (items, BinderInfo::Implicit),
                _ => return malformed("expected a binder group like `(x A)`", group.span),
            };
            let Some((ty, names)) = items.split_last() else {
                return malformed("empty binder group", group.span);
            };
            if names.is_empty() {
                return malformed("binder group without names", group.span);
            }
            let ty = self.expand(ty)?;
            for name in names {
                let Some(name) = name.as_symbol() else {
                    return malformed("binder names must be symbols", name.span);
                };
                binders.push((name.to_string(), info, ty.clone()));
            }
        }

        let mut result = self.expand(body)?;
        for (name, info, ty) in binders.into_iter().rev() {
            let kind = match form {
                BinderForm::Forall => SurfaceTermKind::Pi(name, info, Box::new(ty), Box::new(result)),
                BinderForm::Fun => SurfaceTermKind::Lam(name, info, Box::new(ty), Box::new(result)),
            };
            result = SurfaceTerm { kind, span };
        }
        Ok(result)
    }
}
