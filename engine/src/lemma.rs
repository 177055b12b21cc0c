//! Host transformations built from global lemmas and equations.

use crate::error::TacticResult;
use crate::session::Session;
use crate::transform::{Outcome, Transformation};
use kernel::checker::as_eq;
use kernel::context::Fact;
use kernel::meta::MetaKind;
use kernel::{BinderKind, MetaId, Term};
use std::rc::Rc;
use tracing::trace;

/// Number of leading `∀`s.
pub fn pi_arity(term: &Term) -> usize {
    let mut count = 0;
    let mut current = term;
    while let Term::Pi(_, _, _, body) = current {
        count += 1;
        current = body.as_ref();
    }
    count
}

struct Telescope {
    args: Vec<Rc<Term>>,
    premises: Vec<MetaId>,
    rest: Rc<Term>,
}

/// Instantiate the first `count` binders of `ty` with fresh placeholders.
/// Binders the rest depends on become parameters, the others `premise` placeholders.
fn telescope(session: &mut Session, ty: &Rc<Term>, count: usize, premise: MetaKind) -> Telescope {
    let mut args = Vec::with_capacity(count);
    let mut premises = Vec::new();
    let mut rest = ty.clone();
    for _ in 0..count {
        let Some(binder) = rest.as_binder().filter(|b| b.kind == BinderKind::Pi) else {
            break;
        };
        let kind = if binder.body.has_loose_bvar(0) {
            MetaKind::Param
        } else {
            premise
        };
        let domain = session.instantiate(&binder.domain);
        let m = session.new_meta(domain, kind);
        if kind == premise {
            premises.push(m);
        }
        let arg = Term::meta(m);
        rest = binder.body.instantiate(&arg);
        args.push(arg);
    }
    Telescope {
        args,
        premises,
        rest: session.instantiate(&rest),
    }
}

fn open(session: &Session, ids: Vec<MetaId>) -> Vec<MetaId> {
    ids.into_iter()
        .filter(|m| !session.metas().is_assigned(*m))
        .collect()
}

/// `apply L`: backwards against a goal, or forwards into a fact through the
/// lemma's last premise.
#[derive(Debug, Clone)]
pub struct ApplyLemma {
    pub lemma: Rc<Term>,
    label: String,
}

impl ApplyLemma {
    pub fn new(lemma: Rc<Term>) -> Self {
        let label = lemma.to_string();
        ApplyLemma { lemma, label }
    }

    /// Label used in messages instead of the raw term.
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl Transformation for ApplyLemma {
    fn name(&self) -> String {
        format!("apply {}", self.label)
    }

    fn refine(&self, session: &mut Session, goal: MetaId) -> TacticResult<Vec<MetaId>> {
        let target = session.goal_type(goal)?;
        let lemma_ty = session.instantiate(&session.infer(&self.lemma)?);
        let arity = pi_arity(&lemma_ty);

        // the arity that lines up with the goal first, then everything else from the top
        let preferred = arity.checked_sub(pi_arity(&target));
        let counts: Vec<usize> = preferred
            .into_iter()
            .chain((0..=arity).rev().filter(|c| Some(*c) != preferred))
            .collect();

        for count in counts {
            trace!(lemma = %self.label, count, "trying arity");
            let attempt = session.scoped(|s| {
                let tele = telescope(s, &lemma_ty, count, MetaKind::Goal);
                if let Err(err) = s.unify(&tele.rest, &target) {
                    return s.fail(err.to_string(), Some(target.clone()));
                }
                let proof = Term::apps(self.lemma.clone(), tele.args);
                if let Err(err) = s.unify(&Term::meta(goal), &proof) {
                    return s.fail(err.to_string(), Some(target.clone()));
                }
                Ok(open(s, tele.premises))
            });
            if let Ok(obligations) = attempt {
                return Ok(obligations);
            }
        }
        session.fail(
            format!("the conclusion of `{}` does not match the goal", self.label),
            Some(target),
        )
    }

    fn rewrite(&self, session: &mut Session, fact: &Fact) -> TacticResult<Outcome> {
        let lemma_ty = session.instantiate(&session.infer(&self.lemma)?);
        let mut dependent = Vec::new();
        let mut current: &Term = &lemma_ty;
        while let Term::Pi(_, _, _, body) = current {
            dependent.push(body.has_loose_bvar(0));
            current = body.as_ref();
        }
        let Some(last) = dependent.iter().rposition(|d| !d) else {
            return session.fail(
                format!("`{}` has no premise to apply `{}` to", self.label, fact.name),
                Some(lemma_ty),
            );
        };

        let mut args = Vec::with_capacity(last + 1);
        let mut side_conditions = Vec::new();
        let mut rest = lemma_ty.clone();
        for (i, depends) in dependent.iter().enumerate().take(last + 1) {
            let Some(binder) = rest.as_binder() else {
                break;
            };
            let domain = session.instantiate(&binder.domain);
            let arg = if i == last {
                if let Err(err) = session.unify(&domain, &fact.statement) {
                    let message = format!(
                        "`{}` does not match the last premise of `{}`: {}",
                        fact.name, self.label, err
                    );
                    return session.fail(message, Some(fact.statement.clone()));
                }
                fact.reference()
            } else if *depends {
                Term::meta(session.new_meta(domain, MetaKind::Param))
            } else {
                let m = session.new_meta(domain, MetaKind::SideCondition);
                side_conditions.push(m);
                Term::meta(m)
            };
            rest = binder.body.instantiate(&arg);
            args.push(arg);
        }

        let statement = session.instantiate(&rest);
        let value = session.instantiate(&Term::apps(self.lemma.clone(), args));
        let rewritten = Fact {
            id: fact.id,
            name: fact.name.clone(),
            statement,
            value: Some(value),
        };
        Ok(Outcome {
            fact: rewritten,
            side_conditions: open(session, side_conditions),
        })
    }
}

/// `rw H`: rewrite with a proof of `a = b` (possibly universally quantified
/// or conditional), replacing every instance of `a` by `b`.
#[derive(Debug, Clone)]
pub struct RewriteBy {
    pub equation: Rc<Term>,
    /// Rewrite right-to-left.
    pub reverse: bool,
    label: String,
}

struct Instance {
    ty: Rc<Term>,
    from: Rc<Term>,
    to: Rc<Term>,
    /// Proof of `from = to`.
    proof: Rc<Term>,
    /// Statement with the rewritten occurrences abstracted as bound variable 0.
    abstracted: Rc<Term>,
    side_conditions: Vec<MetaId>,
}

impl Instance {
    fn motive(&self) -> Rc<Term> {
        Term::lam("x", self.ty.clone(), self.abstracted.clone())
    }

    fn rewritten(&self) -> Rc<Term> {
        self.abstracted.instantiate(&self.to)
    }

    /// Proof of `motive a = motive b`.
    fn congruence(&self, a: &Rc<Term>, b: &Rc<Term>, proof: Rc<Term>) -> Rc<Term> {
        Term::apps(
            Term::cnst("congrArg"),
            [self.ty.clone(), Term::prop(), self.motive(), a.clone(), b.clone(), proof],
        )
    }
}

impl RewriteBy {
    pub fn new(equation: Rc<Term>) -> Self {
        let label = equation.to_string();
        RewriteBy {
            equation,
            reverse: false,
            label,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn instance(&self, session: &mut Session, statement: &Rc<Term>) -> TacticResult<Instance> {
        let eq_ty = session.instantiate(&session.infer(&self.equation)?);
        let tele = telescope(session, &eq_ty, pi_arity(&eq_ty), MetaKind::SideCondition);
        let Some((ty, lhs, rhs)) = as_eq(&tele.rest) else {
            return session.fail(
                format!("`{}` is not an equation", self.label),
                Some(eq_ty.clone()),
            );
        };
        let proof = Term::apps(self.equation.clone(), tele.args);
        let (pattern, target, proof) = if self.reverse {
            let symm = Term::apps(
                Term::cnst("Eq.symm"),
                [ty.clone(), lhs.clone(), rhs.clone(), proof],
            );
            (rhs, lhs, symm)
        } else {
            (lhs, rhs, proof)
        };
        if matches!(&*pattern, Term::Meta(_)) {
            return session.fail(
                format!("the pattern of `{}` is a placeholder", self.label),
                Some(statement.clone()),
            );
        }

        let from = self.find_instance(session, &pattern, statement)?;
        let abstracted = statement.abstract_subterm(&from);
        if !abstracted.has_loose_bvar(0) {
            return session.fail(
                format!("did not find an instance of {} in the statement", from),
                Some(statement.clone()),
            );
        }
        Ok(Instance {
            ty: session.instantiate(&ty),
            from,
            to: session.instantiate(&target),
            proof: session.instantiate(&proof),
            abstracted,
            side_conditions: open(session, tele.premises),
        })
    }

    /// First closed subterm of `statement` (pre-order) that unifies with `pattern`.
    fn find_instance(
        &self,
        session: &mut Session,
        pattern: &Rc<Term>,
        statement: &Rc<Term>,
    ) -> TacticResult<Rc<Term>> {
        let mut candidates = Vec::new();
        statement.any_subterm(0, &mut |t, _| {
            if !t.has_loose_bvars() {
                candidates.push(Rc::new(t.clone()));
            }
            false
        });
        for candidate in candidates {
            let matched = session.scoped(|s| match s.unify(pattern, &candidate) {
                Ok(()) => Ok(s.instantiate(pattern)),
                Err(err) => s.fail(err.to_string(), None),
            });
            if let Ok(found) = matched {
                return Ok(found);
            }
        }
        session.fail(
            format!("did not find an instance of {} in the statement", pattern),
            Some(statement.clone()),
        )
    }
}

impl Transformation for RewriteBy {
    fn name(&self) -> String {
        if self.reverse {
            format!("rw ← {}", self.label)
        } else {
            format!("rw {}", self.label)
        }
    }

    fn refine(&self, session: &mut Session, goal: MetaId) -> TacticResult<Vec<MetaId>> {
        let target = session.goal_type(goal)?;
        let inst = self.instance(session, &target)?;
        let rewritten = inst.rewritten();

        let new_goal = session.new_meta(rewritten.clone(), MetaKind::Goal);
        let back = Term::apps(
            Term::cnst("Eq.symm"),
            [inst.ty.clone(), inst.from.clone(), inst.to.clone(), inst.proof.clone()],
        );
        let transport = inst.congruence(&inst.to, &inst.from, back);
        let proof = Term::apps(
            Term::cnst("Eq.mp"),
            [rewritten.clone(), target.clone(), transport, Term::meta(new_goal)],
        );
        if let Err(err) = session.unify(&Term::meta(goal), &proof) {
            return session.fail(err.to_string(), Some(target));
        }

        let mut obligations = Vec::new();
        // a goal that became `t = t` is closed by reflexivity
        match as_eq(&rewritten) {
            Some((ty, lhs, rhs)) if lhs.alpha_eq(&rhs) => {
                let refl = Term::apps(Term::cnst("Eq.refl"), [ty, lhs]);
                session.assign(new_goal, refl);
            }
            _ => obligations.push(new_goal),
        }
        obligations.extend(inst.side_conditions);
        Ok(obligations)
    }

    fn rewrite(&self, session: &mut Session, fact: &Fact) -> TacticResult<Outcome> {
        let statement = session.instantiate(&fact.statement);
        let inst = self.instance(session, &statement)?;
        let rewritten = inst.rewritten();
        let transport = inst.congruence(&inst.from, &inst.to, inst.proof.clone());
        let value = Term::apps(
            Term::cnst("Eq.mp"),
            [statement, rewritten.clone(), transport, fact.reference()],
        );
        Ok(Outcome {
            fact: Fact {
                id: fact.id,
                name: fact.name.clone(),
                statement: rewritten,
                value: Some(value),
            },
            side_conditions: inst.side_conditions,
        })
    }
}
