use crate::ast::{FVarId, Term};
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("a fact named `{0}` already exists")]
    DuplicateName(String),
    #[error("unknown fact: {0}")]
    UnknownFact(String),
}

/// A named statement in the context, optionally carrying its proof or value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub id: FVarId,
    pub name: String,
    pub statement: Rc<Term>,
    pub value: Option<Rc<Term>>,
}

impl Fact {
    pub fn new(id: FVarId, name: impl Into<String>, statement: Rc<Term>) -> Self {
        Fact {
            id,
            name: name.into(),
            statement,
            value: None,
        }
    }

    pub fn with_value(mut self, value: Rc<Term>) -> Self {
        self.value = Some(value);
        self
    }

    /// The term standing for this fact: its payload if it has one, the fact itself otherwise.
    pub fn reference(&self) -> Rc<Term> {
        self.value.clone().unwrap_or_else(|| Term::fvar(self.id))
    }

    /// True if the statement or payload mentions `id`.
    pub fn mentions(&self, id: FVarId) -> bool {
        self.statement.has_fvar(id) || self.value.as_ref().is_some_and(|v| v.has_fvar(id))
    }
}

/// Ordered set of facts. Later facts may mention earlier ones, never the reverse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    facts: Vec<Fact>,
}

impl Context {
    pub fn new() -> Self {
        Context { facts: Vec::new() }
    }

    /// Rebuild a context from a snapshot. Names are trusted to be unique.
    pub fn from_facts(facts: Vec<Fact>) -> Self {
        Context { facts }
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Fact> {
        self.facts.iter()
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn get(&self, id: FVarId) -> Option<&Fact> {
        self.facts.iter().find(|f| f.id == id)
    }

    pub fn find(&self, name: &str) -> Option<&Fact> {
        self.facts.iter().find(|f| f.name == name)
    }

    pub fn position(&self, id: FVarId) -> Option<usize> {
        self.facts.iter().position(|f| f.id == id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn push(&mut self, fact: Fact) -> Result<(), ContextError> {
        if self.contains_name(&fact.name) {
            return Err(ContextError::DuplicateName(fact.name));
        }
        self.facts.push(fact);
        Ok(())
    }

    pub fn insert_at(&mut self, idx: usize, fact: Fact) -> Result<(), ContextError> {
        if self.contains_name(&fact.name) {
            return Err(ContextError::DuplicateName(fact.name));
        }
        let idx = idx.min(self.facts.len());
        self.facts.insert(idx, fact);
        Ok(())
    }

    /// Remove a fact, returning where it stood.
    pub fn remove(&mut self, id: FVarId) -> Option<(usize, Fact)> {
        let idx = self.position(id)?;
        Some((idx, self.facts.remove(idx)))
    }

    /// Facts after `id` whose statement or payload mentions it.
    pub fn dependents(&self, id: FVarId) -> Vec<&Fact> {
        match self.position(id) {
            Some(idx) => self.facts[idx + 1..]
                .iter()
                .filter(|f| f.mentions(id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// First name of the form `base`, `base_1`, `base_2`, ... not already taken.
    pub fn fresh_name(&self, base: &str) -> String {
        let base = if base.is_empty() || base == "_" { "x" } else { base };
        if !self.contains_name(base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}_{}", base, i))
            .find(|candidate| !self.contains_name(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn snapshot(&self) -> Vec<Fact> {
        self.facts.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(id: u64, name: &str, statement: Rc<Term>) -> Fact {
        Fact::new(FVarId(id), name, statement)
    }

    #[test]
    fn fresh_name_skips_taken_names() {
        let mut ctx = Context::new();
        assert_eq!(ctx.fresh_name("x"), "x");
        ctx.push(fact(0, "x", Term::cnst("A"))).unwrap();
        ctx.push(fact(1, "x_1", Term::cnst("A"))).unwrap();
        assert_eq!(ctx.fresh_name("x"), "x_2");
        assert_eq!(ctx.fresh_name("_"), "x_2");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut ctx = Context::new();
        ctx.push(fact(0, "h", Term::cnst("A"))).unwrap();
        let err = ctx.push(fact(1, "h", Term::cnst("B"))).unwrap_err();
        assert_eq!(err, ContextError::DuplicateName("h".into()));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn dependents_only_look_forward() {
        let mut ctx = Context::new();
        ctx.push(fact(0, "x", Term::cnst("A"))).unwrap();
        ctx.push(fact(1, "h", Term::app(Term::cnst("P"), Term::fvar(FVarId(0))))).unwrap();
        ctx.push(fact(2, "k", Term::cnst("Q"))).unwrap();
        let deps: Vec<_> = ctx.dependents(FVarId(0)).iter().map(|f| f.name.clone()).collect();
        assert_eq!(deps, vec!["h".to_string()]);
        assert!(ctx.dependents(FVarId(1)).is_empty());
    }

    #[test]
    fn iterates_newest_first_in_reverse() {
        let mut ctx = Context::new();
        ctx.push(fact(0, "x", Term::cnst("A"))).unwrap();
        ctx.push(fact(1, "h", Term::cnst("P"))).unwrap();
        let names: Vec<&str> = ctx.iter().rev().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["h", "x"]);
    }

    #[test]
    fn remove_reports_position() {
        let mut ctx = Context::new();
        ctx.push(fact(0, "a", Term::cnst("A"))).unwrap();
        ctx.push(fact(1, "b", Term::cnst("B"))).unwrap();
        let (idx, removed) = ctx.remove(FVarId(1)).expect("present");
        assert_eq!(idx, 1);
        assert_eq!(removed.name, "b");
        assert!(ctx.remove(FVarId(1)).is_none());
    }
}
