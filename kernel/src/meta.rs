use crate::ast::{MetaId, Term};
use std::rc::Rc;

/// What a placeholder stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKind {
    /// An open proof obligation.
    Goal,
    /// A parameter that unification is expected to pin down.
    Param,
    /// An auxiliary obligation emitted by a transformation.
    SideCondition,
}

#[derive(Debug, Clone)]
pub struct MetaDecl {
    pub ty: Rc<Term>,
    /// Number of context facts in scope when the placeholder was created.
    pub depth: usize,
    pub kind: MetaKind,
    pub assignment: Option<Rc<Term>>,
}

/// Position in the placeholder store; everything created afterwards is "since" it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MetaMark(usize);

#[derive(Debug, Clone, Default)]
pub struct MetaCtx {
    decls: Vec<MetaDecl>,
}

impl MetaCtx {
    pub fn new() -> Self {
        MetaCtx { decls: Vec::new() }
    }

    pub fn fresh(&mut self, ty: Rc<Term>, depth: usize, kind: MetaKind) -> MetaId {
        let id = MetaId(self.decls.len());
        self.decls.push(MetaDecl {
            ty,
            depth,
            kind,
            assignment: None,
        });
        id
    }

    pub fn decl(&self, id: MetaId) -> Option<&MetaDecl> {
        self.decls.get(id.0)
    }

    pub fn ty(&self, id: MetaId) -> Option<Rc<Term>> {
        self.decl(id).map(|d| d.ty.clone())
    }

    pub fn is_assigned(&self, id: MetaId) -> bool {
        self.decl(id).is_some_and(|d| d.assignment.is_some())
    }

    pub fn assignment(&self, id: MetaId) -> Option<Rc<Term>> {
        self.decl(id).and_then(|d| d.assignment.clone())
    }

    /// Record `id := val`. Returns false if `id` is unknown or already assigned.
    pub fn assign(&mut self, id: MetaId, val: Rc<Term>) -> bool {
        match self.decls.get_mut(id.0) {
            Some(decl) if decl.assignment.is_none() => {
                decl.assignment = Some(val);
                true
            }
            _ => false,
        }
    }

    /// Shrink the scope of `id` to the first `depth` facts.
    pub fn lower_depth(&mut self, id: MetaId, depth: usize) {
        if let Some(decl) = self.decls.get_mut(id.0) {
            decl.depth = decl.depth.min(depth);
        }
    }

    /// Keep depths in step with a fact leaving the context at `pos`.
    pub fn fact_removed(&mut self, pos: usize) {
        for decl in self.decls.iter_mut().filter(|d| d.assignment.is_none()) {
            if decl.depth > pos {
                decl.depth -= 1;
            }
        }
    }

    /// Keep depths in step with a fact entering the context at `pos`.
    pub fn fact_inserted(&mut self, pos: usize) {
        for decl in self.decls.iter_mut().filter(|d| d.assignment.is_none()) {
            if decl.depth > pos {
                decl.depth += 1;
            }
        }
    }

    pub fn mark(&self) -> MetaMark {
        MetaMark(self.decls.len())
    }

    /// Unassigned placeholders created after `mark`, oldest first.
    pub fn unassigned_since(&self, mark: MetaMark) -> Vec<MetaId> {
        (mark.0..self.decls.len())
            .map(MetaId)
            .filter(|id| !self.is_assigned(*id))
            .collect()
    }

    /// Replace every assigned placeholder by its (recursively instantiated) value.
    pub fn instantiate(&self, term: &Rc<Term>) -> Rc<Term> {
        if !term.has_metas() {
            return term.clone();
        }
        term.map_subterms(0, &mut |t, _| match t {
            Term::Meta(id) => self.assignment(*id).map(|val| self.instantiate(&val)),
            _ => None,
        })
    }

    /// True if `id` occurs in `term` once assignments are followed.
    pub fn occurs(&self, id: MetaId, term: &Rc<Term>) -> bool {
        self.instantiate(term).metas().contains(&id)
    }
}
