//! Local-variable environment with lexically scoped bindings.
//!
//! [`LocalEnv`] hands out one [`LocalId`] per declaration, in declaration
//! order, so the slots of a callable can be lowered without renumbering.

use std::collections::HashMap;

use quill_types::tree::{LocalDecl, LocalId, Type};
use quill_types::Span;

// ══════════════════════════════════════════════════════════════════════════════
// Slot
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub(crate) struct LocalSlot {
    pub decl: LocalDecl,
    pub span: Span,
    pub read: bool,
    /// Only `let`/`mutable` bindings get an unused-variable warning.
    pub warn_unused: bool,
}

// ══════════════════════════════════════════════════════════════════════════════
// LocalEnv
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub(crate) struct LocalEnv {
    scopes: Vec<HashMap<String, LocalId>>,
    slots: Vec<LocalSlot>,
}

impl LocalEnv {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            slots: Vec::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot pop the callable scope");
        self.scopes.pop();
    }

    /// Define a binding in the innermost scope.
    ///
    /// Returns `None` if the name is already visible: Quill forbids
    /// shadowing an enclosing binding.
    pub fn define(
        &mut self,
        name: &str,
        ty: Type,
        mutable: bool,
        span: Span,
        warn_unused: bool,
    ) -> Option<LocalId> {
        if self.lookup(name).is_some() {
            return None;
        }
        let id = LocalId(self.slots.len() as u32);
        self.slots.push(LocalSlot {
            decl: LocalDecl {
                name: name.to_string(),
                ty,
                mutable,
            },
            span,
            read: false,
            warn_unused,
        });
        self.scopes.last_mut()?.insert(name.to_string(), id);
        Some(id)
    }

    /// Innermost-to-outermost lookup.
    pub fn lookup(&self, name: &str) -> Option<LocalId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    pub fn slot(&self, id: LocalId) -> Option<&LocalSlot> {
        self.slots.get(id.0 as usize)
    }

    pub fn mark_read(&mut self, id: LocalId) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            slot.read = true;
        }
    }

    /// Bindings that should warn because they were never read.
    pub fn unused(&self) -> impl Iterator<Item = &LocalSlot> {
        self.slots
            .iter()
            .filter(|s| s.warn_unused && !s.read && !s.decl.name.starts_with('_'))
    }

    pub fn into_locals(self) -> Vec<LocalDecl> {
        self.slots.into_iter().map(|s| s.decl).collect()
    }
}
