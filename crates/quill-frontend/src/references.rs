//! Prebuilt binary references known to the front-end.
//!
//! A reference contributes declarations only: its callables carry
//! [`CallableBody::Intrinsic`] and name the reference itself as their
//! declaring source.

use quill_types::ast::CallableKind;
use quill_types::tree::{
    Callable, CallableBody, Namespace, Param, QualifiedName, Signature, Type,
};
use quill_types::Span;

/// The intrinsic library every sample program opens.
pub const INTRINSIC_REFERENCE: &str = "Quill.Intrinsic.qlib";

pub const INTRINSIC_NAMESPACE: &str = "Quill.Intrinsic";

/// References the front-end can load, in catalogue order.
pub fn known_references() -> &'static [&'static str] {
    &[INTRINSIC_REFERENCE]
}

/// Load the declarations of a reference. `None` if the reference is unknown.
pub fn load_reference(identifier: &str) -> Option<Namespace> {
    if identifier.eq_ignore_ascii_case(INTRINSIC_REFERENCE) {
        Some(intrinsic_namespace(identifier))
    } else {
        None
    }
}

fn intrinsic_namespace(source: &str) -> Namespace {
    let mut ns = NamespaceBuilder::new(INTRINSIC_NAMESPACE, source);
    ns.add(
        CallableKind::Function,
        "Message",
        &[("msg", Type::String)],
        Type::Unit,
    );
    ns.add(
        CallableKind::Function,
        "IntAsString",
        &[("value", Type::Int)],
        Type::String,
    );
    ns.add(
        CallableKind::Function,
        "BoolAsString",
        &[("value", Type::Bool)],
        Type::String,
    );
    ns.add(
        CallableKind::Function,
        "Length",
        &[("s", Type::String)],
        Type::Int,
    );
    ns.add(
        CallableKind::Operation,
        "RandomInt",
        &[("max", Type::Int)],
        Type::Int,
    );
    ns.finish()
}

// ──────────────────────────────────────────────────────────────────────
// Registration helpers
// ──────────────────────────────────────────────────────────────────────

struct NamespaceBuilder<'a> {
    name: &'a str,
    source: &'a str,
    callables: Vec<Callable>,
}

impl<'a> NamespaceBuilder<'a> {
    fn new(name: &'a str, source: &'a str) -> Self {
        Self {
            name,
            source,
            callables: Vec::new(),
        }
    }

    fn add(&mut self, kind: CallableKind, name: &str, params: &[(&str, Type)], return_type: Type) {
        let params: Vec<Param> = params
            .iter()
            .map(|(name, ty)| Param {
                name: (*name).to_string(),
                ty: *ty,
            })
            .collect();
        self.callables.push(Callable {
            name: QualifiedName::new(self.name, name),
            kind,
            source: self.source.to_string(),
            signature: Signature {
                params,
                return_type,
            },
            locals: Vec::new(),
            body: CallableBody::Intrinsic,
            span: Span::point(1, 1),
        });
    }

    fn finish(self) -> Namespace {
        Namespace {
            name: self.name.to_string(),
            callables: self.callables,
        }
    }
}
