//! Shared types for the Quill pipeline.
//!
//! This crate defines source spans, diagnostics, the syntax tree, the
//! Program Representation handed to rewrite steps, the rewrite-step contract
//! itself, and the naming/layout constants that connect the pipeline stages.

pub mod abi;
pub mod ast;
mod diagnostic;
pub mod rewrite;
mod span;
pub mod tree;

pub use diagnostic::{
    has_errors, Diagnostic, DiagnosticCategory, DiagnosticCode, DiagnosticSink, Diagnostics,
    Severity, MAX_ERRORS,
};
pub use rewrite::RewriteStep;
pub use span::{SourceFile, Span};

/// Source identifier → source text, in insertion order.
pub type SourceMap = indexmap::IndexMap<String, String>;
