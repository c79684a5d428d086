//! Quill back-end compiler.
//!
//! Takes ordered WAT artifacts plus the names of prebuilt references and
//! produces a single validated WebAssembly module. The back-end reports
//! everything through diagnostics; it has no error type of its own.

pub mod compiler;
pub mod references;

pub use compiler::{BackendCompiler, BackendOutput, SourceText};
pub use references::{BackendReference, INTRINSIC_REFERENCE, RUNTIME_REFERENCE};
