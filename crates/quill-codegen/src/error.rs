//! Codegen error types.

use quill_types::tree::QualifiedName;
use thiserror::Error;

/// Errors that can occur while lowering a compilation to WAT.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// The string literals of the program do not fit below the heap.
    #[error("string literal pool exhausted: {needed} bytes needed, {available} available")]
    StringPoolExhausted { needed: u32, available: u32 },

    /// The compilation lists an entry point that names no callable.
    #[error("entry point `{0}` does not name a callable")]
    DanglingEntryPoint(QualifiedName),

    /// The entry shim cannot call an entry point that takes arguments.
    #[error("entry point `{0}` takes parameters")]
    EntryPointHasParameters(QualifiedName),

    /// Two artifacts were generated under the same name.
    #[error("artifact `{0}` generated twice")]
    ArtifactCollision(String),

    /// A call site names a callable missing from the compilation.
    #[error("`{caller}` calls unresolved callable `{callee}`")]
    UnresolvedCallee {
        caller: QualifiedName,
        callee: QualifiedName,
    },

    /// A local slot index points past the callable's locals.
    #[error("`{callable}` uses undeclared local slot {slot}")]
    UnknownLocal { callable: QualifiedName, slot: u32 },
}

impl CodegenError {
    /// `true` for broken pipeline invariants, `false` for limits the user
    /// program can hit.
    pub fn is_defect(&self) -> bool {
        !matches!(self, Self::StringPoolExhausted { .. })
    }
}

/// Codegen result type alias.
pub type CodegenResult<T> = Result<T, CodegenError>;
