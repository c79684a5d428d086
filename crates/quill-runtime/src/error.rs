//! Execution error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The bytes did not parse, link or instantiate.
    #[error("failed to load module: {0}")]
    Load(String),

    /// An operation was called in a state that does not allow it.
    #[error("cannot {operation} while the context is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// The program called `fail`.
    #[error("program failed: {0}")]
    Failed(String),

    /// The configured fuel ran out.
    #[error("execution ran out of fuel")]
    OutOfFuel,

    /// Any other trap.
    #[error("execution trapped: {0}")]
    Trap(String),

    /// The worker thread could not be started or panicked; the store is lost.
    #[error("invocation worker failed: {0}")]
    Worker(String),
}

/// Execution result type alias.
pub type ExecutionResult<T> = Result<T, ExecutionError>;
