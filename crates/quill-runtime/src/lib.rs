//! Quill isolated execution context.
//!
//! An [`ExecutionContext`] owns one wasmi store for one load/invoke cycle:
//!
//! ```text
//! Unloaded ──load──▶ Loaded ──invoke──▶ Invoking ──wait──▶ Loaded ──teardown──▶ Torn
//! ```
//!
//! The entry point runs on a worker thread. [`InvocationTask`] borrows the
//! context mutably, so the context cannot be torn down while a task is
//! outstanding.

mod context;
mod error;
mod host;

pub use context::{
    ContextStats, EntryHandle, EntryKind, ExecutionContext, InvocationTask, LoadedSymbols,
};
pub use error::ExecutionError;
pub use host::{HostConfig, HostState};
