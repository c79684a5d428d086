//! Quill front-end.
//!
//! ```text
//! references + sources → Lexer → Parser → Checker → Compilation → rewrite steps
//! ```
//!
//! Entry point: [`CompilationLoader::load`].

mod checker;
mod env;
mod loader;
pub mod references;

pub use loader::{
    CompilationLoader, LoadDefect, LoadOutcome, LoaderConfig, TaskEvent, TaskEventKind,
    TASK_OVERALL, TASK_PARSING, TASK_REFERENCES, TASK_RESOLUTION, TASK_REWRITE_STEPS,
};
