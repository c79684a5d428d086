//! Quill in-memory code generator.
//!
//! [`InMemoryEmitter`] is a rewrite step that lowers a checked
//! [`Compilation`](quill_types::tree::Compilation) into WebAssembly text
//! artifacts. It never touches the filesystem: every artifact lands in an
//! [`ArtifactMap`] owned by the caller.
//!
//! ## Artifacts
//!
//! - one artifact per source file, keyed by the source identifier, holding
//!   the lowered callables and the data segments of their string literals;
//! - for an executable, `<source>.g.EntryPoint.wat` with the exported entry
//!   shim `__QuillEntryPoint__ : () -> i32`, and `<source>.g.Main.wat` with
//!   the exported `_start` command.
//!
//! Artifacts are module *fields*, not modules. The back-end wraps them,
//! together with the reference preludes, into a single module.
//!
//! ## Value representation
//!
//! | Quill    | WAT   |
//! |----------|-------|
//! | `Int`    | `i64` |
//! | `Bool`   | `i32` (0 or 1) |
//! | `String` | `i32` pointer to `[len: u32][utf-8 bytes]` |
//! | `Unit`   | no value |

pub mod artifact;
mod context;
pub mod emitter;
mod entry;
pub mod error;
mod expr;
mod stmt;
mod wat;

pub use artifact::{ArtifactMap, EntryShim};
pub use context::{DataSegment, StringPool, ASSEMBLY_NAME, OUTPUT_PATH};
pub use emitter::{generate, InMemoryEmitter, EMITTER_NAME, EMITTER_PRIORITY};
pub use error::{CodegenError, CodegenResult};
