//! Quill compiler: orchestrates the full pipeline.
//!
//! ```text
//! sources → CompilationLoader (+ InMemoryEmitter) → ArtifactMap
//!         → Driver (BackendCompiler) → BinaryModule
//!         → ExecutionContext (load → resolve → invoke → wait → teardown)
//! ```
//!
//! [`Pipeline::run`] sequences the stages and stops at the first one that
//! reports an Error. User mistakes come back as diagnostics and a
//! [`RunStatus`]; broken stage contracts come back as [`PipelineError`].

mod config;
pub mod driver;
mod error;
mod logger;
mod pipeline;
pub mod sample;

pub use config::{ConfigError, PipelineConfig};
pub use driver::{BinaryModule, Driver, DriverOutput};
pub use error::PipelineError;
pub use logger::{human_readable, ConsoleLogger, Formatter};
pub use pipeline::{Pipeline, PipelineReport, RunStatus};
