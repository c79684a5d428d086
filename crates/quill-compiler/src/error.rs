use quill_codegen::CodegenError;
use quill_frontend::LoadDefect;
use thiserror::Error;

/// Pipeline defects. User errors are diagnostics, never this type.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Frontend(#[from] LoadDefect),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error("the compilation has entry points but no entry shim was registered")]
    MissingEntryShim,

    #[error("failed to encode the module manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}
