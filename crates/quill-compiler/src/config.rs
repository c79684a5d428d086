//! Pipeline configuration, loadable from TOML.
//!
//! ```toml
//! assembly_name = "hello-quill"
//! is_executable = true
//! references = ["Quill.Intrinsic.qlib"]
//! verbosity = "warning"
//! no_warn = [4005]
//!
//! [assembly_constants]
//! OutputPath = "out/"
//!
//! [host]
//! fuel = 1000000
//! seed = 42
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use quill_codegen::{ASSEMBLY_NAME, OUTPUT_PATH};
use quill_frontend::references::INTRINSIC_REFERENCE;
use quill_runtime::HostConfig;
use quill_types::Severity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ASSEMBLY_NAME: &str = "hello-quill";

/// Stands in for a file-system path: nothing is written to disk.
pub const IN_MEMORY_OUTPUT: &str = "<in-memory>";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name of the binary module and the `AssemblyName` constant.
    pub assembly_name: String,
    /// Executable mode requires an entry point; library mode skips
    /// invocation.
    pub is_executable: bool,
    /// Front-end references.
    pub references: Vec<String>,
    /// Back-end references linked in addition to the runtime prelude.
    pub backend_references: Vec<String>,
    /// Injected into every rewrite step; overrides the defaults derived from
    /// `assembly_name`.
    pub assembly_constants: BTreeMap<String, String>,
    /// Least severe diagnostic the console logger prints.
    pub verbosity: Severity,
    /// Codes the console logger suppresses (Errors are never suppressed).
    pub no_warn: Vec<u16>,
    /// Added to every reported line number.
    pub line_offset: u32,
    /// Invoke the `_start` command driver instead of the entry shim.
    pub invoke_command: bool,
    pub host: HostConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            assembly_name: DEFAULT_ASSEMBLY_NAME.to_string(),
            is_executable: true,
            references: vec![INTRINSIC_REFERENCE.to_string()],
            backend_references: Vec::new(),
            assembly_constants: BTreeMap::new(),
            verbosity: Severity::Hint,
            no_warn: Vec::new(),
            line_offset: 0,
            invoke_command: false,
            host: HostConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// The constants handed to rewrite steps: `AssemblyName` and
    /// `OutputPath` first, then the configured entries on top.
    pub fn rewrite_constants(&self) -> BTreeMap<String, String> {
        let mut constants = BTreeMap::new();
        constants.insert(ASSEMBLY_NAME.to_string(), self.assembly_name.clone());
        constants.insert(OUTPUT_PATH.to_string(), IN_MEMORY_OUTPUT.to_string());
        for (key, value) in &self.assembly_constants {
            constants.insert(key.clone(), value.clone());
        }
        constants
    }
}
