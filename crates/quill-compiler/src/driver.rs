//! Second-stage driver: generated artifacts to a binary module.
//!
//! The back-end may hand back bytes together with an Error (a module that
//! encodes but fails validation). The driver never forwards such bytes: any
//! Error means no [`BinaryModule`].

use std::borrow::Cow;

use quill_backend::{BackendCompiler, SourceText, INTRINSIC_REFERENCE, RUNTIME_REFERENCE};
use quill_codegen::ArtifactMap;
use quill_types::abi::{ModuleManifest, MANIFEST_SECTION};
use quill_types::{has_errors, Diagnostic, DiagnosticSink};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info_span};
use wasm_encoder::{CustomSection, Encode, Section};

use crate::error::PipelineError;

/// A validated wasm module with its manifest embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryModule {
    pub name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub size: usize,
    /// Lowercase hex SHA-256 of `bytes`.
    pub digest: String,
    pub manifest: ModuleManifest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOutput {
    pub module: Option<BinaryModule>,
    /// Every back-end diagnostic, Errors included.
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Driver {
    module_name: String,
    references: Vec<String>,
}

impl Driver {
    /// The runtime and intrinsic preludes are always linked; `extra` adds to
    /// them.
    pub fn new(module_name: impl Into<String>, extra: &[String]) -> Self {
        let mut references = vec![RUNTIME_REFERENCE.to_string(), INTRINSIC_REFERENCE.to_string()];
        references.extend(extra.iter().cloned());
        Self {
            module_name: module_name.into(),
            references,
        }
    }

    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Compile `artifacts` in insertion order.
    pub fn compile(
        &self,
        artifacts: &ArtifactMap,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<DriverOutput, PipelineError> {
        let _span = info_span!("driver", module = %self.module_name).entered();
        let sources: Vec<SourceText> = artifacts
            .iter()
            .map(|(name, text)| SourceText::new(name, text))
            .collect();
        let output = BackendCompiler::new(self.module_name.as_str()).compile(&sources, &self.references);
        for diagnostic in &output.diagnostics {
            sink.report(diagnostic);
        }

        let module = match output.bytes {
            Some(bytes) if output.success && !has_errors(&output.diagnostics) => {
                let manifest = ModuleManifest {
                    name: self.module_name.clone(),
                    artifacts: artifacts.names().map(str::to_string).collect(),
                    entry_symbol: artifacts.entry_shim().map(|shim| shim.symbol.clone()),
                };
                Some(seal(&self.module_name, bytes, manifest)?)
            }
            _ => {
                debug!("back-end reported errors; no module produced");
                None
            }
        };

        Ok(DriverOutput {
            module,
            diagnostics: output.diagnostics,
        })
    }
}

/// Append the manifest section and digest the result.
fn seal(name: &str, mut bytes: Vec<u8>, manifest: ModuleManifest) -> Result<BinaryModule, PipelineError> {
    let data = serde_json::to_vec(&manifest)?;
    let section = CustomSection {
        name: Cow::Borrowed(MANIFEST_SECTION),
        data: Cow::Owned(data),
    };
    bytes.push(section.id());
    section.encode(&mut bytes);

    let digest = format!("{:x}", Sha256::digest(&bytes));
    debug!(size = bytes.len(), %digest, "module sealed");
    Ok(BinaryModule {
        name: name.to_string(),
        size: bytes.len(),
        bytes,
        digest,
        manifest,
    })
}
