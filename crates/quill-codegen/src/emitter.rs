//! The in-memory generation rewrite step.

use std::collections::BTreeMap;
use std::sync::Arc;

use quill_types::abi::{self, ENTRY_POINT_SYMBOL};
use quill_types::tree::Compilation;
use quill_types::{Diagnostic, DiagnosticCode, RewriteStep};
use tracing::{debug, info_span};

use crate::artifact::{ArtifactMap, EntryShim};
use crate::context::{DataSegment, LoweringContext};
use crate::entry::{emit_command, emit_entry_shim, entry_artifact_name, main_artifact_name};
use crate::error::{CodegenError, CodegenResult};
use crate::stmt::emit_callable;
use crate::wat::quote_bytes;

pub const EMITTER_NAME: &str = "InMemoryWatGeneration";
pub const EMITTER_PRIORITY: i32 = -2;

// ══════════════════════════════════════════════════════════════════════════════
// Generation
// ══════════════════════════════════════════════════════════════════════════════

/// Lower `compilation` into a fresh artifact map.
///
/// Pure: the same compilation and constants always produce the same map.
pub fn generate(
    compilation: &Compilation,
    constants: &BTreeMap<String, String>,
) -> CodegenResult<ArtifactMap> {
    let mut lowering = LoweringContext::new(compilation, constants);
    let mut artifacts = ArtifactMap::new();

    for source in compilation.source_files() {
        if abi::is_reference(source) {
            continue;
        }
        let text = emit_source(&mut lowering, compilation, source)?;
        artifacts.insert(source, text)?;
    }

    if let Some(entry_name) = compilation.entry_points.first() {
        let entry = lowering
            .callable(entry_name)
            .ok_or_else(|| CodegenError::DanglingEntryPoint(entry_name.clone()))?;
        let shim_name = entry_artifact_name(&entry.source);
        artifacts.insert(main_artifact_name(&entry.source), emit_command(&lowering, EMITTER_NAME, entry))?;
        artifacts.insert(shim_name.clone(), emit_entry_shim(&lowering, EMITTER_NAME, entry)?)?;
        artifacts.set_entry_shim(EntryShim {
            artifact: shim_name,
            symbol: ENTRY_POINT_SYMBOL.to_string(),
            callable: entry.name.clone(),
        });
        if compilation.entry_points.len() > 1 {
            debug!(
                entry = %entry.name,
                ignored = compilation.entry_points.len() - 1,
                "using the first entry point"
            );
        }
    }

    debug!(
        artifacts = artifacts.len(),
        string_pool_bytes = lowering.strings.used(),
        "generation finished"
    );
    Ok(artifacts)
}

/// One artifact: the data segments and callables declared in `source`.
fn emit_source<'c>(
    lowering: &mut LoweringContext<'c>,
    compilation: &'c Compilation,
    source: &str,
) -> CodegenResult<String> {
    let mut funcs = Vec::new();
    for callable in compilation.callables().filter(|c| c.source == source) {
        if let Some(text) = emit_callable(lowering, callable)? {
            funcs.push(text);
        }
    }
    let mut text = lowering.header(EMITTER_NAME, source);
    for DataSegment { offset, bytes } in lowering.strings.take_segments() {
        text.push_str(&format!("(data (i32.const {offset}) {})\n", quote_bytes(&bytes)));
    }
    for func in funcs {
        text.push_str(&func);
    }
    Ok(text)
}

// ══════════════════════════════════════════════════════════════════════════════
// InMemoryEmitter
// ══════════════════════════════════════════════════════════════════════════════

/// Rewrite step writing generated artifacts into a caller-owned map.
///
/// The compilation passes through unchanged. On failure nothing is written
/// to the map; a pipeline defect is kept for [`InMemoryEmitter::take_defect`].
pub struct InMemoryEmitter<'a> {
    artifacts: &'a mut ArtifactMap,
    constants: BTreeMap<String, String>,
    diagnostics: Vec<Diagnostic>,
    defect: Option<CodegenError>,
}

impl<'a> InMemoryEmitter<'a> {
    pub fn new(artifacts: &'a mut ArtifactMap) -> Self {
        Self {
            artifacts,
            constants: BTreeMap::new(),
            diagnostics: Vec::new(),
            defect: None,
        }
    }

    /// The defect behind the last failed transformation, if any.
    pub fn take_defect(&mut self) -> Option<CodegenError> {
        self.defect.take()
    }

    fn run(&mut self, compilation: &Compilation) -> CodegenResult<usize> {
        let generated = generate(compilation, &self.constants)?;
        let count = generated.len();
        self.artifacts.merge(generated)?;
        Ok(count)
    }
}

impl RewriteStep for InMemoryEmitter<'_> {
    fn name(&self) -> &str {
        EMITTER_NAME
    }

    fn priority(&self) -> i32 {
        EMITTER_PRIORITY
    }

    fn assembly_constants(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.constants
    }

    fn generated_diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn transformation(&mut self, compilation: Arc<Compilation>) -> (bool, Arc<Compilation>) {
        let _span = info_span!("codegen", step = EMITTER_NAME).entered();
        self.diagnostics.clear();
        self.defect = None;

        match self.run(&compilation) {
            Ok(count) => {
                let entry = self
                    .artifacts
                    .entry_shim()
                    .map(|shim| format!("; entry shim `{}` in `{}`", shim.symbol, shim.artifact))
                    .unwrap_or_default();
                self.diagnostics.push(Diagnostic::info(
                    DiagnosticCode::GENERATION_SUMMARY,
                    format!("generated {count} artifact(s){entry}"),
                ));
                (true, compilation)
            }
            Err(error) if !error.is_defect() => {
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticCode::STRING_POOL_EXHAUSTED,
                    error.to_string(),
                ));
                (false, compilation)
            }
            Err(error) => {
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticCode::CODEGEN_DEFECT,
                    format!("code generation defect: {error}"),
                ));
                self.defect = Some(error);
                (false, compilation)
            }
        }
    }
}
