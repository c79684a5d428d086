//! The pipeline orchestrator.

use std::sync::Arc;

use quill_codegen::{ArtifactMap, InMemoryEmitter};
use quill_frontend::{CompilationLoader, LoadOutcome, LoaderConfig};
use quill_runtime::{ContextStats, ExecutionContext, InvocationTask};
use quill_types::{has_errors, Diagnostic, DiagnosticSink, RewriteStep, SourceMap};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::config::PipelineConfig;
use crate::driver::{BinaryModule, Driver};
use crate::error::PipelineError;

// ══════════════════════════════════════════════════════════════════════════════
// Report
// ══════════════════════════════════════════════════════════════════════════════

/// How far a run got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStatus {
    /// The front-end or a rewrite step reported an Error.
    FrontendFailed,
    /// The back-end reported an Error; no execution context was created.
    BackendFailed,
    LoadFailed { message: String },
    /// Executable mode, but the module exports no entry symbol.
    EntryNotFound,
    /// Library mode: compiled, nothing to invoke.
    Library,
    InvocationFailed { message: String },
    Completed { exit_code: i32 },
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Library | Self::Completed { .. })
    }

    /// Process exit code: the entry point's result when it fits in a `u8`
    /// (255 otherwise), 0 for a library, 1 for any failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Completed { exit_code } => u8::try_from(*exit_code).unwrap_or(u8::MAX),
            Self::Library => 0,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub status: RunStatus,
    pub frontend_diagnostics: Vec<Diagnostic>,
    pub backend_diagnostics: Vec<Diagnostic>,
    pub artifacts: ArtifactMap,
    pub module: Option<BinaryModule>,
    /// Messages the program printed.
    pub output: Vec<String>,
}

impl PipelineReport {
    fn new(status: RunStatus, frontend_diagnostics: Vec<Diagnostic>, artifacts: ArtifactMap) -> Self {
        Self {
            status,
            frontend_diagnostics,
            backend_diagnostics: Vec::new(),
            artifacts,
            module: None,
            output: Vec::new(),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Pipeline
// ══════════════════════════════════════════════════════════════════════════════

pub struct Pipeline {
    config: PipelineConfig,
    stats: Arc<ContextStats>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            stats: Arc::new(ContextStats::default()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load and teardown counts of every execution context this pipeline
    /// created.
    pub fn stats(&self) -> &Arc<ContextStats> {
        &self.stats
    }

    pub fn run(
        &self,
        sources: &SourceMap,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<PipelineReport, PipelineError> {
        self.run_with_steps(sources, Vec::new(), sink)
    }

    /// Run with `steps` registered next to the in-memory emitter.
    pub fn run_with_steps(
        &self,
        sources: &SourceMap,
        steps: Vec<&mut dyn RewriteStep>,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<PipelineReport, PipelineError> {
        let _span = info_span!("pipeline", assembly = %self.config.assembly_name).entered();

        // 1. Front-end with the emitter attached
        let (artifacts, outcome) = self.generate_with_steps(sources, steps, sink)?;
        if has_errors(&outcome.diagnostics) {
            info!("front-end reported errors; stopping");
            return Ok(PipelineReport::new(
                RunStatus::FrontendFailed,
                outcome.diagnostics,
                artifacts,
            ));
        }

        // 2. Every entry point must have left a shim behind
        let has_entry_points = outcome
            .compilation
            .as_ref()
            .is_some_and(|compilation| compilation.is_executable());
        if self.config.is_executable && has_entry_points && artifacts.entry_shim().is_none() {
            return Err(PipelineError::MissingEntryShim);
        }

        let mut report = PipelineReport::new(RunStatus::BackendFailed, outcome.diagnostics, artifacts);

        // 3. Second-stage compile
        let driver = Driver::new(self.config.assembly_name.as_str(), &self.config.backend_references);
        let compiled = driver.compile(&report.artifacts, sink)?;
        report.backend_diagnostics = compiled.diagnostics;
        let Some(module) = compiled.module else {
            info!("back-end reported errors; no execution context created");
            return Ok(report);
        };

        // 4. One isolated load/invoke cycle
        let (status, output) = self.execute(&module);
        info!(status = ?status, "run finished");
        report.status = status;
        report.output = output;
        report.module = Some(module);
        Ok(report)
    }

    /// Only the front-end and the emitter: the artifacts a run would compile.
    pub fn generate(
        &self,
        sources: &SourceMap,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<(ArtifactMap, LoadOutcome), PipelineError> {
        self.generate_with_steps(sources, Vec::new(), sink)
    }

    fn generate_with_steps(
        &self,
        sources: &SourceMap,
        steps: Vec<&mut dyn RewriteStep>,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<(ArtifactMap, LoadOutcome), PipelineError> {
        let mut artifacts = ArtifactMap::new();
        let outcome = {
            let mut emitter = InMemoryEmitter::new(&mut artifacts);
            let mut registered: Vec<&mut dyn RewriteStep> = Vec::with_capacity(steps.len() + 1);
            registered.push(&mut emitter);
            for step in steps {
                registered.push(step);
            }
            let config = LoaderConfig {
                is_executable: self.config.is_executable,
                assembly_constants: self.config.rewrite_constants(),
                rewrite_steps: registered,
                on_event: None,
            };
            let outcome = CompilationLoader::load(sources, &self.config.references, config, sink)?;
            if let Some(defect) = emitter.take_defect() {
                return Err(defect.into());
            }
            outcome
        };
        debug!(artifacts = artifacts.len(), "front-end finished");
        Ok((artifacts, outcome))
    }

    /// Load, resolve, invoke, tear down. The context is torn down on every
    /// path out of this function.
    fn execute(&self, module: &BinaryModule) -> (RunStatus, Vec<String>) {
        let _span = info_span!("execute", module = %module.name).entered();
        let mut context = ExecutionContext::with_stats(self.config.host.clone(), Arc::clone(&self.stats));

        let symbols = match context.load(&module.bytes) {
            Ok(symbols) => symbols,
            Err(error) => {
                warn!(%error, "module failed to load");
                return (
                    RunStatus::LoadFailed {
                        message: error.to_string(),
                    },
                    Vec::new(),
                );
            }
        };

        let handle = if self.config.invoke_command {
            context.resolve_command(&symbols)
        } else {
            context.resolve_entry(&symbols)
        };
        let Some(handle) = handle else {
            context.teardown();
            let status = if self.config.is_executable {
                warn!("no entry symbol found in module");
                RunStatus::EntryNotFound
            } else {
                RunStatus::Library
            };
            return (status, Vec::new());
        };

        debug!(symbol = %handle.symbol, "invoking entry point");
        let result = context.invoke(handle).and_then(InvocationTask::wait);
        let output = context
            .host_state()
            .map(|host| host.messages.clone())
            .unwrap_or_default();
        context.teardown();

        let status = match result {
            Ok(exit_code) => RunStatus::Completed { exit_code },
            Err(error) => RunStatus::InvocationFailed {
                message: error.to_string(),
            },
        };
        (status, output)
    }
}
