//! The compilation loader: loads references, parses and checks sources, and
//! hosts rewrite steps over the resulting [`Compilation`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use quill_lexer::Lexer;
use quill_parser::Parser;
use quill_types::abi;
use quill_types::tree::{Compilation, Namespace};
use quill_types::{
    has_errors, Diagnostic, DiagnosticCode, DiagnosticSink, RewriteStep, SourceFile, SourceMap,
};
use tracing::{debug, info_span};

use crate::checker::{Checker, ParsedSource};
use crate::references;

// ══════════════════════════════════════════════════════════════════════════════
// Configuration and results
// ══════════════════════════════════════════════════════════════════════════════

/// Everything the loader needs besides the sources.
#[derive(Default)]
pub struct LoaderConfig<'s> {
    /// Executable mode requires an entry point; library mode ignores them.
    pub is_executable: bool,
    /// Injected into every rewrite step before it runs.
    pub assembly_constants: BTreeMap<String, String>,
    /// Run in ascending priority order once the compilation is error-free.
    pub rewrite_steps: Vec<&'s mut dyn RewriteStep>,
    /// Observer for task start/end events.
    pub on_event: Option<&'s mut dyn FnMut(&TaskEvent)>,
}

pub struct LoadOutcome {
    /// `None` when the front-end reported an error before rewrite steps ran.
    /// A failed rewrite step still forwards the compilation it returned.
    pub compilation: Option<Arc<Compilation>>,
    /// Every diagnostic reported during the load, in order.
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadOutcome {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }
}

/// Pipeline defects: broken invariants, never user mistakes.
#[derive(Debug, thiserror::Error)]
pub enum LoadDefect {
    #[error("rewrite step `{step}` broke its own postcondition")]
    PostconditionFailed { step: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEventKind {
    Start,
    End,
}

impl fmt::Display for TaskEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::End => write!(f, "end"),
        }
    }
}

/// A lifecycle event for one task of the load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    pub parent: Option<String>,
    pub task: String,
}

pub const TASK_OVERALL: &str = "OverallCompilation";
pub const TASK_REFERENCES: &str = "ReferenceLoading";
pub const TASK_PARSING: &str = "Parsing";
pub const TASK_RESOLUTION: &str = "Resolution";
pub const TASK_REWRITE_STEPS: &str = "RewriteSteps";

// ══════════════════════════════════════════════════════════════════════════════
// CompilationLoader
// ══════════════════════════════════════════════════════════════════════════════

pub struct CompilationLoader;

impl CompilationLoader {
    /// Load `references`, build a compilation from `sources` and run the
    /// configured rewrite steps over it.
    ///
    /// User errors are reported to `sink` and through
    /// [`LoadOutcome::diagnostics`]; only broken step contracts are returned
    /// as `Err`.
    pub fn load(
        sources: &SourceMap,
        references: &[String],
        config: LoaderConfig<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<LoadOutcome, LoadDefect> {
        let _span = info_span!("frontend", sources = sources.len()).entered();
        let LoaderConfig {
            is_executable,
            assembly_constants,
            rewrite_steps,
            on_event,
        } = config;
        let mut run = LoadRun {
            sink,
            on_event,
            diagnostics: Vec::new(),
        };

        run.event(TaskEventKind::Start, None, TASK_OVERALL);

        run.event(TaskEventKind::Start, Some(TASK_OVERALL), TASK_REFERENCES);
        let loaded = run.load_references(references);
        run.event(TaskEventKind::End, Some(TASK_OVERALL), TASK_REFERENCES);

        run.event(TaskEventKind::Start, Some(TASK_OVERALL), TASK_PARSING);
        let parsed = run.parse_sources(sources);
        run.event(TaskEventKind::End, Some(TASK_OVERALL), TASK_PARSING);

        if has_errors(&run.diagnostics) {
            run.event(TaskEventKind::End, None, TASK_OVERALL);
            return Ok(run.finish(None));
        }

        run.event(TaskEventKind::Start, Some(TASK_OVERALL), TASK_RESOLUTION);
        let (compilation, found) = Checker::new().check(loaded, &parsed, is_executable);
        for diagnostic in found {
            run.report(diagnostic);
        }
        run.event(TaskEventKind::End, Some(TASK_OVERALL), TASK_RESOLUTION);

        if has_errors(&run.diagnostics) {
            run.event(TaskEventKind::End, None, TASK_OVERALL);
            return Ok(run.finish(None));
        }
        debug!(
            namespaces = compilation.namespaces.len(),
            entry_points = compilation.entry_points.len(),
            "compilation built"
        );

        run.event(TaskEventKind::Start, Some(TASK_OVERALL), TASK_REWRITE_STEPS);
        let compilation =
            run.run_rewrite_steps(Arc::new(compilation), rewrite_steps, &assembly_constants);
        run.event(TaskEventKind::End, Some(TASK_OVERALL), TASK_REWRITE_STEPS);
        let compilation = compilation?;

        run.event(TaskEventKind::End, None, TASK_OVERALL);
        Ok(run.finish(Some(compilation)))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// One load
// ══════════════════════════════════════════════════════════════════════════════

struct LoadRun<'s, 'k> {
    sink: &'k mut dyn DiagnosticSink,
    on_event: Option<&'s mut dyn FnMut(&TaskEvent)>,
    diagnostics: Vec<Diagnostic>,
}

impl LoadRun<'_, '_> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.sink.report(&diagnostic);
        self.diagnostics.push(diagnostic);
    }

    fn event(&mut self, kind: TaskEventKind, parent: Option<&str>, task: &str) {
        debug!(%kind, parent = parent.unwrap_or("-"), task, "task");
        if let Some(on_event) = self.on_event.as_mut() {
            on_event(&TaskEvent {
                kind,
                parent: parent.map(str::to_string),
                task: task.to_string(),
            });
        }
    }

    fn finish(self, compilation: Option<Arc<Compilation>>) -> LoadOutcome {
        LoadOutcome {
            compilation,
            diagnostics: self.diagnostics,
        }
    }

    // ── References ──

    fn load_references(&mut self, references: &[String]) -> Vec<Namespace> {
        let mut seen: Vec<&str> = Vec::new();
        let mut loaded = Vec::new();
        for reference in references {
            if seen.iter().any(|s| s.eq_ignore_ascii_case(reference)) {
                continue;
            }
            seen.push(reference);
            match references::load_reference(reference) {
                Some(namespace) => {
                    debug!(reference = %reference, callables = namespace.callables.len(), "reference loaded");
                    loaded.push(namespace);
                }
                None => self.report(
                    Diagnostic::error(
                        DiagnosticCode::UNKNOWN_REFERENCE,
                        format!(
                            "unknown reference `{reference}`; known references: {}",
                            references::known_references().join(", ")
                        ),
                    )
                    .in_source(reference.as_str()),
                ),
            }
        }
        loaded
    }

    // ── Parsing ──

    fn parse_sources(&mut self, sources: &SourceMap) -> Vec<ParsedSource> {
        let mut parsed = Vec::with_capacity(sources.len());
        for (id, text) in sources {
            if abi::is_reference(id) {
                self.report(
                    Diagnostic::error(
                        DiagnosticCode::UNKNOWN_REFERENCE,
                        format!("`{id}` names a binary reference; pass it as a reference, not a source"),
                    )
                    .in_source(id.as_str()),
                );
                continue;
            }
            let file = SourceFile::new(id.as_str(), text.as_str());
            let lexed = Lexer::new(&file).lex();
            let lex_failed = lexed.errors.has_errors();
            for diagnostic in lexed.errors.into_vec() {
                self.report(diagnostic);
            }
            if lex_failed {
                continue;
            }
            let result = Parser::new(lexed.tokens, &file).parse();
            for diagnostic in result.errors.into_vec() {
                self.report(diagnostic);
            }
            parsed.push(ParsedSource {
                id: id.clone(),
                unit: result.unit,
            });
        }
        parsed
    }

    // ── Rewrite steps ──

    fn run_rewrite_steps(
        &mut self,
        mut compilation: Arc<Compilation>,
        mut steps: Vec<&mut dyn RewriteStep>,
        constants: &BTreeMap<String, String>,
    ) -> Result<Arc<Compilation>, LoadDefect> {
        // Stable: equal priorities keep registration order.
        steps.sort_by_key(|step| step.priority());

        for step in steps {
            let name = step.name().to_string();
            let _span = info_span!("rewrite_step", step = %name, priority = step.priority()).entered();
            self.event(TaskEventKind::Start, Some(TASK_REWRITE_STEPS), &name);

            if step.implements_precondition_verification()
                && !step.precondition_verification(&compilation)
            {
                self.report(Diagnostic::info(
                    DiagnosticCode::PRECONDITION_NOT_MET,
                    format!("rewrite step `{name}` skipped: precondition not met"),
                ));
                self.event(TaskEventKind::End, Some(TASK_REWRITE_STEPS), &name);
                continue;
            }

            let injected = step.assembly_constants();
            for (key, value) in constants {
                injected.insert(key.clone(), value.clone());
            }

            if step.implements_transformation() {
                let (succeeded, transformed) = step.transformation(Arc::clone(&compilation));
                compilation = transformed;
                for diagnostic in step.generated_diagnostics() {
                    self.report(diagnostic.clone());
                }
                if !succeeded {
                    self.report(Diagnostic::error(
                        DiagnosticCode::REWRITE_STEP_FAILED,
                        format!("rewrite step `{name}` failed"),
                    ));
                    self.event(TaskEventKind::End, Some(TASK_REWRITE_STEPS), &name);
                    // Later steps do not run; the compilation is still forwarded.
                    break;
                }
                debug!(step = %name, "rewrite step transformed the compilation");
            }

            if step.implements_postcondition_verification()
                && !step.postcondition_verification(&compilation)
            {
                self.event(TaskEventKind::End, Some(TASK_REWRITE_STEPS), &name);
                return Err(LoadDefect::PostconditionFailed { step: name });
            }

            self.event(TaskEventKind::End, Some(TASK_REWRITE_STEPS), &name);
        }

        Ok(compilation)
    }
}
