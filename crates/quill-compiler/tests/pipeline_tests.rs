//! End-to-end pipeline tests: source → front-end → in-memory generation →
//! back-end → isolated execution.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use quill_compiler::sample::{sample_sources, SAMPLE_ID};
use quill_compiler::{Pipeline, PipelineConfig, PipelineReport, RunStatus};
use quill_runtime::HostConfig;
use quill_types::tree::Compilation;
use quill_types::{has_errors, Diagnostic, DiagnosticCode, RewriteStep, SourceMap};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

const SQUARES: &str = r#"
namespace Squares {
    open Quill.Intrinsic;

    function Square(x : Int) : Int {
        return x * x;
    }

    @EntryPoint()
    operation Main() : Int {
        Message("squaring");
        return Square(6);
    }
}
"#;

fn sources(entries: &[(&str, &str)]) -> SourceMap {
    entries
        .iter()
        .map(|(id, text)| (id.to_string(), text.to_string()))
        .collect()
}

fn run_with(config: PipelineConfig, entries: &[(&str, &str)]) -> (Pipeline, PipelineReport, Vec<Diagnostic>) {
    let pipeline = Pipeline::new(config);
    let mut sink: Vec<Diagnostic> = Vec::new();
    let report = pipeline
        .run(&sources(entries), &mut sink)
        .expect("no pipeline defect");
    (pipeline, report, sink)
}

fn run(entries: &[(&str, &str)]) -> (Pipeline, PipelineReport, Vec<Diagnostic>) {
    run_with(PipelineConfig::default(), entries)
}

fn codes(diagnostics: &[Diagnostic]) -> Vec<DiagnosticCode> {
    diagnostics.iter().map(|d| d.code).collect()
}

/// A rewrite step that records when it ran.
struct Recorder {
    name: &'static str,
    priority: i32,
    succeed: bool,
    log: Rc<RefCell<Vec<&'static str>>>,
    constants: BTreeMap<String, String>,
    diagnostics: Vec<Diagnostic>,
}

impl Recorder {
    fn new(name: &'static str, priority: i32, log: &Rc<RefCell<Vec<&'static str>>>) -> Self {
        Self {
            name,
            priority,
            succeed: true,
            log: Rc::clone(log),
            constants: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }
}

impl RewriteStep for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn assembly_constants(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.constants
    }

    fn generated_diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn transformation(&mut self, compilation: Arc<Compilation>) -> (bool, Arc<Compilation>) {
        self.log.borrow_mut().push(self.name);
        (self.succeed, compilation)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// 1. Executable runs
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_sample_program_runs_end_to_end() {
    let pipeline = Pipeline::new(PipelineConfig::default());
    let mut sink: Vec<Diagnostic> = Vec::new();
    let report = pipeline.run(&sample_sources(), &mut sink).unwrap();

    assert!(!has_errors(&report.frontend_diagnostics), "{:#?}", report.frontend_diagnostics);
    let RunStatus::Completed { exit_code } = report.status else {
        panic!("sample did not complete: {:?}", report.status);
    };
    assert!((0..=100).contains(&exit_code));
    assert_eq!(
        report.output,
        [format!("Ones: {exit_code}"), format!("Zeros: {}", 100 - exit_code)]
    );
    assert_eq!(
        report.artifacts.names().collect::<Vec<_>>(),
        [
            SAMPLE_ID.to_string(),
            format!("{SAMPLE_ID}.g.Main.wat"),
            format!("{SAMPLE_ID}.g.EntryPoint.wat"),
        ]
    );
    assert_eq!(pipeline.stats().loads(), 1);
    assert_eq!(pipeline.stats().teardowns(), 1);
}

#[test]
fn test_two_callables_one_entry_point() {
    let (pipeline, report, _) = run(&[("squares.ql", SQUARES)]);
    assert!(!has_errors(&report.frontend_diagnostics));
    assert_eq!(report.status, RunStatus::Completed { exit_code: 36 });
    assert_eq!(report.output, ["squaring"]);

    let names: Vec<_> = report.artifacts.names().collect();
    assert_eq!(names, ["squares.ql", "squares.ql.g.Main.wat", "squares.ql.g.EntryPoint.wat"]);
    let shim = report.artifacts.entry_shim().expect("shim");
    assert_eq!(shim.artifact, "squares.ql.g.EntryPoint.wat");

    let module = report.module.as_ref().expect("module");
    assert!(!module.bytes.is_empty());
    assert_eq!(&module.bytes[0..4], b"\0asm");
    assert!(wasmparser::validate(&module.bytes).is_ok());
    assert_eq!(module.manifest.entry_symbol.as_deref(), Some("__QuillEntryPoint__"));
    assert_eq!(module.manifest.artifacts, names);
    assert_eq!(report.status.exit_code(), 36);
    assert_eq!(pipeline.stats().teardowns(), 1);
}

#[test]
fn test_command_driver_reports_the_same_result() {
    let config = PipelineConfig {
        invoke_command: true,
        ..PipelineConfig::default()
    };
    let (_, report, _) = run_with(config, &[("squares.ql", SQUARES)]);
    assert_eq!(report.status, RunStatus::Completed { exit_code: 36 });
}

#[test]
fn test_string_entry_point_prints_its_result() {
    let program = r#"
namespace Greeter {
    @EntryPoint()
    function Greet() : String {
        return "hi " + "there";
    }
}
"#;
    let (_, report, _) = run(&[("greet.ql", program)]);
    assert_eq!(report.status, RunStatus::Completed { exit_code: 0 });
    assert_eq!(report.output, ["hi there"]);
}

#[test]
fn test_string_entry_point_needs_no_front_end_reference() {
    let program = r#"
namespace Greeter {
    @EntryPoint()
    function Greet() : String {
        return "bare";
    }
}
"#;
    let config = PipelineConfig {
        references: Vec::new(),
        ..PipelineConfig::default()
    };
    let (_, report, sink) = run_with(config, &[("greet.ql", program)]);
    assert!(!has_errors(&sink), "{sink:?}");
    assert_eq!(report.status, RunStatus::Completed { exit_code: 0 });
    assert_eq!(report.output, ["bare"]);
}

#[test]
fn test_runs_are_deterministic() {
    let (_, first, _) = run(&[("squares.ql", SQUARES)]);
    let (_, second, _) = run(&[("squares.ql", SQUARES)]);
    assert_eq!(first.artifacts, second.artifacts);
    assert_eq!(
        first.module.map(|m| m.digest),
        second.module.map(|m| m.digest)
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// 2. Failures stop the pipeline
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_undefined_name_stops_before_the_back_end() {
    let program = r#"
namespace Broken {
    @EntryPoint()
    operation Main() : Int {
        return missing + 1;
    }
}
"#;
    let (pipeline, report, _) = run(&[("broken.ql", program)]);
    assert_eq!(report.status, RunStatus::FrontendFailed);
    assert!(codes(&report.frontend_diagnostics).contains(&DiagnosticCode::UNDEFINED_NAME));
    assert!(report.artifacts.is_empty());
    assert!(report.backend_diagnostics.is_empty());
    assert!(report.module.is_none());
    assert_eq!(pipeline.stats().loads(), 0);
    assert_eq!(report.status.exit_code(), 1);
}

#[test]
fn test_back_end_error_creates_no_context() {
    let config = PipelineConfig {
        backend_references: vec!["Quill.Missing.qlib".to_string()],
        ..PipelineConfig::default()
    };
    let (pipeline, report, _) = run_with(config, &[("squares.ql", SQUARES)]);
    assert_eq!(report.status, RunStatus::BackendFailed);
    assert!(codes(&report.backend_diagnostics).contains(&DiagnosticCode::UNKNOWN_BACKEND_REFERENCE));
    assert!(report.module.is_none());
    assert!(!report.artifacts.is_empty());
    assert_eq!(pipeline.stats().loads(), 0);
    assert_eq!(pipeline.stats().teardowns(), 0);
}

#[test]
fn test_failing_program_is_torn_down() {
    let program = r#"
namespace Failing {
    @EntryPoint()
    operation Main() : Int {
        fail "boom";
    }
}
"#;
    let (pipeline, report, _) = run(&[("fail.ql", program)]);
    match &report.status {
        RunStatus::InvocationFailed { message } => assert!(message.contains("boom"), "{message}"),
        other => panic!("expected an invocation failure, got {other:?}"),
    }
    assert_eq!(pipeline.stats().loads(), 1);
    assert_eq!(pipeline.stats().teardowns(), 1);
}

#[test]
fn test_fuel_stops_runaway_programs() {
    let program = r#"
namespace Spin {
    @EntryPoint()
    operation Main() : Unit {
        mutable n = 0;
        while true {
            set n += 1;
        }
    }
}
"#;
    let config = PipelineConfig {
        host: HostConfig {
            fuel: Some(50_000),
            ..HostConfig::default()
        },
        ..PipelineConfig::default()
    };
    let (pipeline, report, _) = run_with(config, &[("spin.ql", program)]);
    assert_eq!(
        report.status,
        RunStatus::InvocationFailed {
            message: "execution ran out of fuel".to_string()
        }
    );
    assert_eq!(pipeline.stats().teardowns(), 1);
}

// ══════════════════════════════════════════════════════════════════════════════
// 3. Library mode
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_library_compiles_without_invocation() {
    let library = r#"
namespace Lib {
    function Twice(x : Int) : Int { return x + x; }
}
"#;
    let config = PipelineConfig {
        is_executable: false,
        ..PipelineConfig::default()
    };
    let (pipeline, report, _) = run_with(config, &[("lib.ql", library)]);
    assert_eq!(report.status, RunStatus::Library);
    assert_eq!(report.artifacts.names().collect::<Vec<_>>(), ["lib.ql"]);
    assert!(report.artifacts.entry_shim().is_none());
    let module = report.module.expect("library module");
    assert_eq!(module.manifest.entry_symbol, None);
    assert_eq!(pipeline.stats().loads(), 1);
    assert_eq!(pipeline.stats().teardowns(), 1);
}

#[test]
fn test_library_ignores_entry_points() {
    let config = PipelineConfig {
        is_executable: false,
        ..PipelineConfig::default()
    };
    let (_, report, _) = run_with(config, &[("squares.ql", SQUARES)]);
    assert_eq!(report.status, RunStatus::Library);
    assert!(codes(&report.frontend_diagnostics).contains(&DiagnosticCode::ENTRY_POINT_IN_LIBRARY));
    assert_eq!(report.artifacts.len(), 1);
}

// ══════════════════════════════════════════════════════════════════════════════
// 4. Rewrite steps
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_lower_priority_transforms_first() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut late = Recorder::new("late", 5, &log);
    let mut early = Recorder::new("early", -2, &log);

    let pipeline = Pipeline::new(PipelineConfig::default());
    let mut sink: Vec<Diagnostic> = Vec::new();
    let report = pipeline
        .run_with_steps(
            &sources(&[("squares.ql", SQUARES)]),
            vec![&mut late as &mut dyn RewriteStep, &mut early],
            &mut sink,
        )
        .unwrap();
    assert_eq!(*log.borrow(), ["early", "late"]);
    assert_eq!(report.status, RunStatus::Completed { exit_code: 36 });
}

#[test]
fn test_failed_step_stops_the_run() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut failing = Recorder::new("failing", 5, &log);
    failing.succeed = false;

    let pipeline = Pipeline::new(PipelineConfig::default());
    let mut sink: Vec<Diagnostic> = Vec::new();
    let report = pipeline
        .run_with_steps(
            &sources(&[("squares.ql", SQUARES)]),
            vec![&mut failing as &mut dyn RewriteStep],
            &mut sink,
        )
        .unwrap();
    assert_eq!(report.status, RunStatus::FrontendFailed);
    assert!(codes(&report.frontend_diagnostics).contains(&DiagnosticCode::REWRITE_STEP_FAILED));
    // The emitter ran before the failing step.
    assert_eq!(report.artifacts.len(), 3);
    assert_eq!(pipeline.stats().loads(), 0);
}

#[test]
fn test_configured_constants_reach_the_emitter() {
    let config = PipelineConfig {
        assembly_name: "custom".to_string(),
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(config);
    let mut sink: Vec<Diagnostic> = Vec::new();
    let (artifacts, outcome) = pipeline
        .generate(&sources(&[("squares.ql", SQUARES)]), &mut sink)
        .unwrap();
    assert!(!outcome.has_errors());
    let text = artifacts.get("squares.ql").expect("artifact");
    assert!(text.contains(";; assembly: custom"), "{text}");
    assert_eq!(pipeline.stats().loads(), 0);
}

// ══════════════════════════════════════════════════════════════════════════════
// 5. Reporting
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_sink_sees_every_diagnostic_in_order() {
    let (_, report, sink) = run(&[("squares.ql", SQUARES)]);
    let mut expected = report.frontend_diagnostics.clone();
    expected.extend(report.backend_diagnostics.iter().cloned());
    assert_eq!(sink, expected);
    assert!(codes(&report.frontend_diagnostics).contains(&DiagnosticCode::GENERATION_SUMMARY));
    assert!(codes(&report.backend_diagnostics).contains(&DiagnosticCode::MODULE_SUMMARY));
}

#[test]
fn test_report_serializes_to_json() {
    let (_, report, _) = run(&[("squares.ql", SQUARES)]);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"]["kind"], "completed");
    assert_eq!(json["status"]["exit_code"], 36);
    assert_eq!(json["module"]["digest"].as_str().map(str::len), Some(64));
    assert!(json["module"].get("bytes").is_none());
    assert_eq!(json["output"][0], "squaring");

    let (_, failed, _) = run(&[("bad.ql", "namespace {")]);
    let json = serde_json::to_value(&failed).unwrap();
    assert_eq!(json["status"]["kind"], "frontend_failed");
    assert!(json["module"].is_null());
}

#[test]
fn test_exit_codes_fit_a_byte() {
    assert_eq!(RunStatus::Completed { exit_code: 7 }.exit_code(), 7);
    assert_eq!(RunStatus::Completed { exit_code: 300 }.exit_code(), 255);
    assert_eq!(RunStatus::Completed { exit_code: -1 }.exit_code(), 255);
    assert_eq!(RunStatus::Library.exit_code(), 0);
    assert_eq!(RunStatus::EntryNotFound.exit_code(), 1);
    assert!(!RunStatus::BackendFailed.is_success());
}
