//! In-memory generation: artifact naming, entry shim registration, failure
//! modes, and validity of the generated WAT once assembled.

use std::collections::BTreeMap;
use std::sync::Arc;

use quill_backend::{BackendCompiler, SourceText, INTRINSIC_REFERENCE, RUNTIME_REFERENCE};
use quill_codegen::{generate, ArtifactMap, CodegenError, InMemoryEmitter, EMITTER_NAME, EMITTER_PRIORITY};
use quill_frontend::{CompilationLoader, LoadOutcome, LoaderConfig};
use quill_types::ast::CallableKind;
use quill_types::tree::{
    Block, Callable, CallableBody, Compilation, Namespace, QualifiedName, Signature, Type,
};
use quill_types::{Diagnostic, DiagnosticCode, RewriteStep, SourceMap, Span};
use wasmparser::{ExternalKind, Payload};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

const SAMPLE: &str = r#"
namespace Sample {
    open Quill.Intrinsic;

    function Square(x : Int) : Int {
        return x * x;
    }

    function Describe(n : Int) : String {
        if n > 10 {
            return "big";
        } elif n > 5 {
            return "medium";
        }
        return "small";
    }

    @EntryPoint()
    operation Main() : Int {
        mutable total = 0;
        for i in 1..4 {
            set total += Square(i);
        }
        let label = "total: " + IntAsString(total);
        Message(label);
        if label == "total: 30" and not (total < 0) {
            Message(Describe(total));
        }
        return total;
    }
}
"#;

fn source_map(sources: &[(&str, &str)]) -> SourceMap {
    sources
        .iter()
        .map(|(id, text)| (id.to_string(), text.to_string()))
        .collect()
}

/// Load `sources` with an emitter attached; return the artifacts, the load
/// outcome and the emitter's defect.
fn emit(sources: &[(&str, &str)], is_executable: bool) -> (ArtifactMap, LoadOutcome, Option<CodegenError>) {
    emit_into(ArtifactMap::new(), sources, is_executable)
}

fn emit_into(
    mut artifacts: ArtifactMap,
    sources: &[(&str, &str)],
    is_executable: bool,
) -> (ArtifactMap, LoadOutcome, Option<CodegenError>) {
    let (outcome, defect) = {
        let mut emitter = InMemoryEmitter::new(&mut artifacts);
        let config = LoaderConfig {
            is_executable,
            rewrite_steps: vec![&mut emitter as &mut dyn RewriteStep],
            ..LoaderConfig::default()
        };
        let mut sink: Vec<Diagnostic> = Vec::new();
        let outcome = CompilationLoader::load(
            &source_map(sources),
            &[INTRINSIC_REFERENCE.to_string()],
            config,
            &mut sink,
        )
        .expect("no load defect");
        (outcome, emitter.take_defect())
    };
    (artifacts, outcome, defect)
}

fn assemble(artifacts: &ArtifactMap) -> Vec<u8> {
    let sources: Vec<SourceText> = artifacts
        .iter()
        .map(|(name, text)| SourceText::new(name, text))
        .collect();
    let output = BackendCompiler::new("codegen-test").compile(
        &sources,
        &[RUNTIME_REFERENCE.to_string(), INTRINSIC_REFERENCE.to_string()],
    );
    assert!(output.success, "backend failed: {:#?}", output.diagnostics);
    output.bytes.expect("module bytes")
}

fn exports(wasm: &[u8]) -> Vec<(String, ExternalKind)> {
    let mut found = Vec::new();
    for payload in wasmparser::Parser::new(0).parse_all(wasm) {
        if let Ok(Payload::ExportSection(reader)) = payload {
            for export in reader {
                let export = export.unwrap();
                found.push((export.name.to_string(), export.kind));
            }
        }
    }
    found
}

fn has_code(outcome: &LoadOutcome, code: DiagnosticCode) -> bool {
    outcome.diagnostics.iter().any(|d| d.code == code)
}

fn empty_callable(ns: &str, name: &str, source: &str) -> Callable {
    Callable {
        name: QualifiedName::new(ns, name),
        kind: CallableKind::Operation,
        source: source.to_string(),
        signature: Signature {
            params: Vec::new(),
            return_type: Type::Unit,
        },
        locals: Vec::new(),
        body: CallableBody::Provided(Block::default()),
        span: Span::point(1, 1),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Artifact naming
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_executable_gets_source_artifact_and_shim_pair() {
    let (artifacts, outcome, defect) = emit(&[("main.ql", SAMPLE)], true);
    assert!(!outcome.has_errors(), "{:#?}", outcome.diagnostics);
    assert!(defect.is_none());
    assert_eq!(
        artifacts.names().collect::<Vec<_>>(),
        ["main.ql", "main.ql.g.Main.wat", "main.ql.g.EntryPoint.wat"]
    );
    let shim = artifacts.entry_shim().expect("shim registered");
    assert_eq!(shim.artifact, "main.ql.g.EntryPoint.wat");
    assert_eq!(shim.symbol, "__QuillEntryPoint__");
    assert_eq!(shim.callable, QualifiedName::new("Sample", "Main"));
    assert!(has_code(&outcome, DiagnosticCode::GENERATION_SUMMARY));
}

#[test]
fn test_library_has_no_shim() {
    let library = "namespace Lib { function Twice(x : Int) : Int { return x + x; } }";
    let (artifacts, outcome, _) = emit(&[("lib.ql", library)], false);
    assert!(!outcome.has_errors(), "{:#?}", outcome.diagnostics);
    assert_eq!(artifacts.names().collect::<Vec<_>>(), ["lib.ql"]);
    assert!(artifacts.entry_shim().is_none());
}

#[test]
fn test_reference_sources_are_never_artifacts() {
    let (artifacts, _, _) = emit(&[("main.ql", SAMPLE)], true);
    assert!(artifacts
        .names()
        .all(|name| !name.to_ascii_lowercase().ends_with(".qlib")));
}

#[test]
fn test_first_entry_point_wins() {
    let (artifacts, outcome, _) = emit(
        &[
            ("b.ql", "namespace B { @EntryPoint() operation Second() : Unit { } }"),
            ("a.ql", "namespace A { @EntryPoint() operation First() : Unit { } }"),
        ],
        true,
    );
    assert!(!outcome.has_errors(), "{:#?}", outcome.diagnostics);
    assert_eq!(
        artifacts.names().collect::<Vec<_>>(),
        ["b.ql", "a.ql", "b.ql.g.Main.wat", "b.ql.g.EntryPoint.wat"]
    );
    assert_eq!(
        artifacts.entry_shim().map(|s| &s.callable),
        Some(&QualifiedName::new("B", "Second"))
    );
}

#[test]
fn test_generation_is_deterministic() {
    let (first, _, _) = emit(&[("main.ql", SAMPLE)], true);
    let (second, _, _) = emit(&[("main.ql", SAMPLE)], true);
    assert_eq!(first, second);
}

#[test]
fn test_artifact_header_uses_assembly_constants() {
    let outcome = {
        let compilation = emit(&[("main.ql", SAMPLE)], true).1.compilation.expect("compilation");
        let mut constants = BTreeMap::new();
        constants.insert("AssemblyName".to_string(), "sample".to_string());
        constants.insert("OutputPath".to_string(), "out/sample.wasm".to_string());
        generate(&compilation, &constants).expect("generation succeeds")
    };
    let text = outcome.get("main.ql").expect("source artifact");
    assert!(text.contains(";; assembly: sample"));
    assert!(text.contains(";; output: out/sample.wasm"));
    assert!(text.starts_with(&format!(";; generated by {EMITTER_NAME}")));
}

// ══════════════════════════════════════════════════════════════════════════════
// Lowering
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_generated_module_validates_and_exports_entry_symbols() {
    let (artifacts, _, _) = emit(&[("main.ql", SAMPLE)], true);
    let wasm = assemble(&artifacts);
    let names: Vec<String> = exports(&wasm).into_iter().map(|(name, _)| name).collect();
    assert!(names.contains(&"__QuillEntryPoint__".to_string()));
    assert!(names.contains(&"_start".to_string()));
    assert!(names.contains(&"memory".to_string()));
}

#[test]
fn test_lowering_uses_prelude_for_strings() {
    let (artifacts, _, _) = emit(&[("main.ql", SAMPLE)], true);
    let text = artifacts.get("main.ql").unwrap();
    assert!(text.contains("call $Quill.Runtime.Concat"));
    assert!(text.contains("call $Quill.Runtime.StrEq"));
    assert!(text.contains("call $Quill.Intrinsic.IntAsString"));
    assert!(text.contains("(func $Sample.Square (param $x i64) (result i64)"));
    assert!(text.contains("(data (i32.const 64)"));
}

#[test]
fn test_sibling_scopes_get_distinct_wat_locals() {
    let program = r#"
namespace Loops {
    function Count() : Int {
        mutable n = 0;
        for i in 0..2 { set n += i; }
        for i in 0..3 { set n += i; }
        return n;
    }
}
"#;
    let (artifacts, outcome, _) = emit(&[("loops.ql", program)], false);
    assert!(!outcome.has_errors(), "{:#?}", outcome.diagnostics);
    let text = artifacts.get("loops.ql").unwrap();
    assert!(text.contains("(local $i i64)"));
    assert!(text.contains("(local $i#1 i64)"));
    assemble(&artifacts);
}

#[test]
fn test_fail_and_loops_lower_to_valid_wat() {
    let program = r#"
namespace Control {
    open Quill.Intrinsic;

    operation Check(limit : Int) : Bool {
        mutable i = 0;
        while i < limit {
            if i == 7 {
                fail "seven";
            }
            set i += 1;
        }
        let flag = limit > 3 or Length("abc") == 3;
        return flag ? true | false;
    }

    @EntryPoint()
    operation Main() : String {
        let ok = Check(5);
        return BoolAsString(ok);
    }
}
"#;
    let (artifacts, outcome, _) = emit(&[("control.ql", program)], true);
    assert!(!outcome.has_errors(), "{:#?}", outcome.diagnostics);
    let text = artifacts.get("control.ql").unwrap();
    assert!(text.contains("call $Quill.Intrinsic.Fail\n"));
    assert!(text.contains("unreachable"));
    let shim = artifacts.get("control.ql.g.EntryPoint.wat").unwrap();
    assert!(shim.contains("call $Quill.Intrinsic.Message"));
    assemble(&artifacts);
}

// ══════════════════════════════════════════════════════════════════════════════
// Failures
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_dangling_entry_point_is_a_defect() {
    let compilation = Compilation {
        namespaces: vec![Namespace {
            name: "App".into(),
            callables: vec![empty_callable("App", "Helper", "app.ql")],
        }],
        entry_points: vec![QualifiedName::new("App", "Main")],
    };
    let mut artifacts = ArtifactMap::new();
    let mut emitter = InMemoryEmitter::new(&mut artifacts);
    assert_eq!(emitter.name(), EMITTER_NAME);
    assert_eq!(emitter.priority(), EMITTER_PRIORITY);

    let input = Arc::new(compilation);
    let (succeeded, output) = emitter.transformation(Arc::clone(&input));
    assert!(!succeeded);
    assert!(Arc::ptr_eq(&input, &output), "compilation passes through");
    assert!(emitter
        .generated_diagnostics()
        .iter()
        .any(|d| d.code == DiagnosticCode::CODEGEN_DEFECT && d.is_error()));
    assert_eq!(
        emitter.take_defect(),
        Some(CodegenError::DanglingEntryPoint(QualifiedName::new("App", "Main")))
    );
    assert!(emitter.take_defect().is_none());
    drop(emitter);
    assert!(artifacts.is_empty(), "nothing written on failure");
}

#[test]
fn test_existing_artifact_collides() {
    let mut existing = ArtifactMap::new();
    existing.insert("main.ql", ";; stale").unwrap();
    let (artifacts, outcome, defect) = emit_into(existing, &[("main.ql", SAMPLE)], true);
    assert_eq!(defect, Some(CodegenError::ArtifactCollision("main.ql".into())));
    assert!(has_code(&outcome, DiagnosticCode::REWRITE_STEP_FAILED));
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts.get("main.ql"), Some(";; stale"));
}

#[test]
fn test_string_pool_exhaustion_is_a_user_error() {
    let huge = "x".repeat(70_000);
    let program = format!(
        "namespace Big {{ open Quill.Intrinsic; @EntryPoint() operation Main() : Unit {{ Message(\"{huge}\"); }} }}"
    );
    let (artifacts, outcome, defect) = emit(&[("big.ql", &program)], true);
    assert!(defect.is_none(), "exhaustion is not a defect");
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.code == DiagnosticCode::STRING_POOL_EXHAUSTED && d.is_error()));
    assert!(has_code(&outcome, DiagnosticCode::REWRITE_STEP_FAILED));
    assert!(artifacts.is_empty());
}

#[test]
fn test_step_is_skipped_after_frontend_errors() {
    let (artifacts, outcome, defect) = emit(&[("main.ql", "namespace Broken { function F() : Int { } }")], false);
    assert!(outcome.has_errors());
    assert!(!has_code(&outcome, DiagnosticCode::GENERATION_SUMMARY));
    assert!(artifacts.is_empty());
    assert!(defect.is_none());
}
