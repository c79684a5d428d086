//! Execution context lifecycle, entry resolution and host behaviour.

use std::borrow::Cow;
use std::sync::Arc;

use quill_runtime::{
    ContextStats, EntryKind, ExecutionContext, ExecutionError, HostConfig, LoadedSymbols,
};
use quill_types::abi::ModuleManifest;
use wasm_encoder::{CustomSection, Encode, Section};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

const IMPORTS: &str = r#"
  (import "quill.intrinsic" "message" (func $message (param i32)))
  (import "quill.intrinsic" "random_int" (func $random (param i64) (result i64)))
  (import "quill.intrinsic" "fail" (func $fail (param i32)))
  (import "quill.intrinsic" "exit" (func $exit (param i32)))
  (memory (export "memory") 1)
  (data (i32.const 64) "\05\00\00\00hello")
  (data (i32.const 80) "\04\00\00\00boom")
"#;

fn module(body: &str) -> Vec<u8> {
    wat::parse_str(format!("(module {IMPORTS} {body})")).expect("test module assembles")
}

fn program() -> Vec<u8> {
    module(
        r#"
  (func (export "__QuillEntryPoint__") (result i32)
    i32.const 64
    call $message
    i32.const 42)
  (func (export "_start")
    i32.const 7
    call $exit)
  (func (export "custom_entry") (result i32)
    i32.const 9)
  (func (export "wrong_signature") (param i32) (result i32)
    local.get 0)
"#,
    )
}

fn with_manifest(mut bytes: Vec<u8>, entry_symbol: Option<&str>) -> Vec<u8> {
    let manifest = ModuleManifest {
        name: "test".into(),
        artifacts: vec!["main.ql".into()],
        entry_symbol: entry_symbol.map(str::to_string),
    };
    let data = serde_json::to_vec(&manifest).unwrap();
    let section = CustomSection {
        name: Cow::Borrowed("quill.manifest"),
        data: Cow::Owned(data),
    };
    bytes.push(section.id());
    section.encode(&mut bytes);
    bytes
}

fn loaded(bytes: &[u8], config: HostConfig) -> (ExecutionContext, LoadedSymbols) {
    let mut context = ExecutionContext::new(config);
    let symbols = context.load(bytes).expect("module loads");
    (context, symbols)
}

fn run_entry(bytes: &[u8], config: HostConfig) -> (ExecutionContext, Result<i32, ExecutionError>) {
    let (mut context, symbols) = loaded(bytes, config);
    let handle = context.resolve_entry(&symbols).expect("entry resolves");
    let result = context.invoke(handle).expect("invocation starts").wait();
    (context, result)
}

// ══════════════════════════════════════════════════════════════════════════════
// Loading and resolution
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_load_lists_function_exports() {
    let (_context, symbols) = loaded(&program(), HostConfig::default());
    assert_eq!(
        symbols.exports,
        ["__QuillEntryPoint__", "_start", "custom_entry", "wrong_signature"]
    );
    assert!(symbols.manifest.is_none());
}

#[test]
fn test_invalid_bytes_fail_to_load() {
    let stats = Arc::new(ContextStats::default());
    let mut context = ExecutionContext::with_stats(HostConfig::default(), Arc::clone(&stats));
    match context.load(b"not wasm") {
        Err(ExecutionError::Load(_)) => {}
        other => panic!("expected a load error, got {other:?}"),
    }
    drop(context);
    assert_eq!(stats.loads(), 0);
    assert_eq!(stats.teardowns(), 0);
}

#[test]
fn test_missing_host_import_fails_to_load() {
    let bytes = wat::parse_str(r#"(module (import "elsewhere" "f" (func)))"#).unwrap();
    let mut context = ExecutionContext::new(HostConfig::default());
    assert!(matches!(context.load(&bytes), Err(ExecutionError::Load(_))));
}

#[test]
fn test_entry_resolves_by_convention() {
    let (context, symbols) = loaded(&program(), HostConfig::default());
    let handle = context.resolve_entry(&symbols).expect("entry");
    assert_eq!(handle.symbol, "__QuillEntryPoint__");
    assert_eq!(handle.kind, EntryKind::Shim);
}

#[test]
fn test_manifest_symbol_takes_precedence() {
    let bytes = with_manifest(program(), Some("custom_entry"));
    let (mut context, symbols) = loaded(&bytes, HostConfig::default());
    assert_eq!(
        symbols.manifest.as_ref().and_then(|m| m.entry_symbol.as_deref()),
        Some("custom_entry")
    );
    let handle = context.resolve_entry(&symbols).expect("entry");
    assert_eq!(handle.symbol, "custom_entry");
    assert_eq!(context.invoke(handle).unwrap().wait(), Ok(9));
}

#[test]
fn test_library_module_has_no_entry() {
    let bytes = with_manifest(module(""), None);
    let (context, symbols) = loaded(&bytes, HostConfig::default());
    assert!(symbols.manifest.is_some());
    assert!(context.resolve_entry(&symbols).is_none());
    assert!(context.resolve_command(&symbols).is_none());
}

#[test]
fn test_wrong_signature_does_not_resolve() {
    let bytes = with_manifest(program(), Some("wrong_signature"));
    let (context, symbols) = loaded(&bytes, HostConfig::default());
    assert!(context.resolve_entry(&symbols).is_none());
}

// ══════════════════════════════════════════════════════════════════════════════
// Invocation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_entry_result_and_messages() {
    let (context, result) = run_entry(&program(), HostConfig::default());
    assert_eq!(result, Ok(42));
    let host = context.host_state().expect("store returned after wait");
    assert_eq!(host.messages, ["hello"]);
    assert_eq!(host.exit_code, None);
}

#[test]
fn test_command_reports_exit_code() {
    let (mut context, symbols) = loaded(&program(), HostConfig::default());
    let handle = context.resolve_command(&symbols).expect("command");
    assert_eq!(handle.kind, EntryKind::Command);
    assert_eq!(context.invoke(handle).unwrap().wait(), Ok(7));
    assert_eq!(context.host_state().and_then(|h| h.exit_code), Some(7));
}

#[test]
fn test_fail_propagates_message() {
    let bytes = module(
        r#"
  (func (export "__QuillEntryPoint__") (result i32)
    i32.const 80
    call $fail
    unreachable)
"#,
    );
    let (_context, result) = run_entry(&bytes, HostConfig::default());
    assert_eq!(result, Err(ExecutionError::Failed("boom".into())));
}

#[test]
fn test_trap_propagates() {
    let bytes = module(
        r#"
  (func (export "__QuillEntryPoint__") (result i32)
    i32.const 1
    i32.const 0
    i32.div_s)
"#,
    );
    let (_context, result) = run_entry(&bytes, HostConfig::default());
    assert!(matches!(result, Err(ExecutionError::Trap(_))), "{result:?}");
}

#[test]
fn test_fuel_bounds_infinite_loops() {
    let bytes = module(
        r#"
  (func (export "__QuillEntryPoint__") (result i32)
    (loop $forever
      br $forever)
    i32.const 0)
"#,
    );
    let config = HostConfig {
        fuel: Some(10_000),
        ..HostConfig::default()
    };
    let (_context, result) = run_entry(&bytes, config);
    assert_eq!(result, Err(ExecutionError::OutOfFuel));
}

#[test]
fn test_random_int_is_seeded() {
    let bytes = module(
        r#"
  (func (export "__QuillEntryPoint__") (result i32)
    i64.const 1000
    call $random
    i32.wrap_i64)
"#,
    );
    let config = HostConfig {
        seed: 1234,
        ..HostConfig::default()
    };
    let first = run_entry(&bytes, config.clone()).1.expect("runs");
    let second = run_entry(&bytes, config).1.expect("runs");
    assert_eq!(first, second);
    assert!((0..1000).contains(&first));
}

#[test]
fn test_random_int_rejects_non_positive_bound() {
    let bytes = module(
        r#"
  (func (export "__QuillEntryPoint__") (result i32)
    i64.const 0
    call $random
    i32.wrap_i64)
"#,
    );
    let (_context, result) = run_entry(&bytes, HostConfig::default());
    assert!(matches!(result, Err(ExecutionError::Trap(_))));
}

// ══════════════════════════════════════════════════════════════════════════════
// State machine
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_invoke_before_load_is_rejected() {
    let (context, symbols) = loaded(&program(), HostConfig::default());
    let handle = context.resolve_entry(&symbols).unwrap();
    let mut fresh = ExecutionContext::new(HostConfig::default());
    assert!(matches!(
        fresh.invoke(handle),
        Err(ExecutionError::InvalidState { operation: "invoke", state: "unloaded" })
    ));
}

#[test]
fn test_second_load_is_rejected() {
    let (mut context, _) = loaded(&program(), HostConfig::default());
    assert!(matches!(
        context.load(&program()),
        Err(ExecutionError::InvalidState { operation: "load", state: "loaded" })
    ));
}

#[test]
fn test_second_invoke_is_rejected() {
    let (mut context, symbols) = loaded(&program(), HostConfig::default());
    let handle = context.resolve_entry(&symbols).unwrap();
    assert_eq!(context.invoke(handle.clone()).unwrap().wait(), Ok(42));
    assert!(matches!(
        context.invoke(handle),
        Err(ExecutionError::InvalidState { operation: "invoke", state: "completed" })
    ));
    assert!(matches!(
        context.load(&program()),
        Err(ExecutionError::InvalidState { operation: "load", state: "completed" })
    ));
    assert_eq!(context.host_state().unwrap().messages.len(), 1);
    assert!(context.resolve_entry(&symbols).is_none());
}

#[test]
fn test_dropped_task_is_joined() {
    let (mut context, symbols) = loaded(&program(), HostConfig::default());
    let handle = context.resolve_entry(&symbols).unwrap();
    drop(context.invoke(handle).unwrap());
    assert!(context.host_state().is_some(), "store returned on drop");
}

#[test]
fn test_dropped_failing_task_still_completes() {
    let bytes = module(
        r#"
  (func (export "__QuillEntryPoint__") (result i32)
    i32.const 80
    call $fail
    unreachable)
"#,
    );
    let stats = Arc::new(ContextStats::default());
    let mut context = ExecutionContext::with_stats(HostConfig::default(), Arc::clone(&stats));
    let symbols = context.load(&bytes).unwrap();
    let handle = context.resolve_entry(&symbols).unwrap();
    drop(context.invoke(handle).unwrap());
    assert_eq!(
        context.host_state().and_then(|host| host.failure.clone()),
        Some("boom".to_string())
    );
    context.teardown();
    assert_eq!(stats.teardowns(), 1);
}

#[test]
fn test_teardown_happens_exactly_once_per_load() {
    let stats = Arc::new(ContextStats::default());

    let mut explicit = ExecutionContext::with_stats(HostConfig::default(), Arc::clone(&stats));
    let symbols = explicit.load(&program()).unwrap();
    let handle = explicit.resolve_entry(&symbols).unwrap();
    explicit.invoke(handle).unwrap().wait().unwrap();
    explicit.teardown();

    let mut implicit = ExecutionContext::with_stats(HostConfig::default(), Arc::clone(&stats));
    implicit.load(&program()).unwrap();
    drop(implicit);

    let never_loaded = ExecutionContext::with_stats(HostConfig::default(), Arc::clone(&stats));
    never_loaded.teardown();

    assert_eq!(stats.loads(), 2);
    assert_eq!(stats.teardowns(), 2);
}
