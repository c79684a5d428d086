//! The execution context state machine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use quill_types::abi::{ModuleManifest, COMMAND_SYMBOL, ENTRY_POINT_SYMBOL, MANIFEST_SECTION};
use tracing::{debug, info_span, warn};
use wasmi::core::TrapCode;
use wasmi::{Config, Engine, Instance, Linker, Module, Store};
use wasmparser::{ExternalKind, Payload};

use crate::error::{ExecutionError, ExecutionResult};
use crate::host::{self, HostConfig, HostState};

// ══════════════════════════════════════════════════════════════════════════════
// Public types
// ══════════════════════════════════════════════════════════════════════════════

/// Load and teardown counters, shareable across contexts.
#[derive(Debug, Default)]
pub struct ContextStats {
    loads: AtomicUsize,
    teardowns: AtomicUsize,
}

impl ContextStats {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

/// What a successful load found in the module.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadedSymbols {
    /// Exported function names, in export order.
    pub exports: Vec<String>,
    /// The embedded manifest, if the module carries a valid one.
    pub manifest: Option<ModuleManifest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// `() -> i32`: the value is the result.
    Shim,
    /// `() -> ()`: the result is the code passed to the host `exit`.
    Command,
}

/// A resolved, callable export of the loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHandle {
    pub symbol: String,
    pub kind: EntryKind,
}

// ══════════════════════════════════════════════════════════════════════════════
// ExecutionContext
// ══════════════════════════════════════════════════════════════════════════════

struct Loaded {
    store: Store<HostState>,
    instance: Instance,
}

enum State {
    Unloaded,
    Loaded(Box<Loaded>),
    /// The store is on a worker thread.
    Invoking(Instance),
    /// The invocation returned; only inspection and teardown remain.
    Completed(Box<Loaded>),
    /// A worker was lost together with the store.
    Poisoned,
    Torn,
}

impl State {
    fn label(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loaded(_) => "loaded",
            Self::Invoking(_) => "invoking",
            Self::Completed(_) => "completed",
            Self::Poisoned => "poisoned",
            Self::Torn => "torn down",
        }
    }

    fn holds_module(&self) -> bool {
        matches!(
            self,
            Self::Loaded(_) | Self::Invoking(_) | Self::Completed(_) | Self::Poisoned
        )
    }
}

/// One isolated load/invoke cycle over a binary module.
pub struct ExecutionContext {
    engine: Engine,
    config: HostConfig,
    stats: Arc<ContextStats>,
    state: State,
}

impl ExecutionContext {
    pub fn new(config: HostConfig) -> Self {
        Self::with_stats(config, Arc::new(ContextStats::default()))
    }

    pub fn with_stats(config: HostConfig, stats: Arc<ContextStats>) -> Self {
        let mut engine_config = Config::default();
        engine_config.consume_fuel(config.fuel.is_some());
        Self {
            engine: Engine::new(&engine_config),
            config,
            stats,
            state: State::Unloaded,
        }
    }

    pub fn stats(&self) -> &Arc<ContextStats> {
        &self.stats
    }

    /// Host state of the loaded module: messages, exit code and failure.
    pub fn host_state(&self) -> Option<&HostState> {
        match &self.state {
            State::Loaded(loaded) | State::Completed(loaded) => Some(loaded.store.data()),
            _ => None,
        }
    }

    /// Parse, link and instantiate `bytes`.
    pub fn load(&mut self, bytes: &[u8]) -> ExecutionResult<LoadedSymbols> {
        let _span = info_span!("load", bytes = bytes.len()).entered();
        if !matches!(self.state, State::Unloaded) {
            return Err(self.invalid("load"));
        }

        let symbols = inspect(bytes)?;
        let module = Module::new(&self.engine, bytes).map_err(|e| ExecutionError::Load(e.to_string()))?;
        let mut store = Store::new(&self.engine, HostState::new(&self.config));
        if let Some(fuel) = self.config.fuel {
            store
                .set_fuel(fuel)
                .map_err(|e| ExecutionError::Load(e.to_string()))?;
        }
        let mut linker = <Linker<HostState>>::new(&self.engine);
        host::link(&mut linker).map_err(|e| ExecutionError::Load(e.to_string()))?;
        let instance = linker
            .instantiate(&mut store, &module)
            .and_then(|pre| pre.start(&mut store))
            .map_err(|e| ExecutionError::Load(e.to_string()))?;

        self.state = State::Loaded(Box::new(Loaded { store, instance }));
        self.stats.loads.fetch_add(1, Ordering::SeqCst);
        debug!(exports = symbols.exports.len(), manifest = symbols.manifest.is_some(), "module loaded");
        Ok(symbols)
    }

    /// The entry shim: the manifest's symbol, else `__QuillEntryPoint__`.
    pub fn resolve_entry(&self, symbols: &LoadedSymbols) -> Option<EntryHandle> {
        let symbol = symbols
            .manifest
            .as_ref()
            .and_then(|m| m.entry_symbol.clone())
            .unwrap_or_else(|| ENTRY_POINT_SYMBOL.to_string());
        self.resolve(symbols, symbol, EntryKind::Shim)
    }

    /// The `_start` command.
    pub fn resolve_command(&self, symbols: &LoadedSymbols) -> Option<EntryHandle> {
        self.resolve(symbols, COMMAND_SYMBOL.to_string(), EntryKind::Command)
    }

    fn resolve(&self, symbols: &LoadedSymbols, symbol: String, kind: EntryKind) -> Option<EntryHandle> {
        let State::Loaded(loaded) = &self.state else {
            return None;
        };
        if !symbols.exports.contains(&symbol) {
            return None;
        }
        // The export must also have the expected signature.
        let typed = match kind {
            EntryKind::Shim => loaded
                .instance
                .get_typed_func::<(), i32>(&loaded.store, &symbol)
                .is_ok(),
            EntryKind::Command => loaded
                .instance
                .get_typed_func::<(), ()>(&loaded.store, &symbol)
                .is_ok(),
        };
        typed.then_some(EntryHandle { symbol, kind })
    }

    /// Start `handle` on a worker thread. A context runs at most one
    /// invocation; once the task completes only `host_state` and `teardown`
    /// remain.
    pub fn invoke(&mut self, handle: EntryHandle) -> ExecutionResult<InvocationTask<'_>> {
        let loaded = match std::mem::replace(&mut self.state, State::Poisoned) {
            State::Loaded(loaded) => loaded,
            other => {
                self.state = other;
                return Err(self.invalid("invoke"));
            }
        };
        let Loaded { mut store, instance } = *loaded;
        self.state = State::Invoking(instance);
        let metered = self.config.fuel.is_some();

        let worker = thread::Builder::new()
            .name(format!("quill-invoke-{}", handle.symbol))
            .spawn(move || {
                let outcome = run_entry(&mut store, instance, &handle, metered);
                (store, outcome)
            });
        match worker {
            Ok(worker) => Ok(InvocationTask {
                context: self,
                worker: Some(worker),
            }),
            Err(error) => {
                self.state = State::Poisoned;
                Err(ExecutionError::Worker(error.to_string()))
            }
        }
    }

    /// Release the module and everything instantiated from it.
    pub fn teardown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let previous = std::mem::replace(&mut self.state, State::Torn);
        if previous.holds_module() {
            self.stats.teardowns.fetch_add(1, Ordering::SeqCst);
            debug!(state = previous.label(), "context torn down");
        }
    }

    fn invalid(&self, operation: &'static str) -> ExecutionError {
        ExecutionError::InvalidState {
            operation,
            state: self.state.label(),
        }
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        if !matches!(self.state, State::Torn) {
            self.release();
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// InvocationTask
// ══════════════════════════════════════════════════════════════════════════════

type WorkerOutput = (Store<HostState>, ExecutionResult<i32>);

/// An entry point running on a worker thread.
///
/// Completes exactly once: through [`InvocationTask::wait`], or by joining
/// when dropped.
pub struct InvocationTask<'a> {
    context: &'a mut ExecutionContext,
    worker: Option<JoinHandle<WorkerOutput>>,
}

impl InvocationTask<'_> {
    /// Block until the entry point returns; yields its numeric result or the
    /// trap that stopped it.
    pub fn wait(mut self) -> ExecutionResult<i32> {
        self.join()
    }

    /// `true` once the worker has finished and `wait` will not block.
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    fn join(&mut self) -> ExecutionResult<i32> {
        let Some(worker) = self.worker.take() else {
            return Err(ExecutionError::Worker("invocation already completed".into()));
        };
        let instance = match &self.context.state {
            State::Invoking(instance) => *instance,
            _ => {
                self.context.state = State::Poisoned;
                return Err(ExecutionError::Worker("context lost its invocation".into()));
            }
        };
        match worker.join() {
            Ok((store, outcome)) => {
                self.context.state = State::Completed(Box::new(Loaded { store, instance }));
                outcome
            }
            Err(_) => {
                warn!("invocation worker panicked");
                self.context.state = State::Poisoned;
                Err(ExecutionError::Worker("worker thread panicked".into()))
            }
        }
    }
}

impl Drop for InvocationTask<'_> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(error) = self.join() {
                warn!(%error, "dropped invocation failed");
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn run_entry(
    store: &mut Store<HostState>,
    instance: Instance,
    handle: &EntryHandle,
    metered: bool,
) -> ExecutionResult<i32> {
    let _span = info_span!("invoke", symbol = %handle.symbol).entered();
    let result = match handle.kind {
        EntryKind::Shim => instance
            .get_typed_func::<(), i32>(&*store, &handle.symbol)
            .and_then(|f| f.call(&mut *store, ())),
        EntryKind::Command => instance
            .get_typed_func::<(), ()>(&*store, &handle.symbol)
            .and_then(|f| f.call(&mut *store, ()))
            .map(|()| store.data().exit_code.unwrap_or(0)),
    };
    result.map_err(|error| {
        if let Some(message) = store.data().failure.clone() {
            ExecutionError::Failed(message)
        } else if metered && error.as_trap_code() == Some(TrapCode::OutOfFuel) {
            ExecutionError::OutOfFuel
        } else {
            ExecutionError::Trap(error.to_string())
        }
    })
}

/// Exported function names and the manifest section of `bytes`.
fn inspect(bytes: &[u8]) -> ExecutionResult<LoadedSymbols> {
    let mut symbols = LoadedSymbols::default();
    for payload in wasmparser::Parser::new(0).parse_all(bytes) {
        match payload.map_err(|e| ExecutionError::Load(e.to_string()))? {
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.map_err(|e| ExecutionError::Load(e.to_string()))?;
                    if export.kind == ExternalKind::Func {
                        symbols.exports.push(export.name.to_string());
                    }
                }
            }
            Payload::CustomSection(reader) if reader.name() == MANIFEST_SECTION => {
                match serde_json::from_slice::<ModuleManifest>(reader.data()) {
                    Ok(manifest) => symbols.manifest = Some(manifest),
                    Err(error) => warn!(%error, "ignoring malformed module manifest"),
                }
            }
            _ => {}
        }
    }
    Ok(symbols)
}
