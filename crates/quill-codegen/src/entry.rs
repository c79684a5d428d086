//! The entry shim and the command driver.

use quill_types::abi::{
    callable_symbol, COMMAND_SYMBOL, ENTRY_POINT_ARTIFACT_SUFFIX, ENTRY_POINT_SYMBOL, EXIT_FUNC,
    MAIN_ARTIFACT_SUFFIX, MESSAGE_FUNC,
};
use quill_types::tree::{Callable, Type};

use crate::context::LoweringContext;
use crate::error::{CodegenError, CodegenResult};
use crate::wat::WatWriter;

pub(crate) fn entry_artifact_name(source: &str) -> String {
    format!("{source}{ENTRY_POINT_ARTIFACT_SUFFIX}")
}

pub(crate) fn main_artifact_name(source: &str) -> String {
    format!("{source}{MAIN_ARTIFACT_SUFFIX}")
}

/// `__QuillEntryPoint__ : () -> i32`, converting the entry result.
///
/// A `String` result is printed through the intrinsic prelude's host
/// import, which the back-end always links.
pub(crate) fn emit_entry_shim(
    lowering: &LoweringContext<'_>,
    generator: &str,
    entry: &Callable,
) -> CodegenResult<String> {
    if !entry.signature.params.is_empty() {
        return Err(CodegenError::EntryPointHasParameters(entry.name.clone()));
    }
    let mut w = WatWriter::new();
    w.raw(&lowering.header(generator, &format!("entry shim for {}", entry.name)));
    w.begin(format!(
        "(func ${ENTRY_POINT_SYMBOL} (export \"{ENTRY_POINT_SYMBOL}\") (result i32)"
    ));
    w.line(format!("call {}", callable_symbol(&entry.name)));
    match entry.signature.return_type {
        Type::Unit => w.line("i32.const 0"),
        Type::Int => w.line("i32.wrap_i64"),
        Type::Bool => {}
        Type::String => {
            w.line(format!("call {MESSAGE_FUNC}"));
            w.line("i32.const 0");
        }
    }
    w.end(")");
    Ok(w.finish())
}

/// `_start`: call the shim and hand its value to the host `exit` import.
pub(crate) fn emit_command(lowering: &LoweringContext<'_>, generator: &str, entry: &Callable) -> String {
    let mut w = WatWriter::new();
    w.raw(&lowering.header(generator, &format!("command driver for {}", entry.name)));
    w.begin(format!("(func ${COMMAND_SYMBOL} (export \"{COMMAND_SYMBOL}\")"));
    w.line(format!("call ${ENTRY_POINT_SYMBOL}"));
    w.line(format!("call {EXIT_FUNC}"));
    w.end(")");
    w.finish()
}
