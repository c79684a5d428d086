//! Names and layout shared by the code generator, the back-end and the
//! runtime. Changing anything here changes the contract between stages.

use crate::tree::QualifiedName;
use serde::{Deserialize, Serialize};

/// File-name suffix that marks a prebuilt binary reference.
pub const REFERENCE_SUFFIX: &str = ".qlib";

/// Suffix of the entry-shim artifact, appended to the entry point's
/// declaring-source identifier.
pub const ENTRY_POINT_ARTIFACT_SUFFIX: &str = ".g.EntryPoint.wat";

/// Suffix of the command-driver artifact.
pub const MAIN_ARTIFACT_SUFFIX: &str = ".g.Main.wat";

/// Exported symbol of the entry shim: `() -> i32`.
pub const ENTRY_POINT_SYMBOL: &str = "__QuillEntryPoint__";

/// Exported symbol of the command driver: `() -> ()`, result reported
/// through the `exit` import.
pub const COMMAND_SYMBOL: &str = "_start";

/// Import module that the host must provide.
pub const HOST_MODULE: &str = "quill.intrinsic";

/// Name of the custom section that carries the [`ModuleManifest`].
pub const MANIFEST_SECTION: &str = "quill.manifest";

/// Exported linear memory.
pub const MEMORY_EXPORT: &str = "memory";

/// First byte of the compile-time string pool. Bytes below it are reserved
/// for the runtime prelude's constants.
pub const STRING_POOL_BASE: u32 = 64;

/// First byte of the runtime heap; the string pool must end below it.
pub const HEAP_BASE: u32 = 65_536;

// ── Host imports (module [`HOST_MODULE`]) ──

/// `message(ptr: i32)`: print a string.
pub const HOST_MESSAGE: &str = "message";
/// `random_int(max: i64) -> i64`: uniform in `[0, max)`.
pub const HOST_RANDOM_INT: &str = "random_int";
/// `fail(ptr: i32)`: abort the invocation with a message.
pub const HOST_FAIL: &str = "fail";
/// `exit(code: i32)`: record the process exit code.
pub const HOST_EXIT: &str = "exit";

// ── Symbols provided by the back-end references ──

pub const MESSAGE_FUNC: &str = "$Quill.Intrinsic.Message";
pub const FAIL_FUNC: &str = "$Quill.Intrinsic.Fail";
pub const EXIT_FUNC: &str = "$Quill.Intrinsic.Exit";
pub const ALLOC_FUNC: &str = "$Quill.Runtime.Alloc";
pub const CONCAT_FUNC: &str = "$Quill.Runtime.Concat";
pub const STR_EQ_FUNC: &str = "$Quill.Runtime.StrEq";

/// WAT symbol of a callable: `$<namespace>.<name>`.
pub fn callable_symbol(name: &QualifiedName) -> String {
    format!("${}.{}", name.namespace, name.name)
}

/// `true` if the identifier names a prebuilt binary reference.
pub fn is_reference(identifier: &str) -> bool {
    let suffix_len = REFERENCE_SUFFIX.len();
    identifier.len() >= suffix_len
        && identifier
            .get(identifier.len() - suffix_len..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(REFERENCE_SUFFIX))
}

/// Metadata embedded in every binary module produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub name: String,
    /// Artifact names in the order they were compiled.
    pub artifacts: Vec<String>,
    /// Exported entry-shim symbol, when the module is executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_symbol: Option<String>,
}
