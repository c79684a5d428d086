//! Lowering state shared across one generation run, and per-callable state.

use std::collections::{BTreeMap, HashMap};

use quill_types::abi::{HEAP_BASE, STRING_POOL_BASE};
use quill_types::tree::{Callable, Compilation, LocalId, QualifiedName, Type};

use crate::error::{CodegenError, CodegenResult};
use crate::wat;

// ══════════════════════════════════════════════════════════════════════════════
// String pool
// ══════════════════════════════════════════════════════════════════════════════

/// One literal laid out as `[len: u32 LE][bytes]` at `offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    pub offset: u32,
    pub bytes: Vec<u8>,
}

/// Interns string literals into `[STRING_POOL_BASE, HEAP_BASE)`.
///
/// Offsets are handed out in interning order, 4-byte aligned, so the layout
/// depends only on the order in which literals are lowered.
#[derive(Debug)]
pub struct StringPool {
    next_offset: u32,
    offsets: HashMap<String, u32>,
    pending: Vec<DataSegment>,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPool {
    pub fn new() -> Self {
        Self {
            next_offset: STRING_POOL_BASE,
            offsets: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Offset of `text`, laying it out on first use.
    pub fn intern(&mut self, text: &str) -> CodegenResult<u32> {
        if let Some(&offset) = self.offsets.get(text) {
            return Ok(offset);
        }
        let len = u32::try_from(text.len()).unwrap_or(u32::MAX);
        let needed = len.saturating_add(4);
        let available = HEAP_BASE - self.next_offset;
        if needed > available {
            return Err(CodegenError::StringPoolExhausted { needed, available });
        }

        let offset = self.next_offset;
        let mut bytes = Vec::with_capacity(needed as usize);
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(text.as_bytes());
        self.pending.push(DataSegment { offset, bytes });
        self.offsets.insert(text.to_string(), offset);
        self.next_offset = (offset + needed).next_multiple_of(4);
        Ok(offset)
    }

    /// Segments interned since the last call, in offset order.
    pub fn take_segments(&mut self) -> Vec<DataSegment> {
        std::mem::take(&mut self.pending)
    }

    /// Bytes of the pool in use, including alignment padding.
    pub fn used(&self) -> u32 {
        self.next_offset - STRING_POOL_BASE
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// LoweringContext
// ══════════════════════════════════════════════════════════════════════════════

pub const ASSEMBLY_NAME: &str = "AssemblyName";
pub const OUTPUT_PATH: &str = "OutputPath";

/// Everything lowering needs beyond the callable being lowered.
pub struct LoweringContext<'c> {
    callables: HashMap<&'c QualifiedName, &'c Callable>,
    pub strings: StringPool,
    assembly_name: Option<String>,
    output_path: Option<String>,
}

impl<'c> LoweringContext<'c> {
    pub fn new(compilation: &'c Compilation, constants: &BTreeMap<String, String>) -> Self {
        Self {
            callables: compilation.callables().map(|c| (&c.name, c)).collect(),
            strings: StringPool::new(),
            assembly_name: constants.get(ASSEMBLY_NAME).cloned(),
            output_path: constants.get(OUTPUT_PATH).cloned(),
        }
    }

    pub fn callable(&self, name: &QualifiedName) -> Option<&'c Callable> {
        self.callables.get(name).copied()
    }

    /// The `;;` comment lines opening every artifact.
    pub fn header(&self, generator: &str, subject: &str) -> String {
        let mut header = format!(";; generated by {generator}: {}\n", wat::comment_text(subject));
        if let Some(name) = &self.assembly_name {
            header.push_str(&format!(";; assembly: {}\n", wat::comment_text(name)));
        }
        if let Some(path) = &self.output_path {
            header.push_str(&format!(";; output: {}\n", wat::comment_text(path)));
        }
        header
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// FuncContext
// ══════════════════════════════════════════════════════════════════════════════

/// Per-callable lowering state: WAT local names and scratch locals.
pub struct FuncContext<'a, 'c> {
    pub lowering: &'a mut LoweringContext<'c>,
    pub callable: &'c Callable,
    names: Vec<String>,
    scratch: Vec<(String, &'static str)>,
    labels: u32,
}

impl<'a, 'c> FuncContext<'a, 'c> {
    pub fn new(lowering: &'a mut LoweringContext<'c>, callable: &'c Callable) -> Self {
        let mut seen: HashMap<&str, u32> = HashMap::new();
        let names = callable
            .locals
            .iter()
            .map(|local| {
                let count = seen.entry(local.name.as_str()).or_insert(0);
                let name = match *count {
                    0 => format!("${}", local.name),
                    n => format!("${}#{n}", local.name),
                };
                *count += 1;
                name
            })
            .collect();
        Self {
            lowering,
            callable,
            names,
            scratch: Vec::new(),
            labels: 0,
        }
    }

    /// WAT name of a local slot.
    pub fn local(&self, id: LocalId) -> CodegenResult<&str> {
        self.names
            .get(id.0 as usize)
            .map(String::as_str)
            .ok_or_else(|| CodegenError::UnknownLocal {
                callable: self.callable.name.clone(),
                slot: id.0,
            })
    }

    /// Type of a local slot.
    pub fn local_type(&self, id: LocalId) -> CodegenResult<Type> {
        self.callable
            .local(id)
            .map(|decl| decl.ty)
            .ok_or_else(|| CodegenError::UnknownLocal {
                callable: self.callable.name.clone(),
                slot: id.0,
            })
    }

    /// A fresh label suffix for `block`/`loop` pairs.
    pub fn next_label(&mut self) -> u32 {
        self.labels += 1;
        self.labels
    }

    /// Declare a compiler-introduced local. `#` cannot appear in a Quill
    /// identifier, so scratch names never collide with user locals.
    pub fn scratch_local(&mut self, role: &str, ty: &'static str) -> String {
        let name = format!("$#{role}{}", self.scratch.len());
        self.scratch.push((name.clone(), ty));
        name
    }

    /// `(local ...)` declarations: non-parameter slots, then scratch locals.
    pub fn local_declarations(&self) -> Vec<String> {
        let params = self.callable.signature.params.len();
        let declared = self
            .callable
            .locals
            .iter()
            .zip(&self.names)
            .skip(params)
            .filter_map(|(decl, name)| wat::val_type(decl.ty).map(|t| format!("(local {name} {t})")));
        let scratch = self
            .scratch
            .iter()
            .map(|(name, ty)| format!("(local {name} {ty})"));
        declared.chain(scratch).collect()
    }

    /// `(param ...)` declarations.
    pub fn param_declarations(&self) -> Vec<String> {
        self.callable
            .locals
            .iter()
            .zip(&self.names)
            .take(self.callable.signature.params.len())
            .filter_map(|(decl, name)| wat::val_type(decl.ty).map(|t| format!("(param {name} {t})")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_lays_out_aligned_length_prefixed_strings() {
        let mut pool = StringPool::new();
        assert_eq!(pool.intern("hello").unwrap(), 64);
        // 4 + 5 = 9 bytes, aligned to 12.
        assert_eq!(pool.intern("x").unwrap(), 76);
        assert_eq!(pool.intern("hello").unwrap(), 64);

        let segments = pool.take_segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].bytes, b"\x05\x00\x00\x00hello");
        assert!(pool.take_segments().is_empty());
        assert_eq!(pool.used(), 20);
    }

    #[test]
    fn pool_reports_exhaustion() {
        let mut pool = StringPool::new();
        let big = "a".repeat((HEAP_BASE - STRING_POOL_BASE - 4) as usize);
        assert!(pool.intern(&big).is_ok());
        match pool.intern("b") {
            Err(CodegenError::StringPoolExhausted { needed, available }) => {
                assert_eq!(needed, 5);
                assert_eq!(available, 0);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn empty_string_is_four_bytes() {
        let mut pool = StringPool::new();
        assert_eq!(pool.intern("").unwrap(), 64);
        assert_eq!(pool.intern("x").unwrap(), 68);
    }
}
