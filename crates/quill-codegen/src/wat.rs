//! Indented WAT text writer and literal helpers.

use quill_types::tree::Type;
use std::fmt::Write;

const INDENT: &str = "  ";

#[derive(Debug, Default)]
pub(crate) struct WatWriter {
    out: String,
    depth: usize,
}

impl WatWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_depth(depth: usize) -> Self {
        Self {
            out: String::new(),
            depth,
        }
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    /// Write `text` and indent what follows.
    pub fn begin(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    /// Dedent and write `text`.
    pub fn end(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    /// Dedent, write `text`, indent again (`else`).
    pub fn middle(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
        self.depth += 1;
    }

    /// Append already formatted text verbatim.
    pub fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// The WAT value type of a Quill type; `None` for `Unit`.
pub(crate) fn val_type(ty: Type) -> Option<&'static str> {
    match ty {
        Type::Unit => None,
        Type::Int => Some("i64"),
        Type::Bool | Type::String => Some("i32"),
    }
}

/// ` (result <t>)`, or nothing for `Unit`.
pub(crate) fn result_clause(ty: Type) -> String {
    val_type(ty)
        .map(|t| format!(" (result {t})"))
        .unwrap_or_default()
}

/// Quote bytes as a WAT string literal. Printable ASCII other than `"` and
/// `\` is kept; everything else becomes a `\hh` escape.
pub(crate) fn quote_bytes(bytes: &[u8]) -> String {
    let mut quoted = String::with_capacity(bytes.len() + 2);
    quoted.push('"');
    for &byte in bytes {
        match byte {
            b'"' | b'\\' => {
                let _ = write!(quoted, "\\{byte:02x}");
            }
            0x20..=0x7e => quoted.push(char::from(byte)),
            _ => {
                let _ = write!(quoted, "\\{byte:02x}");
            }
        }
    }
    quoted.push('"');
    quoted
}

/// Quote text for a `;;` comment: keep it on one line.
pub(crate) fn comment_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}
