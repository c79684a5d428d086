use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of errors a single lexer or parser run records before it
/// stops collecting.
pub const MAX_ERRORS: usize = 20;

/// Diagnostic severity, most severe first.
///
/// The derived ordering is used for verbosity filtering: a logger configured
/// with `Warning` prints `Error` and `Warning` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "Error"),
            Self::Warning => write!(f, "Warning"),
            Self::Info => write!(f, "Information"),
            Self::Hint => write!(f, "Hint"),
        }
    }
}

/// Which pipeline stage a code belongs to, derived from its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Syntax,
    Resolution,
    Type,
    Structure,
    Rewrite,
    Backend,
}

/// Numeric diagnostic code (QL1000–QL6999).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagnosticCode(pub u16);

impl DiagnosticCode {
    // ── Syntax (QL1000–QL1999) ──
    pub const UNEXPECTED_TOKEN: Self = Self(1001);
    pub const UNTERMINATED_STRING: Self = Self(1002);
    pub const INVALID_CHARACTER: Self = Self(1003);
    pub const INTEGER_OVERFLOW: Self = Self(1004);
    pub const INVALID_ESCAPE: Self = Self(1005);

    // ── Resolution (QL2000–QL2999) ──
    pub const UNDEFINED_NAME: Self = Self(2001);
    pub const UNDEFINED_CALLABLE: Self = Self(2002);
    pub const AMBIGUOUS_CALLABLE: Self = Self(2003);
    pub const UNKNOWN_NAMESPACE: Self = Self(2004);
    pub const DUPLICATE_CALLABLE: Self = Self(2005);
    pub const VARIABLE_ALREADY_DECLARED: Self = Self(2006);
    pub const UNKNOWN_REFERENCE: Self = Self(2007);
    pub const CALLABLE_AS_VALUE: Self = Self(2008);

    // ── Type (QL3000–QL3999) ──
    pub const TYPE_MISMATCH: Self = Self(3001);
    pub const WRONG_ARG_COUNT: Self = Self(3002);
    pub const INVALID_OPERATOR: Self = Self(3003);
    pub const IMMUTABLE_ASSIGNMENT: Self = Self(3004);
    pub const MISSING_RETURN: Self = Self(3005);
    pub const OPERATION_IN_FUNCTION: Self = Self(3006);

    // ── Structure (QL4000–QL4999) ──
    pub const MISSING_ENTRY_POINT: Self = Self(4001);
    pub const ENTRY_POINT_PARAMETERS: Self = Self(4002);
    pub const ENTRY_POINT_IN_LIBRARY: Self = Self(4003);
    pub const UNKNOWN_ATTRIBUTE: Self = Self(4004);
    pub const UNUSED_VARIABLE: Self = Self(4005);

    // ── Rewrite steps (QL5000–QL5999) ──
    pub const REWRITE_STEP_FAILED: Self = Self(5001);
    pub const PRECONDITION_NOT_MET: Self = Self(5002);
    pub const GENERATION_SUMMARY: Self = Self(5101);
    pub const STRING_POOL_EXHAUSTED: Self = Self(5102);
    pub const CODEGEN_DEFECT: Self = Self(5103);

    // ── Back-end (QL6000–QL6999) ──
    pub const ASSEMBLY_FAILED: Self = Self(6001);
    pub const VALIDATION_FAILED: Self = Self(6002);
    pub const UNKNOWN_BACKEND_REFERENCE: Self = Self(6003);
    pub const EMPTY_ARTIFACT: Self = Self(6101);
    pub const MODULE_SUMMARY: Self = Self(6201);
    pub const ARTIFACT_SUMMARY: Self = Self(6202);

    pub fn category(self) -> DiagnosticCategory {
        match self.0 {
            2000..=2999 => DiagnosticCategory::Resolution,
            3000..=3999 => DiagnosticCategory::Type,
            4000..=4999 => DiagnosticCategory::Structure,
            5000..=5999 => DiagnosticCategory::Rewrite,
            6000..=6999 => DiagnosticCategory::Backend,
            _ => DiagnosticCategory::Syntax,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QL{:04}", self.0)
    }
}

/// A single message produced by one of the compiler stages.
///
/// Diagnostics are values: once created they are only moved, cloned, or
/// printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    /// Source identifier the diagnostic refers to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            source: None,
            span: None,
        }
    }

    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    pub fn hint(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Hint, code, message)
    }

    /// Attach the source identifier and position.
    pub fn at(mut self, source: impl Into<String>, span: Span) -> Self {
        self.source = Some(source.into());
        self.span = Some(span);
        self
    }

    /// Attach only the source identifier.
    pub fn in_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, &self.span) {
            (Some(source), Some(span)) => write!(f, "{source}:{span}: ")?,
            (Some(source), None) => write!(f, "{source}: ")?,
            _ => {}
        }
        write!(f, "{} {}: {}", self.severity, self.code, self.message)
    }
}

/// Anything that wants to observe diagnostics as they are produced.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: &Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.push(diagnostic.clone());
    }
}

/// Diagnostics collected by a single lexer or parser run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub entries: Vec<Diagnostic>,
    pub total_errors: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    /// `true` once the error cap has been reached.
    pub fn is_saturated(&self) -> bool {
        self.total_errors >= MAX_ERRORS
    }

    /// Record a diagnostic. Errors past [`MAX_ERRORS`] are counted but not stored.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.total_errors += 1;
            if self.total_errors > MAX_ERRORS {
                return;
            }
        }
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.total_errors += other.total_errors;
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

/// `true` if any diagnostic in the slice is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_category_follows_ranges() {
        assert_eq!(
            DiagnosticCode::UNEXPECTED_TOKEN.category(),
            DiagnosticCategory::Syntax
        );
        assert_eq!(
            DiagnosticCode::UNDEFINED_CALLABLE.category(),
            DiagnosticCategory::Resolution
        );
        assert_eq!(DiagnosticCode::TYPE_MISMATCH.category(), DiagnosticCategory::Type);
        assert_eq!(
            DiagnosticCode::MISSING_ENTRY_POINT.category(),
            DiagnosticCategory::Structure
        );
        assert_eq!(
            DiagnosticCode::REWRITE_STEP_FAILED.category(),
            DiagnosticCategory::Rewrite
        );
        assert_eq!(
            DiagnosticCode::VALIDATION_FAILED.category(),
            DiagnosticCategory::Backend
        );
    }

    #[test]
    fn code_display_is_zero_padded() {
        assert_eq!(DiagnosticCode::UNDEFINED_NAME.to_string(), "QL2001");
        assert_eq!(DiagnosticCode(7).to_string(), "QL0007");
    }

    #[test]
    fn severity_orders_most_severe_first() {
        assert!(Severity::Error < Severity::Warning);
        assert!(Severity::Warning < Severity::Info);
        assert!(Severity::Info < Severity::Hint);
    }

    #[test]
    fn display_includes_location_when_present() {
        let d = Diagnostic::error(DiagnosticCode::UNDEFINED_NAME, "no variable `x`")
            .at("main.ql", Span::point(4, 9));
        assert_eq!(d.to_string(), "main.ql:4:9: Error QL2001: no variable `x`");

        let bare = Diagnostic::warning(DiagnosticCode::EMPTY_ARTIFACT, "empty");
        assert_eq!(bare.to_string(), "Warning QL6101: empty");
    }

    #[test]
    fn push_caps_stored_errors_but_counts_all() {
        let mut diags = Diagnostics::new();
        for i in 0..25 {
            diags.push(Diagnostic::error(
                DiagnosticCode::UNEXPECTED_TOKEN,
                format!("error {i}"),
            ));
        }
        diags.push(Diagnostic::warning(DiagnosticCode::UNUSED_VARIABLE, "unused"));
        assert_eq!(diags.total_errors, 25);
        assert_eq!(diags.entries.len(), MAX_ERRORS + 1);
        assert!(diags.is_saturated());
    }

    #[test]
    fn vec_sink_preserves_insertion_order() {
        let mut sink: Vec<Diagnostic> = Vec::new();
        sink.report(&Diagnostic::info(DiagnosticCode::MODULE_SUMMARY, "first"));
        sink.report(&Diagnostic::hint(DiagnosticCode::ARTIFACT_SUMMARY, "second"));
        let messages: Vec<_> = sink.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, ["first", "second"]);
    }

    #[test]
    fn json_omits_missing_location() {
        let d = Diagnostic::error(DiagnosticCode::ASSEMBLY_FAILED, "bad");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"severity":"error","code":6001,"message":"bad"}"#);
    }
}
