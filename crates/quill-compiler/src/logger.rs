//! Console diagnostic sink.

use std::collections::BTreeSet;
use std::io::{self, Write};

use quill_types::{Diagnostic, DiagnosticCode, DiagnosticSink, Severity};

/// Renders one diagnostic as a single line.
pub type Formatter = fn(&Diagnostic) -> String;

/// `source:line:col: Severity QLnnnn: message`
pub fn human_readable(diagnostic: &Diagnostic) -> String {
    diagnostic.to_string()
}

/// Prints diagnostics as they are reported: Errors and Warnings to the error
/// stream, everything else to the output stream.
///
/// Diagnostics less severe than the verbosity are dropped, as are the codes
/// in the suppression set unless the diagnostic is an Error.
pub struct ConsoleLogger<O: Write = io::Stdout, E: Write = io::Stderr> {
    out: O,
    err: E,
    format: Formatter,
    verbosity: Severity,
    no_warn: BTreeSet<DiagnosticCode>,
    line_offset: u32,
    errors: usize,
    warnings: usize,
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self::with_writers(io::stdout(), io::stderr())
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Write, E: Write> ConsoleLogger<O, E> {
    pub fn with_writers(out: O, err: E) -> Self {
        Self {
            out,
            err,
            format: human_readable,
            verbosity: Severity::Hint,
            no_warn: BTreeSet::new(),
            line_offset: 0,
            errors: 0,
            warnings: 0,
        }
    }

    pub fn with_format(mut self, format: Formatter) -> Self {
        self.format = format;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Severity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_no_warn(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.no_warn.extend(codes.into_iter().map(DiagnosticCode));
        self
    }

    pub fn with_line_offset(mut self, lines: u32) -> Self {
        self.line_offset = lines;
        self
    }

    /// Errors printed so far.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Warnings printed so far.
    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }

    fn is_shown(&self, diagnostic: &Diagnostic) -> bool {
        if diagnostic.is_error() {
            return true;
        }
        diagnostic.severity <= self.verbosity && !self.no_warn.contains(&diagnostic.code)
    }
}

impl<O: Write, E: Write> DiagnosticSink for ConsoleLogger<O, E> {
    fn report(&mut self, diagnostic: &Diagnostic) {
        if !self.is_shown(diagnostic) {
            return;
        }
        let line = if self.line_offset == 0 {
            (self.format)(diagnostic)
        } else {
            let mut shifted = diagnostic.clone();
            shifted.span = shifted.span.map(|span| span.offset_lines(self.line_offset));
            (self.format)(&shifted)
        };
        // Console output is best effort.
        let _ = match diagnostic.severity {
            Severity::Error => {
                self.errors += 1;
                writeln!(self.err, "{line}")
            }
            Severity::Warning => {
                self.warnings += 1;
                writeln!(self.err, "{line}")
            }
            Severity::Info | Severity::Hint => writeln!(self.out, "{line}"),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_types::Span;

    fn logger() -> ConsoleLogger<Vec<u8>, Vec<u8>> {
        ConsoleLogger::with_writers(Vec::new(), Vec::new())
    }

    fn streams(logger: ConsoleLogger<Vec<u8>, Vec<u8>>) -> (String, String) {
        let (out, err) = logger.into_writers();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn routes_by_severity() {
        let mut logger = logger();
        logger.report(&Diagnostic::error(DiagnosticCode::UNDEFINED_NAME, "e"));
        logger.report(&Diagnostic::warning(DiagnosticCode::UNUSED_VARIABLE, "w"));
        logger.report(&Diagnostic::info(DiagnosticCode::GENERATION_SUMMARY, "i"));
        logger.report(&Diagnostic::hint(DiagnosticCode::ARTIFACT_SUMMARY, "h"));
        assert_eq!((logger.error_count(), logger.warning_count()), (1, 1));
        let (out, err) = streams(logger);
        assert_eq!(err, "Error QL2001: e\nWarning QL4005: w\n");
        assert_eq!(out, "Information QL5101: i\nHint QL6202: h\n");
    }

    #[test]
    fn verbosity_drops_less_severe() {
        let mut logger = logger().with_verbosity(Severity::Warning);
        logger.report(&Diagnostic::info(DiagnosticCode::GENERATION_SUMMARY, "i"));
        logger.report(&Diagnostic::warning(DiagnosticCode::UNUSED_VARIABLE, "w"));
        let (out, err) = streams(logger);
        assert!(out.is_empty());
        assert_eq!(err, "Warning QL4005: w\n");
    }

    #[test]
    fn no_warn_never_hides_errors() {
        let mut logger = logger().with_no_warn([4005, 2001]);
        logger.report(&Diagnostic::warning(DiagnosticCode::UNUSED_VARIABLE, "w"));
        logger.report(&Diagnostic::error(DiagnosticCode::UNDEFINED_NAME, "e"));
        let (_, err) = streams(logger);
        assert_eq!(err, "Error QL2001: e\n");
    }

    #[test]
    fn line_offset_shifts_spans() {
        let mut logger = logger().with_line_offset(10);
        logger.report(
            &Diagnostic::warning(DiagnosticCode::UNUSED_VARIABLE, "w").at("a.ql", Span::point(2, 5)),
        );
        let (_, err) = streams(logger);
        assert_eq!(err, "a.ql:12:5: Warning QL4005: w\n");
    }

    #[test]
    fn custom_format_is_applied() {
        let mut logger = logger().with_format(|d| format!("{} {}", d.code, d.message));
        logger.report(&Diagnostic::info(DiagnosticCode::MODULE_SUMMARY, "done"));
        let (out, _) = streams(logger);
        assert_eq!(out, "QL6201 done\n");
    }
}
