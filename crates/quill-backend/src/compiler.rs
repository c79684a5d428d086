//! Module assembly and validation.
//!
//! The assembled text has the shape
//!
//! ```text
//! (module $<name>
//!   <imports of every reference>
//!   <definitions of every reference>
//!   <sources, in order>
//! )
//! ```
//!
//! Imports come first because the text format forbids an import after any
//! function, memory, table or global definition.

use quill_types::{Diagnostic, DiagnosticCode};
use tracing::{debug, info_span};

use crate::references::{self, BackendReference};

/// One input artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub name: String,
    pub text: String,
}

impl SourceText {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOutput {
    /// `true` when no Error diagnostic was reported.
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// The encoded module. May be present even when `success` is `false`
    /// (a module that encoded but failed validation).
    pub bytes: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct BackendCompiler {
    module_name: String,
}

impl BackendCompiler {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Assemble, encode and validate one module.
    pub fn compile(&self, sources: &[SourceText], references: &[String]) -> BackendOutput {
        let _span = info_span!("backend", module = %self.module_name, sources = sources.len()).entered();
        let mut diagnostics = Vec::new();
        let text = self.assemble(sources, references, &mut diagnostics);

        let bytes = match wat::parse_str(&text) {
            Ok(bytes) => Some(bytes),
            Err(error) => {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::ASSEMBLY_FAILED,
                    format!("module `{}` failed to assemble: {error}", self.module_name),
                ));
                None
            }
        };

        if let Some(bytes) = &bytes {
            match wasmparser::validate(bytes) {
                Ok(_) => diagnostics.push(Diagnostic::info(
                    DiagnosticCode::MODULE_SUMMARY,
                    format!(
                        "module `{}`: {} bytes from {} artifact(s)",
                        self.module_name,
                        bytes.len(),
                        sources.len()
                    ),
                )),
                Err(error) => diagnostics.push(Diagnostic::error(
                    DiagnosticCode::VALIDATION_FAILED,
                    format!("module `{}` failed validation: {error}", self.module_name),
                )),
            }
        }

        let success = !diagnostics.iter().any(Diagnostic::is_error);
        debug!(success, bytes = bytes.as_ref().map_or(0, Vec::len), "backend finished");
        BackendOutput {
            success,
            diagnostics,
            bytes,
        }
    }

    /// The module text for `sources` and `references`. Unknown references
    /// and empty artifacts are reported to `diagnostics`; assembly goes on.
    pub fn assemble(
        &self,
        sources: &[SourceText],
        references: &[String],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> String {
        let linked = link_references(references, diagnostics);

        let mut text = format!("(module ${}\n", module_identifier(&self.module_name));
        for reference in &linked {
            text.push_str(reference.imports);
        }
        for reference in &linked {
            text.push_str(&format!("\n;; reference {}\n", reference.name));
            text.push_str(reference.definitions);
        }
        for source in sources {
            if source.text.trim().is_empty() {
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticCode::EMPTY_ARTIFACT,
                        format!("artifact `{}` is empty", source.name),
                    )
                    .in_source(source.name.as_str()),
                );
            }
            diagnostics.push(
                Diagnostic::hint(
                    DiagnosticCode::ARTIFACT_SUMMARY,
                    format!("artifact `{}`: {} bytes of text", source.name, source.text.len()),
                )
                .in_source(source.name.as_str()),
            );
            let label = source.name.replace(|c: char| c.is_control(), " ");
            text.push_str(&format!("\n;; artifact {label}\n"));
            text.push_str(&source.text);
            text.push('\n');
        }
        text.push_str(")\n");
        text
    }
}

/// Resolve reference names, pulling in requirements ahead of the reference
/// that needs them. Each reference is linked once.
fn link_references(
    references: &[String],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<&'static BackendReference> {
    let mut linked: Vec<&'static BackendReference> = Vec::new();
    for name in references {
        let Some(reference) = references::lookup(name) else {
            diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::UNKNOWN_BACKEND_REFERENCE,
                    format!(
                        "unknown back-end reference `{name}`; known references: {}",
                        references::known().collect::<Vec<_>>().join(", ")
                    ),
                )
                .in_source(name.as_str()),
            );
            continue;
        };
        for required in reference.requires.iter().filter_map(|r| references::lookup(r)) {
            if !linked.iter().any(|l| l.name == required.name) {
                linked.push(required);
            }
        }
        if !linked.iter().any(|l| l.name == reference.name) {
            linked.push(reference);
        }
    }
    linked
}

/// A WAT identifier for `name`: characters outside the identifier set become
/// `_`.
fn module_identifier(name: &str) -> String {
    const EXTRA: &str = "!#$%&'*+-./:<=>?@\\^_`|~";
    let id: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || EXTRA.contains(c) { c } else { '_' })
        .collect();
    if id.is_empty() {
        "module".to_string()
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::{INTRINSIC_REFERENCE, RUNTIME_REFERENCE};

    #[test]
    fn requirements_link_before_dependents() {
        let mut diagnostics = Vec::new();
        let linked = link_references(
            &[INTRINSIC_REFERENCE.to_string(), RUNTIME_REFERENCE.to_string()],
            &mut diagnostics,
        );
        let names: Vec<&str> = linked.iter().map(|r| r.name).collect();
        assert_eq!(names, [RUNTIME_REFERENCE, INTRINSIC_REFERENCE]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn module_identifiers_are_sanitised() {
        assert_eq!(module_identifier("sample app"), "sample_app");
        assert_eq!(module_identifier("a.b-c"), "a.b-c");
        assert_eq!(module_identifier(""), "module");
    }
}
