//! The rewrite-step extension contract.
//!
//! A rewrite step is hosted by the front-end after a compilation has been
//! built without errors. Steps run in ascending [`RewriteStep::priority`]
//! order, each with the lifecycle
//!
//! ```text
//! precondition_verification → transformation → postcondition_verification
//! ```
//!
//! where the two verifications are only called when the corresponding
//! `implements_*` flag is set.

use crate::tree::Compilation;
use crate::Diagnostic;
use std::collections::BTreeMap;
use std::sync::Arc;

pub trait RewriteStep {
    /// Stable identifier used for ordering ties and logging.
    fn name(&self) -> &str;

    /// Lower priorities run first.
    fn priority(&self) -> i32;

    /// Key/value configuration the host injects before calling
    /// [`transformation`](Self::transformation).
    fn assembly_constants(&mut self) -> &mut BTreeMap<String, String>;

    /// Diagnostics the host surfaces after the transformation, whatever its
    /// result.
    fn generated_diagnostics(&self) -> &[Diagnostic];

    fn implements_precondition_verification(&self) -> bool {
        false
    }

    fn implements_transformation(&self) -> bool {
        true
    }

    fn implements_postcondition_verification(&self) -> bool {
        false
    }

    /// Returning `false` makes the host skip this step.
    fn precondition_verification(&self, _compilation: &Compilation) -> bool {
        true
    }

    /// Returns whether the step succeeded and the compilation to forward.
    /// The host forwards the returned compilation even on failure.
    fn transformation(&mut self, compilation: Arc<Compilation>) -> (bool, Arc<Compilation>);

    /// An invariant the step guarantees about its own output. A `false`
    /// result is a pipeline defect, not a user error.
    fn postcondition_verification(&self, _compilation: &Compilation) -> bool {
        true
    }
}
