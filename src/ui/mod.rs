//! Terminal output for a coordinator run.
//!
//! - `formatter` - pure formatting and printing helpers
//! - This module - the run summary built from a [RunReport]

pub mod formatter;

pub use formatter::{
    display_boundary_warning, display_decision, display_error, display_outcome, display_status,
    display_success,
};

use crate::coordinator::RunReport;

/// Print warnings, the decision (if one was reached) and the outcome
pub fn display_report(report: &RunReport) {
    for warning in &report.warnings {
        display_boundary_warning(warning);
    }
    if let Some(decision) = &report.decision {
        display_decision(decision, report.resolution.as_ref());
    }
    if report.manifest_committed {
        display_success("Committed manifest version");
    }
    display_outcome(&report.outcome);
}
