//! Pure formatting functions for run output.
//!
//! The `format_*` functions build strings and are unit tested; the
//! `display_*` functions only print them.

use console::style;

use crate::boundary::BoundaryWarning;
use crate::coordinator::{CoordinatorDecision, Outcome};
use crate::resolver::Resolution;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Display a boundary warning on stderr.
pub fn display_boundary_warning(warning: &BoundaryWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// One line per decision field, e.g. `previous: 1.2.0`.
///
/// `resolution` is absent when the run stopped before RESOLVE.
pub fn format_decision(decision: &CoordinatorDecision, resolution: Option<&Resolution>) -> String {
    let mut lines = Vec::new();
    if let Some(resolution) = resolution {
        lines.push(format!("previous: {}", resolution.previous));
        lines.push(format!(
            "bump: {}",
            resolution
                .bump
                .map(|b| b.to_string())
                .unwrap_or_else(|| "none".to_string())
        ));
    }
    lines.push(format!("candidate: {}", decision.candidate_version));
    lines.push(format!("tag: {}", decision.tag));
    lines.push(format!("publish: {}", decision.publish));
    lines.push(format!("skip_release: {}", decision.skip_release));
    lines.join("\n")
}

pub fn format_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Published(record) => match &record.url {
            Some(url) => format!("Published {} ({})", record.tag, url),
            None => format!("Published {}", record.tag),
        },
        Outcome::Skipped(reason) => format!("Skipped: {}", reason),
        Outcome::ReleaseRejected { tag, reason } => {
            format!("Tag {} pushed, release not created: {}", tag, reason)
        }
    }
}

pub fn display_decision(decision: &CoordinatorDecision, resolution: Option<&Resolution>) {
    println!("\n{}", style("Release decision").bold());
    for line in format_decision(decision, resolution).lines() {
        println!("  {}", line);
    }
}

pub fn display_outcome(outcome: &Outcome) {
    let text = format_outcome(outcome);
    match outcome {
        Outcome::Published(_) => display_success(&text),
        Outcome::Skipped(_) => display_status(&text),
        Outcome::ReleaseRejected { .. } => display_error(&text),
    }
}
