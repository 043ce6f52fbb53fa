//! Check command implementation

use anyhow::{anyhow, Result};
use edit_history::output::{output_json, CheckResponse, JsonResponse, OutputFormat};
use edit_history::{generate_execution_id, ConsistencyChecker, ConsistencyViolation, ProgressMonitor};
use std::path::PathBuf;

use crate::common::{install_signal_handler, load_logs, progress_monitor};

/// Replay every log in both directions
///
/// Returns exit code 0 when every log is clean, 1 otherwise.
pub fn run_check(logs: Vec<PathBuf>, output_format: OutputFormat) -> Result<u8> {
    let logs = load_logs(&logs)?;
    let token = install_signal_handler()?;
    let monitor = progress_monitor(output_format, token);

    let reports = ConsistencyChecker::new()
        .check_all(&logs, &monitor)
        .map_err(|_| {
            monitor.done();
            anyhow!("check cancelled")
        })?;

    let clean = reports.iter().all(|report| report.is_clean());
    let total_issues: usize = reports.iter().map(|report| report.total_issues()).sum();
    let exit_code = if clean { 0u8 } else { 1u8 };

    if output_format.is_json() {
        let response = CheckResponse {
            files: reports.len(),
            clean,
            total_issues,
            reports,
        };
        output_json(&JsonResponse::new(response, &generate_execution_id()), output_format)?;
        return Ok(exit_code);
    }

    for report in &reports {
        println!(
            "{}: {} steps over {} segments",
            report.path, report.steps_checked, report.segments_checked
        );
        for violation in &report.violations {
            println!("  [{}] {}", violation.code(), describe(violation));
        }
    }

    if clean {
        println!("All {} logs replay consistently.", reports.len());
    } else {
        println!("Total: {} issues", total_issues);
    }
    Ok(exit_code)
}

fn describe(violation: &ConsistencyViolation) -> String {
    match violation {
        ConsistencyViolation::NoRestorationPoint { path } => {
            format!("{} has no snapshot with content", path)
        }
        ConsistencyViolation::ReplayFailed {
            from,
            to,
            direction,
            message,
            ..
        } => format!("{} replay {}..{} failed: {}", direction, from, to, message),
        ConsistencyViolation::Divergent {
            from,
            to,
            at,
            replayed,
            recorded,
        } => format!(
            "replay {}..{} diverges at {}: replayed {:?}, recorded {:?}",
            from, to, at, replayed, recorded
        ),
    }
}
