//! Restore command implementation

use anyhow::{anyhow, Result};
use edit_history::output::{output_json, JsonResponse, OutputFormat, RestoreResponse};
use edit_history::{generate_execution_id, CodeRestorer, OperationLog, Timestamp};
use std::path::PathBuf;

use crate::cli::RestoreTarget;
use crate::common::load_logs;

/// Log for `path` on `branch`, or the only log of `branch` when no path is given
fn select_log(logs: Vec<OperationLog>, path: Option<&str>, branch: &str) -> Result<OperationLog> {
    let mut logs: Vec<OperationLog> = logs.into_iter().filter(|log| log.branch() == branch).collect();
    let on_branch = if branch.is_empty() {
        String::new()
    } else {
        format!(" on branch {}", branch)
    };
    match path {
        Some(path) => logs
            .into_iter()
            .find(|log| log.path() == path)
            .ok_or_else(|| anyhow!("no operations logged for {}{}", path, on_branch)),
        None if logs.len() == 1 => logs.pop().ok_or_else(|| anyhow!("log is empty")),
        None if logs.is_empty() => Err(anyhow!("no operations logged{}", on_branch)),
        None => {
            let paths: Vec<&str> = logs.iter().map(|log| log.path()).collect();
            Err(anyhow!(
                "log covers {} files ({}); pick one with --path",
                paths.len(),
                paths.join(", ")
            ))
        }
    }
}

pub fn run_restore(
    logs: Vec<PathBuf>,
    path: Option<String>,
    branch: String,
    target: RestoreTarget,
    output_format: OutputFormat,
) -> Result<()> {
    let log = select_log(load_logs(&logs)?, path.as_deref(), &branch)?;

    let index = match target {
        RestoreTarget::Index(index) => index,
        RestoreTarget::Time(time) => log
            .last_index_at_or_before(Timestamp(time))
            .ok_or_else(|| anyhow!("no operation of {} at or before {}", log.path(), time))?,
    };

    let code = CodeRestorer::new(&log).restore(index)?;
    tracing::debug!(path = log.path(), index, "restored");

    if output_format.is_json() {
        let response = RestoreResponse {
            path: log.path().to_string(),
            index,
            time: log.get(index).map(|op| op.time).unwrap_or_default(),
            restoration_point: log.restoration_point(index),
            code,
        };
        return output_json(&JsonResponse::new(response, &generate_execution_id()), output_format);
    }

    print!("{}", code);
    if !code.ends_with('\n') {
        println!();
    }
    Ok(())
}
