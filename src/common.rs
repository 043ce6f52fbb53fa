//! Input loading and process plumbing shared by the CLI commands
//!
//! Log files are JSON arrays of operations. A file may mix operations of
//! several paths; they are grouped into one log per (path, branch).

use anyhow::{Context, Result};
use edit_history::output::{output_json, ErrorResponse, JsonResponse, OutputFormat};
use edit_history::{
    BuildConfig, BuildError, CancellationToken, ConstructTable, LogError, Operation, OperationLog,
    ProgressBarMonitor, RestoreError,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Read every operation of one log file
pub fn load_operations(path: &Path) -> Result<Vec<Operation>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read log {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid log file {}", path.display()))
}

/// Read log files and split them into one log per (path, branch)
pub fn load_logs(paths: &[PathBuf]) -> Result<Vec<OperationLog>> {
    let mut grouped: BTreeMap<(String, String), Vec<Operation>> = BTreeMap::new();
    for path in paths {
        for op in load_operations(path)? {
            grouped
                .entry((op.path.clone(), op.branch.clone()))
                .or_default()
                .push(op);
        }
    }

    grouped
        .into_iter()
        .map(|((path, branch), ops)| {
            OperationLog::from_operations(ops)
                .with_context(|| format!("invalid operation log for {} ({})", path, branch))
        })
        .collect()
}

/// Construct table from `path`, or an empty one
pub fn load_constructs(path: Option<&Path>) -> Result<ConstructTable> {
    let Some(path) = path else {
        return Ok(ConstructTable::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read construct table {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("invalid construct table {}", path.display()))
}

pub fn load_config(path: Option<&Path>) -> Result<BuildConfig> {
    match path {
        Some(path) => BuildConfig::from_file(path),
        None => Ok(BuildConfig::default()),
    }
}

/// Cancellation token set by SIGINT or SIGTERM
pub fn install_signal_handler() -> Result<CancellationToken> {
    let token = CancellationToken::new();

    #[cfg(unix)]
    {
        use signal_hook::consts::signal;
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([signal::SIGTERM, signal::SIGINT])?;
        let flag = token.clone();
        std::thread::spawn(move || {
            if signals.forever().next().is_some() {
                flag.cancel();
            }
        });
    }

    Ok(token)
}

/// Progress bar for interactive runs, hidden when emitting JSON
pub fn progress_monitor(output_format: OutputFormat, token: CancellationToken) -> ProgressBarMonitor {
    if output_format.is_json() {
        ProgressBarMonitor::hidden(token)
    } else {
        ProgressBarMonitor::new(token)
    }
}

/// Stable code of a library error anywhere in the chain
pub fn error_code(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<BuildError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<RestoreError>() {
            Some(e.code())
        } else {
            cause.downcast_ref::<LogError>().map(LogError::code)
        }
    })
}

/// Report a failed command on stderr, or as a JSON error on stdout
pub fn report_error(err: &anyhow::Error, output_format: OutputFormat) {
    if output_format.is_json() {
        let response = JsonResponse::new(
            ErrorResponse {
                code: error_code(err).map(str::to_string),
                error: "command_failed".to_string(),
                message: format!("{:#}", err),
            },
            &edit_history::generate_execution_id(),
        );
        if output_json(&response, output_format).is_ok() {
            return;
        }
    }
    match error_code(err) {
        Some(code) => eprintln!("Error [{}]: {:#}", code, err),
        None => eprintln!("Error: {:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_logs_groups_by_path() {
        let file = write_json(
            r#"[
                {"time": 2, "path": "b.rs", "type": "Document", "start": 0, "inserted": "x"},
                {"time": 0, "path": "a.rs", "type": "FileSnapshot", "code": ""},
                {"time": 1, "path": "b.rs", "type": "FileSnapshot", "code": ""}
            ]"#,
        );
        let logs = load_logs(&[file.path().to_path_buf()]).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].path(), "a.rs");
        assert_eq!(logs[1].path(), "b.rs");
        assert_eq!(logs[1].len(), 2);
    }

    #[test]
    fn test_duplicate_time_carries_log_code() {
        let file = write_json(
            r#"[
                {"time": 1, "path": "a.rs", "type": "FileSnapshot", "code": ""},
                {"time": 1, "path": "a.rs", "type": "Document", "start": 0, "inserted": "x"}
            ]"#,
        );
        let err = load_logs(&[file.path().to_path_buf()]).unwrap_err();
        assert_eq!(error_code(&err), Some(edit_history::error_codes::EH_LOG_001_DUPLICATE_TIME));
    }

    #[test]
    fn test_missing_constructs_is_empty_table() {
        let table = load_constructs(None).unwrap();
        assert!(table.times("a.rs").is_empty());
    }
}
