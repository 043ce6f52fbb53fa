//! Graph command implementation
//!
//! Builds the project graph of every logged file on a background task and
//! exports it as DOT or JSON.

use anyhow::{anyhow, Result};
use edit_history::graph::export::{export_project, file_label, ExportFormat, ProjectExport};
use edit_history::output::{output_json, GraphResponse, JsonResponse, OutputFormat};
use edit_history::{
    generate_execution_id, BuildConfig, BuildTask, ConstructTable, OperationLog, ProgressMonitor,
    ProjectGraph, TaskOutcome,
};
use std::path::PathBuf;

use crate::common::{install_signal_handler, load_config, load_constructs, load_logs, progress_monitor};

/// Build the project graph of `logs`, honouring SIGINT/SIGTERM
pub fn build_project(
    project: &str,
    logs: Vec<OperationLog>,
    constructs: ConstructTable,
    config: BuildConfig,
    output_format: OutputFormat,
) -> Result<ProjectGraph> {
    let token = install_signal_handler()?;
    let name = project.to_string();

    let task = BuildTask::spawn_with_token("graph", token, move |token| {
        let monitor = progress_monitor(output_format, token.clone());
        let outcome = TaskOutcome::from_result(ProjectGraph::build(&name, &logs, &constructs, &config, &monitor));
        monitor.done();
        outcome
    });

    match task.wait() {
        TaskOutcome::Completed(graph) => Ok(graph),
        TaskOutcome::Cancelled => Err(anyhow!("graph build cancelled")),
        TaskOutcome::Failed(err) => Err(err.into()),
    }
}

pub fn run_graph(
    logs: Vec<PathBuf>,
    constructs: Option<PathBuf>,
    format: ExportFormat,
    project: String,
    config: Option<PathBuf>,
    output_format: OutputFormat,
) -> Result<()> {
    let logs = load_logs(&logs)?;
    let constructs = load_constructs(constructs.as_deref())?;
    let config = load_config(config.as_deref())?;

    let graph = build_project(&project, logs, constructs, config, output_format)?;

    if output_format.is_json() {
        let export = match format {
            ExportFormat::Json => serde_json::to_value(ProjectExport::from_project(&graph))?,
            ExportFormat::Dot => serde_json::Value::String(export_project(&graph, ExportFormat::Dot)?),
        };
        let response = GraphResponse {
            project: graph.project().to_string(),
            files: graph.files().iter().map(file_label).collect(),
            stats: graph.stats(),
            export,
        };
        return output_json(&JsonResponse::new(response, &generate_execution_id()), output_format);
    }

    println!("{}", export_project(&graph, format)?);

    let stats = graph.stats();
    eprintln!(
        "{} files: {} operation nodes, {} construct nodes, {} edges",
        graph.files().len(),
        stats.operation_nodes,
        stats.construct_nodes,
        stats.total_edges()
    );
    Ok(())
}
