//! Slice command implementation
//!
//! Shows the operations that affected (backward) or were affected by
//! (forward) a graph node or a code region.

use anyhow::{anyhow, Result};
use edit_history::output::{output_json, JsonResponse, OutputFormat, SliceEntry, SliceResponse};
use edit_history::{generate_execution_id, Operation, SliceDirection, Slicer};
use std::path::PathBuf;

use crate::cli::SliceCriterion;
use crate::common::{load_config, load_constructs, load_logs};
use crate::graph_cmd::build_project;

pub fn run_slice(
    logs: Vec<PathBuf>,
    constructs: Option<PathBuf>,
    criterion: SliceCriterion,
    direction: SliceDirection,
    config: Option<PathBuf>,
    output_format: OutputFormat,
) -> Result<()> {
    let logs = load_logs(&logs)?;
    let constructs = load_constructs(constructs.as_deref())?;
    let config = load_config(config.as_deref())?;
    let graph = build_project("slice", logs, constructs, config, output_format)?;

    let slicer = Slicer::new(&graph);
    let slice = match &criterion {
        SliceCriterion::Node(key) => {
            let id = graph
                .node_by_key(key)
                .ok_or_else(|| anyhow!("no graph node with key {}", key))?;
            slicer
                .slice_from_node(id, direction)
                .ok_or_else(|| anyhow!("no graph node with key {}", key))?
        }
        SliceCriterion::Region(region) => {
            if graph.file(&region.path, &region.branch).is_none() {
                return Err(anyhow!("no operations logged for {}", region));
            }
            slicer.slice_from_region(region, direction)
        }
    };

    let entries: Vec<SliceEntry> = slice
        .nodes()
        .iter()
        .zip(slice.operations())
        .map(|(&id, op)| SliceEntry {
            key: graph.node(id).map(|node| node.key()).unwrap_or_default(),
            operation: op.clone(),
        })
        .collect();

    if output_format.is_json() {
        let response = SliceResponse {
            title: slice.title().to_string(),
            direction: direction.to_string(),
            count: slice.len(),
            time_span: slice.time_span(),
            operations: entries,
        };
        return output_json(&JsonResponse::new(response, &generate_execution_id()), output_format);
    }

    println!("{}", slice.title());
    if entries.is_empty() {
        println!("  (no operations)");
        return Ok(());
    }
    for entry in &entries {
        println!("  {:<32} {}", entry.key, summary(&entry.operation));
    }
    println!();
    println!("{} operations", slice.len());
    Ok(())
}

/// One-line description of an edit
fn summary(op: &Operation) -> String {
    if let Some(edit) = op.as_document() {
        match (edit.inserted.is_empty(), edit.deleted.is_empty()) {
            (false, true) => format!("insert {:?} at {}", edit.inserted, edit.start),
            (true, false) => format!("delete {:?} at {}", edit.deleted, edit.start),
            _ => format!("replace {:?} with {:?} at {}", edit.deleted, edit.inserted, edit.start),
        }
    } else if let Some(copy) = op.as_copy() {
        format!("copy {:?} at {}", copy.copied, copy.start)
    } else {
        op.op_type().to_string()
    }
}
