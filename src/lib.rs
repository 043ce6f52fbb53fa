//! edit-history: replay, dependency graphs and slicing over source edit logs
//!
//! An operation log records every insert, delete, copy and snapshot applied
//! to a file. From that log the crate can:
//!
//! - restore the exact text of the file at any logged instant ([`CodeRestorer`])
//! - verify that the log replays consistently ([`ConsistencyChecker`])
//! - build a dependency graph linking edits to each other and to named code
//!   elements ([`GraphBuilder`], [`ProjectGraph`])
//! - compute backward and forward slices over that graph ([`Slicer`])
//!
//! # Position Conventions
//!
//! All offsets are **character offsets** (Unicode scalar values) from the
//! start of the file, 0-indexed. Ranges are half-open `[start, end)`.
//!
//! # Storage
//!
//! The library never reads or writes logs itself. Loaders hand it
//! [`Operation`]s; the `edithist` binary reads them from JSON files.

pub mod config;
pub mod construct;
pub mod error;
pub mod error_codes;
pub mod graph;
pub mod offset;
pub mod operation;
pub mod output;
pub mod registry;
pub mod restore;
pub mod slice;
pub mod task;
pub mod text;
pub mod version;

pub use config::BuildConfig;
pub use construct::{Construct, ConstructFact, ConstructSupplier, ConstructTable, NoConstructs, SnapshotList};
pub use error::{BuildError, LogError, RestoreError};
pub use graph::{
    export_graph, Edge, EdgeKind, ExportFormat, FileGraph, GlobalEdge, GlobalNodeId, GraphBuilder,
    GraphStats, Node, NodeId, ProjectGraph,
};
pub use offset::{adjust_backward, adjust_forward, reach_marks, EditSpan, TrackedOffsets};
pub use operation::{Action, Operation, OperationKind, OperationLog, OperationType, Timestamp};
pub use output::{generate_execution_id, output_json, JsonResponse, OutputFormat};
pub use registry::GraphRegistry;
pub use restore::{CodeRestorer, ConsistencyChecker, ConsistencyReport, ConsistencyViolation};
pub use slice::{CodeRegion, Slice, SliceDirection, SliceGraph, Slicer};
pub use task::{BuildTask, CancellationToken, Cancelled, NullMonitor, ProgressBarMonitor, ProgressMonitor, TaskOutcome};
