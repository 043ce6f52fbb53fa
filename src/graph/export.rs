//! Graph export to JSON and Graphviz DOT

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use super::{EdgeKind, FileGraph, GraphStats, Node, ProjectGraph};
use crate::operation::Timestamp;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Pretty-printed JSON document
    Json,
    /// Graphviz DOT
    Dot,
}

impl ExportFormat {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "dot" => Some(ExportFormat::Dot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExport {
    pub key: String,
    pub kind: String,
    pub time: Timestamp,
    pub qualified_name: String,
    pub offset_start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeExport {
    pub src: String,
    pub dst: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphExport {
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,
    pub last_build: Option<Timestamp>,
    pub stats: GraphStats,
    pub nodes: Vec<NodeExport>,
    pub edges: Vec<EdgeExport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectExport {
    pub project: String,
    pub files: Vec<GraphExport>,
    pub inter_file_edges: Vec<EdgeExport>,
}

impl GraphExport {
    pub fn from_graph(graph: &FileGraph) -> Self {
        let nodes = graph
            .nodes()
            .map(|(_, node)| NodeExport {
                key: node.key(),
                kind: node_kind(node).to_string(),
                time: node.time(),
                qualified_name: node.qualified_name(),
                offset_start: node.offset_start(),
            })
            .collect();
        let edges = graph
            .edges()
            .iter()
            .filter_map(|edge| {
                Some(EdgeExport {
                    src: graph.node(edge.src)?.key(),
                    dst: graph.node(edge.dst)?.key(),
                    kind: edge.kind.to_string(),
                })
            })
            .collect();
        GraphExport {
            path: graph.path().to_string(),
            branch: graph.branch().to_string(),
            last_build: graph.last_build(),
            stats: graph.stats(),
            nodes,
            edges,
        }
    }
}

impl ProjectExport {
    pub fn from_project(project: &ProjectGraph) -> Self {
        ProjectExport {
            project: project.project().to_string(),
            files: project.files().iter().map(GraphExport::from_graph).collect(),
            inter_file_edges: project
                .inter_file_edges()
                .iter()
                .filter_map(|edge| {
                    Some(EdgeExport {
                        src: project.node(edge.src)?.key(),
                        dst: project.node(edge.dst)?.key(),
                        kind: edge.kind.to_string(),
                    })
                })
                .collect(),
        }
    }
}

/// `PATH`, or `PATH [BRANCH]` off the default branch
pub fn file_label(graph: &FileGraph) -> String {
    if graph.branch().is_empty() {
        graph.path().to_string()
    } else {
        format!("{} [{}]", graph.path(), graph.branch())
    }
}

fn node_kind(node: &Node) -> &'static str {
    match node {
        Node::Operation(_) => "operation",
        Node::Construct(_) => "construct",
    }
}

fn edge_color(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::BackwardEdit => "red",
        EdgeKind::ForwardEdit => "darkgreen",
        EdgeKind::NoChange => "gray",
        EdgeKind::Ordered => "black",
        EdgeKind::CCP => "blue",
    }
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn write_dot_nodes(out: &mut String, graph: &FileGraph, indent: &str) -> Result<()> {
    for (_, node) in graph.nodes() {
        let (shape, label) = match node {
            Node::Operation(op) => (
                "box",
                format!("{} {}\\n@{}", op.operation.op_type(), op.operation.time, op.span.start),
            ),
            Node::Construct(c) => (
                "ellipse",
                format!(
                    "{}\\n[{}, {})",
                    escape_dot(&c.construct.qualified_name),
                    c.construct.start,
                    c.construct.end
                ),
            ),
        };
        writeln!(
            out,
            "{}\"{}\" [shape={}, label=\"{}\"];",
            indent,
            escape_dot(&node.key()),
            shape,
            label
        )?;
    }
    Ok(())
}

fn write_dot_edge(out: &mut String, src: &str, dst: &str, kind: EdgeKind) -> Result<()> {
    writeln!(
        out,
        "  \"{}\" -> \"{}\" [label=\"{}\", color={}];",
        escape_dot(src),
        escape_dot(dst),
        kind,
        edge_color(kind)
    )?;
    Ok(())
}

/// Render one file graph
pub fn to_dot(graph: &FileGraph) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "digraph EditHistory {{")?;
    writeln!(out, "  rankdir=LR;")?;
    write_dot_nodes(&mut out, graph, "  ")?;
    for edge in graph.edges() {
        if let (Some(src), Some(dst)) = (graph.node(edge.src), graph.node(edge.dst)) {
            write_dot_edge(&mut out, &src.key(), &dst.key(), edge.kind)?;
        }
    }
    writeln!(out, "}}")?;
    Ok(out)
}

/// Render a project, one cluster per file
pub fn project_to_dot(project: &ProjectGraph) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "digraph EditHistory {{")?;
    writeln!(out, "  rankdir=LR;")?;
    for (position, graph) in project.files().iter().enumerate() {
        writeln!(out, "  subgraph cluster_{} {{", position)?;
        writeln!(out, "    label=\"{}\";", escape_dot(&file_label(graph)))?;
        write_dot_nodes(&mut out, graph, "    ")?;
        writeln!(out, "  }}")?;
    }
    for graph in project.files() {
        for edge in graph.edges() {
            if let (Some(src), Some(dst)) = (graph.node(edge.src), graph.node(edge.dst)) {
                write_dot_edge(&mut out, &src.key(), &dst.key(), edge.kind)?;
            }
        }
    }
    for edge in project.inter_file_edges() {
        if let (Some(src), Some(dst)) = (project.node(edge.src), project.node(edge.dst)) {
            write_dot_edge(&mut out, &src.key(), &dst.key(), edge.kind)?;
        }
    }
    writeln!(out, "}}")?;
    Ok(out)
}

/// Export one file graph in `format`
pub fn export_graph(graph: &FileGraph, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&GraphExport::from_graph(graph))?),
        ExportFormat::Dot => to_dot(graph),
    }
}

/// Export a whole project in `format`
pub fn export_project(project: &ProjectGraph, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&ProjectExport::from_project(project))?),
        ExportFormat::Dot => project_to_dot(project),
    }
}
