//! Dependency graph over operations and named code elements
//!
//! A [`FileGraph`] is an arena: nodes live in a `Vec` and are addressed by
//! [`NodeId`]. Edges are `(src, dst, kind)` values kept in insertion order
//! plus a hash set that rejects duplicates. Adjacency is an index derived
//! from the edge list once construction finishes ([`FileGraph::seal`]); it
//! is never patched node by node.
//!
//! Graphs are rebuilt wholesale. A graph whose `last_build` is older than
//! its file's newest operation is stale and must be replaced, not edited.

pub mod builder;
pub mod export;
pub mod project;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::construct::Construct;
use crate::offset::EditSpan;
use crate::operation::{Operation, Timestamp};

pub use builder::GraphBuilder;
pub use export::{export_graph, ExportFormat};
pub use project::{GlobalEdge, GlobalNodeId, ProjectGraph};

/// Stable index of a node inside one [`FileGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Kind of dependency an edge records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Construct before an edit -> the edit that touched it
    BackwardEdit,
    /// Edit -> construct after it that contains its result
    ForwardEdit,
    /// Same construct in two adjacent snapshots
    NoChange,
    /// Earlier edit -> later edit on the text it produced or read
    Ordered,
    /// Cut or copy -> the paste that consumed its text
    CCP,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 5] = [
        EdgeKind::BackwardEdit,
        EdgeKind::ForwardEdit,
        EdgeKind::NoChange,
        EdgeKind::Ordered,
        EdgeKind::CCP,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EdgeKind::BackwardEdit => "BackwardEdit",
            EdgeKind::ForwardEdit => "ForwardEdit",
            EdgeKind::NoChange => "NoChange",
            EdgeKind::Ordered => "Ordered",
            EdgeKind::CCP => "CCP",
        }
    }

    /// Edges between two Document/Copy operations
    pub fn is_operation_edge(self) -> bool {
        matches!(self, EdgeKind::Ordered | EdgeKind::CCP)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Directed edge; identity is the whole triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub src: NodeId,
    pub dst: NodeId,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(src: NodeId, dst: NodeId, kind: EdgeKind) -> Self {
        Edge { src, dst, kind }
    }
}

/// A Document or Copy operation in the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationNode {
    /// Index of the operation in its file log
    pub index: usize,
    pub operation: Operation,
    pub span: EditSpan,
}

/// One named code element at one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructNode {
    /// Position of the snapshot in [`FileGraph::snapshots`]
    pub snapshot: usize,
    pub construct: Construct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Operation(OperationNode),
    Construct(ConstructNode),
}

impl Node {
    pub fn time(&self) -> Timestamp {
        match self {
            Node::Operation(node) => node.operation.time,
            Node::Construct(node) => node.construct.snapshot_time,
        }
    }

    /// Unique key of the node within its graph
    pub fn key(&self) -> String {
        match self {
            Node::Operation(node) => {
                operation_key(&node.operation.path, &node.operation.branch, node.operation.time)
            }
            Node::Construct(node) => {
                construct_key(&node.construct.qualified_name, node.construct.snapshot_time)
            }
        }
    }

    pub fn qualified_name(&self) -> String {
        match self {
            Node::Operation(node) => format!("{}#{}", node.operation.path, node.operation.time),
            Node::Construct(node) => node.construct.qualified_name.clone(),
        }
    }

    pub fn offset_start(&self) -> usize {
        match self {
            Node::Operation(node) => node.span.start,
            Node::Construct(node) => node.construct.start,
        }
    }

    pub fn as_operation(&self) -> Option<&OperationNode> {
        match self {
            Node::Operation(node) => Some(node),
            Node::Construct(_) => None,
        }
    }

    pub fn as_construct(&self) -> Option<&ConstructNode> {
        match self {
            Node::Construct(node) => Some(node),
            Node::Operation(_) => None,
        }
    }

    pub fn is_operation(&self) -> bool {
        matches!(self, Node::Operation(_))
    }
}

/// `op:PATH@TIME`, or `op:PATH[BRANCH]@TIME` off the default branch
pub fn operation_key(path: &str, branch: &str, time: Timestamp) -> String {
    if branch.is_empty() {
        format!("op:{}@{}", path, time)
    } else {
        format!("op:{}[{}]@{}", path, branch, time)
    }
}

pub fn construct_key(qualified_name: &str, snapshot_time: Timestamp) -> String {
    format!("{}@{}", qualified_name, snapshot_time)
}

/// Snapshot a graph's construct nodes were taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRef {
    pub index: usize,
    pub time: Timestamp,
}

/// Node and edge counts of a graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub operation_nodes: usize,
    pub construct_nodes: usize,
    pub snapshots: usize,
    pub edges: BTreeMap<String, usize>,
}

impl GraphStats {
    pub fn total_edges(&self) -> usize {
        self.edges.values().sum()
    }

    pub fn merge(&mut self, other: &GraphStats) {
        self.operation_nodes += other.operation_nodes;
        self.construct_nodes += other.construct_nodes;
        self.snapshots += other.snapshots;
        for (kind, count) in &other.edges {
            *self.edges.entry(kind.clone()).or_default() += count;
        }
    }
}

/// Dependency graph of one file on one branch
#[derive(Debug, Clone, Default)]
pub struct FileGraph {
    path: String,
    branch: String,
    nodes: Vec<Node>,
    keys: AHashMap<String, NodeId>,
    /// Operation nodes in log order
    operation_nodes: Vec<NodeId>,
    snapshots: Vec<SnapshotRef>,
    edges: Vec<Edge>,
    edge_set: AHashSet<Edge>,
    outgoing: Vec<Vec<u32>>,
    incoming: Vec<Vec<u32>>,
    last_build: Option<Timestamp>,
}

impl FileGraph {
    pub fn new(path: &str, branch: &str) -> Self {
        FileGraph {
            path: path.to_string(),
            branch: branch.to_string(),
            ..Default::default()
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Newest operation time the graph reflects; `None` for an unbuilt graph
    pub fn last_build(&self) -> Option<Timestamp> {
        self.last_build
    }

    /// The file changed after this graph was built
    pub fn is_stale(&self, last_updated: Option<Timestamp>) -> bool {
        match (self.last_build, last_updated) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(built), Some(updated)) => updated > built,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u32), node))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn snapshots(&self) -> &[SnapshotRef] {
        &self.snapshots
    }

    /// Operation nodes in log order
    pub fn operation_nodes(&self) -> &[NodeId] {
        &self.operation_nodes
    }

    pub fn node_by_key(&self, key: &str) -> Option<NodeId> {
        self.keys.get(key).copied()
    }

    pub fn operation_node_for(&self, op: &Operation) -> Option<NodeId> {
        if op.path != self.path || op.branch != self.branch {
            return None;
        }
        self.operation_node_at(op.time)
    }

    pub fn operation_node_at(&self, time: Timestamp) -> Option<NodeId> {
        self.node_by_key(&operation_key(&self.path, &self.branch, time))
    }

    pub fn construct_node_for(&self, construct: &Construct) -> Option<NodeId> {
        self.node_by_key(&construct_key(&construct.qualified_name, construct.snapshot_time))
    }

    /// Nodes strictly older than `time`
    pub fn nodes_before(&self, time: Timestamp) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, node)| node.time() < time)
            .map(|(id, _)| id)
            .collect()
    }

    /// Nodes strictly newer than `time`
    pub fn nodes_after(&self, time: Timestamp) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, node)| node.time() > time)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |edge| edge.kind == kind)
    }

    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.outgoing
            .get(id.index())
            .into_iter()
            .flatten()
            .map(|&e| &self.edges[e as usize])
    }

    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.incoming
            .get(id.index())
            .into_iter()
            .flatten()
            .map(|&e| &self.edges[e as usize])
    }

    /// Sources of edges ending at `id`, sorted and deduplicated
    pub fn src_nodes(&self, id: NodeId) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.incoming(id).map(|edge| edge.src).collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }

    /// Destinations of edges starting at `id`, sorted and deduplicated
    pub fn dst_nodes(&self, id: NodeId) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.outgoing(id).map(|edge| edge.dst).collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn contains_edge(&self, edge: &Edge) -> bool {
        self.edge_set.contains(edge)
    }

    pub fn stats(&self) -> GraphStats {
        let operation_nodes = self.operation_nodes.len();
        let mut edges = BTreeMap::new();
        for kind in EdgeKind::ALL {
            edges.insert(kind.to_string(), self.edges_of_kind(kind).count());
        }
        GraphStats {
            operation_nodes,
            construct_nodes: self.nodes.len() - operation_nodes,
            snapshots: self.snapshots.len(),
            edges,
        }
    }

    /// Drop every node and edge; the graph becomes unbuilt
    pub fn clear(&mut self) {
        let path = std::mem::take(&mut self.path);
        let branch = std::mem::take(&mut self.branch);
        *self = FileGraph::new(&path, &branch);
    }

    pub(crate) fn add_snapshot(&mut self, snapshot: SnapshotRef) -> usize {
        self.snapshots.push(snapshot);
        self.snapshots.len() - 1
    }

    /// Insert a node; `None` if its key is already taken
    pub(crate) fn add_node(&mut self, node: Node) -> Option<NodeId> {
        let key = node.key();
        if self.keys.contains_key(&key) {
            return None;
        }
        let id = NodeId(self.nodes.len() as u32);
        if node.is_operation() {
            self.operation_nodes.push(id);
        }
        self.nodes.push(node);
        self.keys.insert(key, id);
        Some(id)
    }

    /// Insert an edge; `false` if the same triple already exists
    pub(crate) fn add_edge(&mut self, src: NodeId, dst: NodeId, kind: EdgeKind) -> bool {
        let edge = Edge::new(src, dst, kind);
        if !self.edge_set.insert(edge) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Swap every edge of `kind` for `edges`, keeping the build time
    ///
    /// Returns `false` and leaves the graph untouched when the edge set is
    /// already the same.
    pub(crate) fn replace_edges_of_kind(&mut self, kind: EdgeKind, edges: Vec<(NodeId, NodeId)>) -> bool {
        let fresh: Vec<Edge> = edges
            .into_iter()
            .map(|(src, dst)| Edge::new(src, dst, kind))
            .collect();
        let current = self.edges_of_kind(kind).count();
        if fresh.len() == current && fresh.iter().all(|edge| self.edge_set.contains(edge)) {
            return false;
        }
        self.edges.retain(|edge| edge.kind != kind);
        self.edge_set.retain(|edge| edge.kind != kind);
        for edge in fresh {
            self.add_edge(edge.src, edge.dst, edge.kind);
        }
        self.seal(self.last_build);
        true
    }

    /// Rebuild the adjacency index and stamp the build time
    pub(crate) fn seal(&mut self, last_build: Option<Timestamp>) {
        let mut outgoing = vec![Vec::new(); self.nodes.len()];
        let mut incoming = vec![Vec::new(); self.nodes.len()];
        for (i, edge) in self.edges.iter().enumerate() {
            outgoing[edge.src.index()].push(i as u32);
            incoming[edge.dst.index()].push(i as u32);
        }
        self.outgoing = outgoing;
        self.incoming = incoming;
        self.last_build = last_build;
    }
}
