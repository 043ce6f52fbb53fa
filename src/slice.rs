//! History slicing
//!
//! A slice is the time-ordered set of operations causally connected to a
//! criterion: either a graph node (usually a construct) or an arbitrary code
//! region at one instant.
//!
//! # Node criteria
//! Backward: every node reaching the criterion over BackwardEdit,
//! ForwardEdit, NoChange or CCP edges, plus the one-step BackwardEdit
//! successors of those nodes. Forward is the dual. Ordered edges are not
//! followed.
//!
//! # Region criteria
//! Seeds are the operations whose footprint, translated to the criterion's
//! instant, overlaps the region. The slice then follows Ordered and CCP
//! edges from the seeds.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

use crate::graph::{EdgeKind, FileGraph, GlobalNodeId, Node, NodeId, ProjectGraph, SnapshotRef};
use crate::offset::{EditSpan, TrackedOffsets};
use crate::operation::{Operation, Timestamp};

/// Slice direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceDirection {
    /// What affected the criterion
    Backward,
    /// What the criterion affected
    Forward,
}

impl SliceDirection {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "backward" => Some(SliceDirection::Backward),
            "forward" => Some(SliceDirection::Forward),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SliceDirection::Backward => "backward",
            SliceDirection::Forward => "forward",
        }
    }
}

impl fmt::Display for SliceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Characters `[start, start + len)` of `path` right after the operation at `time`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRegion {
    pub path: String,
    /// Empty for the default branch
    #[serde(default)]
    pub branch: String,
    pub start: usize,
    pub len: usize,
    pub time: Timestamp,
}

impl CodeRegion {
    pub fn new(path: &str, start: usize, len: usize, time: impl Into<Timestamp>) -> Self {
        CodeRegion {
            path: path.to_string(),
            branch: String::new(),
            start,
            len,
            time: time.into(),
        }
    }

    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = branch.to_string();
        self
    }

    /// Parse `PATH:START:LEN@TIME`
    pub fn parse(s: &str) -> Option<Self> {
        let (location, time) = s.rsplit_once('@')?;
        let time: i64 = time.parse().ok()?;
        let mut parts = location.rsplitn(3, ':');
        let len: usize = parts.next()?.parse().ok()?;
        let start: usize = parts.next()?.parse().ok()?;
        start.checked_add(len)?;
        let path = parts.next().filter(|p| !p.is_empty())?;
        Some(CodeRegion::new(path, start, len, time))
    }
}

impl fmt::Display for CodeRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.branch.is_empty() {
            write!(f, "[{}]", self.branch)?;
        }
        write!(
            f,
            "[{}, {})@{}",
            self.start,
            self.start.saturating_add(self.len),
            self.time
        )
    }
}

/// Graph the slicer can walk
pub trait SliceGraph {
    type Id: Copy + Eq + Hash + Ord + fmt::Debug;

    fn node(&self, id: Self::Id) -> Option<&Node>;

    /// Neighbours over edges arriving at `id` (backward) or leaving it (forward)
    fn neighbours(&self, id: Self::Id, direction: SliceDirection) -> Vec<(Self::Id, EdgeKind)>;

    /// Operation nodes of `path` on `branch`, in log order
    fn operation_nodes_of(&self, path: &str, branch: &str) -> Vec<Self::Id>;

    fn snapshots_of(&self, path: &str, branch: &str) -> &[SnapshotRef];
}

impl SliceGraph for FileGraph {
    type Id = NodeId;

    fn node(&self, id: NodeId) -> Option<&Node> {
        FileGraph::node(self, id)
    }

    fn neighbours(&self, id: NodeId, direction: SliceDirection) -> Vec<(NodeId, EdgeKind)> {
        match direction {
            SliceDirection::Backward => self.incoming(id).map(|e| (e.src, e.kind)).collect(),
            SliceDirection::Forward => self.outgoing(id).map(|e| (e.dst, e.kind)).collect(),
        }
    }

    fn operation_nodes_of(&self, path: &str, branch: &str) -> Vec<NodeId> {
        if path == self.path() && branch == self.branch() {
            self.operation_nodes().to_vec()
        } else {
            Vec::new()
        }
    }

    fn snapshots_of(&self, path: &str, branch: &str) -> &[SnapshotRef] {
        if path == self.path() && branch == self.branch() {
            self.snapshots()
        } else {
            &[]
        }
    }
}

impl SliceGraph for ProjectGraph {
    type Id = GlobalNodeId;

    fn node(&self, id: GlobalNodeId) -> Option<&Node> {
        ProjectGraph::node(self, id)
    }

    fn neighbours(&self, id: GlobalNodeId, direction: SliceDirection) -> Vec<(GlobalNodeId, EdgeKind)> {
        match direction {
            SliceDirection::Backward => self.incoming(id),
            SliceDirection::Forward => self.outgoing(id),
        }
    }

    fn operation_nodes_of(&self, path: &str, branch: &str) -> Vec<GlobalNodeId> {
        let Some(file) = self.file_position(path, branch) else {
            return Vec::new();
        };
        self.file_at(file)
            .map(|graph| {
                graph
                    .operation_nodes()
                    .iter()
                    .map(|&node| GlobalNodeId { file, node })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn snapshots_of(&self, path: &str, branch: &str) -> &[SnapshotRef] {
        self.file(path, branch)
            .map(|graph| graph.snapshots())
            .unwrap_or(&[])
    }
}

/// Time-ordered operations of one slice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slice<Id> {
    title: String,
    direction: SliceDirection,
    nodes: Vec<Id>,
    operations: Vec<Operation>,
}

impl<Id: Copy + Eq> Slice<Id> {
    /// Criterion and the snapshot it was evaluated against
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn direction(&self) -> SliceDirection {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Operation nodes, oldest first
    pub fn nodes(&self) -> &[Id] {
        &self.nodes
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn contains(&self, id: Id) -> bool {
        self.nodes.contains(&id)
    }

    pub fn contains_operation(&self, op: &Operation) -> bool {
        self.operations
            .iter()
            .any(|o| o.time == op.time && o.path == op.path && o.branch == op.branch)
    }

    /// Times of the oldest and newest operation
    pub fn time_span(&self) -> Option<(Timestamp, Timestamp)> {
        Some((self.operations.first()?.time, self.operations.last()?.time))
    }
}

/// Computes slices over a [`SliceGraph`]
pub struct Slicer<'g, G: SliceGraph> {
    graph: &'g G,
}

impl<'g, G: SliceGraph> Slicer<'g, G> {
    pub fn new(graph: &'g G) -> Self {
        Slicer { graph }
    }

    pub fn backward_slice(&self, criterion: G::Id) -> Option<Slice<G::Id>> {
        self.slice_from_node(criterion, SliceDirection::Backward)
    }

    pub fn forward_slice(&self, criterion: G::Id) -> Option<Slice<G::Id>> {
        self.slice_from_node(criterion, SliceDirection::Forward)
    }

    /// Slice from a graph node; `None` if the node does not exist
    pub fn slice_from_node(&self, criterion: G::Id, direction: SliceDirection) -> Option<Slice<G::Id>> {
        let node = self.graph.node(criterion)?;

        let mut reached = self.traverse([criterion], direction, |kind| kind != EdgeKind::Ordered);

        // Sibling constructs and operations one BackwardEdit step away
        let siblings: Vec<G::Id> = reached
            .iter()
            .flat_map(|&id| self.graph.neighbours(id, SliceDirection::Forward))
            .filter(|(_, kind)| *kind == EdgeKind::BackwardEdit)
            .map(|(id, _)| id)
            .collect();
        reached.extend(siblings);

        let snapshot = match node {
            Node::Construct(c) => Some(c.snapshot),
            Node::Operation(op) => snapshot_position(
                self.graph.snapshots_of(&op.operation.path, &op.operation.branch),
                op.operation.time,
            ),
        };
        let title = title(direction, &node.key(), snapshot);
        Some(self.finish(title, direction, reached))
    }

    /// Slice from a code region at one instant
    pub fn slice_from_region(&self, region: &CodeRegion, direction: SliceDirection) -> Slice<G::Id> {
        let candidates: Vec<(G::Id, EditSpan, Timestamp)> = self
            .graph
            .operation_nodes_of(&region.path, &region.branch)
            .into_iter()
            .filter_map(|id| {
                let op = self.graph.node(id)?.as_operation()?;
                Some((id, op.span, op.operation.time))
            })
            .collect();

        let seeds = match direction {
            SliceDirection::Backward => backward_seeds(&candidates, region),
            SliceDirection::Forward => forward_seeds(&candidates, region),
        };
        tracing::debug!(region = %region, %direction, seeds = seeds.len(), "region slice seeds");

        let reached = self.traverse(seeds, direction, EdgeKind::is_operation_edge);
        let snapshots = self.graph.snapshots_of(&region.path, &region.branch);
        let snapshot = snapshot_position(snapshots, region.time);
        let title = title(direction, &region.to_string(), snapshot);
        self.finish(title, direction, reached)
    }

    /// Depth-first walk from `start` over edges whose kind passes `follow`
    fn traverse(
        &self,
        start: impl IntoIterator<Item = G::Id>,
        direction: SliceDirection,
        follow: impl Fn(EdgeKind) -> bool,
    ) -> AHashSet<G::Id> {
        let mut visited = AHashSet::new();
        let mut stack: Vec<G::Id> = Vec::new();
        for id in start {
            if visited.insert(id) {
                stack.push(id);
            }
        }
        while let Some(id) = stack.pop() {
            for (next, kind) in self.graph.neighbours(id, direction) {
                if follow(kind) && visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        visited
    }

    fn finish(&self, title: String, direction: SliceDirection, reached: AHashSet<G::Id>) -> Slice<G::Id> {
        let mut entries: Vec<(G::Id, &Operation)> = reached
            .into_iter()
            .filter_map(|id| {
                let op = self.graph.node(id)?.as_operation()?;
                Some((id, &op.operation))
            })
            .collect();
        entries.sort_by(|(a_id, a), (b_id, b)| {
            a.time
                .cmp(&b.time)
                .then_with(|| a.path.cmp(&b.path))
                .then_with(|| a_id.cmp(b_id))
        });

        Slice {
            title,
            direction,
            nodes: entries.iter().map(|(id, _)| *id).collect(),
            operations: entries.into_iter().map(|(_, op)| op.clone()).collect(),
        }
    }
}

fn title(direction: SliceDirection, criterion: &str, snapshot: Option<usize>) -> String {
    let label = match direction {
        SliceDirection::Backward => "Backward",
        SliceDirection::Forward => "Forward",
    };
    match snapshot {
        Some(position) => format!("{} slice of {} (snapshot {})", label, criterion, position),
        None => format!("{} slice of {} (no snapshot)", label, criterion),
    }
}

/// Newest snapshot at or before `time`
fn snapshot_position(snapshots: &[SnapshotRef], time: Timestamp) -> Option<usize> {
    snapshots.partition_point(|s| s.time <= time).checked_sub(1)
}

/// Operations at or before the region's instant that produced or shaped it
///
/// Inserted characters count when they are tracked region characters. A
/// deletion counts when its point falls inside the tracked bounds. A copy
/// counts when it read a tracked character.
fn backward_seeds<Id: Copy>(candidates: &[(Id, EditSpan, Timestamp)], region: &CodeRegion) -> Vec<Id> {
    let mut tracked = TrackedOffsets::for_range(region.start, region.len);
    let mut seeds = Vec::new();

    for (id, span, _) in candidates.iter().rev().filter(|(_, _, t)| *t <= region.time) {
        if tracked.is_empty() {
            break;
        }
        let hit = if span.is_copy() {
            let (start, end) = span.prior_range();
            tracked.touches(start, end)
        } else {
            let (start, end) = span.posterior_range();
            let inserted = span.is_add() && tracked.touches(start, end);
            let removed = span.is_remove()
                && tracked
                    .bounds()
                    .is_some_and(|(lo, hi)| lo <= span.start && span.start < hi);
            inserted || removed
        };
        if hit {
            seeds.push(*id);
        }
        tracked.project_backward(span);
    }
    seeds
}

/// Operations after the region's instant that changed or read it
///
/// A deletion counts when it removes tracked characters, an insertion when
/// it lands strictly inside the tracked bounds, a copy when it reads a
/// tracked character.
fn forward_seeds<Id: Copy>(candidates: &[(Id, EditSpan, Timestamp)], region: &CodeRegion) -> Vec<Id> {
    let mut tracked = TrackedOffsets::for_range(region.start, region.len);
    let mut seeds = Vec::new();

    for (id, span, _) in candidates.iter().filter(|(_, _, t)| *t > region.time) {
        if tracked.is_empty() {
            break;
        }
        let (start, end) = span.prior_range();
        let hit = if span.is_copy() {
            tracked.touches(start, end)
        } else {
            let removed = span.is_remove() && tracked.touches(start, end);
            let inserted = span.is_add()
                && tracked
                    .bounds()
                    .is_some_and(|(lo, hi)| lo < span.start && span.start < hi);
            removed || inserted
        };
        if hit {
            seeds.push(*id);
        }
        tracked.project_forward(span);
    }
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::construct::NoConstructs;
    use crate::graph::GraphBuilder;
    use crate::operation::{Action, OperationLog};
    use crate::task::NullMonitor;

    fn build(ops: Vec<Operation>) -> FileGraph {
        let log = OperationLog::from_operations(ops).unwrap();
        GraphBuilder::new(&log, &BuildConfig::default())
            .build(&NoConstructs, &NullMonitor)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_region_parse() {
        let region = CodeRegion::parse("src/a.rs:10:5@1200").unwrap();
        assert_eq!(region, CodeRegion::new("src/a.rs", 10, 5, 1200));
        assert_eq!(
            CodeRegion::parse("C:/src/a.rs:1:2@3").unwrap().path,
            "C:/src/a.rs"
        );
        assert!(CodeRegion::parse("a.rs:10@3").is_none());
        assert!(CodeRegion::parse("a.rs:x:1@3").is_none());
        assert_eq!(region.to_string(), "src/a.rs[10, 15)@1200");
    }

    #[test]
    fn test_region_on_a_branch() {
        let ops = vec![
            Operation::snapshot(0, "a.rs", "abc").with_branch("dev"),
            Operation::document(1, "a.rs", 1, "XY", "").with_branch("dev"),
        ];
        let graph = build(ops);
        let region = CodeRegion::new("a.rs", 1, 2, 1).with_branch("dev");
        assert_eq!(region.to_string(), "a.rs[dev][1, 3)@1");

        let slicer = Slicer::new(&graph);
        let slice = slicer.slice_from_region(&region, SliceDirection::Backward);
        assert_eq!(slice.nodes(), &[graph.operation_node_at(Timestamp(1)).unwrap()]);
        let default_branch = CodeRegion::new("a.rs", 1, 2, 1);
        assert!(slicer.slice_from_region(&default_branch, SliceDirection::Backward).is_empty());
    }

    #[test]
    fn test_region_at_the_top_of_the_offset_range() {
        let huge = format!("a.rs:{}:1@3", usize::MAX);
        assert!(CodeRegion::parse(&huge).is_none());
        let region = CodeRegion::new("a.rs", usize::MAX, 1, 3);
        assert_eq!(region.to_string(), format!("a.rs[{0}, {0})@3", usize::MAX));

        let graph = build(vec![
            Operation::snapshot(0, "a.rs", "abc"),
            Operation::document(1, "a.rs", usize::MAX, "x", ""),
            Operation::document(2, "a.rs", usize::MAX - 1, "", "yz"),
        ]);
        let near_top = CodeRegion::new("a.rs", usize::MAX - 2, 2, 2);
        let slice = Slicer::new(&graph).slice_from_region(&near_top, SliceDirection::Backward);
        assert_eq!(slice.nodes(), &[graph.operation_node_at(Timestamp(2)).unwrap()]);
    }

    #[test]
    fn test_backward_slice_from_paste_includes_copy() {
        let graph = build(vec![
            Operation::snapshot(0, "a.rs", &"x".repeat(25)),
            Operation::copy(1, "a.rs", 5, "foo"),
            Operation::document(2, "a.rs", 20, "foo", "").with_action(Action::Paste),
        ]);
        let paste = graph.operation_node_at(Timestamp(2)).unwrap();
        let copy = graph.operation_node_at(Timestamp(1)).unwrap();

        let slice = Slicer::new(&graph).backward_slice(paste).unwrap();
        assert_eq!(slice.nodes(), &[copy, paste]);
        assert_eq!(slice.time_span(), Some((Timestamp(1), Timestamp(2))));
        assert!(slice.title().starts_with("Backward slice of op:a.rs@2"));
        assert!(slice.title().ends_with("(snapshot 0)"));

        let forward = Slicer::new(&graph).forward_slice(copy).unwrap();
        assert!(forward.contains(paste));
    }

    #[test]
    fn test_node_slice_ignores_ordered_edges() {
        let graph = build(vec![
            Operation::snapshot(0, "a.rs", ""),
            Operation::document(1, "a.rs", 0, "abc", ""),
            Operation::document(2, "a.rs", 1, "", "b"),
        ]);
        let later = graph.operation_node_at(Timestamp(2)).unwrap();
        let slice = Slicer::new(&graph).backward_slice(later).unwrap();
        assert_eq!(slice.nodes(), &[later]);
    }

    #[test]
    fn test_region_backward_slice_follows_ordered_chain() {
        // "hello" typed, then "l" replaced by "L", then " world" appended
        let graph = build(vec![
            Operation::snapshot(0, "a.rs", ""),
            Operation::document(1, "a.rs", 0, "hello", ""),
            Operation::document(2, "a.rs", 2, "L", "l"),
            Operation::document(3, "a.rs", 5, " world", ""),
        ]);
        let at = |t: i64| graph.operation_node_at(Timestamp(t)).unwrap();

        // "heLlo world"[2..3] == "L"
        let slice = Slicer::new(&graph)
            .slice_from_region(&CodeRegion::new("a.rs", 2, 1, 3), SliceDirection::Backward);
        assert_eq!(slice.nodes(), &[at(1), at(2)]);

        // " world" only came from the last edit
        let slice = Slicer::new(&graph)
            .slice_from_region(&CodeRegion::new("a.rs", 6, 5, 3), SliceDirection::Backward);
        assert_eq!(slice.nodes(), &[at(3)]);
        assert!(slice.contains_operation(&Operation::document(3, "a.rs", 5, " world", "")));
    }

    #[test]
    fn test_region_forward_slice() {
        let graph = build(vec![
            Operation::snapshot(0, "a.rs", "abcdef"),
            Operation::document(1, "a.rs", 2, "", "cd"),
            Operation::document(2, "a.rs", 0, "zz", ""),
            Operation::document(3, "a.rs", 3, "Q", ""),
        ]);
        let at = |t: i64| graph.operation_node_at(Timestamp(t)).unwrap();

        // "bcde" loses "cd" at t1 and becomes "zzabef"[3..5) after t2;
        // t3 inserts at 3, on the boundary rather than inside
        let slice = Slicer::new(&graph)
            .slice_from_region(&CodeRegion::new("a.rs", 1, 4, 0), SliceDirection::Forward);
        assert_eq!(slice.nodes(), &[at(1)]);

        let slice = Slicer::new(&graph)
            .slice_from_region(&CodeRegion::new("a.rs", 0, 6, 0), SliceDirection::Forward);
        assert_eq!(slice.nodes(), &[at(1), at(3)]);
    }

    #[test]
    fn test_missing_node_has_no_slice() {
        let graph = build(vec![Operation::snapshot(0, "a.rs", "")]);
        assert!(Slicer::new(&graph).backward_slice(NodeId(99)).is_none());
    }
}
