//! Per-file dependency graph construction
//!
//! # Behavior
//! 1. One operation node per Document/Copy operation, in log order
//! 2. One construct node per named element of every parsed snapshot
//! 3. BackwardEdit: construct at the preceding snapshot enclosing the
//!    operation's touched range, translated back to that snapshot
//! 4. ForwardEdit: construct at the following snapshot enclosing the
//!    operation's resulting range, translated forward to that snapshot
//! 5. NoChange between constructs of adjacent snapshots that no edit
//!    separates, matched by translated offset and name, or by name alone
//! 6. Ordered: earlier edit -> later edit, found by walking the later
//!    edit's offsets back through history ([`TrackedOffsets`])
//! 7. CCP: the cut/copy immediately preceding a paste in this log, when
//!    their texts match. A project graph redoes this step on the merged
//!    stream of every file, where a foreign cut/copy can intervene.
//!
//! A build checks for cancellation between operations and snapshots. A
//! cancelled build returns nothing; the half-built graph is dropped.

use ahash::AHashSet;

use super::{ConstructNode, EdgeKind, FileGraph, Node, NodeId, OperationNode, SnapshotRef};
use crate::config::BuildConfig;
use crate::construct::{Construct, ConstructSupplier, SnapshotList};
use crate::error::BuildError;
use crate::offset::{adjust_caret_backward, adjust_caret_forward, reach_marks, EditSpan, TrackedOffsets};
use crate::operation::{Operation, OperationLog};
use crate::task::{Cancelled, ProgressMonitor};

/// Builds the [`FileGraph`] of one operation log
pub struct GraphBuilder<'a> {
    log: &'a OperationLog,
    config: &'a BuildConfig,
}

struct OpEntry<'a> {
    id: NodeId,
    index: usize,
    span: EditSpan,
    op: &'a Operation,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(log: &'a OperationLog, config: &'a BuildConfig) -> Self {
        GraphBuilder { log, config }
    }

    /// Parse the scheduled snapshots with `supplier`, then build
    ///
    /// # Returns
    /// `Ok(Ok(graph))` on success, `Ok(Err(Cancelled))` when the monitor
    /// requested cancellation, `Err` when a snapshot could not be restored
    /// or parsed. No partial graph is returned in either failure case.
    pub fn build(
        &self,
        supplier: &dyn ConstructSupplier,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Result<FileGraph, Cancelled>, BuildError> {
        monitor.begin_task(self.log.path(), self.planned_steps(supplier));
        let graph = self.build_steps(supplier, monitor)?;
        if graph.is_ok() {
            monitor.done();
        }
        Ok(graph)
    }

    /// Build from snapshots that were already parsed
    pub fn build_with_snapshots(
        &self,
        snapshots: &SnapshotList,
        monitor: &dyn ProgressMonitor,
    ) -> Result<FileGraph, Cancelled> {
        let edits = self.log.edit_indices().count();
        monitor.begin_task(self.log.path(), snapshots.len() + edits * 2);
        let graph = self.finish(snapshots, monitor)?;
        monitor.done();
        Ok(graph)
    }

    /// Progress steps a build of this log reports
    pub(crate) fn planned_steps(&self, supplier: &dyn ConstructSupplier) -> usize {
        let extra_times = supplier.snapshot_times(self.log.path());
        let scheduled = SnapshotList::schedule(self.log, self.config, &extra_times).len();
        scheduled * 2 + self.log.edit_indices().count() * 2
    }

    /// Build, reporting steps into a task the caller began
    pub(crate) fn build_steps(
        &self,
        supplier: &dyn ConstructSupplier,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Result<FileGraph, Cancelled>, BuildError> {
        let extra_times = supplier.snapshot_times(self.log.path());
        tracing::debug!(path = self.log.path(), branch = self.log.branch(), "collecting snapshots");
        let snapshots = match SnapshotList::collect(self.log, supplier, self.config, &extra_times, monitor)? {
            Ok(snapshots) => snapshots,
            Err(Cancelled) => {
                tracing::info!(path = self.log.path(), "graph build cancelled");
                return Ok(Err(Cancelled));
            }
        };
        Ok(self.finish(&snapshots, monitor))
    }

    fn finish(
        &self,
        snapshots: &SnapshotList,
        monitor: &dyn ProgressMonitor,
    ) -> Result<FileGraph, Cancelled> {
        let mut graph = FileGraph::new(self.log.path(), self.log.branch());
        if let Err(Cancelled) = self.populate(&mut graph, snapshots, monitor) {
            tracing::info!(path = self.log.path(), "graph build cancelled");
            return Err(Cancelled);
        }
        graph.seal(self.log.last_updated());

        tracing::info!(
            path = self.log.path(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "graph built"
        );
        Ok(graph)
    }

    fn populate(
        &self,
        graph: &mut FileGraph,
        snapshots: &SnapshotList,
        monitor: &dyn ProgressMonitor,
    ) -> Result<(), Cancelled> {
        let ops = self.add_operation_nodes(graph);
        let per_snapshot = self.add_construct_nodes(graph, snapshots);

        tracing::debug!(path = self.log.path(), "linking edits to constructs");
        let mut consumed: AHashSet<NodeId> = AHashSet::new();
        let mut introduced: AHashSet<NodeId> = AHashSet::new();
        for entry in &ops {
            monitor.checkpoint()?;
            self.link_edit(graph, snapshots, &per_snapshot, &ops, entry, &mut consumed, &mut introduced);
            monitor.report_progress(1);
        }

        tracing::debug!(path = self.log.path(), "linking unchanged constructs");
        for position in 1..snapshots.len() {
            monitor.checkpoint()?;
            self.link_unchanged(graph, snapshots, &per_snapshot, &ops, position, &consumed, &introduced);
            monitor.report_progress(1);
        }

        tracing::debug!(path = self.log.path(), "ordering edits");
        let spans: Vec<EditSpan> = ops.iter().map(|entry| entry.span).collect();
        let marks = reach_marks(&spans);
        for (later, entry) in ops.iter().enumerate() {
            monitor.checkpoint()?;
            let mut tracked = TrackedOffsets::for_span(&entry.span);
            for earlier in (0..later).rev() {
                // everything left sits past what ops[..=earlier] ever touched
                if !tracked.lowest().is_some_and(|low| low < marks[earlier + 1]) {
                    break;
                }
                if tracked.offer(&ops[earlier].span, self.config.link_copy_sources).depends {
                    graph.add_edge(ops[earlier].id, entry.id, EdgeKind::Ordered);
                }
            }
            monitor.report_progress(1);
        }

        let stream: Vec<&Operation> = ops.iter().map(|entry| entry.op).collect();
        for (position, entry) in ops.iter().enumerate() {
            if let Some(source) = clipboard_source(&stream, position, self.config) {
                graph.add_edge(ops[source].id, entry.id, EdgeKind::CCP);
            }
        }
        Ok(())
    }

    fn add_operation_nodes(&self, graph: &mut FileGraph) -> Vec<OpEntry<'a>> {
        let mut ops = Vec::new();
        for (index, op) in self.log.document_operations() {
            let Some(span) = op.edit_span() else {
                continue;
            };
            let node = Node::Operation(OperationNode {
                index,
                operation: op.clone(),
                span,
            });
            if let Some(id) = graph.add_node(node) {
                ops.push(OpEntry { id, index, span, op });
            }
        }
        ops
    }

    fn add_construct_nodes(&self, graph: &mut FileGraph, snapshots: &SnapshotList) -> Vec<Vec<NodeId>> {
        let mut per_snapshot = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots.iter() {
            let position = graph.add_snapshot(SnapshotRef {
                index: snapshot.index,
                time: snapshot.time,
            });
            let mut ids = Vec::with_capacity(snapshot.constructs.len());
            for construct in &snapshot.constructs {
                let node = Node::Construct(ConstructNode {
                    snapshot: position,
                    construct: construct.clone(),
                });
                match graph.add_node(node) {
                    Some(id) => ids.push(id),
                    None => tracing::warn!(
                        path = self.log.path(),
                        name = %construct.qualified_name,
                        time = %snapshot.time,
                        "duplicate construct in snapshot, keeping the first"
                    ),
                }
            }
            per_snapshot.push(ids);
        }
        per_snapshot
    }

    /// BackwardEdit and ForwardEdit edges of one operation
    #[allow(clippy::too_many_arguments)]
    fn link_edit(
        &self,
        graph: &mut FileGraph,
        snapshots: &SnapshotList,
        per_snapshot: &[Vec<NodeId>],
        ops: &[OpEntry<'_>],
        entry: &OpEntry<'_>,
        consumed: &mut AHashSet<NodeId>,
        introduced: &mut AHashSet<NodeId>,
    ) {
        let parsed = |position: &usize| !per_snapshot[*position].is_empty();
        if let Some(position) = snapshots.position_before(entry.index).filter(parsed) {
            let snapshot_index = snapshots.get(position).map_or(0, |s| s.index);
            let between = spans_between(ops, snapshot_index, entry.index);
            let (start, end) = entry.span.prior_range();
            let start = adjust_caret_backward(start, &between);
            let end = adjust_caret_backward(end, &between);

            for &id in &per_snapshot[position] {
                if construct_of(graph, id).is_some_and(|c| encloses(c, start, end)) {
                    graph.add_edge(id, entry.id, EdgeKind::BackwardEdit);
                    if !entry.span.is_copy() {
                        consumed.insert(id);
                    }
                }
            }
        }

        if let Some(position) = snapshots.position_at_or_after(entry.index).filter(parsed) {
            let snapshot_index = snapshots.get(position).map_or(entry.index, |s| s.index);
            let between = spans_between(ops, entry.index, snapshot_index + 1);
            let (start, end) = entry.span.posterior_range();
            let start = adjust_caret_forward(start, &between);
            let end = adjust_caret_forward(end, &between);

            for &id in &per_snapshot[position] {
                if construct_of(graph, id).is_some_and(|c| encloses(c, start, end)) {
                    graph.add_edge(entry.id, id, EdgeKind::ForwardEdit);
                    if !entry.span.is_pure_insert() {
                        introduced.insert(id);
                    }
                }
            }
        }
    }

    /// NoChange edges from snapshot `position - 1` to snapshot `position`
    #[allow(clippy::too_many_arguments)]
    fn link_unchanged(
        &self,
        graph: &mut FileGraph,
        snapshots: &SnapshotList,
        per_snapshot: &[Vec<NodeId>],
        ops: &[OpEntry<'_>],
        position: usize,
        consumed: &AHashSet<NodeId>,
        introduced: &AHashSet<NodeId>,
    ) {
        let (Some(older), Some(newer)) = (snapshots.get(position - 1), snapshots.get(position)) else {
            return;
        };
        let between = spans_between(ops, older.index, newer.index + 1);

        let sources: Vec<(NodeId, &Construct)> = per_snapshot[position - 1]
            .iter()
            .filter(|id| !consumed.contains(*id))
            .filter_map(|&id| construct_of(graph, id).map(|c| (id, c)))
            .collect();

        let mut links = Vec::new();
        for &dst in &per_snapshot[position] {
            if introduced.contains(&dst) {
                continue;
            }
            let Some(target) = construct_of(graph, dst) else {
                continue;
            };
            let origin = adjust_caret_backward(target.start, &between);
            let same_name = |c: &Construct| c.simple_name() == target.simple_name();

            let mut matched: Vec<NodeId> = sources
                .iter()
                .filter(|(_, c)| c.start == origin && same_name(c))
                .map(|(id, _)| *id)
                .collect();
            if matched.is_empty() && self.config.name_fallback {
                matched = sources
                    .iter()
                    .filter(|(_, c)| same_name(c))
                    .map(|(id, _)| *id)
                    .collect();
            }
            links.extend(matched.into_iter().map(|src| (src, dst)));
        }

        for (src, dst) in links {
            graph.add_edge(src, dst, EdgeKind::NoChange);
        }
    }
}

fn construct_of(graph: &FileGraph, id: NodeId) -> Option<&Construct> {
    graph
        .node(id)
        .and_then(Node::as_construct)
        .map(|node| &node.construct)
}

/// Range `[start, end)` lies inside the construct; an empty range is a
/// caret and must sit before the construct's last character
fn encloses(construct: &Construct, start: usize, end: usize) -> bool {
    if start == end {
        construct.start <= start && start < construct.end
    } else {
        construct.encloses(start, end)
    }
}

/// Spans of operations with log index strictly between `after` and `before`
fn spans_between(ops: &[OpEntry<'_>], after: usize, before: usize) -> Vec<EditSpan> {
    let from = ops.partition_point(|entry| entry.index <= after);
    let to = ops.partition_point(|entry| entry.index < before);
    if from >= to {
        return Vec::new();
    }
    ops[from..to].iter().map(|entry| entry.span).collect()
}

/// Cut or copy a paste consumed
///
/// Only the nearest preceding cut/copy in `stream` is eligible; when its
/// text does not match, the paste has no source.
pub(crate) fn clipboard_source(
    stream: &[&Operation],
    paste: usize,
    config: &BuildConfig,
) -> Option<usize> {
    let pasted = stream.get(paste)?;
    if !pasted.is_paste() {
        return None;
    }
    let inserted = &pasted.as_document()?.inserted;
    let source = stream[..paste].iter().rposition(|op| op.is_cut_or_copy())?;
    let clipboard = stream[source].clipboard_text()?;
    config.clipboard_matches(clipboard, inserted).then_some(source)
}
