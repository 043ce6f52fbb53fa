//! Project graph: the file graphs of a project plus inter-file edges
//!
//! One file graph exists per (path, branch). The clipboard is shared by the
//! whole project, so CCP links are recomputed on the project-wide operation
//! stream (every file's operations merged by time) after each refresh. Links
//! inside one file replace that file graph's own CCP edges; links between
//! files are stored beside the file graphs, which stay self-contained.

use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::builder::clipboard_source;
use super::{EdgeKind, FileGraph, GraphBuilder, GraphStats, Node, NodeId};
use crate::config::BuildConfig;
use crate::construct::ConstructSupplier;
use crate::error::BuildError;
use crate::operation::{Operation, OperationLog, Timestamp};
use crate::task::{Cancelled, ProgressMonitor};

/// Node address across the whole project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalNodeId {
    /// Position of the file graph in the project
    pub file: u32,
    pub node: NodeId,
}

/// Edge between nodes of two different files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalEdge {
    pub src: GlobalNodeId,
    pub dst: GlobalNodeId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectGraph {
    project: String,
    files: Vec<FileGraph>,
    by_file: AHashMap<(String, String), usize>,
    inter_edges: Vec<GlobalEdge>,
    inter_set: AHashSet<GlobalEdge>,
    inter_out: AHashMap<GlobalNodeId, Vec<usize>>,
    inter_in: AHashMap<GlobalNodeId, Vec<usize>>,
}

impl ProjectGraph {
    pub fn new(project: &str) -> Self {
        ProjectGraph {
            project: project.to_string(),
            ..Default::default()
        }
    }

    /// Build every file graph of `logs` and link them
    pub fn build(
        project: &str,
        logs: &[OperationLog],
        supplier: &dyn ConstructSupplier,
        config: &BuildConfig,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Result<Self, Cancelled>, BuildError> {
        let mut graph = ProjectGraph::new(project);
        Ok(graph
            .refresh(logs, supplier, config, monitor)?
            .map(|_| graph))
    }

    /// Rebuild the file graphs that are missing or stale, in parallel
    ///
    /// # Returns
    /// Number of file graphs rebuilt. On cancellation or failure the project
    /// is left exactly as it was: graphs from earlier builds stay intact.
    pub fn refresh(
        &mut self,
        logs: &[OperationLog],
        supplier: &dyn ConstructSupplier,
        config: &BuildConfig,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Result<usize, Cancelled>, BuildError> {
        let stale: Vec<&OperationLog> = logs
            .iter()
            .filter(|log| self.needs_rebuild(log.path(), log.branch(), log.last_updated()))
            .collect();
        tracing::debug!(project = %self.project, stale = stale.len(), total = logs.len(), "refreshing project graph");

        let total = stale
            .iter()
            .map(|log| GraphBuilder::new(log, config).planned_steps(supplier))
            .sum();
        monitor.begin_task(&self.project, total);
        let built: Vec<Result<FileGraph, Cancelled>> = stale
            .par_iter()
            .map(|log| GraphBuilder::new(log, config).build_steps(supplier, monitor))
            .collect::<Result<_, BuildError>>()?;
        let built: Vec<FileGraph> = match built.into_iter().collect() {
            Ok(graphs) => graphs,
            Err(Cancelled) => return Ok(Err(Cancelled)),
        };

        let rebuilt = built.len();
        for graph in built {
            self.install(graph);
        }
        self.link_clipboard(config);
        monitor.done();

        tracing::info!(
            project = %self.project,
            rebuilt,
            files = self.files.len(),
            inter_file_edges = self.inter_edges.len(),
            "project graph refreshed"
        );
        Ok(Ok(rebuilt))
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Replace or add a file graph; positions of existing files never move
    pub fn install(&mut self, graph: FileGraph) -> u32 {
        let key = (graph.path().to_string(), graph.branch().to_string());
        if let Some(&position) = self.by_file.get(&key) {
            self.files[position] = graph;
            position as u32
        } else {
            self.by_file.insert(key, self.files.len());
            self.files.push(graph);
            (self.files.len() - 1) as u32
        }
    }

    /// Clear one file graph and every inter-file edge touching it
    pub fn invalidate(&mut self, path: &str, branch: &str) -> bool {
        let Some(position) = self.file_position(path, branch).map(|p| p as usize) else {
            return false;
        };
        self.files[position].clear();
        let kept: Vec<GlobalEdge> = self
            .inter_edges
            .iter()
            .filter(|edge| edge.src.file as usize != position && edge.dst.file as usize != position)
            .copied()
            .collect();
        self.set_inter_edges(kept);
        true
    }

    /// No graph for `path` on `branch`, or it predates `last_updated`
    pub fn needs_rebuild(&self, path: &str, branch: &str, last_updated: Option<Timestamp>) -> bool {
        self.file(path, branch)
            .map_or(true, |graph| graph.is_stale(last_updated))
    }

    pub fn files(&self) -> &[FileGraph] {
        &self.files
    }

    pub fn file(&self, path: &str, branch: &str) -> Option<&FileGraph> {
        self.file_position(path, branch)
            .and_then(|position| self.file_at(position))
    }

    pub fn file_position(&self, path: &str, branch: &str) -> Option<u32> {
        self.by_file
            .get(&(path.to_string(), branch.to_string()))
            .map(|&position| position as u32)
    }

    /// File graphs of `path` on every branch
    pub fn files_of(&self, path: &str) -> impl Iterator<Item = &FileGraph> + '_ {
        let path = path.to_string();
        self.files.iter().filter(move |graph| graph.path() == path)
    }

    pub fn file_at(&self, file: u32) -> Option<&FileGraph> {
        self.files.get(file as usize)
    }

    pub fn node(&self, id: GlobalNodeId) -> Option<&Node> {
        self.file_at(id.file)?.node(id.node)
    }

    pub fn node_by_key(&self, key: &str) -> Option<GlobalNodeId> {
        self.files.iter().enumerate().find_map(|(file, graph)| {
            graph.node_by_key(key).map(|node| GlobalNodeId {
                file: file as u32,
                node,
            })
        })
    }

    pub fn operation_node_for(&self, op: &Operation) -> Option<GlobalNodeId> {
        let file = self.file_position(&op.path, &op.branch)?;
        let node = self.file_at(file)?.operation_node_for(op)?;
        Some(GlobalNodeId { file, node })
    }

    pub fn inter_file_edges(&self) -> &[GlobalEdge] {
        &self.inter_edges
    }

    pub fn contains_edge(&self, edge: &GlobalEdge) -> bool {
        if edge.src.file == edge.dst.file {
            return self.file_at(edge.src.file).is_some_and(|graph| {
                graph.contains_edge(&super::Edge::new(edge.src.node, edge.dst.node, edge.kind))
            });
        }
        self.inter_set.contains(edge)
    }

    /// Neighbours reached over edges leaving `id`, inter-file edges included
    pub fn outgoing(&self, id: GlobalNodeId) -> Vec<(GlobalNodeId, EdgeKind)> {
        let mut out: Vec<(GlobalNodeId, EdgeKind)> = self
            .file_at(id.file)
            .into_iter()
            .flat_map(|graph| graph.outgoing(id.node))
            .map(|edge| {
                let dst = GlobalNodeId {
                    file: id.file,
                    node: edge.dst,
                };
                (dst, edge.kind)
            })
            .collect();
        if let Some(edges) = self.inter_out.get(&id) {
            out.extend(edges.iter().map(|&e| (self.inter_edges[e].dst, self.inter_edges[e].kind)));
        }
        out
    }

    /// Neighbours reached over edges arriving at `id`
    pub fn incoming(&self, id: GlobalNodeId) -> Vec<(GlobalNodeId, EdgeKind)> {
        let mut out: Vec<(GlobalNodeId, EdgeKind)> = self
            .file_at(id.file)
            .into_iter()
            .flat_map(|graph| graph.incoming(id.node))
            .map(|edge| {
                let src = GlobalNodeId {
                    file: id.file,
                    node: edge.src,
                };
                (src, edge.kind)
            })
            .collect();
        if let Some(edges) = self.inter_in.get(&id) {
            out.extend(edges.iter().map(|&e| (self.inter_edges[e].src, self.inter_edges[e].kind)));
        }
        out
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats::default();
        for graph in &self.files {
            stats.merge(&graph.stats());
        }
        *stats.edges.entry(EdgeKind::CCP.to_string()).or_default() += self.inter_edges.len();
        stats
    }

    /// Recompute every CCP edge on the project-wide operation stream
    fn link_clipboard(&mut self, config: &BuildConfig) {
        let mut stream: Vec<(GlobalNodeId, &Operation)> = Vec::new();
        for (file, graph) in self.files.iter().enumerate() {
            for &node in graph.operation_nodes() {
                if let Some(Node::Operation(op)) = graph.node(node) {
                    let id = GlobalNodeId {
                        file: file as u32,
                        node,
                    };
                    stream.push((id, &op.operation));
                }
            }
        }
        stream.sort_by(|(_, a), (_, b)| {
            a.time
                .cmp(&b.time)
                .then_with(|| a.path.cmp(&b.path))
                .then_with(|| a.branch.cmp(&b.branch))
        });

        let ops: Vec<&Operation> = stream.iter().map(|(_, op)| *op).collect();
        let mut local: Vec<Vec<(NodeId, NodeId)>> = vec![Vec::new(); self.files.len()];
        let mut inter = Vec::new();
        for (position, (paste, _)) in stream.iter().enumerate() {
            let Some(source) = clipboard_source(&ops, position, config) else {
                continue;
            };
            let (src, _) = stream[source];
            if src.file == paste.file {
                local[src.file as usize].push((src.node, paste.node));
            } else {
                inter.push(GlobalEdge {
                    src,
                    dst: *paste,
                    kind: EdgeKind::CCP,
                });
            }
        }

        let mut relinked = 0;
        for (graph, edges) in self.files.iter_mut().zip(local) {
            if graph.replace_edges_of_kind(EdgeKind::CCP, edges) {
                relinked += 1;
            }
        }
        if relinked > 0 {
            tracing::debug!(project = %self.project, files = relinked, "clipboard links changed inside files");
        }
        self.set_inter_edges(inter);
    }

    fn set_inter_edges(&mut self, edges: Vec<GlobalEdge>) {
        self.inter_edges.clear();
        self.inter_set.clear();
        self.inter_out.clear();
        self.inter_in.clear();
        for edge in edges {
            if !self.inter_set.insert(edge) {
                continue;
            }
            let position = self.inter_edges.len();
            self.inter_edges.push(edge);
            self.inter_out.entry(edge.src).or_default().push(position);
            self.inter_in.entry(edge.dst).or_default().push(position);
        }
    }
}
