//! Registry of built project graphs
//!
//! One registry instance is created by the host and handed to whatever
//! needs graphs; there is no process-wide instance. Graphs are keyed by
//! project id, then by (file path, branch) inside the project.
//!
//! # Thread Safety
//!
//! The registry holds no locks. Mutating methods take `&mut self`; a host
//! that rebuilds graphs on worker threads wraps it in a `Mutex` or
//! `RwLock` and serializes rebuilds against queries per file graph.

use ahash::AHashMap;

use crate::graph::{FileGraph, ProjectGraph};
use crate::operation::Timestamp;

#[derive(Debug, Default)]
pub struct GraphRegistry {
    projects: AHashMap<String, ProjectGraph>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a project graph, returning the one it replaces
    pub fn install(&mut self, graph: ProjectGraph) -> Option<ProjectGraph> {
        tracing::debug!(project = graph.project(), files = graph.files().len(), "installing project graph");
        self.projects.insert(graph.project().to_string(), graph)
    }

    pub fn get(&self, project: &str) -> Option<&ProjectGraph> {
        self.projects.get(project)
    }

    pub fn get_mut(&mut self, project: &str) -> Option<&mut ProjectGraph> {
        self.projects.get_mut(project)
    }

    /// Project graph for `project`, created empty when absent
    pub fn project_mut(&mut self, project: &str) -> &mut ProjectGraph {
        self.projects
            .entry(project.to_string())
            .or_insert_with(|| ProjectGraph::new(project))
    }

    pub fn file(&self, project: &str, path: &str, branch: &str) -> Option<&FileGraph> {
        self.get(project)?.file(path, branch)
    }

    /// Clear one file graph; `false` when nothing was registered for it
    pub fn invalidate(&mut self, project: &str, path: &str, branch: &str) -> bool {
        self.projects
            .get_mut(project)
            .is_some_and(|graph| graph.invalidate(path, branch))
    }

    /// Whether the graph of `path` on `branch` is missing or older than
    /// `last_updated`
    pub fn needs_rebuild(
        &self,
        project: &str,
        path: &str,
        branch: &str,
        last_updated: Option<Timestamp>,
    ) -> bool {
        self.get(project)
            .map_or(true, |graph| graph.needs_rebuild(path, branch, last_updated))
    }

    pub fn remove(&mut self, project: &str) -> Option<ProjectGraph> {
        self.projects.remove(project)
    }

    pub fn projects(&self) -> impl Iterator<Item = &str> + '_ {
        self.projects.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::construct::NoConstructs;
    use crate::operation::{Operation, OperationLog};
    use crate::task::NullMonitor;

    fn log(path: &str) -> OperationLog {
        OperationLog::from_operations(vec![
            Operation::snapshot(0, path, "abc"),
            Operation::document(1, path, 1, "X", ""),
        ])
        .unwrap()
    }

    fn project(name: &str) -> ProjectGraph {
        ProjectGraph::build(name, &[log("a.rs"), log("b.rs")], &NoConstructs, &BuildConfig::default(), &NullMonitor)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_registries_are_independent() {
        let mut first = GraphRegistry::new();
        let second = GraphRegistry::new();
        first.install(project("p"));
        assert!(first.get("p").is_some());
        assert!(second.get("p").is_none());
        assert!(second.is_empty());
    }

    #[test]
    fn test_needs_rebuild_follows_last_build() {
        let mut registry = GraphRegistry::new();
        assert!(registry.needs_rebuild("p", "a.rs", "", Some(Timestamp(1))));

        registry.install(project("p"));
        assert!(!registry.needs_rebuild("p", "a.rs", "", Some(Timestamp(1))));
        assert!(registry.needs_rebuild("p", "a.rs", "", Some(Timestamp(2))));
        assert!(registry.needs_rebuild("p", "c.rs", "", Some(Timestamp(1))));
    }

    #[test]
    fn test_invalidate_clears_one_file() {
        let mut registry = GraphRegistry::new();
        registry.install(project("p"));

        assert!(registry.invalidate("p", "a.rs", ""));
        assert!(registry.file("p", "a.rs", "").is_some_and(|graph| graph.is_empty()));
        assert!(registry.needs_rebuild("p", "a.rs", "", Some(Timestamp(1))));
        assert!(!registry.needs_rebuild("p", "b.rs", "", Some(Timestamp(1))));
        assert!(!registry.invalidate("p", "missing.rs", ""));
        assert!(!registry.invalidate("other", "a.rs", ""));
    }

    #[test]
    fn test_install_replaces_and_remove_returns() {
        let mut registry = GraphRegistry::new();
        assert!(registry.install(project("p")).is_none());
        assert!(registry.install(project("p")).is_some());
        registry.project_mut("q");
        assert_eq!(registry.len(), 2);
        assert!(registry.remove("p").is_some());
        assert_eq!(registry.projects().collect::<Vec<_>>(), vec!["q"]);
    }
}
