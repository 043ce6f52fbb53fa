//! Named code elements and the snapshots they were parsed from
//!
//! The engine never parses source. An external [`ConstructSupplier`] is
//! handed a full-content snapshot and returns the named elements it found,
//! with character ranges. The results are cached per snapshot in a
//! [`SnapshotList`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::operation::{OperationLog, Timestamp};
use crate::restore::CodeRestorer;
use crate::task::{Cancelled, ProgressMonitor};

/// Parser output for one element of one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructFact {
    pub name: String,
    pub qualified_name: String,
    pub start: usize,
    pub end: usize,
}

/// A named code element at one snapshot of one file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Construct {
    pub path: String,
    pub snapshot_time: Timestamp,
    pub qualified_name: String,
    pub name: String,
    pub start: usize,
    pub end: usize,
}

impl Construct {
    pub fn from_fact(path: &str, snapshot_time: Timestamp, fact: ConstructFact) -> Self {
        Construct {
            path: path.to_string(),
            snapshot_time,
            qualified_name: fact.qualified_name,
            name: fact.name,
            start: fact.start,
            end: fact.end,
        }
    }

    /// Name without its qualifying prefix
    pub fn simple_name(&self) -> &str {
        &self.name
    }

    /// `[start, end)` lies inside this element's range
    pub fn encloses(&self, start: usize, end: usize) -> bool {
        self.start <= start && end <= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// External analyzer that finds named elements in a snapshot
pub trait ConstructSupplier: Send + Sync {
    fn constructs(
        &self,
        path: &str,
        index: usize,
        time: Timestamp,
        code: &str,
    ) -> anyhow::Result<Vec<ConstructFact>>;

    /// Times the supplier wants snapshots at, besides restoration points
    fn snapshot_times(&self, _path: &str) -> Vec<Timestamp> {
        Vec::new()
    }
}

impl<F> ConstructSupplier for F
where
    F: Fn(&str, usize, Timestamp, &str) -> anyhow::Result<Vec<ConstructFact>> + Send + Sync,
{
    fn constructs(
        &self,
        path: &str,
        index: usize,
        time: Timestamp,
        code: &str,
    ) -> anyhow::Result<Vec<ConstructFact>> {
        self(path, index, time, code)
    }
}

/// Supplier that finds nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConstructs;

impl ConstructSupplier for NoConstructs {
    fn constructs(&self, _: &str, _: usize, _: Timestamp, _: &str) -> anyhow::Result<Vec<ConstructFact>> {
        Ok(Vec::new())
    }
}

/// Pre-computed parser output keyed by path and snapshot time
///
/// Snapshots missing from the table have no elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstructTable {
    entries: BTreeMap<String, BTreeMap<Timestamp, Vec<ConstructFact>>>,
}

impl ConstructTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, time: Timestamp, facts: Vec<ConstructFact>) {
        self.entries
            .entry(path.to_string())
            .or_default()
            .insert(time, facts);
    }

    /// Snapshot times recorded for `path`
    pub fn times(&self, path: &str) -> Vec<Timestamp> {
        self.entries
            .get(path)
            .map(|by_time| by_time.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl ConstructSupplier for ConstructTable {
    fn constructs(
        &self,
        path: &str,
        _index: usize,
        time: Timestamp,
        _code: &str,
    ) -> anyhow::Result<Vec<ConstructFact>> {
        Ok(self
            .entries
            .get(path)
            .and_then(|by_time| by_time.get(&time))
            .cloned()
            .unwrap_or_default())
    }

    fn snapshot_times(&self, path: &str) -> Vec<Timestamp> {
        self.times(path)
    }
}

/// Elements found in one full-content snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Log index the snapshot was taken at
    pub index: usize,
    pub time: Timestamp,
    pub constructs: Vec<Construct>,
}

/// Parsed snapshots of one file, in log order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotList {
    snapshots: Vec<Snapshot>,
}

impl SnapshotList {
    /// Parse every scheduled snapshot of `log`
    ///
    /// Snapshots are taken at every restoration point, at every snapshot time
    /// listed in `extra_times`, and every `snapshot_interval` edit operations
    /// when configured. Non-restoration-point snapshots are restored first.
    pub fn collect(
        log: &OperationLog,
        supplier: &dyn ConstructSupplier,
        config: &BuildConfig,
        extra_times: &[Timestamp],
        monitor: &dyn ProgressMonitor,
    ) -> Result<Result<SnapshotList, Cancelled>, BuildError> {
        let indices = Self::schedule(log, config, extra_times);
        let restorer = CodeRestorer::new(log);
        let mut snapshots = Vec::with_capacity(indices.len());

        let mut previous: Option<(usize, String)> = None;
        for index in indices {
            if monitor.is_cancelled() {
                return Ok(Err(Cancelled));
            }
            let recorded = log.operations()[index].snapshot_code();
            let restored = match (recorded, &previous) {
                (Some(code), _) => Ok(code.to_string()),
                (None, Some((prev_index, prev_code))) => {
                    restorer.replay_between(prev_code, *prev_index, index)
                }
                (None, None) => restorer.restore(index),
            }
            .or_else(|_| restorer.restore(index))
            .map_err(|source| BuildError::Restore {
                path: log.path().to_string(),
                index,
                source,
            })?;

            let time = log.operations()[index].time;
            let facts = supplier
                .constructs(log.path(), index, time, &restored)
                .map_err(|source| BuildError::Supplier {
                    path: log.path().to_string(),
                    index,
                    source,
                })?;

            snapshots.push(Snapshot {
                index,
                time,
                constructs: facts
                    .into_iter()
                    .map(|fact| Construct::from_fact(log.path(), time, fact))
                    .collect(),
            });
            previous = Some((index, restored));
            monitor.report_progress(1);
        }

        Ok(Ok(SnapshotList { snapshots }))
    }

    /// Log indices a build will parse, ascending
    pub fn schedule(log: &OperationLog, config: &BuildConfig, extra_times: &[Timestamp]) -> Vec<usize> {
        let mut indices: BTreeSet<usize> = log.restoration_points().into_iter().collect();

        indices.extend(extra_times.iter().filter_map(|&t| log.index_at(t)));

        if let Some(interval) = config.snapshot_interval.filter(|&n| n > 0) {
            indices.extend(
                log.edit_indices()
                    .enumerate()
                    .filter(|(ordinal, _)| (ordinal + 1) % interval == 0)
                    .map(|(_, index)| index),
            );
        }
        indices.into_iter().collect()
    }

    pub fn from_snapshots(mut snapshots: Vec<Snapshot>) -> Self {
        snapshots.sort_by_key(|s| s.index);
        SnapshotList { snapshots }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }

    pub fn get(&self, position: usize) -> Option<&Snapshot> {
        self.snapshots.get(position)
    }

    /// Position of the newest snapshot taken strictly before log `index`
    pub fn position_before(&self, index: usize) -> Option<usize> {
        self.snapshots
            .partition_point(|s| s.index < index)
            .checked_sub(1)
    }

    /// Position of the newest snapshot taken at or before log `index`
    pub fn position_at_or_before(&self, index: usize) -> Option<usize> {
        self.snapshots
            .partition_point(|s| s.index <= index)
            .checked_sub(1)
    }

    /// Position of the oldest snapshot taken at or after log `index`
    pub fn position_at_or_after(&self, index: usize) -> Option<usize> {
        let position = self.snapshots.partition_point(|s| s.index < index);
        (position < self.snapshots.len()).then_some(position)
    }

    /// Position of the snapshot holding `construct`
    pub fn position_of(&self, construct: &Construct) -> Option<usize> {
        self.snapshots
            .iter()
            .position(|s| s.time == construct.snapshot_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use crate::task::NullMonitor;

    fn fact(name: &str, start: usize, end: usize) -> ConstructFact {
        ConstructFact {
            name: name.to_string(),
            qualified_name: format!("A.{}", name),
            start,
            end,
        }
    }

    #[test]
    fn test_schedule_includes_periodic_snapshots() {
        let log = OperationLog::from_operations(vec![
            Operation::snapshot(0, "a.rs", ""),
            Operation::document(1, "a.rs", 0, "a", ""),
            Operation::document(2, "a.rs", 1, "b", ""),
            Operation::command(3, "a.rs", "save"),
            Operation::document(4, "a.rs", 2, "c", ""),
            Operation::document(5, "a.rs", 3, "d", ""),
        ])
        .unwrap();

        let config = BuildConfig {
            snapshot_interval: Some(2),
            ..BuildConfig::default()
        };
        assert_eq!(SnapshotList::schedule(&log, &config, &[]), vec![0, 2, 5]);
        assert_eq!(
            SnapshotList::schedule(&log, &BuildConfig::default(), &[Timestamp(4)]),
            vec![0, 4]
        );
    }

    #[test]
    fn test_collect_passes_restored_text_to_supplier() {
        let log = OperationLog::from_operations(vec![
            Operation::snapshot(0, "a.rs", "m(){}"),
            Operation::document(1, "a.rs", 0, "n(){}", ""),
        ])
        .unwrap();
        let supplier = |_: &str, index: usize, _: Timestamp, code: &str| {
            assert_eq!(code, if index == 0 { "m(){}" } else { "n(){}m(){}" });
            Ok(vec![fact("m", code.len() - 5, code.len())])
        };

        let list = SnapshotList::collect(&log, &supplier, &BuildConfig::default(), &[Timestamp(1)], &NullMonitor)
            .unwrap()
            .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).unwrap().constructs[0].start, 5);
        assert_eq!(list.get(1).unwrap().constructs[0].snapshot_time, Timestamp(1));
    }

    #[test]
    fn test_supplier_failure_is_build_error() {
        let log = OperationLog::from_operations(vec![Operation::snapshot(0, "a.rs", "")]).unwrap();
        let failing =
            |_: &str, _: usize, _: Timestamp, _: &str| -> anyhow::Result<Vec<ConstructFact>> {
                Err(anyhow::anyhow!("parse error"))
            };
        let result =
            SnapshotList::collect(&log, &failing, &BuildConfig::default(), &[], &NullMonitor);
        assert!(matches!(result, Err(BuildError::Supplier { index: 0, .. })));
    }

    #[test]
    fn test_construct_table_lookup() {
        let mut table = ConstructTable::new();
        table.insert("a.rs", Timestamp(3), vec![fact("m", 0, 4)]);
        assert_eq!(table.constructs("a.rs", 0, Timestamp(3), "").unwrap().len(), 1);
        assert!(table.constructs("a.rs", 0, Timestamp(4), "").unwrap().is_empty());
        assert_eq!(table.times("a.rs"), vec![Timestamp(3)]);
    }

    #[test]
    fn test_positions() {
        let list = SnapshotList::from_snapshots(vec![
            Snapshot { index: 4, time: Timestamp(40), constructs: vec![] },
            Snapshot { index: 0, time: Timestamp(0), constructs: vec![] },
        ]);
        assert_eq!(list.position_at_or_before(3), Some(0));
        assert_eq!(list.position_at_or_before(4), Some(1));
        assert_eq!(list.position_before(4), Some(0));
        assert_eq!(list.position_before(0), None);
        assert_eq!(list.position_at_or_after(1), Some(1));
        assert_eq!(list.position_at_or_after(5), None);
    }
}
