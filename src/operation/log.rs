//! Time-ordered operation log for one file
//!
//! The log is append-only: indices already handed out never change meaning.
//! Loaders may hand operations over in any order; [`OperationLog::from_operations`]
//! sorts them and rejects duplicate timestamps.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use super::{Operation, Timestamp};
use crate::error::LogError;
use crate::offset::EditSpan;

/// Ordered operations of one (path, branch)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLog {
    path: String,
    branch: String,
    operations: Vec<Operation>,
}

impl OperationLog {
    /// Create an empty log for `path` on `branch`
    pub fn new(path: &str, branch: &str) -> Self {
        OperationLog {
            path: path.to_string(),
            branch: branch.to_string(),
            operations: Vec::new(),
        }
    }

    /// Build a log from operations in any order
    ///
    /// The path and branch are taken from the first operation. Every
    /// operation must belong to the same resource, and timestamps must be
    /// unique.
    pub fn from_operations(mut operations: Vec<Operation>) -> Result<Self, LogError> {
        let (path, branch) = match operations.first() {
            Some(op) => (op.path.clone(), op.branch.clone()),
            None => return Ok(OperationLog::default()),
        };

        if let Some(foreign) = operations
            .iter()
            .find(|op| op.path != path || op.branch != branch)
        {
            return Err(LogError::ForeignResource {
                expected: path,
                found: foreign.path.clone(),
                time: foreign.time,
            });
        }

        operations.sort_by_key(|op| op.time);
        if let Some(pair) = operations.windows(2).find(|w| w[0].time == w[1].time) {
            return Err(LogError::DuplicateTime {
                path,
                time: pair[0].time,
            });
        }

        Ok(OperationLog {
            path,
            branch,
            operations,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Operation> {
        self.operations.get(index)
    }

    /// Append an operation newer than every logged one
    pub fn append(&mut self, op: Operation) -> Result<usize, LogError> {
        if self.operations.is_empty() && self.path.is_empty() {
            self.path = op.path.clone();
            self.branch = op.branch.clone();
        }
        if op.path != self.path || op.branch != self.branch {
            return Err(LogError::ForeignResource {
                expected: self.path.clone(),
                found: op.path,
                time: op.time,
            });
        }
        if let Some(last) = self.operations.last() {
            if op.time == last.time {
                return Err(LogError::DuplicateTime {
                    path: self.path.clone(),
                    time: op.time,
                });
            }
            if op.time < last.time {
                return Err(LogError::OutOfOrder {
                    last: last.time,
                    time: op.time,
                });
            }
        }
        self.operations.push(op);
        Ok(self.operations.len() - 1)
    }

    /// Timestamp of the newest operation
    pub fn last_updated(&self) -> Option<Timestamp> {
        self.operations.last().map(|op| op.time)
    }

    /// Timestamp of the oldest operation
    pub fn first_time(&self) -> Option<Timestamp> {
        self.operations.first().map(|op| op.time)
    }

    /// Operation with exactly this timestamp
    pub fn operation_at(&self, time: Timestamp) -> Option<&Operation> {
        self.index_at(time).map(|index| &self.operations[index])
    }

    /// Index of the operation with exactly this timestamp
    pub fn index_at(&self, time: Timestamp) -> Option<usize> {
        self.operations.binary_search_by_key(&time, |op| op.time).ok()
    }

    /// Index of the newest operation at or before `time`
    pub fn last_index_at_or_before(&self, time: Timestamp) -> Option<usize> {
        let after = self.operations.partition_point(|op| op.time <= time);
        after.checked_sub(1)
    }

    /// Index of the oldest operation at or after `time`
    pub fn first_index_at_or_after(&self, time: Timestamp) -> Option<usize> {
        let index = self.operations.partition_point(|op| op.time < time);
        (index < self.operations.len()).then_some(index)
    }

    /// Nearest restoration point at or before `index`
    pub fn restoration_point_before(&self, index: usize) -> Option<usize> {
        if self.operations.is_empty() {
            return None;
        }
        let from = index.min(self.operations.len() - 1);
        (0..=from)
            .rev()
            .find(|&i| self.operations[i].is_restoration_point())
    }

    /// Nearest restoration point at or after `index`
    pub fn restoration_point_after(&self, index: usize) -> Option<usize> {
        (index..self.operations.len()).find(|&i| self.operations[i].is_restoration_point())
    }

    /// Restoration point before `index`, falling back to the one after
    pub fn restoration_point(&self, index: usize) -> Option<usize> {
        self.restoration_point_before(index)
            .or_else(|| self.restoration_point_after(index))
    }

    /// Indices of every restoration point, in order
    pub fn restoration_points(&self) -> Vec<usize> {
        self.operations
            .iter()
            .enumerate()
            .filter(|(_, op)| op.is_restoration_point())
            .map(|(i, _)| i)
            .collect()
    }

    /// Operations in the closed index range `[from, to]`
    ///
    /// Out-of-range bounds are clamped; an inverted range is empty.
    pub fn slice(&self, from: usize, to: usize) -> &[Operation] {
        if from > to || from >= self.operations.len() {
            return &[];
        }
        let to = to.min(self.operations.len() - 1);
        &self.operations[from..=to]
    }

    /// Edit spans of the Document/Copy operations in `range`, in order
    pub fn edit_spans(&self, range: RangeInclusive<usize>) -> Vec<EditSpan> {
        self.slice(*range.start(), *range.end())
            .iter()
            .filter_map(Operation::edit_span)
            .collect()
    }

    /// Indices of Document/Copy operations
    pub fn edit_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.operations
            .iter()
            .enumerate()
            .filter(|(_, op)| op.is_edit())
            .map(|(i, _)| i)
    }

    /// Document and Copy operations with their indices
    pub fn document_operations(&self) -> impl Iterator<Item = (usize, &Operation)> + '_ {
        self.operations
            .iter()
            .enumerate()
            .filter(|(_, op)| op.is_edit())
    }

    /// Every operation logged as part of the gesture containing `time`
    pub fn compound_group(&self, time: Timestamp) -> Vec<&Operation> {
        let Some(op) = self.operation_at(time) else {
            return Vec::new();
        };
        let key = op.compound.unwrap_or(op.time);
        self.operations
            .iter()
            .filter(|other| other.compound.unwrap_or(other.time) == key)
            .collect()
    }
}

impl<'a> IntoIterator for &'a OperationLog {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}
