//! Code restoration
//!
//! Rebuilds the exact text of a file at any log index by replaying the
//! operations between that index and the nearest restoration point.
//!
//! # Behavior
//! 1. Find the restoration point (snapshot with content) before the index,
//!    falling back to the one after it
//! 2. Replay forward (point < index) or backward (point > index)
//! 3. Every step checks that the text it removes equals the logged text;
//!    a mismatch makes the index not restorable
//!
//! Copy, Command, Refactor and content-less snapshots are no-ops during replay.

pub mod consistency;

use crate::error::RestoreError;
use crate::operation::{DocumentEdit, Operation, OperationKind, OperationLog, Timestamp};
use crate::text;

pub use consistency::{ConsistencyChecker, ConsistencyReport, ConsistencyViolation};

/// Apply a Document edit to `code`
///
/// Replaces `[start, start + deleted.len)` with the inserted text after
/// checking the slice equals the logged deleted text.
pub fn apply_forward(code: &str, edit: &DocumentEdit, time: Timestamp) -> Result<String, RestoreError> {
    replace_checked(code, edit.start, &edit.deleted, &edit.inserted, time)
}

/// Undo a Document edit on `code`
///
/// Replaces `[start, start + inserted.len)` with the deleted text after
/// checking the slice equals the logged inserted text.
pub fn apply_backward(code: &str, edit: &DocumentEdit, time: Timestamp) -> Result<String, RestoreError> {
    replace_checked(code, edit.start, &edit.inserted, &edit.deleted, time)
}

fn replace_checked(
    code: &str,
    start: usize,
    expected: &str,
    replacement: &str,
    time: Timestamp,
) -> Result<String, RestoreError> {
    let expected_len = text::char_len(expected);
    let range = text::byte_range(code, start, expected_len).ok_or_else(|| {
        RestoreError::SpanOutOfBounds {
            time,
            start,
            end: start.saturating_add(expected_len),
            len: text::char_len(code),
        }
    })?;

    let found = &code[range.clone()];
    if found != expected {
        return Err(RestoreError::TextMismatch {
            time,
            offset: start,
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }

    let mut out = String::with_capacity(code.len() - range.len() + replacement.len());
    out.push_str(&code[..range.start]);
    out.push_str(replacement);
    out.push_str(&code[range.end..]);
    Ok(out)
}

/// Direction of a single replay step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Apply one operation in `direction`; non-Document operations leave the text unchanged
pub fn step(code: &str, op: &Operation, direction: Direction) -> Result<String, RestoreError> {
    match &op.kind {
        OperationKind::Document(edit) => match direction {
            Direction::Forward => apply_forward(code, edit, op.time),
            Direction::Backward => apply_backward(code, edit, op.time),
        },
        _ => Ok(code.to_string()),
    }
}

/// Restores file text at arbitrary indices of one log
#[derive(Debug, Clone, Copy)]
pub struct CodeRestorer<'a> {
    log: &'a OperationLog,
}

impl<'a> CodeRestorer<'a> {
    pub fn new(log: &'a OperationLog) -> Self {
        CodeRestorer { log }
    }

    pub fn log(&self) -> &'a OperationLog {
        self.log
    }

    /// Text of the file right after the operation at `index` applied
    pub fn restore(&self, index: usize) -> Result<String, RestoreError> {
        self.check_index(index)?;
        let findex = self
            .log
            .restoration_point(index)
            .ok_or(RestoreError::NoRestorationPoint { index })?;
        let code = self.log.operations()[findex]
            .snapshot_code()
            .ok_or(RestoreError::NoRestorationPoint { index })?;

        self.replay_between(code, findex, index)
    }

    /// Text right after the operation with exactly this timestamp
    pub fn restore_at_time(&self, time: Timestamp) -> Result<String, RestoreError> {
        let index = self
            .log
            .last_index_at_or_before(time)
            .ok_or(RestoreError::IndexOutOfRange {
                index: 0,
                len: self.log.len(),
            })?;
        self.restore(index)
    }

    /// Restore `target_index` from text already known at `cur_index`
    ///
    /// Adjacent indices take a single replay step; anything else restarts
    /// from the nearest restoration point.
    pub fn restore_from(
        &self,
        cur_code: &str,
        cur_index: usize,
        target_index: usize,
    ) -> Result<String, RestoreError> {
        self.check_index(cur_index)?;
        self.check_index(target_index)?;

        if target_index == cur_index {
            Ok(cur_code.to_string())
        } else if target_index == cur_index + 1 {
            let next = &self.log.operations()[target_index];
            if let Some(code) = next.snapshot_code() {
                return Ok(code.to_string());
            }
            step(cur_code, next, Direction::Forward)
        } else if target_index + 1 == cur_index {
            let here = &self.log.operations()[cur_index];
            if let Some(code) = self.log.operations()[target_index].snapshot_code() {
                return Ok(code.to_string());
            }
            step(cur_code, here, Direction::Backward)
        } else {
            self.restore(target_index)
        }
    }

    /// Replay from `from_code` (text at `from`) to the text at `to`
    pub fn replay_between(
        &self,
        from_code: &str,
        from: usize,
        to: usize,
    ) -> Result<String, RestoreError> {
        let ops = self.log.operations();
        let mut code = from_code.to_string();
        if from < to {
            for op in &ops[from + 1..=to] {
                code = step(&code, op, Direction::Forward)?;
            }
        } else {
            for op in ops[to + 1..=from].iter().rev() {
                code = step(&code, op, Direction::Backward)?;
            }
        }
        Ok(code)
    }

    /// Sequential replay of `[from, to]` using single steps
    pub fn replay(&self, from: usize, to: usize) -> Replay<'a> {
        Replay {
            restorer: *self,
            next: from,
            to,
            current: None,
            failed: false,
        }
    }

    fn check_index(&self, index: usize) -> Result<(), RestoreError> {
        if index >= self.log.len() {
            Err(RestoreError::IndexOutOfRange {
                index,
                len: self.log.len(),
            })
        } else {
            Ok(())
        }
    }
}

/// Iterator over `(index, code)` for consecutive indices
///
/// Stops after the first failure, which it yields.
pub struct Replay<'a> {
    restorer: CodeRestorer<'a>,
    next: usize,
    to: usize,
    current: Option<(usize, String)>,
    failed: bool,
}

impl Iterator for Replay<'_> {
    type Item = (usize, Result<String, RestoreError>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next > self.to {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let result = match &self.current {
            Some((cur_index, code)) => self.restorer.restore_from(code, *cur_index, index),
            None => self.restorer.restore(index),
        };
        match &result {
            Ok(code) => self.current = Some((index, code.clone())),
            Err(_) => self.failed = true,
        }
        Some((index, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Action;

    fn abc_log() -> OperationLog {
        OperationLog::from_operations(vec![
            Operation::snapshot(0, "a.rs", "abc"),
            Operation::document(1, "a.rs", 1, "X", ""),
            Operation::document(2, "a.rs", 2, "", "b"),
        ])
        .unwrap()
    }

    #[test]
    fn test_restore_insert_then_delete() {
        let log = abc_log();
        let restorer = CodeRestorer::new(&log);
        assert_eq!(restorer.restore(2).unwrap(), "aXc");
        assert_eq!(restorer.restore(1).unwrap(), "aXbc");
        assert_eq!(restorer.restore(0).unwrap(), "abc");
    }

    #[test]
    fn test_restore_backward_from_later_snapshot() {
        let log = OperationLog::from_operations(vec![
            Operation::document(1, "a.rs", 1, "X", ""),
            Operation::document(2, "a.rs", 2, "", "b"),
            Operation::snapshot(3, "a.rs", "aXc").with_action(Action::Save),
        ])
        .unwrap();
        let restorer = CodeRestorer::new(&log);
        assert_eq!(restorer.restore(1).unwrap(), "aXc");
        assert_eq!(restorer.restore(0).unwrap(), "aXbc");
    }

    #[test]
    fn test_forward_then_backward_is_identity() {
        let base = "fn main() { old(); }";
        let edit = DocumentEdit {
            start: 12,
            inserted: "new".into(),
            deleted: "old".into(),
        };
        let forward = apply_forward(base, &edit, Timestamp(1)).unwrap();
        assert_eq!(forward, "fn main() { new(); }");
        assert_eq!(apply_backward(&forward, &edit, Timestamp(1)).unwrap(), base);
    }

    #[test]
    fn test_edit_at_usize_max_is_out_of_bounds() {
        let log = OperationLog::from_operations(vec![
            Operation::snapshot(0, "a.rs", "abc"),
            Operation::document(1, "a.rs", usize::MAX, "", "b"),
        ])
        .unwrap();
        let err = CodeRestorer::new(&log).restore(1).unwrap_err();
        assert!(matches!(
            err,
            RestoreError::SpanOutOfBounds {
                start: usize::MAX,
                end: usize::MAX,
                len: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_mismatch_is_not_restorable() {
        let log = OperationLog::from_operations(vec![
            Operation::snapshot(0, "a.rs", "abc"),
            Operation::document(1, "a.rs", 0, "", "z"),
        ])
        .unwrap();
        let err = CodeRestorer::new(&log).restore(1).unwrap_err();
        assert!(matches!(err, RestoreError::TextMismatch { offset: 0, .. }));
    }

    #[test]
    fn test_span_past_end_is_not_restorable() {
        let log = OperationLog::from_operations(vec![
            Operation::snapshot(0, "a.rs", "ab"),
            Operation::document(1, "a.rs", 1, "", "bcd"),
        ])
        .unwrap();
        let err = CodeRestorer::new(&log).restore(1).unwrap_err();
        assert!(matches!(err, RestoreError::SpanOutOfBounds { len: 2, .. }));
    }

    #[test]
    fn test_missing_restoration_point() {
        let log =
            OperationLog::from_operations(vec![Operation::document(1, "a.rs", 0, "x", "")]).unwrap();
        assert_eq!(
            CodeRestorer::new(&log).restore(0),
            Err(RestoreError::NoRestorationPoint { index: 0 })
        );
        assert!(matches!(
            CodeRestorer::new(&log).restore(5),
            Err(RestoreError::IndexOutOfRange { index: 5, len: 1 })
        ));
    }

    #[test]
    fn test_copy_is_noop() {
        let log = OperationLog::from_operations(vec![
            Operation::snapshot(0, "a.rs", "abc"),
            Operation::copy(1, "a.rs", 0, "ab"),
        ])
        .unwrap();
        assert_eq!(CodeRestorer::new(&log).restore(1).unwrap(), "abc");
    }

    #[test]
    fn test_restore_from_adjacent_steps() {
        let log = abc_log();
        let restorer = CodeRestorer::new(&log);
        assert_eq!(restorer.restore_from("abc", 0, 1).unwrap(), "aXbc");
        assert_eq!(restorer.restore_from("aXc", 2, 1).unwrap(), "aXbc");
        assert_eq!(restorer.restore_from("ignored", 2, 0).unwrap(), "abc");
    }

    #[test]
    fn test_replay_iterator() {
        let log = abc_log();
        let codes: Vec<String> = CodeRestorer::new(&log)
            .replay(0, 2)
            .map(|(_, code)| code.unwrap())
            .collect();
        assert_eq!(codes, vec!["abc", "aXbc", "aXc"]);
    }
}
