//! Log consistency checking
//!
//! Replays the whole log segment by segment. Each segment runs between two
//! neighbouring restoration points and is replayed twice: forward from the
//! earlier snapshot and backward from the later one. Every step verifies the
//! text it removes, and each replay must land exactly on the other snapshot's
//! content.
//!
//! A violation marks the report as failed but does not stop the check; the
//! next segment starts fresh from its own snapshot.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{step, Direction};
use crate::error::RestoreError;
use crate::error_codes::*;
use crate::operation::{OperationLog, Timestamp};
use crate::task::{Cancelled, ProgressMonitor};

/// One problem found while replaying a log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyViolation {
    /// The log stores no full content anywhere
    NoRestorationPoint { path: String },

    /// A replay step could not apply between `from` and `to`
    ReplayFailed {
        from: Timestamp,
        to: Timestamp,
        direction: String,
        code: String,
        message: String,
    },

    /// Replaying across a segment does not reproduce the snapshot at `at`
    Divergent {
        from: Timestamp,
        to: Timestamp,
        at: Timestamp,
        replayed: String,
        recorded: String,
    },
}

impl ConsistencyViolation {
    fn replay_failed(from: Timestamp, to: Timestamp, direction: Direction, err: &RestoreError) -> Self {
        ConsistencyViolation::ReplayFailed {
            from,
            to,
            direction: match direction {
                Direction::Forward => "forward".to_string(),
                Direction::Backward => "backward".to_string(),
            },
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ConsistencyViolation::NoRestorationPoint { .. } => EH_RST_001_NO_RESTORATION_POINT,
            ConsistencyViolation::ReplayFailed { .. } => EH_CHK_002_REPLAY_FAILED,
            ConsistencyViolation::Divergent { .. } => EH_CHK_001_DIVERGENT_RESTORATION,
        }
    }

    /// Offending time range, if the violation has one
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        match self {
            ConsistencyViolation::NoRestorationPoint { .. } => None,
            ConsistencyViolation::ReplayFailed { from, to, .. }
            | ConsistencyViolation::Divergent { from, to, .. } => Some((*from, *to)),
        }
    }
}

/// Result of checking one log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub path: String,
    /// Replay steps verified, both directions counted
    pub steps_checked: usize,
    pub segments_checked: usize,
    pub violations: Vec<ConsistencyViolation>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn total_issues(&self) -> usize {
        self.violations.len()
    }
}

/// Verifies that a log replays consistently in both directions
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyChecker;

impl ConsistencyChecker {
    pub fn new() -> Self {
        ConsistencyChecker
    }

    /// Check one log
    pub fn check(
        &self,
        log: &OperationLog,
        monitor: &dyn ProgressMonitor,
    ) -> Result<ConsistencyReport, Cancelled> {
        monitor.begin_task("check", log.len() * 2);
        let report = self.inspect(log, monitor)?;
        monitor.done();
        Ok(report)
    }

    /// Check many logs in parallel under one progress task
    pub fn check_all(
        &self,
        logs: &[OperationLog],
        monitor: &dyn ProgressMonitor,
    ) -> Result<Vec<ConsistencyReport>, Cancelled> {
        let total = logs.iter().map(|log| log.len() * 2).sum();
        monitor.begin_task("check", total);
        let reports = logs
            .par_iter()
            .map(|log| self.inspect(log, monitor))
            .collect::<Result<Vec<_>, _>>()?;
        monitor.done();
        Ok(reports)
    }

    /// Replay one log, reporting steps but never starting or ending a task
    fn inspect(
        &self,
        log: &OperationLog,
        monitor: &dyn ProgressMonitor,
    ) -> Result<ConsistencyReport, Cancelled> {
        let mut report = ConsistencyReport {
            path: log.path().to_string(),
            ..Default::default()
        };
        if log.is_empty() {
            return Ok(report);
        }

        let points = log.restoration_points();
        let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
            report.violations.push(ConsistencyViolation::NoRestorationPoint {
                path: log.path().to_string(),
            });
            tracing::warn!(path = log.path(), "log has no restoration point");
            return Ok(report);
        };

        // Operations before the first snapshot can only be reached backward.
        if first > 0 {
            self.verify_run(log, first, 0, Direction::Backward, &mut report, monitor)?;
        }

        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            report.segments_checked += 1;

            let forward = self.verify_run(log, a, b, Direction::Forward, &mut report, monitor)?;
            if let Some(replayed) = forward {
                self.compare(log, a, b, b, replayed, &mut report);
            }

            let backward = self.verify_run(log, b, a, Direction::Backward, &mut report, monitor)?;
            if let Some(replayed) = backward {
                self.compare(log, a, b, a, replayed, &mut report);
            }
        }

        if last + 1 < log.len() {
            self.verify_run(log, last, log.len() - 1, Direction::Forward, &mut report, monitor)?;
        }

        for violation in &report.violations {
            tracing::warn!(path = log.path(), code = violation.code(), ?violation, "consistency violation");
        }
        Ok(report)
    }

    /// Replay from restoration point `from` to index `to`, verifying each step
    ///
    /// Returns the replayed text, or `None` after recording a failed step.
    fn verify_run(
        &self,
        log: &OperationLog,
        from: usize,
        to: usize,
        direction: Direction,
        report: &mut ConsistencyReport,
        monitor: &dyn ProgressMonitor,
    ) -> Result<Option<String>, Cancelled> {
        let ops = log.operations();
        let mut code = ops[from].snapshot_code().unwrap_or_default().to_string();

        let indices: Box<dyn Iterator<Item = usize>> = match direction {
            Direction::Forward => Box::new(from + 1..=to),
            Direction::Backward => Box::new((to + 1..=from).rev()),
        };

        for index in indices {
            monitor.checkpoint()?;
            let op = &ops[index];
            match step(&code, op, direction) {
                Ok(next) => code = next,
                Err(err) => {
                    let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
                    report.violations.push(ConsistencyViolation::replay_failed(
                        ops[lo].time,
                        ops[hi].time,
                        direction,
                        &err,
                    ));
                    return Ok(None);
                }
            }
            report.steps_checked += 1;
            monitor.report_progress(1);
        }
        Ok(Some(code))
    }

    fn compare(
        &self,
        log: &OperationLog,
        a: usize,
        b: usize,
        at: usize,
        replayed: String,
        report: &mut ConsistencyReport,
    ) {
        let ops = log.operations();
        let recorded = ops[at].snapshot_code().unwrap_or_default();
        if replayed != recorded {
            report.violations.push(ConsistencyViolation::Divergent {
                from: ops[a].time,
                to: ops[b].time,
                at: ops[at].time,
                replayed,
                recorded: recorded.to_string(),
            });
        }
    }
}
