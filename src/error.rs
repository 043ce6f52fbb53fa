//! Error types for log, restoration and graph construction failures
//!
//! Every variant maps to a stable code in [`crate::error_codes`].

use crate::error_codes::*;
use crate::operation::Timestamp;

/// Operation log rejected an operation
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("duplicate timestamp {time} in log for {path}")]
    DuplicateTime { path: String, time: Timestamp },

    #[error("operation at {time} is older than the newest logged operation ({last})")]
    OutOfOrder { last: Timestamp, time: Timestamp },

    #[error("operation at {time} belongs to {found}, log is for {expected}")]
    ForeignResource {
        expected: String,
        found: String,
        time: Timestamp,
    },
}

impl LogError {
    pub fn code(&self) -> &'static str {
        match self {
            LogError::DuplicateTime { .. } => EH_LOG_001_DUPLICATE_TIME,
            LogError::OutOfOrder { .. } => EH_LOG_002_OUT_OF_ORDER,
            LogError::ForeignResource { .. } => EH_LOG_003_FOREIGN_RESOURCE,
        }
    }
}

/// Text at an index is not restorable
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RestoreError {
    #[error("no restoration point on either side of index {index}")]
    NoRestorationPoint { index: usize },

    #[error("index {index} is out of range (log has {len} operations)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("text at offset {offset} does not match operation at {time}: expected {expected:?}, found {found:?}")]
    TextMismatch {
        time: Timestamp,
        offset: usize,
        expected: String,
        found: String,
    },

    #[error("operation at {time} spans [{start}, {end}) past the end of a {len}-character text")]
    SpanOutOfBounds {
        time: Timestamp,
        start: usize,
        end: usize,
        len: usize,
    },
}

impl RestoreError {
    pub fn code(&self) -> &'static str {
        match self {
            RestoreError::NoRestorationPoint { .. } => EH_RST_001_NO_RESTORATION_POINT,
            RestoreError::IndexOutOfRange { .. } => EH_RST_002_INDEX_OUT_OF_RANGE,
            RestoreError::TextMismatch { .. } => EH_RST_003_TEXT_MISMATCH,
            RestoreError::SpanOutOfBounds { .. } => EH_RST_004_SPAN_OUT_OF_BOUNDS,
        }
    }
}

/// Graph construction failed; the partial graph was discarded
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("snapshot at index {index} of {path} is not restorable: {source}")]
    Restore {
        path: String,
        index: usize,
        #[source]
        source: RestoreError,
    },

    #[error("construct supplier failed for {path} at index {index}: {source}")]
    Supplier {
        path: String,
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid log: {0}")]
    InvalidLog(#[from] LogError),

    #[error("build task ended without an outcome")]
    TaskLost,
}

impl BuildError {
    pub fn code(&self) -> &'static str {
        match self {
            BuildError::Restore { source, .. } => source.code(),
            BuildError::Supplier { .. } => EH_GR_001_SUPPLIER_FAILED,
            BuildError::InvalidLog(_) => EH_GR_002_INVALID_LOG,
            BuildError::TaskLost => EH_GR_003_TASK_LOST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_variant() {
        let err = RestoreError::NoRestorationPoint { index: 3 };
        assert_eq!(err.code(), EH_RST_001_NO_RESTORATION_POINT);
        assert!(err.to_string().contains("index 3"));

        let build = BuildError::Restore {
            path: "a.rs".into(),
            index: 3,
            source: err,
        };
        assert_eq!(build.code(), EH_RST_001_NO_RESTORATION_POINT);

        let log: BuildError = LogError::OutOfOrder {
            last: Timestamp(5),
            time: Timestamp(4),
        }
        .into();
        assert_eq!(log.code(), EH_GR_002_INVALID_LOG);
    }
}
