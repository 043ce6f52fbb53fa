//! Stable error codes for edit-history failures
//!
//! Error codes follow the pattern: EH-{CATEGORY}-{3-digit number}
//!
//! Categories (1-3 uppercase letters):
//! - LOG: Operation log errors (ordering, duplicate timestamps)
//! - RST: Restoration errors (missing restoration point, replay mismatch)
//! - CHK: Consistency check violations
//! - GR: Graph construction errors
//!
//! Each error code is stable and should not be reused.

/// Two operations share a timestamp on the same (path, branch)
pub const EH_LOG_001_DUPLICATE_TIME: &str = "EH-LOG-001";

/// Appended operation is not newer than the last logged one
pub const EH_LOG_002_OUT_OF_ORDER: &str = "EH-LOG-002";

/// Operation belongs to a different resource or branch
pub const EH_LOG_003_FOREIGN_RESOURCE: &str = "EH-LOG-003";

/// No snapshot with full content on either side of the index
pub const EH_RST_001_NO_RESTORATION_POINT: &str = "EH-RST-001";

/// Requested index is past the end of the log
pub const EH_RST_002_INDEX_OUT_OF_RANGE: &str = "EH-RST-002";

/// Text slice at the recorded offset differs from the logged text
pub const EH_RST_003_TEXT_MISMATCH: &str = "EH-RST-003";

/// Recorded span runs past the end of the running text
pub const EH_RST_004_SPAN_OUT_OF_BOUNDS: &str = "EH-RST-004";

/// Forward and backward replays disagree for the same instant
pub const EH_CHK_001_DIVERGENT_RESTORATION: &str = "EH-CHK-001";

/// Replayed step failed while checking the log
pub const EH_CHK_002_REPLAY_FAILED: &str = "EH-CHK-002";

/// Construct supplier could not analyze a snapshot
pub const EH_GR_001_SUPPLIER_FAILED: &str = "EH-GR-001";

/// Graph construction hit an invalid log
pub const EH_GR_002_INVALID_LOG: &str = "EH-GR-002";

/// Background build task terminated without reporting an outcome
pub const EH_GR_003_TASK_LOST: &str = "EH-GR-003";

/// Error code documentation
///
/// | Code | Description | Remediation |
/// |------|-------------|-------------|
/// | EH-LOG-001 | Duplicate timestamp | Fix the loader; timestamps are unique per file and branch |
/// | EH-LOG-002 | Out-of-order append | Append only after the newest timestamp |
/// | EH-LOG-003 | Foreign resource | Route the operation to its own file log |
/// | EH-RST-001 | No restoration point | The log needs at least one snapshot with content |
/// | EH-RST-002 | Index out of range | Query an index below `len()` |
/// | EH-RST-003 | Text mismatch | Run `edithist check`; the log is corrupt past this time |
/// | EH-RST-004 | Span out of bounds | Run `edithist check`; the log is corrupt past this time |
/// | EH-CHK-001 | Divergent restoration | Inspect both texts in the report |
/// | EH-CHK-002 | Replay failed during check | See the embedded restore error |
/// | EH-GR-001 | Supplier failed | Check the construct table for the snapshot |
/// | EH-GR-002 | Invalid log | Rebuild the log from its source |
/// | EH-GR-003 | Task lost | The build thread panicked; rerun the build |
pub const ERROR_CODE_DOCUMENTATION: &str = "Error code documentation available in source";
