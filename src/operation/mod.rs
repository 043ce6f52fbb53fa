//! Operation model
//!
//! One logged change to one file: a document edit, a copy, a whole-file
//! snapshot, an editor command or a refactoring. Only [`DocumentEdit`] mutates
//! text; [`FileSnapshot`]s carrying content are restoration points.
//!
//! # Offset convention
//!
//! All offsets and lengths count characters (Unicode scalar values), never
//! UTF-8 bytes. See [`crate::text`] for the conversion helpers.

pub mod log;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::offset::EditSpan;
use crate::text::char_len;

pub use log::OperationLog;

/// Logical timestamp, unique per (path, branch)
///
/// Milliseconds since the Unix epoch in recorded logs, but only the total
/// order matters to the engine.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn millis(self) -> i64 {
        self.0
    }

    /// Wall-clock view of the timestamp, if it is in chrono's range
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Timestamp(value)
    }
}

/// Variant tag of an [`Operation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Document,
    Copy,
    FileSnapshot,
    Command,
    Refactor,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationType::Document => "Document",
            OperationType::Copy => "Copy",
            OperationType::FileSnapshot => "FileSnapshot",
            OperationType::Command => "Command",
            OperationType::Refactor => "Refactor",
        };
        write!(f, "{}", s)
    }
}

/// User gesture that produced an operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Plain typing or deleting
    #[default]
    Edit,
    Cut,
    Paste,
    Copy,
    Undo,
    Redo,
    /// File added to the workspace
    Add,
    Remove,
    Open,
    Close,
    Save,
    Activate,
    Rename,
    Move,
    Execute,
    Refactor,
    #[serde(other)]
    Unknown,
}

impl Action {
    /// Snapshot actions that are expected to carry the full file content
    pub fn stores_content(self) -> bool {
        matches!(
            self,
            Action::Add | Action::Open | Action::Close | Action::Save | Action::Activate
        )
    }
}

/// Text insertion, deletion or replacement at `start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEdit {
    pub start: usize,
    #[serde(default)]
    pub inserted: String,
    #[serde(default)]
    pub deleted: String,
}

impl DocumentEdit {
    pub fn inserted_len(&self) -> usize {
        char_len(&self.inserted)
    }

    pub fn deleted_len(&self) -> usize {
        char_len(&self.deleted)
    }

    /// Pure insertion (nothing deleted)
    pub fn is_insertion(&self) -> bool {
        self.deleted.is_empty() && !self.inserted.is_empty()
    }

    /// Pure deletion (nothing inserted)
    pub fn is_deletion(&self) -> bool {
        self.inserted.is_empty() && !self.deleted.is_empty()
    }

    pub fn is_replacement(&self) -> bool {
        !self.inserted.is_empty() && !self.deleted.is_empty()
    }
}

/// Text copied to the clipboard; never mutates content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyEdit {
    pub start: usize,
    pub copied: String,
}

impl CopyEdit {
    pub fn copied_len(&self) -> usize {
        char_len(&self.copied)
    }
}

/// Whole-file event; `code` is present only at restoration points
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Editor command, metadata only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOp {
    pub command_id: String,
}

/// Refactoring descriptor
///
/// Its textual effect is logged as accompanying [`DocumentEdit`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefactorOp {
    pub name: String,
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
    pub selection_start: usize,
    pub selection_len: usize,
}

/// Variant payload of an [`Operation`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OperationKind {
    Document(DocumentEdit),
    Copy(CopyEdit),
    FileSnapshot(FileSnapshot),
    Command(CommandOp),
    Refactor(RefactorOp),
}

/// One logged change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub time: Timestamp,
    pub path: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub action: Action,
    #[serde(default)]
    pub author: String,
    /// Timestamp of the gesture this operation belongs to, if grouped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compound: Option<Timestamp>,
    #[serde(flatten)]
    pub kind: OperationKind,
}

impl Operation {
    fn with_kind(time: impl Into<Timestamp>, path: &str, kind: OperationKind) -> Self {
        Operation {
            time: time.into(),
            path: path.to_string(),
            branch: String::new(),
            action: Action::default(),
            author: String::new(),
            compound: None,
            kind,
        }
    }

    pub fn document(
        time: impl Into<Timestamp>,
        path: &str,
        start: usize,
        inserted: &str,
        deleted: &str,
    ) -> Self {
        Self::with_kind(
            time,
            path,
            OperationKind::Document(DocumentEdit {
                start,
                inserted: inserted.to_string(),
                deleted: deleted.to_string(),
            }),
        )
    }

    pub fn copy(time: impl Into<Timestamp>, path: &str, start: usize, copied: &str) -> Self {
        Self::with_kind(
            time,
            path,
            OperationKind::Copy(CopyEdit {
                start,
                copied: copied.to_string(),
            }),
        )
        .with_action(Action::Copy)
    }

    /// Snapshot carrying full content (a restoration point)
    pub fn snapshot(time: impl Into<Timestamp>, path: &str, code: &str) -> Self {
        Self::with_kind(
            time,
            path,
            OperationKind::FileSnapshot(FileSnapshot {
                code: Some(code.to_string()),
            }),
        )
        .with_action(Action::Open)
    }

    /// Whole-file event without stored content
    pub fn file_event(time: impl Into<Timestamp>, path: &str, action: Action) -> Self {
        Self::with_kind(
            time,
            path,
            OperationKind::FileSnapshot(FileSnapshot::default()),
        )
        .with_action(action)
    }

    pub fn command(time: impl Into<Timestamp>, path: &str, command_id: &str) -> Self {
        Self::with_kind(
            time,
            path,
            OperationKind::Command(CommandOp {
                command_id: command_id.to_string(),
            }),
        )
        .with_action(Action::Execute)
    }

    pub fn refactor(
        time: impl Into<Timestamp>,
        path: &str,
        name: &str,
        arguments: BTreeMap<String, String>,
        selection_start: usize,
        selection_len: usize,
    ) -> Self {
        Self::with_kind(
            time,
            path,
            OperationKind::Refactor(RefactorOp {
                name: name.to_string(),
                arguments,
                selection_start,
                selection_len,
            }),
        )
        .with_action(Action::Refactor)
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = branch.to_string();
        self
    }

    pub fn with_author(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self
    }

    pub fn with_compound(mut self, compound: impl Into<Timestamp>) -> Self {
        self.compound = Some(compound.into());
        self
    }

    pub fn op_type(&self) -> OperationType {
        match self.kind {
            OperationKind::Document(_) => OperationType::Document,
            OperationKind::Copy(_) => OperationType::Copy,
            OperationKind::FileSnapshot(_) => OperationType::FileSnapshot,
            OperationKind::Command(_) => OperationType::Command,
            OperationKind::Refactor(_) => OperationType::Refactor,
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self.kind, OperationKind::Document(_))
    }

    pub fn is_copy(&self) -> bool {
        matches!(self.kind, OperationKind::Copy(_))
    }

    /// Document or Copy: the operations that become graph nodes
    pub fn is_edit(&self) -> bool {
        self.is_document() || self.is_copy()
    }

    pub fn is_file_snapshot(&self) -> bool {
        matches!(self.kind, OperationKind::FileSnapshot(_))
    }

    /// Snapshot that stores the full file content
    pub fn is_restoration_point(&self) -> bool {
        self.snapshot_code().is_some()
    }

    pub fn is_paste(&self) -> bool {
        self.is_document() && self.action == Action::Paste
    }

    pub fn is_cut(&self) -> bool {
        self.is_document() && self.action == Action::Cut
    }

    /// Candidate source for a paste
    pub fn is_cut_or_copy(&self) -> bool {
        self.is_copy() || self.is_cut()
    }

    pub fn as_document(&self) -> Option<&DocumentEdit> {
        match &self.kind {
            OperationKind::Document(edit) => Some(edit),
            _ => None,
        }
    }

    pub fn as_copy(&self) -> Option<&CopyEdit> {
        match &self.kind {
            OperationKind::Copy(copy) => Some(copy),
            _ => None,
        }
    }

    pub fn snapshot_code(&self) -> Option<&str> {
        match &self.kind {
            OperationKind::FileSnapshot(snapshot) => snapshot.code.as_deref(),
            _ => None,
        }
    }

    /// Text a cut removed or a copy captured
    pub fn clipboard_text(&self) -> Option<&str> {
        match &self.kind {
            OperationKind::Copy(copy) => Some(&copy.copied),
            OperationKind::Document(edit) if self.action == Action::Cut => Some(&edit.deleted),
            _ => None,
        }
    }

    /// Offsets touched by a Document or Copy operation
    pub fn edit_span(&self) -> Option<EditSpan> {
        match &self.kind {
            OperationKind::Document(edit) => Some(EditSpan::document(
                edit.start,
                edit.inserted_len(),
                edit.deleted_len(),
            )),
            OperationKind::Copy(copy) => Some(EditSpan::copy(copy.start, copy.copied_len())),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OperationKind::Document(edit) => write!(
                f,
                "{} Document({:?}) @{} +{:?} -{:?}",
                self.time, self.action, edit.start, edit.inserted, edit.deleted
            ),
            OperationKind::Copy(copy) => {
                write!(f, "{} Copy @{} {:?}", self.time, copy.start, copy.copied)
            }
            OperationKind::FileSnapshot(snapshot) => write!(
                f,
                "{} FileSnapshot({:?}){}",
                self.time,
                self.action,
                if snapshot.code.is_some() { " [content]" } else { "" }
            ),
            OperationKind::Command(cmd) => write!(f, "{} Command {}", self.time, cmd.command_id),
            OperationKind::Refactor(refactor) => {
                write!(f, "{} Refactor {}", self.time, refactor.name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_edit_predicates() {
        let insert = Operation::document(1, "a.rs", 0, "x", "");
        let delete = Operation::document(2, "a.rs", 0, "", "x");
        let replace = Operation::document(3, "a.rs", 0, "y", "x");

        assert!(insert.as_document().unwrap().is_insertion());
        assert!(delete.as_document().unwrap().is_deletion());
        assert!(replace.as_document().unwrap().is_replacement());
        assert!(insert.is_edit() && !insert.is_copy());
    }

    #[test]
    fn test_restoration_point_requires_content() {
        let with_code = Operation::snapshot(1, "a.rs", "fn main() {}");
        let without = Operation::file_event(2, "a.rs", Action::Save);

        assert!(with_code.is_restoration_point());
        assert!(without.is_file_snapshot());
        assert!(!without.is_restoration_point());
    }

    #[test]
    fn test_clipboard_text_for_cut_and_copy() {
        let cut = Operation::document(1, "a.rs", 4, "", "foo").with_action(Action::Cut);
        let copy = Operation::copy(2, "a.rs", 4, "bar");
        let typed = Operation::document(3, "a.rs", 4, "", "baz");

        assert_eq!(cut.clipboard_text(), Some("foo"));
        assert_eq!(copy.clipboard_text(), Some("bar"));
        assert_eq!(typed.clipboard_text(), None);
        assert!(cut.is_cut_or_copy() && copy.is_cut_or_copy() && !typed.is_cut_or_copy());
    }

    #[test]
    fn test_edit_span_counts_characters() {
        let op = Operation::document(1, "a.rs", 2, "é🚀", "abc");
        let span = op.edit_span().unwrap();
        assert_eq!(span.start, 2);
        assert_eq!(span.inserted, 2);
        assert_eq!(span.deleted, 3);

        assert!(Operation::command(2, "a.rs", "save").edit_span().is_none());
    }

    #[test]
    fn test_operation_json_shape() {
        let op = Operation::document(7, "src/lib.rs", 3, "abc", "")
            .with_action(Action::Paste)
            .with_compound(5);
        let json = serde_json::to_value(&op).unwrap();

        assert_eq!(json["type"], "Document");
        assert_eq!(json["action"], "paste");
        assert_eq!(json["start"], 3);
        assert_eq!(json["compound"], 5);

        let unknown: Operation = serde_json::from_str(
            r#"{"time":1,"path":"a","type":"Command","command_id":"x","action":"weird"}"#,
        )
        .unwrap();
        assert_eq!(unknown.action, Action::Unknown);
    }
}
