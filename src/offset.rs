//! Offset translation across logged edits
//!
//! An offset is only meaningful at one instant of the timeline. This module
//! moves offsets between instants by replaying the positional effect of the
//! Document/Copy operations that happened in between.
//!
//! # Rules for one edit at `start` inserting `I` and deleting `D` characters
//!
//! Forward (the edit is applied):
//! - `offset < start`: unchanged
//! - `start <= offset < start + D`: the character was deleted, untraceable
//! - `offset >= start + D`: shifted by `I - D`
//!
//! Backward (the edit is undone) is the dual over the inserted span
//! `[start, start + I)`.
//!
//! Untraceable offsets are `None`. Callers treat them as "no dependency",
//! never as a fault. Span ends saturate at `usize::MAX`, so a logged offset
//! near the top of the range never wraps.

use serde::{Deserialize, Serialize};

/// Positional footprint of a Document or Copy operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditSpan {
    pub start: usize,
    /// Characters inserted (Document only)
    pub inserted: usize,
    /// Characters deleted (Document only)
    pub deleted: usize,
    /// Characters copied (Copy only)
    pub copied: usize,
}

impl EditSpan {
    pub fn document(start: usize, inserted: usize, deleted: usize) -> Self {
        EditSpan {
            start,
            inserted,
            deleted,
            copied: 0,
        }
    }

    pub fn copy(start: usize, copied: usize) -> Self {
        EditSpan {
            start,
            inserted: 0,
            deleted: 0,
            copied,
        }
    }

    pub fn is_copy(&self) -> bool {
        self.copied > 0 && self.inserted == 0 && self.deleted == 0
    }

    /// Edit adds characters
    pub fn is_add(&self) -> bool {
        self.inserted > 0
    }

    /// Edit removes characters
    pub fn is_remove(&self) -> bool {
        self.deleted > 0
    }

    /// Pure insertion: only a reference point is touched in the prior text
    pub fn is_pure_insert(&self) -> bool {
        self.inserted > 0 && self.deleted == 0
    }

    /// Range of the prior text this edit reads or removes
    ///
    /// Deletions and replacements touch the deleted characters, copies the
    /// copied characters. Pure insertions touch no character.
    pub fn prior_range(&self) -> (usize, usize) {
        if self.copied > 0 {
            (self.start, self.start.saturating_add(self.copied))
        } else {
            (self.start, self.start.saturating_add(self.deleted))
        }
    }

    /// Range of the resulting text the edit produced or read
    pub fn posterior_range(&self) -> (usize, usize) {
        if self.copied > 0 {
            (self.start, self.start.saturating_add(self.copied))
        } else {
            (self.start, self.start.saturating_add(self.inserted))
        }
    }

    /// One past the last offset of the resulting text a later edit can be
    /// matched against; a removal point counts as one character
    pub fn reach(&self) -> usize {
        let width = self.inserted.max(self.copied).max(1);
        self.start.saturating_add(width)
    }

    /// Net length change
    pub fn delta(&self) -> isize {
        (self.inserted as isize).saturating_sub(self.deleted as isize)
    }

    /// Translate `offset` from before this edit to after it
    pub fn forward(&self, offset: usize) -> Option<usize> {
        if self.is_copy() || offset < self.start {
            return Some(offset);
        }
        if offset < self.start.saturating_add(self.deleted) {
            return None;
        }
        Some((offset - self.deleted).saturating_add(self.inserted))
    }

    /// Translate `offset` from after this edit to before it
    pub fn backward(&self, offset: usize) -> Option<usize> {
        if self.is_copy() || offset < self.start {
            return Some(offset);
        }
        if offset < self.start.saturating_add(self.inserted) {
            return None;
        }
        Some((offset - self.inserted).saturating_add(self.deleted))
    }

    /// Translate a caret position forward
    ///
    /// Unlike characters, carets are never deleted: a caret inside a deleted
    /// span collapses onto the edit start.
    pub fn forward_caret(&self, caret: usize) -> usize {
        if self.is_copy() || caret <= self.start {
            return caret;
        }
        if caret < self.start.saturating_add(self.deleted) {
            return self.start;
        }
        (caret - self.deleted).saturating_add(self.inserted)
    }

    /// Translate a caret position backward; carets inside the inserted span
    /// collapse onto the edit start.
    pub fn backward_caret(&self, caret: usize) -> usize {
        if self.is_copy() || caret <= self.start {
            return caret;
        }
        if caret < self.start.saturating_add(self.inserted) {
            return self.start;
        }
        (caret - self.inserted).saturating_add(self.deleted)
    }
}

/// Offset after `spans` were applied in order
pub fn adjust_forward(offset: usize, spans: &[EditSpan]) -> Option<usize> {
    spans
        .iter()
        .try_fold(offset, |offset, span| span.forward(offset))
}

/// Offset before `spans` were applied (undoes them in reverse order)
pub fn adjust_backward(offset: usize, spans: &[EditSpan]) -> Option<usize> {
    spans
        .iter()
        .rev()
        .try_fold(offset, |offset, span| span.backward(offset))
}

/// Caret after `spans` were applied in order
pub fn adjust_caret_forward(caret: usize, spans: &[EditSpan]) -> usize {
    spans.iter().fold(caret, |caret, span| span.forward_caret(caret))
}

/// Caret before `spans` were applied
pub fn adjust_caret_backward(caret: usize, spans: &[EditSpan]) -> usize {
    spans
        .iter()
        .rev()
        .fold(caret, |caret, span| span.backward_caret(caret))
}

/// High-water marks of a span sequence
///
/// `marks[k]` is a caret in the text right before `spans[k]` (the last entry
/// is the text after every span). No span of `spans[..k]` produced, copied or
/// removed anything at or after it, so a backward walk whose tracked offsets
/// all sit at or after `marks[k]` cannot match any earlier span.
pub fn reach_marks(spans: &[EditSpan]) -> Vec<usize> {
    let mut marks = Vec::with_capacity(spans.len() + 1);
    let mut mark = 0;
    marks.push(mark);
    for span in spans {
        mark = span.forward_caret(mark).max(span.reach());
        marks.push(mark);
    }
    marks
}

/// Result of offering one earlier edit to a [`TrackedOffsets`] set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Match {
    /// The edit explains at least one tracked offset
    pub depends: bool,
    /// Offsets retired because they found their cause
    pub retired: usize,
}

/// Offsets of one operation, walked backward through earlier edits
///
/// A node starts by tracking every character it touches (deletion,
/// replacement and copy) or, for a pure insertion, its single reference
/// point. Each earlier edit is offered in reverse time order with
/// [`TrackedOffsets::offer`]:
///
/// - Add-type edit: every tracked character inside the inserted span is
///   retired and the edit becomes a cause. A reference point counts only
///   when it lies strictly inside the inserted text.
/// - Remove-type edit: a sole remaining reference point that sits exactly on
///   the removal point is retired and the edit becomes a cause.
/// - Copy: a tracked character inside the copied span makes the copy a
///   cause, without retiring anything.
///
/// Survivors are then re-projected to before the edit. A multi-character
/// operation can therefore depend on several earlier operations, one per
/// sub-range, and never twice on the same cause for the same offset.
///
/// Characters are kept as sorted, disjoint half-open runs, so the cost of a
/// step follows the number of runs rather than the number of characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedOffsets {
    runs: Vec<(usize, usize)>,
    reference: Option<usize>,
}

impl TrackedOffsets {
    /// Offsets touched by `span`, expressed in the text before it applied
    pub fn for_span(span: &EditSpan) -> Self {
        if span.is_pure_insert() {
            return TrackedOffsets {
                runs: Vec::new(),
                reference: Some(span.start),
            };
        }
        let (start, end) = span.prior_range();
        Self::for_run(start, end)
    }

    /// Track the characters `[start, start + len)`
    pub fn for_range(start: usize, len: usize) -> Self {
        Self::for_run(start, start.saturating_add(len))
    }

    fn for_run(start: usize, end: usize) -> Self {
        let runs = if start < end { vec![(start, end)] } else { Vec::new() };
        TrackedOffsets { runs, reference: None }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty() && self.reference.is_none()
    }

    pub fn len(&self) -> usize {
        let chars: usize = self.runs.iter().map(|&(start, end)| end - start).sum();
        chars + usize::from(self.reference.is_some())
    }

    pub fn chars(&self) -> impl Iterator<Item = usize> + '_ {
        self.runs.iter().flat_map(|&(start, end)| start..end)
    }

    pub fn reference(&self) -> Option<usize> {
        self.reference
    }

    /// Smallest tracked offset, character or reference point
    pub fn lowest(&self) -> Option<usize> {
        let first = self.runs.first().map(|&(start, _)| start);
        first.into_iter().chain(self.reference).min()
    }

    /// Offer an earlier edit, then move survivors to before it
    pub fn offer(&mut self, earlier: &EditSpan, link_copies: bool) -> Match {
        let mut result = Match::default();

        if earlier.is_copy() {
            if link_copies {
                let (start, end) = earlier.prior_range();
                result.depends = self.touches(start, end);
            }
            return result;
        }

        if earlier.is_add() {
            let (start, end) = earlier.posterior_range();
            result.retired += self.retire(start, end);
            if let Some(reference) = self.reference {
                if start < reference && reference < end {
                    self.reference = None;
                    result.retired += 1;
                }
            }
            result.depends = result.retired > 0;
        }

        if !result.depends && earlier.is_remove() && self.runs.is_empty() {
            if self.reference == Some(earlier.start) {
                self.reference = None;
                result.retired += 1;
                result.depends = true;
            }
        }

        self.project_backward(earlier);
        result
    }

    /// Re-project every tracked offset to before `earlier`
    pub fn project_backward(&mut self, earlier: &EditSpan) {
        if !earlier.is_copy() {
            self.splice(earlier.start, earlier.inserted, earlier.deleted);
        }
        self.reference = self.reference.map(|caret| earlier.backward_caret(caret));
    }

    /// Re-project every tracked offset to after `later`
    pub fn project_forward(&mut self, later: &EditSpan) {
        if !later.is_copy() {
            self.splice(later.start, later.deleted, later.inserted);
        }
        self.reference = self.reference.map(|caret| later.forward_caret(caret));
    }

    /// Some tracked character lies in `[start, end)`
    pub fn touches(&self, start: usize, end: usize) -> bool {
        if start >= end {
            return false;
        }
        let first = self.runs.partition_point(|&(_, run_end)| run_end <= start);
        self.runs.get(first).is_some_and(|&(run_start, _)| run_start < end)
    }

    /// Smallest and one-past-largest tracked character
    pub fn bounds(&self) -> Option<(usize, usize)> {
        let (first, _) = *self.runs.first()?;
        let (_, last) = *self.runs.last()?;
        Some((first, last))
    }

    /// Drop the tracked characters in `[start, end)`, returning how many
    fn retire(&mut self, start: usize, end: usize) -> usize {
        if !self.touches(start, end) {
            return 0;
        }
        let mut retired = 0;
        let mut kept = Vec::with_capacity(self.runs.len() + 1);
        for &(run_start, run_end) in &self.runs {
            if run_end <= start || run_start >= end {
                kept.push((run_start, run_end));
                continue;
            }
            retired += run_end.min(end) - run_start.max(start);
            if run_start < start {
                kept.push((run_start, start));
            }
            if run_end > end {
                kept.push((end, run_end));
            }
        }
        self.runs = kept;
        retired
    }

    /// Remove `[start, start + removed)` and shift what follows by
    /// `added - removed`
    fn splice(&mut self, start: usize, removed: usize, added: usize) {
        if self.runs.last().map_or(true, |&(_, end)| end <= start) {
            return;
        }
        let cut = start.saturating_add(removed);
        let shift = |offset: usize| (offset - removed).saturating_add(added);
        let mut moved: Vec<(usize, usize)> = Vec::with_capacity(self.runs.len() + 1);
        let mut push = |run: (usize, usize)| {
            if run.0 >= run.1 {
                return;
            }
            match moved.last_mut() {
                Some(last) if last.1 == run.0 => last.1 = run.1,
                _ => moved.push(run),
            }
        };
        for &(run_start, run_end) in &self.runs {
            if run_start < start {
                push((run_start, run_end.min(start)));
            }
            if run_end > cut {
                push((shift(run_start.max(cut)), shift(run_end)));
            }
        }
        self.runs = moved;
    }
}
