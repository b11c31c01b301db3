//! Per-segment decisions with an undo log
//!
//! Pure in-memory state: no I/O, no events. The owning session announces
//! changes on the event bus after a mutation has fully applied.

use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use vtp_common::events::Decision;

/// One undo step: the decision an index held before a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub index: u32,
    /// `None` when the index was pending
    pub previous: Option<Decision>,
}

/// Result of a successful undo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoOutcome {
    pub index: u32,
    /// Decision now in effect, `None` when the index is pending again
    pub restored: Option<Decision>,
}

/// Accept/reject tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionCounts {
    pub accepted: usize,
    pub rejected: usize,
}

impl DecisionCounts {
    pub fn decided(&self) -> usize {
        self.accepted + self.rejected
    }
}

/// Decision store
///
/// Absence of an entry means pending. Every recorded change pushes a
/// [`HistoryEntry`]; the history is unbounded within a session. Notes and
/// multi-select flags live beside the decisions but never enter the history.
#[derive(Debug, Clone, Default)]
pub struct DecisionStore {
    votes: HashMap<u32, Decision>,
    notes: HashMap<u32, String>,
    history: Vec<HistoryEntry>,
    selected: BTreeSet<u32>,
    revision: u64,
}

impl DecisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: u32) -> Option<Decision> {
        self.votes.get(&index).copied()
    }

    pub fn is_pending(&self, index: u32) -> bool {
        !self.votes.contains_key(&index)
    }

    /// Monotonic counter bumped on every decision change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Record a decision, returning the one it replaced
    ///
    /// Pushes an undo entry and clears the index's multi-select flag.
    pub fn set_decision(&mut self, index: u32, decision: Decision) -> Option<Decision> {
        let previous = self.votes.insert(index, decision);
        self.history.push(HistoryEntry { index, previous });
        self.selected.remove(&index);
        self.revision += 1;
        previous
    }

    /// Return an index to pending without touching the history
    pub fn restore_decision(&mut self, index: u32) -> Option<Decision> {
        let removed = self.votes.remove(&index);
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    /// Apply one decision to many indices
    ///
    /// One history entry per supplied index, in the order given, so undoing
    /// once per supplied index reverts exactly the batch. A repeated index
    /// records the value its earlier occurrence wrote. Returns the indices
    /// as supplied.
    pub fn batch_apply<I>(&mut self, indices: I, decision: Decision) -> Vec<u32>
    where
        I: IntoIterator<Item = u32>,
    {
        let mut applied = Vec::new();
        for index in indices {
            let previous = self.votes.insert(index, decision);
            self.history.push(HistoryEntry { index, previous });
            self.selected.remove(&index);
            applied.push(index);
        }
        if !applied.is_empty() {
            self.revision += 1;
        }
        applied
    }

    /// Revert the most recent change
    ///
    /// Entries whose index fails `is_loaded` are stale (their segment left
    /// the catalog): they are discarded and the next entry is tried.
    pub fn undo<F>(&mut self, is_loaded: F) -> Option<UndoOutcome>
    where
        F: Fn(u32) -> bool,
    {
        while let Some(entry) = self.history.pop() {
            if !is_loaded(entry.index) {
                debug!(index = entry.index, "Skipping stale undo entry");
                continue;
            }

            match entry.previous {
                Some(decision) => {
                    self.votes.insert(entry.index, decision);
                }
                None => {
                    self.votes.remove(&entry.index);
                }
            }
            self.revision += 1;

            return Some(UndoOutcome {
                index: entry.index,
                restored: entry.previous,
            });
        }
        None
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Attach a note; an empty or whitespace-only note removes it
    pub fn set_note(&mut self, index: u32, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            self.notes.remove(&index);
        } else {
            self.notes.insert(index, note.to_string());
        }
    }

    pub fn note(&self, index: u32) -> Option<&str> {
        self.notes.get(&index).map(String::as_str)
    }

    /// Flip the multi-select flag, returning the new state
    pub fn toggle_selected(&mut self, index: u32) -> bool {
        if self.selected.remove(&index) {
            false
        } else {
            self.selected.insert(index);
            true
        }
    }

    pub fn is_selected(&self, index: u32) -> bool {
        self.selected.contains(&index)
    }

    /// Multi-selected indices, ascending
    pub fn selected(&self) -> Vec<u32> {
        self.selected.iter().copied().collect()
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn counts(&self) -> DecisionCounts {
        self.votes
            .values()
            .fold(DecisionCounts::default(), |mut counts, decision| {
                match decision {
                    Decision::Accept => counts.accepted += 1,
                    Decision::Reject => counts.rejected += 1,
                }
                counts
            })
    }

    /// All decisions, ascending by index
    pub fn decisions(&self) -> Vec<(u32, Decision)> {
        let mut all: Vec<_> = self.votes.iter().map(|(i, d)| (*i, *d)).collect();
        all.sort_unstable_by_key(|(i, _)| *i);
        all
    }

    /// Replace all decisions with persisted ones
    ///
    /// History and selection start empty: persisted votes are not undoable.
    pub fn load_persisted<I>(&mut self, votes: I)
    where
        I: IntoIterator<Item = (u32, Decision, Option<String>)>,
    {
        self.votes.clear();
        self.notes.clear();
        self.history.clear();
        self.selected.clear();
        for (index, decision, note) in votes {
            self.votes.insert(index, decision);
            if let Some(note) = note {
                self.set_note(index, &note);
            }
        }
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_decision_returns_previous() {
        let mut store = DecisionStore::new();
        assert_eq!(store.set_decision(4, Decision::Accept), None);
        assert_eq!(store.set_decision(4, Decision::Reject), Some(Decision::Accept));
        assert_eq!(store.get(4), Some(Decision::Reject));
        assert_eq!(store.history_len(), 2);
    }

    #[test]
    fn test_restore_does_not_touch_history() {
        let mut store = DecisionStore::new();
        store.set_decision(1, Decision::Accept);
        assert_eq!(store.restore_decision(1), Some(Decision::Accept));
        assert!(store.is_pending(1));
        assert_eq!(store.history_len(), 1);
    }

    #[test]
    fn test_set_decision_clears_selection_flag() {
        let mut store = DecisionStore::new();
        assert!(store.toggle_selected(9));
        store.set_decision(9, Decision::Reject);
        assert!(!store.is_selected(9));
    }

    #[test]
    fn test_notes_trim_and_clear() {
        let mut store = DecisionStore::new();
        store.set_note(2, "  breathy  ");
        assert_eq!(store.note(2), Some("breathy"));
        store.set_note(2, "   ");
        assert_eq!(store.note(2), None);
    }

    #[test]
    fn test_batch_records_one_entry_per_supplied_index() {
        let mut store = DecisionStore::new();
        let applied = store.batch_apply([3, 1, 3], Decision::Reject);
        assert_eq!(applied, vec![3, 1, 3]);
        assert_eq!(store.history_len(), 3);
        assert_eq!(store.counts(), DecisionCounts { accepted: 0, rejected: 2 });
    }

    #[test]
    fn test_batch_then_undo_reverts_only_the_batch() {
        // Given: an earlier decision, then a batch with a repeated index
        let mut store = DecisionStore::new();
        store.set_decision(9, Decision::Accept);
        store.set_decision(1, Decision::Accept);
        let indices = [3, 1, 3];
        store.batch_apply(indices, Decision::Reject);

        // When: one undo per supplied index
        for _ in 0..indices.len() {
            assert!(store.undo(|_| true).is_some());
        }

        // Then: the batch is gone and everything before it survives
        assert_eq!(store.get(9), Some(Decision::Accept));
        assert_eq!(store.get(1), Some(Decision::Accept));
        assert!(store.is_pending(3));
        assert_eq!(store.history_len(), 2);
    }

    #[test]
    fn test_set_restore_undo_sequence() {
        // Given: a mixed sequence of recorded and restored changes
        let mut store = DecisionStore::new();
        store.set_decision(1, Decision::Accept);
        store.set_decision(2, Decision::Reject);
        store.set_decision(1, Decision::Reject);
        let before_restore = store.history_len();

        // When: restores interleave with the recorded changes
        store.restore_decision(2);
        store.restore_decision(7);
        store.set_decision(4, Decision::Accept);
        store.restore_decision(4);

        // Then: only set_decision grew the history
        assert_eq!(store.history_len(), before_restore + 1);
        assert!(store.is_pending(2) && store.is_pending(4));

        // Undo walks the recorded changes newest first
        assert_eq!(
            store.undo(|_| true),
            Some(UndoOutcome { index: 4, restored: None })
        );
        assert!(store.is_pending(4));
        assert_eq!(
            store.undo(|_| true),
            Some(UndoOutcome { index: 1, restored: Some(Decision::Accept) })
        );
        assert_eq!(store.get(1), Some(Decision::Accept));
        assert_eq!(
            store.undo(|_| true),
            Some(UndoOutcome { index: 2, restored: None })
        );
        assert!(store.is_pending(2));
        assert_eq!(
            store.undo(|_| true),
            Some(UndoOutcome { index: 1, restored: None })
        );
        assert!(store.is_pending(1));
        assert_eq!(store.undo(|_| true), None);
        assert_eq!(store.history_len(), 0);
    }

    #[test]
    fn test_revision_tracks_changes_only() {
        let mut store = DecisionStore::new();
        let start = store.revision();
        store.restore_decision(5);
        assert_eq!(store.revision(), start, "Removing nothing is not a change");
        store.set_decision(5, Decision::Accept);
        assert!(store.revision() > start);
    }
}
