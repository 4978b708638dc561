//! Snapshot Undo/Redo History
//!
//! Every committed edit stores a full copy of the record array as it was before
//! the edit. Undo swaps the live records for the newest snapshot; redo swaps back.
//!
//! # Bounds
//!
//! The undo stack holds at most `limit` snapshots; pushing past the limit drops the
//! oldest. Any new edit clears the redo stack.
//!
//! Snapshots are `Arc`-shared so handing the same state to the save scheduler
//! does not copy it again.

use crate::models::Node;
use std::collections::VecDeque;
use std::sync::Arc;

/// Shared, immutable copy of the full record array
pub type Snapshot = Arc<Vec<Node>>;

/// Bounded undo/redo stacks of full-store snapshots
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(limit.min(64)),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record the state that existed before a committed edit
    pub fn record(&mut self, before: Snapshot) {
        self.undo.push_back(before);
        if self.undo.len() > self.limit {
            self.undo.pop_front();
            tracing::debug!("History full, dropped oldest snapshot");
        }
        self.redo.clear();
    }

    /// Step back: returns the snapshot to install, stashing `current` for redo
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Step forward: returns the snapshot to install, stashing `current` for undo
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(names: &[&str]) -> Snapshot {
        Arc::new(
            names
                .iter()
                .map(|name| Node::with_id(*name, *name, *name, *name))
                .collect(),
        )
    }

    #[test]
    fn test_undo_then_redo_restores_states() {
        let mut history = History::new(10);
        let s0 = snap(&[]);
        let s1 = snap(&["a"]);

        history.record(s0.clone());
        let restored = history.undo(s1.clone()).unwrap();
        assert_eq!(restored, s0);

        let replayed = history.redo(restored).unwrap();
        assert_eq!(replayed, s1);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::new(2);
        history.record(snap(&["1"]));
        history.record(snap(&["2"]));
        history.record(snap(&["3"]));

        assert_eq!(history.undo_depth(), 2);
        let newest = history.undo(snap(&["4"])).unwrap();
        assert_eq!(newest[0].id, "3");
        let older = history.undo(newest).unwrap();
        assert_eq!(older[0].id, "2");
        assert!(history.undo(older).is_none());
    }

    #[test]
    fn test_new_edit_discards_redo_tail() {
        let mut history = History::new(5);
        history.record(snap(&[]));
        history.undo(snap(&["a"])).unwrap();
        assert!(history.can_redo());

        history.record(snap(&[]));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_empty_history_is_noop() {
        let mut history = History::new(5);
        assert!(history.undo(snap(&[])).is_none());
        assert!(history.redo(snap(&[])).is_none());
        assert_eq!(history.redo_depth(), 0);
    }
}
