// ============================================================================
// HISTORY MANAGER — full-stack snapshots, undo with a one-entry floor
// ============================================================================

use std::collections::VecDeque;

use crate::canvas::LayerStack;

/// Default number of snapshots kept before the oldest are pruned.
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// LIFO stack of deep copies of the layer stack.
///
/// The top entry always equals the live state after the most recent
/// mutating action. Undo never removes the last remaining entry.
#[derive(Clone, Debug)]
pub struct HistoryManager {
    snapshots: VecDeque<LayerStack>,
    max_history_size: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryManager {
    /// `max_history_size` is clamped to at least 1.
    pub fn new(max_history_size: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            max_history_size: max_history_size.max(1),
        }
    }

    /// Push a deep copy of `layers`.
    pub fn snapshot(&mut self, layers: &LayerStack) {
        self.snapshots.push_back(layers.clone());
        self.prune();
    }

    /// Drop the current top (if another entry remains) and restore the new
    /// top into `layers`. Returns false when nothing was ever recorded.
    pub fn undo(&mut self, layers: &mut LayerStack) -> bool {
        if self.snapshots.len() > 1 {
            self.snapshots.pop_back();
        }
        self.restore_current(layers)
    }

    /// Copy the top entry into `layers` without popping.
    pub fn restore_current(&self, layers: &mut LayerStack) -> bool {
        match self.snapshots.back() {
            Some(top) => {
                *layers = top.clone();
                true
            }
            None => false,
        }
    }

    /// Forget everything. The caller is expected to push a new root.
    pub fn reset(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.snapshots.len() > 1
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    /// Approximate pixel memory held by all snapshots.
    pub fn memory_usage(&self) -> usize {
        self.snapshots
            .iter()
            .flat_map(|s| s.iter())
            .map(|l| l.surface.byte_len())
            .sum()
    }

    fn prune(&mut self) {
        while self.snapshots.len() > self.max_history_size {
            self.snapshots.pop_front();
        }
    }
}
