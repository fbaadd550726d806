use std::collections::VecDeque;

use crate::model::FusedState;

/// Bounded FIFO of fused states, oldest evicted first. Exclusively owned
/// by the orchestrator; stages only ever see it behind a shared borrow.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<FusedState>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, state: FusedState) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(state);
    }

    pub fn last(&self) -> Option<&FusedState> {
        self.entries.back()
    }

    /// The two most recent entries, oldest first, when available.
    pub fn last_two(&self) -> Option<(&FusedState, &FusedState)> {
        let len = self.entries.len();
        if len < 2 {
            return None;
        }
        Some((&self.entries[len - 2], &self.entries[len - 1]))
    }

    /// Up to `n` most recent entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&FusedState> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(ts: f64) -> FusedState {
        FusedState {
            timestamp: ts,
            ..FusedState::default()
        }
    }

    #[test]
    fn history_evicts_oldest_first() {
        let mut history = HistoryBuffer::with_capacity(3);
        for ts in 0..5 {
            history.push(state(ts as f64));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.recent(3)[0].timestamp, 2.0);
        assert_eq!(history.last().unwrap().timestamp, 4.0);
    }

    #[test]
    fn last_two_requires_two_entries() {
        let mut history = HistoryBuffer::with_capacity(4);
        history.push(state(1.0));
        assert!(history.last_two().is_none());
        history.push(state(2.0));
        let (a, b) = history.last_two().unwrap();
        assert_eq!(a.timestamp, 1.0);
        assert_eq!(b.timestamp, 2.0);
    }

    #[test]
    fn recent_never_exceeds_len() {
        let mut history = HistoryBuffer::with_capacity(8);
        history.push(state(1.0));
        assert_eq!(history.recent(5).len(), 1);
    }
}
