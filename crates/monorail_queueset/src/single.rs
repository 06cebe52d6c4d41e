//! # Single Queue
//!
//! Every participant shares one FIFO. Correct, but all removals touch the
//! same head, so under transactions they conflict with each other. Kept as
//! the baseline the array of queues is measured against.

use std::collections::VecDeque;

use crate::{QueueSetStats, UnorderedSet};

/// Unordered multiset backed by one shared queue.
pub struct SingleQueue<K> {
    queue: VecDeque<K>,
    participants: usize,
    stats: QueueSetStats,
}

impl<K> SingleQueue<K> {
    /// Creates a set for participants `1..=participants`.
    ///
    /// # Panics
    ///
    /// Panics if `participants` is zero.
    #[must_use]
    pub fn new(participants: usize) -> Self {
        assert!(participants > 0, "a single queue needs at least one participant");
        Self {
            queue: VecDeque::new(),
            participants,
            stats: QueueSetStats::default(),
        }
    }

    fn check(&self, participant: usize) {
        assert!(
            (1..=self.participants).contains(&participant),
            "participant id {participant} out of range 1..={}",
            self.participants
        );
    }
}

impl<K> UnorderedSet<K> for SingleQueue<K> {
    fn insert(&mut self, key: K, participant: usize) {
        self.check(participant);
        self.queue.push_back(key);
        self.stats.inserted += 1;
    }

    fn try_remove(&mut self, participant: usize) -> Option<K> {
        self.check(participant);
        let key = self.queue.pop_front();
        if key.is_some() {
            self.stats.local_removes += 1;
        } else {
            self.stats.empty_removes += 1;
        }
        key
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn participants(&self) -> usize {
        self.participants
    }

    fn stats(&self) -> QueueSetStats {
        self.stats
    }
}
