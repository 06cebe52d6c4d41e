//! # Array of Queues
//!
//! One [`LazyQueue`] per participant. Participants insert into and remove
//! from their own slot; a participant whose slot ran dry pulls work from the
//! slots that follow it:
//!
//! ```text
//!   own slot empty
//!        │
//!        ▼
//!  [ p ] [p+1] [p+2] ... [p+N/2]     visit up to N/2 slots
//!          │     │          │
//!        claim claim      claim       one lazy claim per non-empty slot
//!          └─────┴────┬─────┘
//!                     ▼
//!               enqueue on own       then a real dequeue of own slot
//! ```
//!
//! A thief only writes the victim's claim cursor and one node flag; unlinking
//! is left to the victim's next dequeue. That keeps cross-slot footprints
//! small, which is what lets concurrent removals commit as separate
//! hardware transactions. Slots are cache-line padded for the same reason.
//!
//! When the budgeted pass transfers nothing the scan continues around the
//! ring until it finds a key, so a remove only comes back empty-handed when
//! every slot is empty.

use crossbeam_utils::CachePadded;

use crate::queue::LazyQueue;
use crate::{QueueSetStats, UnorderedSet};

/// Slot count used by [`ArrayOfQueues::default`].
pub const DEFAULT_SLOTS: usize = 96;

struct Slot<K> {
    queue: LazyQueue<K>,
    stats: QueueSetStats,
}

/// Unordered multiset built from per-participant lazy queues.
pub struct ArrayOfQueues<K> {
    slots: Box<[CachePadded<Slot<K>>]>,
}

impl<K> ArrayOfQueues<K> {
    /// Creates a set for participants `1..=slots`.
    ///
    /// # Panics
    ///
    /// Panics if `slots` is zero.
    #[must_use]
    pub fn new(slots: usize) -> Self {
        assert!(slots > 0, "an array of queues needs at least one slot");
        tracing::debug!(slots, "array of queues created");
        Self {
            slots: (0..slots)
                .map(|_| {
                    CachePadded::new(Slot {
                        queue: LazyQueue::new(),
                        stats: QueueSetStats::default(),
                    })
                })
                .collect(),
        }
    }

    /// Unclaimed keys in `participant`'s own slot.
    ///
    /// # Panics
    ///
    /// Panics if `participant` is outside `1..=participants()`.
    #[must_use]
    pub fn slot_len(&self, participant: usize) -> usize {
        self.slots[self.own_slot(participant)].queue.len()
    }

    fn own_slot(&self, participant: usize) -> usize {
        let n = self.slots.len();
        assert!(
            (1..=n).contains(&participant),
            "participant id {participant} out of range 1..={n}"
        );
        participant - 1
    }

    /// Claims keys from the slots after `own` and moves them onto `own`.
    fn rebalance(&mut self, own: usize) -> u64 {
        let n = self.slots.len();
        let budget = n / 2;
        let mut index = (own + 1) % n;
        let mut visited = 0;
        let mut moved = 0u64;

        while index != own && (visited < budget || moved == 0) {
            if let Some(key) = self.slots[index].queue.claim() {
                self.slots[own].queue.enqueue(key);
                moved += 1;
            }
            visited += 1;
            index = (index + 1) % n;
        }
        moved
    }
}

impl<K> Default for ArrayOfQueues<K> {
    fn default() -> Self {
        Self::new(DEFAULT_SLOTS)
    }
}

impl<K> UnorderedSet<K> for ArrayOfQueues<K> {
    fn insert(&mut self, key: K, participant: usize) {
        let own = self.own_slot(participant);
        let slot = &mut self.slots[own];
        slot.queue.enqueue(key);
        slot.stats.inserted += 1;
    }

    fn try_remove(&mut self, participant: usize) -> Option<K> {
        let own = self.own_slot(participant);

        if !self.slots[own].queue.is_empty() {
            let key = self.slots[own].queue.dequeue();
            self.slots[own].stats.local_removes += 1;
            return key;
        }

        let moved = self.rebalance(own);
        let slot = &mut self.slots[own];
        slot.stats.stolen += moved;
        let key = slot.queue.dequeue();
        if key.is_some() {
            slot.stats.rebalanced_removes += 1;
        } else {
            slot.stats.empty_removes += 1;
            tracing::trace!(participant, "remove found no key in any slot");
        }
        key
    }

    fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.queue.is_empty())
    }

    fn len(&self) -> usize {
        self.slots.iter().map(|slot| slot.queue.len()).sum()
    }

    fn participants(&self) -> usize {
        self.slots.len()
    }

    fn stats(&self) -> QueueSetStats {
        self.slots
            .iter()
            .fold(QueueSetStats::default(), |total, slot| total.merge(&slot.stats))
    }
}
