//! # Monorail Queue Set
//!
//! An unordered multiset that participants insert into and remove from by
//! id (`1..=N`). Which key a remove returns is unspecified; the only promise
//! is that every inserted key comes out exactly once.
//!
//! ## Variants
//!
//! - [`ArrayOfQueues`] - one lazy queue per participant, work stealing by
//!   non-destructive claims
//! - [`SingleQueue`] - one shared queue, the contention baseline
//!
//! ## Sharing
//!
//! The structures here take `&mut self` and do no synchronisation. Between
//! logical threads they are shared inside the runtime's region-guarded cell:
//!
//! ```rust,ignore
//! let set = runtime.exclusive(ArrayOfQueues::<u64>::new(4));
//! set.with(|s| s.insert(10, 1));
//! let key = set.with(|s| s.remove(2));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod arena;
pub mod array;
pub mod queue;
pub mod single;

use std::fmt;

pub use array::{ArrayOfQueues, DEFAULT_SLOTS};
pub use queue::LazyQueue;
pub use single::SingleQueue;

/// Counters kept by a queue set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueSetStats {
    /// Keys inserted.
    pub inserted: u64,
    /// Removes served from the caller's own slot.
    pub local_removes: u64,
    /// Removes served after pulling keys from other slots.
    pub rebalanced_removes: u64,
    /// Keys moved between slots by rebalancing.
    pub stolen: u64,
    /// Removes that found nothing.
    pub empty_removes: u64,
}

impl QueueSetStats {
    /// Field-wise sum.
    #[must_use]
    pub const fn merge(self, other: &Self) -> Self {
        Self {
            inserted: self.inserted + other.inserted,
            local_removes: self.local_removes + other.local_removes,
            rebalanced_removes: self.rebalanced_removes + other.rebalanced_removes,
            stolen: self.stolen + other.stolen,
            empty_removes: self.empty_removes + other.empty_removes,
        }
    }
}

/// Insert/remove by participant id.
pub trait UnorderedSet<K> {
    /// Adds `key` on behalf of `participant`.
    ///
    /// # Panics
    ///
    /// Panics if `participant` is outside `1..=participants()`.
    fn insert(&mut self, key: K, participant: usize);

    /// Removes some key on behalf of `participant`, `None` if the set is
    /// empty.
    ///
    /// # Panics
    ///
    /// Panics if `participant` is outside `1..=participants()`.
    fn try_remove(&mut self, participant: usize) -> Option<K>;

    /// Removes some key, or returns `K::default()` when there is none.
    ///
    /// The default is indistinguishable from a real key; use
    /// [`UnorderedSet::try_remove`] unless the caller knows keys remain.
    fn remove(&mut self, participant: usize) -> K
    where
        K: Default,
    {
        self.try_remove(participant).unwrap_or_default()
    }

    /// Whether no removable key remains.
    fn is_empty(&self) -> bool;

    /// Number of removable keys.
    fn len(&self) -> usize;

    /// Number of participant ids accepted.
    fn participants(&self) -> usize;

    /// Counters since construction.
    fn stats(&self) -> QueueSetStats;
}

/// Which [`UnorderedSet`] variant [`build_set`] creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SetKind {
    /// [`ArrayOfQueues`] with this many slots.
    ArrayOfQueues {
        /// Slot count, one per participant.
        slots: usize,
    },
    /// [`SingleQueue`] accepting this many participants.
    SingleQueue {
        /// Participant count.
        participants: usize,
    },
}

impl Default for SetKind {
    fn default() -> Self {
        Self::ArrayOfQueues {
            slots: DEFAULT_SLOTS,
        }
    }
}

impl fmt::Display for SetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArrayOfQueues { slots } => write!(f, "array-of-queues/{slots}"),
            Self::SingleQueue { participants } => write!(f, "single-queue/{participants}"),
        }
    }
}

/// Creates the variant selected by `kind`.
#[must_use]
pub fn build_set<K: Send + 'static>(kind: SetKind) -> Box<dyn UnorderedSet<K> + Send> {
    match kind {
        SetKind::ArrayOfQueues { slots } => Box::new(ArrayOfQueues::new(slots)),
        SetKind::SingleQueue { participants } => Box::new(SingleQueue::new(participants)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_removes_each_key_once() {
        for kind in [
            SetKind::default(),
            SetKind::ArrayOfQueues { slots: 3 },
            SetKind::SingleQueue { participants: 3 },
        ] {
            let mut set = build_set::<u32>(kind);
            for key in 1..=30 {
                set.insert(key, (key as usize % 3) + 1);
            }
            assert_eq!(set.len(), 30, "{kind}");

            let mut removed: Vec<u32> = (0..30).map(|i| set.remove((i % 3) + 1)).collect();
            removed.sort_unstable();
            assert_eq!(removed, (1..=30).collect::<Vec<_>>(), "{kind}");
            assert!(set.is_empty(), "{kind}");
        }
    }

    #[test]
    fn test_stats_merge() {
        let a = QueueSetStats {
            inserted: 2,
            stolen: 1,
            ..QueueSetStats::default()
        };
        let b = QueueSetStats {
            inserted: 3,
            empty_removes: 4,
            ..QueueSetStats::default()
        };
        let sum = a.merge(&b);
        assert_eq!(sum.inserted, 5);
        assert_eq!(sum.stolen, 1);
        assert_eq!(sum.empty_removes, 4);
    }
}
