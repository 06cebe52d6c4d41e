//! # Exclusivity Region
//!
//! The single gate every logical thread passes through. Between
//! [`ExclusivityRegion::enter`] and [`ExclusivityRegion::exit`] the calling
//! OS thread is the only one running application logic, unless it is inside
//! an uncommitted hardware transaction that has not conflicted with anybody.
//!
//! ## Ownership tracking
//!
//! Each OS thread remembers which region it holds. That turns the classic
//! misuses into immediate panics instead of silent corruption:
//!
//! - entering while already holding a region
//! - exiting a region the thread does not hold
//! - touching an [`Exclusive`] cell outside its region

mod cell;
mod htm;
mod strategy;

pub use cell::Exclusive;
pub use strategy::{
    build_strategy, ElisionExclusion, Exclusion, LockExclusion, RegionStats, StrategyKind,
    TransactionalExclusion,
};

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

thread_local! {
    /// Identifier of the region held by the current OS thread, `0` when none.
    static HELD: Cell<u64> = const { Cell::new(0) };
}

static NEXT_REGION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide mutual exclusion with a pluggable strategy.
///
/// Created by [`crate::Runtime`] and shared by `Arc` with every logical
/// thread and primitive of that runtime.
pub struct ExclusivityRegion {
    id: u64,
    strategy: Box<dyn Exclusion>,
}

impl ExclusivityRegion {
    /// Creates a region using `kind`.
    #[must_use]
    pub fn new(kind: StrategyKind, max_transaction_retries: u32) -> Self {
        Self::with_exclusion(build_strategy(kind, max_transaction_retries))
    }

    /// Creates a region around an existing strategy.
    #[must_use]
    pub fn with_exclusion(strategy: Box<dyn Exclusion>) -> Self {
        let id = NEXT_REGION_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(region = id, strategy = %strategy.kind(), "exclusivity region created");
        Self { id, strategy }
    }

    /// Blocks until the calling OS thread owns the region.
    ///
    /// # Panics
    ///
    /// Panics if the calling OS thread already holds a region.
    pub fn enter(&self) {
        let held = HELD.with(Cell::get);
        assert!(
            held == 0,
            "exclusivity region entered twice by the same OS thread (holding region {held})"
        );
        self.strategy.enter();
        HELD.with(|h| h.set(self.id));
    }

    /// Gives the region up.
    ///
    /// Must be called before any blocking OS-level operation.
    ///
    /// # Panics
    ///
    /// Panics if the calling OS thread does not hold this region.
    pub fn exit(&self) {
        assert!(self.is_held(), "exclusivity region exited without being held");
        HELD.with(|h| h.set(0));
        self.strategy.exit();
    }

    /// Returns whether the calling OS thread holds this region.
    #[inline]
    #[must_use]
    pub fn is_held(&self) -> bool {
        HELD.with(Cell::get) == self.id
    }

    /// Enters the region and returns a guard that exits on drop.
    #[must_use = "the region is exited as soon as the guard is dropped"]
    pub fn hold(&self) -> RegionGuard<'_> {
        self.enter();
        RegionGuard { region: self }
    }

    /// The strategy in use.
    #[inline]
    #[must_use]
    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Contention counters of the strategy.
    #[must_use]
    pub fn stats(&self) -> RegionStats {
        self.strategy.stats()
    }
}

impl fmt::Debug for ExclusivityRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusivityRegion")
            .field("id", &self.id)
            .field("strategy", &self.strategy.kind())
            .finish()
    }
}

/// Scoped ownership of an [`ExclusivityRegion`].
pub struct RegionGuard<'a> {
    region: &'a ExclusivityRegion,
}

impl Drop for RegionGuard<'_> {
    fn drop(&mut self) {
        // The guarded section may already have exited on its own.
        if self.region.is_held() {
            self.region.exit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_enter_exit_tracks_ownership() {
        for kind in StrategyKind::ALL {
            let region = ExclusivityRegion::new(kind, 16);
            assert!(!region.is_held());
            region.enter();
            assert!(region.is_held());
            region.exit();
            assert!(!region.is_held());
            assert_eq!(region.strategy(), kind);
        }
    }

    #[test]
    fn test_guard_exits_on_drop() {
        let region = ExclusivityRegion::new(StrategyKind::Lock, 16);
        {
            let _guard = region.hold();
            assert!(region.is_held());
        }
        assert!(!region.is_held());
    }

    #[test]
    #[should_panic(expected = "entered twice")]
    fn test_double_enter_panics() {
        let region = ExclusivityRegion::new(StrategyKind::Elision, 16);
        region.enter();
        region.enter();
    }

    #[test]
    #[should_panic(expected = "without being held")]
    fn test_exit_without_enter_panics() {
        let region = ExclusivityRegion::new(StrategyKind::Lock, 16);
        region.exit();
    }

    #[test]
    fn test_holding_one_region_is_not_holding_another() {
        let first = ExclusivityRegion::new(StrategyKind::Lock, 16);
        let second = ExclusivityRegion::new(StrategyKind::Lock, 16);
        let _guard = first.hold();
        assert!(first.is_held());
        assert!(!second.is_held());
    }

    #[test]
    fn test_region_serialises_os_threads() {
        for kind in StrategyKind::ALL {
            let region = Arc::new(ExclusivityRegion::new(kind, 16));
            let inside = Arc::new(AtomicU64::new(0));

            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let region = Arc::clone(&region);
                    let inside = Arc::clone(&inside);
                    thread::spawn(move || {
                        for _ in 0..200 {
                            let _guard = region.hold();
                            // Atomic read-modify-writes abort transactions on
                            // conflict, so this also holds speculatively.
                            assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                            inside.fetch_sub(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();

            for worker in workers {
                worker.join().unwrap();
            }
        }
    }

    /// Strategy supplied by the caller instead of `build_strategy`.
    struct ForwardingLock(LockExclusion);

    // SAFETY: every enter and exit is forwarded to a `LockExclusion`.
    #[allow(unsafe_code)]
    unsafe impl Exclusion for ForwardingLock {
        fn enter(&self) {
            self.0.enter();
        }

        fn exit(&self) {
            self.0.exit();
        }

        fn kind(&self) -> StrategyKind {
            StrategyKind::Lock
        }
    }

    #[test]
    fn test_custom_exclusion_guards_cells() {
        let strategy = Box::new(ForwardingLock(LockExclusion::new()));
        let region = Arc::new(ExclusivityRegion::with_exclusion(strategy));
        let total = Arc::new(Exclusive::new(Arc::clone(&region), 0u64));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let region = Arc::clone(&region);
                let total = Arc::clone(&total);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let _guard = region.hold();
                        total.with(|t| *t += 1);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let _guard = region.hold();
        assert_eq!(total.with(|t| *t), 2000);
        assert_eq!(region.strategy(), StrategyKind::Lock);
    }
}

