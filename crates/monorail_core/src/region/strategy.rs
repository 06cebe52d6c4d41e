//! # Exclusion Strategies
//!
//! Three interchangeable ways to implement the same `enter`/`exit` contract:
//!
//! ```text
//! Lock           enter ──> mutex.lock()             exit ──> mutex.unlock()
//!
//! Transactional  enter ──> XBEGIN ─┬─ flag free ──> run speculatively
//!                                  ├─ flag held ──> XABORT(42), retry
//!                                  └─ gave up ────> spin on flag
//!                exit  ──> in transaction ? XEND : release flag
//!
//! Elision        enter ──> XACQUIRE xchg(flag, 1), pause-spin while held
//!                exit  ──> XRELEASE store(flag, 0)
//! ```
//!
//! Strategies only change contention behaviour. After `enter` returns the
//! caller owns shared state, either logically (a flag or mutex is held) or
//! through hardware isolation (an open transaction).

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::lock_api::RawMutex as _;
use serde::Deserialize;

use super::htm;
use crate::error::RuntimeError;

/// Which exclusion mechanism a region uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Plain mutual-exclusion lock.
    Lock,
    /// Hardware transaction with bounded retries, then a spinlock.
    Transactional,
    /// Spinlock whose acquire/release carry lock-elision hints.
    Elision,
}

impl StrategyKind {
    /// Every strategy, in declaration order.
    pub const ALL: [Self; 3] = [Self::Lock, Self::Transactional, Self::Elision];

    /// The strategy selected by Cargo features.
    ///
    /// `no-hle` selects [`StrategyKind::Lock`], `use-rtm` selects
    /// [`StrategyKind::Transactional`], otherwise [`StrategyKind::Elision`].
    /// `no-hle` wins when both are enabled.
    #[must_use]
    pub const fn build_default() -> Self {
        if cfg!(feature = "no-hle") {
            Self::Lock
        } else if cfg!(feature = "use-rtm") {
            Self::Transactional
        } else {
            Self::Elision
        }
    }

    /// Lowercase name, as accepted in configuration files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Transactional => "transactional",
            Self::Elision => "elision",
        }
    }
}

impl Default for StrategyKind {
    fn default() -> Self {
        Self::build_default()
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| RuntimeError::InvalidConfig(format!("unknown strategy `{s}`")))
    }
}

/// Contention counters reported by a strategy.
///
/// Only the transactional strategy has anything to report; the others return
/// zeroes. Counters are bumped outside transactions so they never become part
/// of a read or write set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegionStats {
    /// Transactions that aborted for any reason.
    pub aborts: u64,
    /// Aborts raised because the fallback flag was held.
    pub lock_busy_aborts: u64,
    /// Entries that gave up on transactions and took the fallback flag.
    pub fallback_acquisitions: u64,
}

/// One `enter`/`exit` contract, three implementations.
///
/// # Safety
///
/// Between a return from `enter` and the matching `exit`, no other OS thread
/// may observe or modify state guarded by the region, other than through a
/// hardware transaction that is rolled back on conflict. `exit` must publish
/// the caller's writes to the next thread whose `enter` returns (release on
/// `exit`, acquire on `enter`). [`Exclusive`](super::Exclusive) hands out
/// `&mut` access on the strength of this contract alone.
///
/// A strategy that does not exclude cannot be written in safe code:
///
/// ```compile_fail,E0200
/// use monorail_core::region::{Exclusion, StrategyKind};
///
/// struct Nothing;
///
/// impl Exclusion for Nothing {
///     fn enter(&self) {}
///     fn exit(&self) {}
///     fn kind(&self) -> StrategyKind {
///         StrategyKind::Lock
///     }
/// }
/// ```
#[allow(unsafe_code)]
pub unsafe trait Exclusion: Send + Sync {
    /// Blocks until the caller owns the region.
    fn enter(&self);

    /// Gives the region up. Must pair with the caller's own `enter`.
    fn exit(&self);

    /// Which strategy this is.
    fn kind(&self) -> StrategyKind;

    /// Contention counters, if the strategy keeps any.
    fn stats(&self) -> RegionStats {
        RegionStats::default()
    }
}

/// Builds the strategy for `kind`.
#[must_use]
pub fn build_strategy(kind: StrategyKind, max_transaction_retries: u32) -> Box<dyn Exclusion> {
    match kind {
        StrategyKind::Lock => Box::new(LockExclusion::new()),
        StrategyKind::Transactional => Box::new(TransactionalExclusion::new(max_transaction_retries)),
        StrategyKind::Elision => Box::new(ElisionExclusion::new()),
    }
}

/// The word the flag-based strategies spin on, alone on its cache line.
struct SpinFlag(CachePadded<AtomicU32>);

impl SpinFlag {
    const FREE: u32 = 0;
    const HELD: u32 = 1;

    fn new() -> Self {
        Self(CachePadded::new(AtomicU32::new(Self::FREE)))
    }

    #[inline]
    fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire) == Self::HELD
    }

    /// Pause-spins until the flag reads free. Does not take it.
    #[inline]
    fn wait_until_free(&self) {
        let backoff = Backoff::new();
        while self.is_held() {
            backoff.spin();
        }
    }

    /// Takes the flag with `swap`, pause-spinning between attempts.
    #[inline]
    fn acquire_with(&self, swap: impl Fn(&AtomicU32) -> u32) {
        while swap(&*self.0) != Self::FREE {
            self.wait_until_free();
        }
    }

    #[inline]
    fn release(&self) {
        self.0.store(Self::FREE, Ordering::Release);
    }
}

/// Plain mutex strategy (`no-hle`).
pub struct LockExclusion {
    raw: parking_lot::RawMutex,
}

impl LockExclusion {
    /// Creates an unlocked strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: parking_lot::RawMutex::INIT,
        }
    }
}

impl Default for LockExclusion {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: a held `RawMutex` excludes every other holder, and lock/unlock
// carry acquire/release ordering.
#[allow(unsafe_code)]
unsafe impl Exclusion for LockExclusion {
    fn enter(&self) {
        self.raw.lock();
    }

    #[allow(unsafe_code)]
    fn exit(&self) {
        // SAFETY: the region only calls `exit` on the OS thread that entered.
        unsafe { self.raw.unlock() };
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Lock
    }
}

/// Transactional strategy with spinlock fallback (`use-rtm`).
pub struct TransactionalExclusion {
    flag: SpinFlag,
    max_retries: u32,
    hardware: bool,
    aborts: CachePadded<AtomicU64>,
    lock_busy_aborts: CachePadded<AtomicU64>,
    fallback_acquisitions: CachePadded<AtomicU64>,
}

impl TransactionalExclusion {
    /// Creates the strategy. Without RTM every entry takes the fallback flag.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        let hardware = htm::rtm_supported();
        if !hardware {
            tracing::warn!(
                "restricted transactional memory unavailable; transactional strategy will always take the fallback lock"
            );
        }
        Self {
            flag: SpinFlag::new(),
            max_retries,
            hardware,
            aborts: CachePadded::new(AtomicU64::new(0)),
            lock_busy_aborts: CachePadded::new(AtomicU64::new(0)),
            fallback_acquisitions: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Whether transactions are actually attempted.
    #[must_use]
    pub fn uses_hardware(&self) -> bool {
        self.hardware
    }

    fn acquire_fallback(&self) {
        self.flag.acquire_with(|word| word.swap(SpinFlag::HELD, Ordering::Acquire));
        self.fallback_acquisitions.fetch_add(1, Ordering::Relaxed);
    }
}

// SAFETY: outside a transaction the spin flag is taken with `Acquire` and
// released with `Release`. A transaction reads the flag first, so the fallback
// holder aborts it, and a committed transaction is atomic with respect to
// every other thread.
#[allow(unsafe_code)]
unsafe impl Exclusion for TransactionalExclusion {
    fn enter(&self) {
        if !self.hardware {
            self.acquire_fallback();
            return;
        }

        let mut retries = 0u32;
        loop {
            self.flag.wait_until_free();

            let status = htm::begin();
            if status == htm::XBEGIN_STARTED {
                // The flag is now in our read set: a fallback acquirer aborts us.
                if self.flag.is_held() {
                    htm::abort_lock_busy();
                }
                return;
            }

            self.aborts.fetch_add(1, Ordering::Relaxed);
            if status & htm::ABORT_EXPLICIT != 0 && htm::abort_code(status) == htm::ABORT_LOCK_BUSY {
                self.lock_busy_aborts.fetch_add(1, Ordering::Relaxed);
            }

            retries += 1;
            let retriable = status & (htm::ABORT_EXPLICIT | htm::ABORT_RETRY) != 0;
            if retries > self.max_retries || !retriable {
                self.acquire_fallback();
                return;
            }
        }
    }

    fn exit(&self) {
        if self.hardware && htm::in_transaction() {
            htm::commit();
        } else {
            self.flag.release();
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Transactional
    }

    fn stats(&self) -> RegionStats {
        RegionStats {
            aborts: self.aborts.load(Ordering::Relaxed),
            lock_busy_aborts: self.lock_busy_aborts.load(Ordering::Relaxed),
            fallback_acquisitions: self.fallback_acquisitions.load(Ordering::Relaxed),
        }
    }
}

/// Lock-elision spinlock (the default).
pub struct ElisionExclusion {
    flag: SpinFlag,
}

impl ElisionExclusion {
    /// Creates an unheld strategy.
    #[must_use]
    pub fn new() -> Self {
        Self { flag: SpinFlag::new() }
    }
}

impl Default for ElisionExclusion {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: the flag is swapped with acquire semantics and cleared with a
// release store. When the processor elides the lock, a conflicting access
// aborts the elision and the swap is replayed for real.
#[allow(unsafe_code)]
unsafe impl Exclusion for ElisionExclusion {
    fn enter(&self) {
        self.flag.acquire_with(htm::elided_swap_acquire);
    }

    fn exit(&self) {
        htm::elided_release(&self.flag.0);
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Elision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("lock".parse::<StrategyKind>().unwrap(), StrategyKind::Lock);
        assert_eq!("Transactional".parse::<StrategyKind>().unwrap(), StrategyKind::Transactional);
        assert_eq!("ELISION".parse::<StrategyKind>().unwrap(), StrategyKind::Elision);
        assert!(matches!("hle".parse::<StrategyKind>(), Err(RuntimeError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_default_matches_features() {
        let expected = if cfg!(feature = "no-hle") {
            StrategyKind::Lock
        } else if cfg!(feature = "use-rtm") {
            StrategyKind::Transactional
        } else {
            StrategyKind::Elision
        };
        assert_eq!(StrategyKind::default(), expected);
    }

    #[test]
    fn test_spin_flag_acquire_release() {
        let flag = SpinFlag::new();
        assert!(!flag.is_held());
        flag.acquire_with(|word| word.swap(SpinFlag::HELD, Ordering::Acquire));
        assert!(flag.is_held());
        flag.release();
        assert!(!flag.is_held());
    }

    #[test]
    fn test_every_strategy_excludes() {
        // A read-modify-write split across a yield only survives if the
        // strategy serialises critical sections. The syscall aborts any
        // transaction, so the transactional path ends up on the flag.
        for kind in StrategyKind::ALL {
            let strategy: Arc<dyn Exclusion> = Arc::from(build_strategy(kind, 8));
            let counter = Arc::new(AtomicU64::new(0));

            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let strategy = Arc::clone(&strategy);
                    let counter = Arc::clone(&counter);
                    thread::spawn(move || {
                        for _ in 0..500 {
                            strategy.enter();
                            let seen = counter.load(Ordering::Relaxed);
                            thread::yield_now();
                            counter.store(seen + 1, Ordering::Relaxed);
                            strategy.exit();
                        }
                    })
                })
                .collect();

            for worker in workers {
                worker.join().unwrap();
            }
            assert_eq!(counter.load(Ordering::Relaxed), 2_000, "strategy {kind}");
        }
    }

    #[test]
    fn test_transactional_stats_without_hardware() {
        let strategy = TransactionalExclusion::new(4);
        strategy.enter();
        strategy.exit();
        let stats = strategy.stats();
        if strategy.uses_hardware() {
            assert!(stats.fallback_acquisitions <= 1);
        } else {
            assert_eq!(stats.fallback_acquisitions, 1);
            assert_eq!(stats.aborts, 0);
        }
    }
}
