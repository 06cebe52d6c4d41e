//! # Region-Guarded Cell
//!
//! Shared state of the primitives lives in [`Exclusive`] cells. The cell has
//! no lock of its own: access is granted only while the calling OS thread
//! holds the cell's region, which already guarantees exclusivity.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::ExclusivityRegion;

/// A value that may only be touched from inside its exclusivity region.
pub struct Exclusive<T> {
    region: Arc<ExclusivityRegion>,
    borrowed: AtomicBool,
    value: UnsafeCell<T>,
}

// SAFETY: every access to `value` goes through `with`, which requires the
// calling OS thread to hold `region`. The region's `Exclusion` is an unsafe
// trait whose implementations guarantee at most one holder outside a hardware
// transaction, and a transaction that conflicts is rolled back before its
// accesses become visible.
unsafe impl<T: Send> Sync for Exclusive<T> {}

impl<T> Exclusive<T> {
    /// Wraps `value`, guarding it with `region`.
    #[must_use]
    pub fn new(region: Arc<ExclusivityRegion>, value: T) -> Self {
        Self {
            region,
            borrowed: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Runs `f` with mutable access to the value.
    ///
    /// Do not suspend, join or yield inside `f`: the region must stay held
    /// for the whole call.
    ///
    /// # Panics
    ///
    /// Panics if the region is not held by the calling OS thread, or if `f`
    /// reenters `with` on the same cell.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        assert!(
            self.region.is_held(),
            "region-guarded state accessed outside its exclusivity region"
        );
        let reentered = self.borrowed.swap(true, Ordering::Acquire);
        assert!(!reentered, "region-guarded state borrowed reentrantly");

        let _borrow = BorrowFlag(&self.borrowed);
        // SAFETY: the region is held (checked above) and the borrow flag rules
        // out a second live reference from this thread.
        let value = unsafe { &mut *self.value.get() };
        f(value)
    }

    /// Mutable access through unique ownership; no region needed.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Unwraps the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    /// The region guarding this value.
    #[inline]
    #[must_use]
    pub fn region(&self) -> &Arc<ExclusivityRegion> {
        &self.region
    }
}

impl<T> fmt::Debug for Exclusive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exclusive")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Clears the borrow flag, also when `f` unwinds.
struct BorrowFlag<'a>(&'a AtomicBool);

impl Drop for BorrowFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::StrategyKind;

    fn region() -> Arc<ExclusivityRegion> {
        Arc::new(ExclusivityRegion::new(StrategyKind::Lock, 16))
    }

    #[test]
    fn test_with_inside_region() {
        let region = region();
        let cell = Exclusive::new(Arc::clone(&region), vec![1, 2]);

        let _guard = region.hold();
        cell.with(|v| v.push(3));
        assert_eq!(cell.with(|v| v.len()), 3);
    }

    #[test]
    #[should_panic(expected = "outside its exclusivity region")]
    fn test_with_outside_region_panics() {
        let cell = Exclusive::new(region(), 0u32);
        cell.with(|v| *v += 1);
    }

    #[test]
    #[should_panic(expected = "reentrantly")]
    fn test_reentrant_with_panics() {
        let region = region();
        let cell = Exclusive::new(Arc::clone(&region), 0u32);
        let _guard = region.hold();
        cell.with(|_| cell.with(|v| *v += 1));
    }

    #[test]
    fn test_borrow_flag_cleared_after_panic() {
        let region = region();
        let cell = Exclusive::new(Arc::clone(&region), 7u32);
        let _guard = region.hold();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cell.with(|_| panic!("inside"));
        }));
        assert!(result.is_err());
        assert_eq!(cell.with(|v| *v), 7);
    }

    #[test]
    fn test_owned_access_skips_region() {
        let mut cell = Exclusive::new(region(), String::from("a"));
        cell.get_mut().push('b');
        assert_eq!(cell.into_inner(), "ab");
    }
}
