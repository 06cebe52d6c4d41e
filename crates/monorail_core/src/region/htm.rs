//! # Hardware Transaction Shims
//!
//! Thin wrappers over the x86-64 RTM instructions (`XBEGIN`, `XEND`,
//! `XABORT`, `XTEST`) and the HLE prefixes (`XACQUIRE`, `XRELEASE`).
//!
//! The RTM intrinsics in `core::arch` are not stable, so the instructions are
//! emitted with `asm!`. `begin`, `commit`, `abort_lock_busy` and
//! `in_transaction` must only run after [`rtm_supported`] returned `true`:
//! on a CPU without RTM they raise `#UD`. The HLE prefixes are plain hints and
//! are ignored by processors that do not implement elision.
//!
//! On other architectures every function degrades to its non-transactional
//! meaning so the strategies above compile unchanged.

#![allow(unsafe_code)]

/// Value left in `EAX` when `XBEGIN` starts a transaction.
pub(crate) const XBEGIN_STARTED: u32 = u32::MAX;

/// Abort status bit: the abort came from `XABORT`.
pub(crate) const ABORT_EXPLICIT: u32 = 1 << 0;

/// Abort status bit: the transaction may succeed on retry.
pub(crate) const ABORT_RETRY: u32 = 1 << 1;

/// `XABORT` code used when the fallback flag was observed held.
pub(crate) const ABORT_LOCK_BUSY: u32 = 42;

/// Extracts the `XABORT` immediate from an abort status.
#[inline]
pub(crate) const fn abort_code(status: u32) -> u32 {
    status >> 24
}

/// Returns whether restricted transactional memory can be used.
///
/// Checks CPUID leaf 7: `EBX[11]` advertises RTM, `EDX[11]` reports that
/// every transaction aborts (microcode-disabled TSX). Cached after the first
/// call.
#[cfg(target_arch = "x86_64")]
pub(crate) fn rtm_supported() -> bool {
    use std::arch::x86_64::{__cpuid, __cpuid_count};
    use std::sync::OnceLock;

    static SUPPORTED: OnceLock<bool> = OnceLock::new();

    *SUPPORTED.get_or_init(|| {
        // SAFETY: CPUID exists on every x86-64 processor.
        #[allow(unused_unsafe)]
        let max_leaf = unsafe { __cpuid(0) }.eax;
        if max_leaf < 7 {
            return false;
        }
        // SAFETY: leaf 7 is within the range reported by leaf 0.
        #[allow(unused_unsafe)]
        let features = unsafe { __cpuid_count(7, 0) };
        let rtm = features.ebx & (1 << 11) != 0;
        let always_aborts = features.edx & (1 << 11) != 0;
        rtm && !always_aborts
    })
}

/// Starts a hardware transaction.
///
/// Returns [`XBEGIN_STARTED`] inside the transaction. When the transaction
/// aborts, the processor discards every write made since this call, restores
/// the registers, and execution comes back out of this function a second
/// time carrying the abort status.
#[cfg(target_arch = "x86_64")]
#[inline]
pub(crate) fn begin() -> u32 {
    let mut status = XBEGIN_STARTED;
    // SAFETY: callers checked `rtm_supported()`. The fallback address is the
    // instruction right after XBEGIN, so both paths leave through the same
    // exit with the status in EAX.
    unsafe {
        std::arch::asm!("xbegin 2f", "2:", inout("eax") status, options(nostack));
    }
    status
}

/// Commits the current hardware transaction.
#[cfg(target_arch = "x86_64")]
#[inline]
pub(crate) fn commit() {
    // SAFETY: only called when `in_transaction()` is true.
    unsafe {
        std::arch::asm!("xend", options(nostack));
    }
}

/// Aborts the current transaction with [`ABORT_LOCK_BUSY`].
#[cfg(target_arch = "x86_64")]
#[inline]
pub(crate) fn abort_lock_busy() {
    // SAFETY: inside a transaction control transfers to the XBEGIN fallback;
    // outside one XABORT is a no-op.
    unsafe {
        std::arch::asm!("xabort 42", options(nostack));
    }
}

/// Returns whether the calling thread is inside a hardware transaction.
#[cfg(target_arch = "x86_64")]
#[inline]
pub(crate) fn in_transaction() -> bool {
    let active: u8;
    // SAFETY: callers checked `rtm_supported()`; XTEST only reads state.
    unsafe {
        std::arch::asm!(
            "xtest",
            "setnz {active}",
            active = out(reg_byte) active,
            options(nostack, nomem),
        );
    }
    active != 0
}

/// Swaps `1` into `flag` with the XACQUIRE hint, returning the old value.
#[cfg(target_arch = "x86_64")]
#[inline]
pub(crate) fn elided_swap_acquire(flag: &std::sync::atomic::AtomicU32) -> u32 {
    let mut value: u32 = 1;
    // SAFETY: `flag` points at a live, aligned u32. XCHG with a memory
    // operand is implicitly locked; 0xF2 is the XACQUIRE prefix.
    unsafe {
        std::arch::asm!(
            ".byte 0xf2",
            "xchg dword ptr [{flag}], {value:e}",
            flag = in(reg) flag.as_ptr(),
            value = inout(reg) value,
            options(nostack),
        );
    }
    value
}

/// Stores `0` into `flag` with the XRELEASE hint.
#[cfg(target_arch = "x86_64")]
#[inline]
pub(crate) fn elided_release(flag: &std::sync::atomic::AtomicU32) {
    // SAFETY: `flag` points at a live, aligned u32. A plain store has release
    // semantics on x86-64; 0xF3 is the XRELEASE prefix.
    unsafe {
        std::arch::asm!(
            ".byte 0xf3",
            "mov dword ptr [{flag}], 0",
            flag = in(reg) flag.as_ptr(),
            options(nostack),
        );
    }
}

#[cfg(not(target_arch = "x86_64"))]
pub(crate) fn rtm_supported() -> bool {
    false
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub(crate) fn begin() -> u32 {
    0
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub(crate) fn commit() {}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub(crate) fn abort_lock_busy() {}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub(crate) fn in_transaction() -> bool {
    false
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub(crate) fn elided_swap_acquire(flag: &std::sync::atomic::AtomicU32) -> u32 {
    flag.swap(1, std::sync::atomic::Ordering::Acquire)
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub(crate) fn elided_release(flag: &std::sync::atomic::AtomicU32) {
    flag.store(0, std::sync::atomic::Ordering::Release);
}
