//! # Barrier
//!
//! Blocks arrivals until a count of them has been reached, then lets them all
//! through. Once open, the barrier stays open until [`Barrier::reset`].
//!
//! The counter is signed: [`Barrier::adjust`] may drive it below zero, and
//! only landing exactly on zero releases the waiters.

use std::collections::VecDeque;
use std::fmt;

use crate::region::Exclusive;
use crate::runtime::Runtime;
use crate::thread::ThreadHandle;

struct BarrierState {
    outstanding: isize,
    waiters: VecDeque<ThreadHandle>,
}

/// Arrival barrier for logical threads.
pub struct Barrier {
    runtime: Runtime,
    state: Exclusive<BarrierState>,
}

enum Arrival {
    PassThrough,
    Release,
    Wait,
}

impl Barrier {
    /// Creates a barrier that opens after `count` arrivals.
    ///
    /// A count of zero creates an open barrier.
    #[must_use]
    pub fn new(runtime: &Runtime, count: usize) -> Self {
        Self {
            runtime: runtime.clone(),
            state: runtime.exclusive(BarrierState {
                outstanding: clamp_count(count),
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Records an arrival.
    ///
    /// Blocks until the barrier opens. The arrival that opens it releases
    /// everyone and then yields so the released threads can run.
    pub fn arrive(&self) {
        let arrival = self.state.with(|s| {
            if s.outstanding <= 0 {
                return Arrival::PassThrough;
            }
            s.outstanding -= 1;
            if s.outstanding == 0 {
                Arrival::Release
            } else {
                Arrival::Wait
            }
        });

        match arrival {
            Arrival::PassThrough => {}
            Arrival::Release => {
                self.release();
                self.runtime.yield_now();
            }
            Arrival::Wait => {
                let me = self.runtime.current();
                self.state.with(|s| s.waiters.push_back(me.clone()));
                me.suspend();
            }
        }
    }

    /// Opens the barrier: resumes every waiter in arrival order.
    pub fn release(&self) {
        let waiters = self.state.with(|s| {
            s.outstanding = 0;
            std::mem::take(&mut s.waiters)
        });
        for waiter in waiters {
            waiter.resume();
        }
    }

    /// Changes the outstanding count by `delta` and returns the new count.
    ///
    /// Landing exactly on zero opens the barrier. A negative count is kept
    /// as is, so a later positive `delta` can bring it back to zero.
    pub fn adjust(&self, delta: isize) -> isize {
        let remaining = self.state.with(|s| {
            s.outstanding = s.outstanding.saturating_add(delta);
            s.outstanding
        });
        if remaining == 0 {
            self.release();
        }
        remaining
    }

    /// Releases current waiters and re-arms the barrier with `count`.
    pub fn reset(&self, count: usize) {
        self.release();
        self.state.with(|s| s.outstanding = clamp_count(count));
    }

    /// Arrivals still needed to open the barrier; zero or negative when open.
    #[must_use]
    pub fn outstanding(&self) -> isize {
        self.state.with(|s| s.outstanding)
    }

    /// Threads currently blocked on the barrier.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.state.with(|s| s.waiters.len())
    }
}

fn clamp_count(count: usize) -> isize {
    isize::try_from(count).unwrap_or(isize::MAX)
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Barrier").finish_non_exhaustive()
    }
}
