//! # Counting Semaphore

use std::collections::VecDeque;
use std::fmt;

use crate::region::Exclusive;
use crate::runtime::Runtime;
use crate::thread::ThreadHandle;

struct SemaphoreState {
    count: usize,
    waiters: VecDeque<ThreadHandle>,
}

/// Counting semaphore with FIFO wakeups.
pub struct Semaphore {
    runtime: Runtime,
    state: Exclusive<SemaphoreState>,
}

impl Semaphore {
    /// Creates a semaphore holding `count` permits.
    #[must_use]
    pub fn new(runtime: &Runtime, count: usize) -> Self {
        Self {
            runtime: runtime.clone(),
            state: runtime.exclusive(SemaphoreState {
                count,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Takes a permit, blocking while none is available.
    ///
    /// A woken waiter checks again; if another thread got the permit first
    /// it queues up at the back.
    pub fn wait(&self) {
        loop {
            if self.try_wait() {
                return;
            }
            let me = self.runtime.current();
            self.state.with(|s| s.waiters.push_back(me.clone()));
            me.suspend();
        }
    }

    /// Takes a permit if one is available.
    #[must_use]
    pub fn try_wait(&self) -> bool {
        self.state.with(|s| {
            if s.count == 0 {
                false
            } else {
                s.count -= 1;
                true
            }
        })
    }

    /// Returns a permit and wakes the longest waiting thread, if any.
    pub fn post(&self) {
        let head = self.state.with(|s| {
            s.count += 1;
            s.waiters.pop_front()
        });
        if let Some(waiter) = head {
            waiter.resume();
        }
    }

    /// Sets the number of permits.
    ///
    /// # Panics
    ///
    /// Panics if any thread is waiting.
    pub fn reset(&self, count: usize) {
        self.state.with(|s| {
            assert!(
                s.waiters.is_empty(),
                "semaphore reset while {} thread(s) are waiting",
                s.waiters.len()
            );
            s.count = count;
        });
    }

    /// Permits currently available.
    #[must_use]
    pub fn available(&self) -> usize {
        self.state.with(|s| s.count)
    }

    /// Threads currently blocked in [`Semaphore::wait`].
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.state.with(|s| s.waiters.len())
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore").finish_non_exhaustive()
    }
}
