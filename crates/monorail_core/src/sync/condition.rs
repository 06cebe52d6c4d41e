//! # Condition Variable
//!
//! No associated mutex: the region already plays that role. Callers test
//! their predicate, call [`Condition::wait`], and test again after waking.

use std::collections::VecDeque;
use std::fmt;

use crate::region::Exclusive;
use crate::runtime::Runtime;
use crate::thread::ThreadHandle;

/// FIFO condition variable for logical threads.
pub struct Condition {
    runtime: Runtime,
    waiters: Exclusive<VecDeque<ThreadHandle>>,
}

impl Condition {
    /// Creates a condition with no waiters.
    #[must_use]
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            runtime: runtime.clone(),
            waiters: runtime.exclusive(VecDeque::new()),
        }
    }

    /// Blocks until signalled.
    pub fn wait(&self) {
        let me = self.runtime.current();
        self.waiters.with(|w| w.push_back(me.clone()));
        me.suspend();
    }

    /// Wakes the longest waiting thread, if any.
    pub fn signal(&self) {
        if let Some(waiter) = self.waiters.with(VecDeque::pop_front) {
            waiter.resume();
        }
    }

    /// Wakes every waiting thread, in the order they started waiting.
    pub fn broadcast(&self) {
        for waiter in self.waiters.with(std::mem::take) {
            waiter.resume();
        }
    }

    /// Threads currently blocked in [`Condition::wait`].
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.waiters.with(|w| w.len())
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::StrategyKind;
    use std::sync::Arc;

    /// Spawns waiters one at a time, each registered before the next starts.
    fn register_waiters(
        runtime: &Runtime,
        cond: &Arc<Condition>,
        woken: &Arc<Exclusive<Vec<usize>>>,
        tags: std::ops::Range<usize>,
    ) -> Vec<crate::thread::LogicalThread<()>> {
        let mut waiters = Vec::new();
        for tag in tags {
            let waiter_cond = Arc::clone(cond);
            let waiter_woken = Arc::clone(woken);
            let before = cond.waiting();
            waiters.push(
                runtime
                    .spawn(move || {
                        waiter_cond.wait();
                        waiter_woken.with(|w| w.push(tag));
                    })
                    .unwrap(),
            );
            while cond.waiting() == before {
                runtime.yield_now();
            }
        }
        waiters
    }

    #[test]
    fn test_signal_wakes_earliest_waiter() {
        for strategy in StrategyKind::ALL {
            let runtime = Runtime::with_strategy(strategy);
            let rt = runtime.clone();
            runtime
                .run(move || {
                    let cond = Arc::new(Condition::new(&rt));
                    let woken = Arc::new(rt.exclusive(Vec::new()));
                    let waiters = register_waiters(&rt, &cond, &woken, 0..3);

                    for (served, waiter) in waiters.iter().enumerate() {
                        cond.signal();
                        while !waiter.is_finished() {
                            rt.yield_now();
                        }
                        assert_eq!(cond.waiting(), 2 - served);
                    }
                    assert_eq!(woken.with(|w| w.clone()), vec![0, 1, 2]);
                    for waiter in waiters {
                        waiter.join().unwrap();
                    }
                })
                .unwrap();
        }
    }

    #[test]
    fn test_broadcast_wakes_only_current_waiters() {
        for strategy in StrategyKind::ALL {
            let runtime = Runtime::with_strategy(strategy);
            let rt = runtime.clone();
            runtime
                .run(move || {
                    let cond = Arc::new(Condition::new(&rt));
                    let woken = Arc::new(rt.exclusive(Vec::new()));
                    let early = register_waiters(&rt, &cond, &woken, 0..3);

                    cond.broadcast();
                    assert_eq!(cond.waiting(), 0);
                    let late = register_waiters(&rt, &cond, &woken, 3..4);
                    for waiter in early {
                        waiter.join().unwrap();
                    }
                    let mut seen = woken.with(|w| w.clone());
                    seen.sort_unstable();
                    assert_eq!(seen, vec![0, 1, 2]);
                    assert_eq!(cond.waiting(), 1);

                    cond.signal();
                    for waiter in late {
                        waiter.join().unwrap();
                    }
                    assert_eq!(woken.with(|w| w.last().copied()), Some(3));
                })
                .unwrap();
        }
    }

    #[test]
    fn test_signal_without_waiters_is_noop() {
        let runtime = Runtime::with_strategy(StrategyKind::Lock);
        let rt = runtime.clone();
        runtime
            .run(move || {
                let cond = Condition::new(&rt);
                cond.signal();
                cond.broadcast();
                assert_eq!(cond.waiting(), 0);
            })
            .unwrap();
    }
}
