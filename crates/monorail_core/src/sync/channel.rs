//! # Channels
//!
//! [`Channel`] is an unbounded FIFO of values with a FIFO of waiting readers.
//! [`BoundedChannel`] adds a [`Semaphore`] of free slots in front of it.
//!
//! ```text
//! send ──> buffer.push_back ──> resume head reader (it re-checks)
//! receive ──> buffer.pop_front, or queue up as reader and suspend
//! ```

use std::collections::VecDeque;
use std::fmt;

use super::Semaphore;
use crate::region::Exclusive;
use crate::runtime::Runtime;
use crate::thread::ThreadHandle;

struct ChannelState<T> {
    buffer: VecDeque<T>,
    readers: VecDeque<ThreadHandle>,
}

/// Unbounded multi-producer multi-consumer channel.
pub struct Channel<T> {
    runtime: Runtime,
    state: Exclusive<ChannelState<T>>,
}

impl<T> Channel<T> {
    /// Creates an empty channel.
    #[must_use]
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            runtime: runtime.clone(),
            state: runtime.exclusive(ChannelState {
                buffer: VecDeque::new(),
                readers: VecDeque::new(),
            }),
        }
    }

    /// Appends `value` and wakes the longest waiting reader.
    pub fn send(&self, value: T) {
        let reader = self.state.with(|s| {
            s.buffer.push_back(value);
            s.readers.pop_front()
        });
        if let Some(reader) = reader {
            reader.resume();
        }
    }

    /// Takes the oldest value, blocking while the channel is empty.
    pub fn receive(&self) -> T {
        loop {
            if let Some(value) = self.try_receive() {
                return value;
            }
            let me = self.runtime.current();
            self.state.with(|s| s.readers.push_back(me.clone()));
            me.suspend();
        }
    }

    /// Takes the oldest value if there is one.
    pub fn try_receive(&self) -> Option<T> {
        self.state.with(|s| s.buffer.pop_front())
    }

    /// Number of buffered values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.with(|s| s.buffer.len())
    }

    /// Whether no value is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Readers currently blocked in [`Channel::receive`].
    #[must_use]
    pub fn waiting_readers(&self) -> usize {
        self.state.with(|s| s.readers.len())
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").finish_non_exhaustive()
    }
}

/// Channel holding at most `capacity` values in flight.
pub struct BoundedChannel<T> {
    inner: Channel<T>,
    slots: Semaphore,
    capacity: usize,
}

impl<T> BoundedChannel<T> {
    /// Creates a channel with room for `capacity` values.
    #[must_use]
    pub fn new(runtime: &Runtime, capacity: usize) -> Self {
        Self {
            inner: Channel::new(runtime),
            slots: Semaphore::new(runtime, capacity),
            capacity,
        }
    }

    /// Appends `value`, blocking while the channel is full.
    pub fn send(&self, value: T) {
        self.slots.wait();
        self.inner.send(value);
    }

    /// Takes the oldest value, blocking while the channel is empty.
    ///
    /// The slot is handed back before the value is taken, so a blocked
    /// sender may be woken while this receiver itself still waits.
    pub fn receive(&self) -> T {
        self.slots.post();
        self.inner.receive()
    }

    /// Takes the oldest value if there is one.
    pub fn try_receive(&self) -> Option<T> {
        let value = self.inner.try_receive()?;
        self.slots.post();
        Some(value)
    }

    /// Maximum number of values in flight.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buffered values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no value is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Senders currently blocked on a full channel.
    #[must_use]
    pub fn waiting_senders(&self) -> usize {
        self.slots.waiting()
    }
}

impl<T> fmt::Debug for BoundedChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedChannel")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
