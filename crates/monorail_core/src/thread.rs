//! # Logical Threads
//!
//! A logical thread is an OS thread that runs application logic only while
//! holding the runtime's exclusivity region. It gives the region up in
//! exactly four places: suspending, joining, sleeping and yielding.
//!
//! ## Lifecycle
//!
//! ```text
//! STARTING ──> RUNNING ──> DONE
//!                │  ▲
//!        suspend │  │ re-enter region
//!                ▼  │
//!          SUSPENDED ──resume──> WOKEN
//! ```
//!
//! ## Handshake
//!
//! `suspend` marks the thread SUSPENDED while holding the thread's private
//! state mutex, then leaves the region and waits on the private condvar. A
//! resumer has to take the same mutex to mark the thread WOKEN, so a wakeup
//! can never slip in between "decided to sleep" and "asleep".

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::thread::{JoinHandle, ThreadId};

use parking_lot::{Condvar, Mutex};

use crate::error::{RuntimeError, RuntimeResult};
use crate::region::ExclusivityRegion;

/// Runtime-unique identifier of a logical thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalId(u64);

impl LogicalId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a logical thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ThreadState {
    /// Created, not yet inside the region.
    Starting,
    /// Holding the region and running.
    Running,
    /// Blocked in `suspend`, region released.
    Suspended,
    /// Resumed, waiting to re-enter the region.
    Woken,
    /// Finished (returned or panicked).
    Done,
}

pub(crate) struct ThreadCore {
    id: LogicalId,
    name: String,
    region: Arc<ExclusivityRegion>,
    os_thread: OnceLock<ThreadId>,
    state: Mutex<ThreadState>,
    wake: Condvar,
}

impl ThreadCore {
    pub(crate) fn new(id: LogicalId, name: String, region: Arc<ExclusivityRegion>) -> Self {
        Self {
            id,
            name,
            region,
            os_thread: OnceLock::new(),
            state: Mutex::new(ThreadState::Starting),
            wake: Condvar::new(),
        }
    }
}

/// Shared reference to a logical thread.
///
/// Cheap to clone. Wait queues of the primitives hold these; they never own
/// the OS thread.
#[derive(Clone)]
pub struct ThreadHandle(Arc<ThreadCore>);

impl ThreadHandle {
    pub(crate) fn new(core: ThreadCore) -> Self {
        Self(Arc::new(core))
    }

    /// Identifier of the thread.
    #[inline]
    #[must_use]
    pub fn id(&self) -> LogicalId {
        self.0.id
    }

    /// Name of the thread.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ThreadState {
        *self.0.state.lock()
    }

    /// Blocks the calling logical thread until another one resumes it.
    ///
    /// Releases the region while blocked and holds it again on return.
    ///
    /// # Panics
    ///
    /// Panics if this handle is not the calling thread's own, or if the
    /// region is not held.
    pub fn suspend(&self) {
        let caller = std::thread::current().id();
        assert!(
            self.0.os_thread.get() == Some(&caller),
            "logical thread {} `{}` can only be suspended by itself",
            self.0.id,
            self.0.name
        );

        let mut state = self.0.state.lock();
        *state = ThreadState::Suspended;
        tracing::trace!(thread = %self.0.id, "suspended");
        self.0.region.exit();

        while *state != ThreadState::Woken {
            self.0.wake.wait(&mut state);
        }
        drop(state);

        self.0.region.enter();
        *self.0.state.lock() = ThreadState::Running;
        tracing::trace!(thread = %self.0.id, "running again");
    }

    /// Wakes a suspended thread. The caller keeps the region; the woken
    /// thread competes for it once the caller gives it up.
    ///
    /// Resuming a thread that is not suspended has no effect.
    ///
    /// # Panics
    ///
    /// Panics if the thread has finished.
    pub fn resume(&self) {
        let mut state = self.0.state.lock();
        assert!(
            *state != ThreadState::Done,
            "cannot resume logical thread {} `{}`: it has finished",
            self.0.id,
            self.0.name
        );
        if *state == ThreadState::Suspended {
            *state = ThreadState::Woken;
            tracing::trace!(thread = %self.0.id, "resumed");
            let _ = self.0.wake.notify_one();
        }
    }

    pub(crate) fn bind_os_thread(&self, os_thread: ThreadId) {
        let _ = self.0.os_thread.set(os_thread);
    }

    /// Enters the region and marks the thread running until the returned
    /// guard drops.
    pub(crate) fn activate(&self) -> Activation<'_> {
        self.0.region.enter();
        *self.0.state.lock() = ThreadState::Running;
        Activation { core: &self.0 }
    }
}

impl PartialEq for ThreadHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ThreadHandle {}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Marks the thread DONE and leaves the region, also when the thread body
/// panics.
pub(crate) struct Activation<'a> {
    core: &'a ThreadCore,
}

impl Drop for Activation<'_> {
    fn drop(&mut self) {
        *self.core.state.lock() = ThreadState::Done;
        if self.core.region.is_held() {
            self.core.region.exit();
        }
    }
}

/// Owning handle of a spawned logical thread.
pub struct LogicalThread<T> {
    handle: ThreadHandle,
    os: JoinHandle<T>,
}

impl<T> LogicalThread<T> {
    pub(crate) fn new(handle: ThreadHandle, os: JoinHandle<T>) -> Self {
        Self { handle, os }
    }

    /// Shared handle, for resuming or inspecting the thread.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> &ThreadHandle {
        &self.handle
    }

    /// Identifier of the thread.
    #[inline]
    #[must_use]
    pub fn id(&self) -> LogicalId {
        self.handle.id()
    }

    /// Name of the thread.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ThreadState {
        self.handle.state()
    }

    /// Whether the OS thread has finished running.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.os.is_finished()
    }

    /// Waits for the thread to finish and returns its result.
    ///
    /// Releases the region while waiting and holds it again on return.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ThreadPanicked`] if the thread body panicked.
    ///
    /// # Panics
    ///
    /// Panics if the region is not held or a thread tries to join itself.
    pub fn join(self) -> RuntimeResult<T> {
        let region = Arc::clone(&self.handle.0.region);
        assert!(
            region.is_held(),
            "joining logical thread {} requires holding the exclusivity region",
            self.handle.id()
        );
        assert!(
            self.os.thread().id() != std::thread::current().id(),
            "logical thread {} cannot join itself",
            self.handle.id()
        );

        let Self { handle, os } = self;
        region.exit();
        let outcome = os.join();
        region.enter();

        tracing::debug!(thread = %handle.id(), panicked = outcome.is_err(), "logical thread joined");
        outcome.map_err(|payload| RuntimeError::ThreadPanicked {
            name: handle.name().to_owned(),
            message: panic_message(payload.as_ref()),
        })
    }
}

impl<T> fmt::Debug for LogicalThread<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LogicalThread").field(&self.handle).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}
