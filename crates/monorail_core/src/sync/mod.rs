//! # Synchronization Primitives for Logical Threads
//!
//! No locks of their own. Every primitive keeps its state in an
//! [`Exclusive`](crate::region::Exclusive) cell, and the region guarantees
//! nobody else touches it while we do.
//!
//! ## The Pattern
//!
//! ```text
//! decide    ──> inspect/update state under the region
//! wait      ──> enqueue own ThreadHandle, suspend (region released)
//! wake      ──> pop head waiter, resume it (region kept)
//! re-check  ──> woken thread loops back to "decide"
//! ```
//!
//! Wait queues are strict FIFO. A woken thread never receives a value or a
//! permit directly; it re-checks once it holds the region again.
//!
//! All operations must be called from a logical thread that holds the
//! region.

mod barrier;
mod channel;
mod condition;
mod semaphore;

pub use barrier::Barrier;
pub use channel::{BoundedChannel, Channel};
pub use condition::Condition;
pub use semaphore::Semaphore;
