//! # Monorail Core
//!
//! Cooperative logical threads running over a single exclusivity region.
//!
//! - At most one logical thread runs application logic at a time (unless
//!   hardware transactions let non-conflicting ones overlap)
//! - Primitives take no locks of their own; the region is the lock
//! - Threads give the region up only to suspend, join, sleep or yield
//!
//! ## Architecture Rules
//!
//! 1. **One region per runtime** - passed around explicitly, never global
//! 2. **FIFO wakeups** - every wait queue is first come, first served
//! 3. **Misuse panics** - suspending someone else, touching guarded state
//!    outside the region and similar bugs fail loudly
//!
//! ## Example
//!
//! ```rust,ignore
//! use monorail_core::{BoundedChannel, Runtime, StrategyKind};
//!
//! let runtime = Runtime::with_strategy(StrategyKind::Lock);
//! let rt = runtime.clone();
//! let sum = runtime.run(move || {
//!     let channel = std::sync::Arc::new(BoundedChannel::new(&rt, 2));
//!     let tx = channel.clone();
//!     let producer = rt.spawn(move || (1..=3).for_each(|v| tx.send(v))).unwrap();
//!     let sum: i32 = (0..3).map(|_| channel.receive()).sum();
//!     producer.join().unwrap();
//!     sum
//! })?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod region;
pub mod runtime;
pub mod sync;
pub mod thread;

pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use region::{Exclusive, ExclusivityRegion, RegionGuard, RegionStats, StrategyKind};
pub use runtime::Runtime;
pub use sync::{Barrier, BoundedChannel, Channel, Condition, Semaphore};
pub use thread::{LogicalId, LogicalThread, ThreadHandle, ThreadState};
