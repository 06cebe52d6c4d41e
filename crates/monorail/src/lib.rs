//! # Monorail
//!
//! Cooperative logical threads over one exclusivity region, plus a
//! work-stealing queue set designed to run inside it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           MONORAIL                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────────────────┐    ┌────────────────────────┐  │
//! │  │   monorail_core          │    │   monorail_queueset    │  │
//! │  │                          │    │                        │  │
//! │  │  • ExclusivityRegion     │    │  • UnorderedSet        │  │
//! │  │    (lock / RTM / HLE)    │    │  • ArrayOfQueues       │  │
//! │  │  • Runtime, threads      │    │  • SingleQueue         │  │
//! │  │  • Barrier, Semaphore,   │    │                        │  │
//! │  │    Condition, Channels   │    │                        │  │
//! │  └────────────┬─────────────┘    └───────────┬────────────┘  │
//! │               │      Exclusive<ArrayOfQueues>│               │
//! │               └──────────────┬───────────────┘               │
//! │                              ▼                               │
//! │                   pipeline (monorail_demo)                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Entry point
//!
//! A program enters the region, spawns one logical thread running its main
//! routine, joins it and exits. [`Runtime::run`] does exactly that.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod pipeline;

// Re-export the units
pub use monorail_core;
pub use monorail_queueset;

// Re-export commonly used types
pub use monorail_core::{
    Barrier, BoundedChannel, Channel, Condition, Exclusive, LogicalThread, Runtime, RuntimeConfig,
    RuntimeError, RuntimeResult, Semaphore, StrategyKind, ThreadHandle, ThreadState,
};
pub use monorail_queueset::{build_set, ArrayOfQueues, SetKind, SingleQueue, UnorderedSet};
pub use pipeline::{run_pipeline, PipelineConfig, PipelineReport};
