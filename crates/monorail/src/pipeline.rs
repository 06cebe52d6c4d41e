//! # Producer/Consumer Pipeline
//!
//! The workload behind `monorail_demo`, exercising every piece together:
//!
//! ```text
//!  producers ──send──> BoundedChannel ──receive──> consumers
//!                                                      │ insert(key, id)
//!                                                      ▼
//!                                        Exclusive<ArrayOfQueues>
//!                                                      │
//!                              Barrier (all inserted) ─┤
//!                                                      ▼
//!                                           consumers drain by try_remove
//! ```
//!
//! Must run on a logical thread that holds the region.

use std::sync::Arc;

use monorail_core::{Barrier, BoundedChannel, Exclusive, Runtime, RuntimeResult};
use monorail_queueset::{ArrayOfQueues, QueueSetStats, UnorderedSet};

/// Shape of the workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Producer threads.
    pub producers: usize,
    /// Consumer threads, one queue-set participant each.
    pub consumers: usize,
    /// Values each producer sends.
    pub messages_per_producer: u64,
    /// Capacity of the channel between the stages.
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            producers: 4,
            consumers: 4,
            messages_per_producer: 1_000,
            channel_capacity: 16,
        }
    }
}

impl PipelineConfig {
    /// Number of values the producers send in total.
    #[must_use]
    pub fn total_messages(&self) -> u64 {
        self.producers as u64 * self.messages_per_producer
    }

    /// Sum of every value sent (values are `1..=total_messages`).
    #[must_use]
    pub fn expected_checksum(&self) -> u64 {
        let n = self.total_messages();
        n * (n + 1) / 2
    }
}

/// Outcome of one pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineReport {
    /// Values the producers sent.
    pub sent: u64,
    /// Values drained from the queue set.
    pub drained: u64,
    /// Sum of the drained values.
    pub checksum: u64,
    /// Expected sum.
    pub expected_checksum: u64,
    /// Queue-set counters.
    pub stats: QueueSetStats,
}

impl PipelineReport {
    /// Whether every value sent was drained exactly once.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.sent == self.drained && self.checksum == self.expected_checksum
    }
}

/// Runs the pipeline on `runtime`.
///
/// # Errors
///
/// Spawn failures and panics of pipeline threads.
///
/// # Panics
///
/// Panics if `config` asks for zero consumers or zero channel capacity.
pub fn run_pipeline(runtime: &Runtime, config: &PipelineConfig) -> RuntimeResult<PipelineReport> {
    assert!(config.consumers > 0, "pipeline needs at least one consumer");
    assert!(config.channel_capacity > 0, "pipeline channel needs capacity");

    let channel: Arc<BoundedChannel<Option<u64>>> =
        Arc::new(BoundedChannel::new(runtime, config.channel_capacity));
    let set: Arc<Exclusive<ArrayOfQueues<u64>>> =
        Arc::new(runtime.exclusive(ArrayOfQueues::new(config.consumers)));
    let inserted = Arc::new(Barrier::new(runtime, config.consumers));

    let mut producers = Vec::with_capacity(config.producers);
    for p in 0..config.producers as u64 {
        let channel = Arc::clone(&channel);
        let per = config.messages_per_producer;
        producers.push(runtime.spawn_named(format!("producer-{p}"), move || {
            for i in 1..=per {
                channel.send(Some(p * per + i));
            }
        })?);
    }

    let mut consumers = Vec::with_capacity(config.consumers);
    for participant in 1..=config.consumers {
        let channel = Arc::clone(&channel);
        let set = Arc::clone(&set);
        let inserted = Arc::clone(&inserted);
        let rt = runtime.clone();
        consumers.push(runtime.spawn_named(format!("consumer-{participant}"), move || {
            while let Some(value) = channel.receive() {
                set.with(|s| s.insert(value, participant));
                if value % 64 == 0 {
                    rt.yield_now();
                }
            }

            inserted.arrive();

            let mut drained = 0u64;
            let mut checksum = 0u64;
            while let Some(value) = set.with(|s| s.try_remove(participant)) {
                drained += 1;
                checksum += value;
            }
            (drained, checksum)
        })?);
    }

    for producer in producers {
        producer.join()?;
    }
    for _ in 0..config.consumers {
        channel.send(None);
    }

    let mut drained = 0;
    let mut checksum = 0;
    for consumer in consumers {
        let (d, c) = consumer.join()?;
        drained += d;
        checksum += c;
    }

    let report = PipelineReport {
        sent: config.total_messages(),
        drained,
        checksum,
        expected_checksum: config.expected_checksum(),
        stats: set.with(|s| s.stats()),
    };
    tracing::info!(
        sent = report.sent,
        drained = report.drained,
        stolen = report.stats.stolen,
        consistent = report.is_consistent(),
        "pipeline finished"
    );
    Ok(report)
}
