pub mod processor;
pub mod scheduler;
pub mod stats;

pub use processor::{BatchEngine, FlushReason};
pub use scheduler::{
    AppendDecision, BatchMode, DEFAULT_MAX_BATCH_BYTES, DEFAULT_RESERVED_OVERHEAD,
    DeadlineAction, FlushScheduler, Wait,
};
pub use stats::{RunningStats, STATS_WINDOW};

use crate::app::Config;
use crate::buffer::DEFAULT_DROP_REPORT_EVERY;
use std::time::Duration;

/// Snapshot of the options the pipeline reads once at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Zero disables the deadline.
    pub send_interval: Duration,
    /// Zero means no explicit ceiling.
    pub max_batch_bytes: usize,
    pub reserved_overhead: usize,
    pub queue_capacity: usize,
    pub publisher_id: String,
    pub drop_report_every: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_secs(10),
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            reserved_overhead: DEFAULT_RESERVED_OVERHEAD,
            queue_capacity: 8192,
            publisher_id: "ua-batch-publisher".to_string(),
            drop_report_every: DEFAULT_DROP_REPORT_EVERY,
        }
    }
}

impl EngineConfig {
    pub fn scheduler(&self) -> FlushScheduler {
        FlushScheduler::new(
            self.send_interval,
            self.max_batch_bytes,
            self.reserved_overhead,
        )
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            send_interval: config.send_interval,
            max_batch_bytes: config.max_batch_bytes,
            reserved_overhead: config.reserved_overhead_bytes,
            queue_capacity: config.queue_capacity,
            publisher_id: config.publisher_id.clone().unwrap_or_default(),
            drop_report_every: config.drop_report_every,
        }
    }
}
