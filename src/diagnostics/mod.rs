// Lock-free pipeline diagnostics using atomic operations
//
// One `Diagnostics` handle is shared by the intake queue, the batch engine
// and whatever reports on them. Readers only ever see a `DiagnosticsSnapshot`.

#[cfg(feature = "metrics")]
pub mod exporter;
pub mod reporter;

#[cfg(feature = "metrics")]
pub use exporter::{ExporterError, PrometheusExporter};
pub use reporter::DiagnosticsReporter;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Shared pipeline counters.
#[derive(Debug, Default)]
pub struct Diagnostics {
    enqueued: AtomicU64,
    queued: AtomicU64,
    dropped: AtomicU64,
    filtered: AtomicU64,
    oversize_dropped: AtomicU64,
    encoded: AtomicU64,
    encoding_failures: AtomicU64,
    sent_batches: AtomicU64,
    sent_bytes: AtomicU64,
    failed_batches: AtomicU64,
    missed_deadlines: AtomicU64,
    /// f64 bit pattern of the running average.
    average_per_batch: AtomicU64,
    last_sent_at_ms: AtomicU64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful push; `depth` is the queue length after it.
    pub fn record_enqueued(&self, depth: usize) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.queued.store(depth as u64, Ordering::Release);
    }

    /// Record a pop; `depth` is the queue length after it.
    pub fn record_dequeued(&self, depth: usize) {
        self.queued.store(depth as u64, Ordering::Release);
    }

    /// Returns the total number of drops including this one.
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_oversize_dropped(&self) {
        self.oversize_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encoded(&self) {
        self.encoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encoding_failure(&self) {
        self.encoding_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_missed_deadline(&self) {
        self.missed_deadlines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_average_per_batch(&self, average: f64) {
        self.average_per_batch
            .store(average.to_bits(), Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes: usize) {
        self.sent_batches.fetch_add(1, Ordering::Relaxed);
        self.sent_bytes.fetch_add(bytes as u64, Ordering::Relaxed);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        self.last_sent_at_ms.store(now, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Acquire)
    }

    /// Get a snapshot of current counters (lock-free, eventually consistent)
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            enqueued_count: self.enqueued.load(Ordering::Relaxed),
            queued_count: self.queued.load(Ordering::Acquire),
            dropped_count: self.dropped.load(Ordering::Relaxed),
            filtered_count: self.filtered.load(Ordering::Relaxed),
            oversize_dropped_count: self.oversize_dropped.load(Ordering::Relaxed),
            encoded_count: self.encoded.load(Ordering::Relaxed),
            encoding_failure_count: self.encoding_failures.load(Ordering::Relaxed),
            sent_batches: self.sent_batches.load(Ordering::Relaxed),
            sent_bytes: self.sent_bytes.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            average_notifications_per_batch: f64::from_bits(
                self.average_per_batch.load(Ordering::Relaxed),
            ),
            missed_deadline_count: self.missed_deadlines.load(Ordering::Relaxed),
            last_sent_at_ms: self.last_sent_at_ms.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of pipeline diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub enqueued_count: u64,
    pub queued_count: u64,
    pub dropped_count: u64,
    pub filtered_count: u64,
    pub oversize_dropped_count: u64,
    pub encoded_count: u64,
    pub encoding_failure_count: u64,
    pub sent_batches: u64,
    pub sent_bytes: u64,
    pub failed_batches: u64,
    pub average_notifications_per_batch: f64,
    pub missed_deadline_count: u64,
    /// Unix milliseconds of the last successful send, 0 if none yet.
    pub last_sent_at_ms: u64,
}

impl DiagnosticsSnapshot {
    /// Share of sends that reached the sink successfully (0.0 to 1.0)
    pub fn send_success_rate(&self) -> f64 {
        let total = self.sent_batches + self.failed_batches;
        if total == 0 {
            return 1.0;
        }

        self.sent_batches as f64 / total as f64
    }

    pub fn last_sent_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        if self.last_sent_at_ms == 0 {
            return None;
        }
        chrono::DateTime::from_timestamp_millis(self.last_sent_at_ms as i64)
    }
}
