use super::{Diagnostics, DiagnosticsSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Periodically logs a diagnostics snapshot until cancelled.
pub struct DiagnosticsReporter {
    diagnostics: Arc<Diagnostics>,
    interval: Duration,
}

impl DiagnosticsReporter {
    pub fn new(diagnostics: Arc<Diagnostics>, interval: Duration) -> Self {
        Self {
            diagnostics,
            interval,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Runs until `cancel` fires. Returns the number of reports emitted.
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        if !self.is_enabled() {
            return 0;
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so the first report
        // covers a full interval.
        ticker.tick().await;

        let mut reports = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    log_snapshot(&self.diagnostics.snapshot());
                    reports += 1;
                }
            }
        }

        // Final report so the shutdown totals end up in the log.
        log_snapshot(&self.diagnostics.snapshot());
        reports + 1
    }
}

fn log_snapshot(snapshot: &DiagnosticsSnapshot) {
    info!(
        enqueued = snapshot.enqueued_count,
        queued = snapshot.queued_count,
        dropped = snapshot.dropped_count,
        filtered = snapshot.filtered_count,
        oversize_dropped = snapshot.oversize_dropped_count,
        encoding_failures = snapshot.encoding_failure_count,
        sent_batches = snapshot.sent_batches,
        sent_bytes = snapshot.sent_bytes,
        failed_batches = snapshot.failed_batches,
        avg_per_batch = snapshot.average_notifications_per_batch,
        missed_deadlines = snapshot.missed_deadline_count,
        "Pipeline diagnostics"
    );
}
