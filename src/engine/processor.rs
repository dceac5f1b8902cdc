use super::EngineConfig;
use super::scheduler::{AppendDecision, DeadlineAction, FlushScheduler};
use super::stats::RunningStats;
use crate::buffer::{BatchFrame, IntakeQueue, PopOutcome};
use crate::diagnostics::Diagnostics;
use crate::domain::NotificationRecord;
use crate::encoder::MessageEncoder;
use crate::sender::MessageSink;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    SingleMessage,
    SizeLimit,
    Deadline,
    Shutdown,
}

impl std::fmt::Display for FlushReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            FlushReason::SingleMessage => "single_message",
            FlushReason::SizeLimit => "size_limit",
            FlushReason::Deadline => "deadline",
            FlushReason::Shutdown => "shutdown",
        };
        f.write_str(reason)
    }
}

/// The single consumer of the intake queue.
///
/// Owns the live frame and the running statistics; nothing else touches
/// them, so neither is locked.
pub struct BatchEngine<E, S> {
    queue: Arc<IntakeQueue>,
    encoder: E,
    sink: S,
    scheduler: FlushScheduler,
    frame: BatchFrame,
    stats: RunningStats,
    diagnostics: Arc<Diagnostics>,
}

impl<E: MessageEncoder, S: MessageSink> BatchEngine<E, S> {
    pub fn new(
        config: &EngineConfig,
        queue: Arc<IntakeQueue>,
        encoder: E,
        sink: S,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            queue,
            encoder,
            sink,
            scheduler: config.scheduler(),
            frame: BatchFrame::new(config.publisher_id.clone()),
            stats: RunningStats::new(),
            diagnostics,
        }
    }

    pub fn scheduler(&self) -> &FlushScheduler {
        &self.scheduler
    }

    /// Consume the queue until `cancel` fires or the queue is closed.
    ///
    /// On cancellation the queue is closed, everything still queued is
    /// processed and a non-empty frame is flushed once before returning.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            mode = ?self.scheduler.mode(),
            send_interval = ?self.scheduler.send_interval(),
            capacity = self.queue.capacity(),
            "Batch engine started"
        );

        self.scheduler.start(Instant::now());
        let mut cancelled = false;

        loop {
            let wait = self.scheduler.wait(Instant::now(), cancelled);
            if wait.missed {
                self.diagnostics.record_missed_deadline();
                trace!("Send deadline already passed");
            }

            match self.queue.pop(wait.timeout, &cancel).await {
                PopOutcome::Item(record) => self.process(record).await,
                PopOutcome::TimedOut => self.on_deadline().await,
                PopOutcome::Cancelled => {
                    if !cancelled {
                        info!(
                            remaining = self.queue.len(),
                            "Cancellation requested, draining intake queue"
                        );
                        cancelled = true;
                    }
                    self.queue.close();
                }
                PopOutcome::Closed => {
                    self.flush(FlushReason::Shutdown).await;
                    break;
                }
            }
        }

        info!(
            batches = self.diagnostics.snapshot().sent_batches,
            "Batch engine stopped"
        );
    }

    /// Encode one record and place it according to the scheduler.
    pub async fn process(&mut self, record: NotificationRecord) {
        let Some(payload) = self.encode(&record) else {
            return;
        };

        match self
            .scheduler
            .decide_append(self.frame.len(), self.frame.is_empty(), payload.len())
        {
            AppendDecision::AppendAndFlush => {
                self.frame.append(&payload);
                self.flush(FlushReason::SingleMessage).await;
            }
            AppendDecision::Append => self.frame.append(&payload),
            AppendDecision::FlushThenAppend => {
                self.flush(FlushReason::SizeLimit).await;
                self.frame.append(&payload);
            }
            AppendDecision::DropOversize { budget } => {
                warn!(
                    node = %record.header().expanded_node_id,
                    size = payload.len(),
                    budget,
                    "Dropping notification larger than the batch budget"
                );
                self.diagnostics.record_oversize_dropped();
            }
        }
    }

    fn encode(&self, record: &NotificationRecord) -> Option<String> {
        match catch_unwind(AssertUnwindSafe(|| self.encoder.encode(record))) {
            Ok(Ok(payload)) => {
                self.diagnostics.record_encoded();
                Some(payload)
            }
            Ok(Err(e)) => {
                warn!(
                    node = %record.header().expanded_node_id,
                    "Failed to encode notification: {}", e
                );
                self.diagnostics.record_encoding_failure();
                None
            }
            Err(_) => {
                error!(
                    node = %record.header().expanded_node_id,
                    "Encoder panicked, notification skipped"
                );
                self.diagnostics.record_encoding_failure();
                None
            }
        }
    }

    async fn on_deadline(&mut self) {
        match self.scheduler.on_timeout(self.frame.is_empty()) {
            DeadlineAction::Flush => self.flush(FlushReason::Deadline).await,
            DeadlineAction::Reschedule => trace!("Deadline passed with an empty frame"),
        }
    }

    /// Finalize the live frame and hand it to the sink.
    ///
    /// A failed send loses the batch; the frame is reset either way.
    pub async fn flush(&mut self, reason: FlushReason) {
        let notifications = self.frame.notification_count();
        let message_id = self.frame.message_id();
        let Some(batch) = self.frame.finalize() else {
            return;
        };

        let average = self.stats.record(notifications);
        self.diagnostics.record_average_per_batch(average);

        let bytes = batch.len();
        match self.sink.send(batch).await {
            Ok(()) => {
                self.diagnostics.record_sent(bytes);
                debug!(
                    message_id,
                    notifications,
                    bytes,
                    %reason,
                    average,
                    "Batch sent"
                );
            }
            Err(e) => {
                self.diagnostics.record_send_failure();
                error!(
                    message_id,
                    notifications,
                    bytes,
                    %reason,
                    "Failed to send batch, {} notifications lost: {}", notifications, e
                );
            }
        }

        self.frame.reset();
        self.scheduler.on_flush(Instant::now());
    }
}
