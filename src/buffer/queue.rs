use crate::diagnostics::Diagnostics;
use crate::domain::NotificationRecord;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::error;

/// One aggregated log line per this many drops.
pub const DEFAULT_DROP_REPORT_EVERY: u64 = 10_000;

// Prevent excessive memory allocation
const MAX_CAPACITY: usize = 100_000_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("Invalid queue capacity: {capacity}")]
    InvalidCapacity { capacity: usize },
}

/// Result of a single `pop` attempt.
#[derive(Debug)]
pub enum PopOutcome {
    Item(NotificationRecord),
    /// The timeout elapsed with nothing queued.
    TimedOut,
    /// The cancellation token fired while waiting.
    Cancelled,
    /// The queue was closed and every remaining item has been taken.
    Closed,
}

struct QueueState {
    items: VecDeque<NotificationRecord>,
    closed: bool,
}

/// Bounded multi-producer, single-consumer FIFO of pending notifications.
///
/// Pushes never block: a push against a full (or closed) queue is rejected and
/// counted. The depth gauge in `Diagnostics` is written inside the same
/// critical section as the mutation that changed it.
pub struct IntakeQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
    drop_report_every: u64,
    diagnostics: Arc<Diagnostics>,
}

impl IntakeQueue {
    pub fn new(capacity: usize, diagnostics: Arc<Diagnostics>) -> Result<Self, QueueError> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(QueueError::InvalidCapacity { capacity });
        }

        Ok(Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.min(64 * 1024)),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
            drop_report_every: DEFAULT_DROP_REPORT_EVERY,
            diagnostics,
        })
    }

    /// Emit the aggregated overflow error every `every` drops (0 disables it).
    pub fn with_drop_report_every(mut self, every: u64) -> Self {
        self.drop_report_every = every;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Non-blocking bounded push. Returns `false` if the record was dropped.
    pub fn try_push(&self, record: NotificationRecord) -> bool {
        {
            let mut state = self.state.lock();
            if !state.closed && state.items.len() < self.capacity {
                state.items.push_back(record);
                self.diagnostics.record_enqueued(state.items.len());
                drop(state);
                self.notify.notify_one();
                return true;
            }
        }

        let total_dropped = self.diagnostics.record_dropped();
        if self.drop_report_every > 0 && total_dropped % self.drop_report_every == 0 {
            error!(
                capacity = self.capacity,
                dropped = total_dropped,
                "The intake queue is at its capacity of {}. {} notifications have been lost so far.",
                self.capacity,
                total_dropped
            );
        }
        false
    }

    /// Take the next record, waiting at most `timeout` (`None` waits until an
    /// item arrives, the queue closes, or `cancel` fires).
    ///
    /// Must only be called from the single consumer.
    pub async fn pop(&self, timeout: Option<Duration>, cancel: &CancellationToken) -> PopOutcome {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if let Some(outcome) = self.try_pop_now() {
                return outcome;
            }
            if cancel.is_cancelled() {
                return PopOutcome::Cancelled;
            }

            // A push between the check above and this await leaves a stored
            // permit, so the wakeup cannot be lost.
            let notified = self.notify.notified();
            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        biased;
                        _ = notified => {}
                        _ = cancel.cancelled() => return PopOutcome::Cancelled,
                        _ = sleep_until(deadline) => {
                            return self.try_pop_now().unwrap_or(PopOutcome::TimedOut);
                        }
                    }
                }
                None => {
                    tokio::select! {
                        biased;
                        _ = notified => {}
                        _ = cancel.cancelled() => return PopOutcome::Cancelled,
                    }
                }
            }
        }
    }

    fn try_pop_now(&self) -> Option<PopOutcome> {
        let mut state = self.state.lock();
        if let Some(record) = state.items.pop_front() {
            self.diagnostics.record_dequeued(state.items.len());
            return Some(PopOutcome::Item(record));
        }
        state.closed.then_some(PopOutcome::Closed)
    }

    /// Reject further pushes and wake the consumer. Idempotent.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_one();
    }
}

impl std::fmt::Debug for IntakeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("IntakeQueue")
            .field("capacity", &self.capacity)
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .finish()
    }
}
