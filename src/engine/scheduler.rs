use crate::buffer::CLOSING_BYTES;
use std::time::Duration;
use tokio::time::Instant;

/// Bytes held back from `max_batch_bytes` for the frame header and footer.
pub const DEFAULT_RESERVED_OVERHEAD: usize = 512;

/// Ceiling used in batched mode when no explicit maximum is configured.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Every notification is sent on its own, immediately.
    SingleMessage,
    /// Notifications accumulate until `budget` bytes or the deadline.
    Batched { budget: usize },
}

/// What to do with an encoded candidate payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendDecision {
    AppendAndFlush,
    Append,
    FlushThenAppend,
    DropOversize { budget: usize },
}

/// How long the consumer may block in `pop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    /// `None` waits until an item arrives or the queue closes.
    pub timeout: Option<Duration>,
    /// The deadline was already in the past.
    pub missed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineAction {
    Flush,
    Reschedule,
}

/// Decides when the batch engine appends, flushes or drops.
///
/// The scheduler never reads a clock; every time-dependent call takes `now`.
#[derive(Debug, Clone)]
pub struct FlushScheduler {
    send_interval: Duration,
    mode: BatchMode,
    next_deadline: Option<Instant>,
}

impl FlushScheduler {
    pub fn new(send_interval: Duration, max_batch_bytes: usize, reserved_overhead: usize) -> Self {
        let mode = if send_interval.is_zero() && max_batch_bytes == 0 {
            BatchMode::SingleMessage
        } else {
            let max = if max_batch_bytes == 0 {
                DEFAULT_MAX_BATCH_BYTES
            } else {
                max_batch_bytes
            };
            BatchMode::Batched {
                budget: max.saturating_sub(reserved_overhead),
            }
        };

        Self {
            send_interval,
            mode,
            next_deadline: None,
        }
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    pub fn send_interval(&self) -> Duration {
        self.send_interval
    }

    pub fn has_deadline(&self) -> bool {
        !self.send_interval.is_zero()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    /// Arm the first deadline one interval after `now`.
    pub fn start(&mut self, now: Instant) {
        self.on_flush(now);
    }

    pub fn decide_append(
        &self,
        current_len: usize,
        buffer_empty: bool,
        candidate_len: usize,
    ) -> AppendDecision {
        let budget = match self.mode {
            BatchMode::SingleMessage => return AppendDecision::AppendAndFlush,
            BatchMode::Batched { budget } => budget,
        };

        if candidate_len > budget {
            return AppendDecision::DropOversize { budget };
        }
        if current_len + candidate_len + CLOSING_BYTES < budget || buffer_empty {
            AppendDecision::Append
        } else {
            AppendDecision::FlushThenAppend
        }
    }

    /// Timeout for the next `pop`.
    pub fn wait(&self, now: Instant, cancelled: bool) -> Wait {
        let Some(deadline) = self.next_deadline.filter(|_| self.has_deadline()) else {
            return Wait {
                timeout: cancelled.then_some(Duration::ZERO),
                missed: false,
            };
        };

        match deadline.checked_duration_since(now) {
            Some(remaining) => Wait {
                timeout: Some(remaining),
                missed: false,
            },
            None => Wait {
                timeout: Some(Duration::ZERO),
                missed: true,
            },
        }
    }

    /// The deadline passed without a new item.
    ///
    /// An empty buffer only pushes the deadline one interval further; a
    /// non-empty one must be flushed, after which the caller reports
    /// `on_flush`.
    pub fn on_timeout(&mut self, buffer_empty: bool) -> DeadlineAction {
        if !buffer_empty {
            return DeadlineAction::Flush;
        }

        if let Some(deadline) = self.next_deadline.as_mut() {
            *deadline += self.send_interval;
        }
        DeadlineAction::Reschedule
    }

    /// A batch was handed to the sink at `now`.
    pub fn on_flush(&mut self, now: Instant) {
        self.next_deadline = self.has_deadline().then(|| now + self.send_interval);
    }
}
