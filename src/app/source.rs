use crate::buffer::Publisher;
use crate::domain::NotificationRecord;
use std::io::{self, BufRead};
use std::thread;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LINE_CHANNEL_CAPACITY: usize = 1024;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub lines: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub invalid: u64,
}

/// Reads newline-delimited JSON notification records and publishes them.
///
/// Lines are read on a dedicated, detached thread. A read parked on an idle
/// pipe therefore never holds the runtime open once the source is dropped.
pub struct LineSource {
    lines: mpsc::Receiver<io::Result<String>>,
}

/// `LineSource` over the process's standard input.
pub type StdinSource = LineSource;

impl LineSource {
    pub fn stdin() -> Result<Self, SourceError> {
        Self::spawn(io::BufReader::new(io::stdin()))
    }

    /// Start a reader thread over `reader`.
    pub fn spawn<R>(reader: R) -> Result<Self, SourceError>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        thread::Builder::new()
            .name("line-reader".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    let failed = line.is_err();
                    if tx.blocking_send(line).is_err() || failed {
                        break;
                    }
                }
            })?;

        Ok(Self { lines: rx })
    }

    /// Publish records until end of input or cancellation.
    pub async fn run(
        mut self,
        publisher: &Publisher,
        cancel: &CancellationToken,
    ) -> Result<SourceStats, SourceError> {
        let mut stats = SourceStats::default();

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                line = self.lines.recv() => line,
            };
            let Some(line) = line else {
                info!(lines = stats.lines, "Input exhausted");
                break;
            };
            let line = line?;

            stats.lines += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<NotificationRecord>(line) {
                Ok(record) => {
                    if publisher.publish(record) {
                        stats.accepted += 1;
                    } else {
                        stats.rejected += 1;
                    }
                }
                Err(e) => {
                    warn!(line = stats.lines, "Skipping malformed record: {}", e);
                    stats.invalid += 1;
                }
            }
        }

        debug!(?stats, "Source stopped");
        Ok(stats)
    }
}
