pub mod config;
pub mod logging;
pub mod service;
pub mod shutdown;
pub mod source;

pub use config::{Config, ConfigError, LogFormat, LogLevel};
pub use logging::{InitializationError, setup_logging};
pub use service::{PublisherService, ServiceError};
pub use source::{LineSource, SourceError, SourceStats, StdinSource};

use crate::diagnostics::DiagnosticsSnapshot;
use tracing::info;

/// The binary: NDJSON records from stdin through the pipeline to the
/// configured HTTP endpoint.
pub struct App {
    service: PublisherService,
}

impl App {
    pub fn from_config(config: Config) -> Result<Self, ServiceError> {
        info!(
            "Configuration: publisher_id={:?}, endpoint={}, send_interval={}s, max_batch_bytes={}",
            config.publisher_id,
            config.sink_endpoint,
            config.send_interval_secs,
            config.max_batch_bytes
        );

        Ok(Self {
            service: PublisherService::new(config)?,
        })
    }

    /// Run until stdin is exhausted or a termination signal arrives.
    pub async fn run(mut self) -> Result<DiagnosticsSnapshot, ServiceError> {
        self.service.start_default()?;

        let cancel = self.service.cancellation_token();
        let signals = shutdown::spawn_signal_handler(cancel.clone());

        info!("ua-batch-publisher is running. Reading notifications from stdin.");
        let stats = match StdinSource::stdin() {
            Ok(source) => source.run(&self.service.publisher(), &cancel).await,
            Err(e) => Err(e),
        };

        // the source is done either way; drain what it managed to publish
        let snapshot = self.service.shutdown().await;
        signals.abort();

        let stats = stats?;
        info!(
            lines = stats.lines,
            accepted = stats.accepted,
            rejected = stats.rejected,
            invalid = stats.invalid,
            "ua-batch-publisher stopped"
        );
        snapshot
    }
}

pub fn get_version() -> String {
    crate::VERSION.to_string()
}
