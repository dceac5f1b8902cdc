use super::config::{Config, ConfigError};
use super::source::SourceError;
use crate::buffer::{IntakeQueue, Publisher, QueueError};
use crate::diagnostics::{Diagnostics, DiagnosticsReporter, DiagnosticsSnapshot};
use crate::encoder::{JsonMessageEncoder, MessageEncoder};
use crate::engine::{BatchEngine, EngineConfig};
use crate::sender::{HttpSink, MessageSink, SinkError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),
    #[error("Sink error: {0}")]
    SinkError(#[from] SinkError),
    #[error("Source error: {0}")]
    SourceError(#[from] SourceError),
    #[cfg(feature = "metrics")]
    #[error("Metrics error: {0}")]
    MetricsError(#[from] crate::diagnostics::ExporterError),
    #[error("Service already running")]
    AlreadyRunning,
    #[error("Service not running")]
    NotRunning,
    #[error("Shutdown timeout")]
    ShutdownTimeout,
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

/// Owns the pipeline: intake queue, engine task and background reporters.
///
/// Producers get a cloneable [`Publisher`]; `shutdown` drains the queue and
/// waits for the final flush.
pub struct PublisherService {
    config: Config,
    engine_config: EngineConfig,
    diagnostics: Arc<Diagnostics>,
    publisher: Publisher,
    cancel: CancellationToken,
    engine_task: Option<JoinHandle<()>>,
    background_tasks: Vec<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl PublisherService {
    /// Build the pipeline. Derived values (intervals, default publisher id)
    /// are recomputed from `config`, so callers need not `post_process` it.
    pub fn new(mut config: Config) -> Result<Self, ServiceError> {
        config.post_process()?;
        config.validate()?;

        let engine_config = EngineConfig::from(&config);
        let diagnostics = Arc::new(Diagnostics::new());

        let queue = IntakeQueue::new(engine_config.queue_capacity, diagnostics.clone())?
            .with_drop_report_every(engine_config.drop_report_every);
        let publisher = Publisher::new(Arc::new(queue), diagnostics.clone())
            .with_bad_status_filter(!config.forward_bad_status);

        Ok(Self {
            config,
            engine_config,
            diagnostics,
            publisher,
            cancel: CancellationToken::new(),
            engine_task: None,
            background_tasks: Vec::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        })
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Start with the JSON encoder and the configured HTTP sink.
    pub fn start_default(&mut self) -> Result<(), ServiceError> {
        let sink = HttpSink::new(self.config.http_sink_config())?;
        self.start(JsonMessageEncoder::new(), sink)
    }

    pub fn start<E, S>(&mut self, encoder: E, sink: S) -> Result<(), ServiceError>
    where
        E: MessageEncoder + 'static,
        S: MessageSink + 'static,
    {
        if self.engine_task.is_some() {
            return Err(ServiceError::AlreadyRunning);
        }

        info!(
            publisher_id = %self.engine_config.publisher_id,
            send_interval = ?self.engine_config.send_interval,
            max_batch_bytes = self.engine_config.max_batch_bytes,
            queue_capacity = self.engine_config.queue_capacity,
            "Starting publisher pipeline"
        );

        #[cfg(feature = "metrics")]
        if self.config.enable_metrics {
            self.start_metrics()?;
        }

        let engine = BatchEngine::new(
            &self.engine_config,
            self.publisher.queue().clone(),
            encoder,
            sink,
            self.diagnostics.clone(),
        );
        self.engine_task = Some(tokio::spawn(engine.run(self.cancel.clone())));

        let reporter =
            DiagnosticsReporter::new(self.diagnostics.clone(), self.config.diagnostics_interval);
        if reporter.is_enabled() {
            let cancel = self.cancel.clone();
            self.background_tasks.push(tokio::spawn(async move {
                reporter.run(cancel).await;
            }));
        }

        Ok(())
    }

    #[cfg(feature = "metrics")]
    fn start_metrics(&mut self) -> Result<(), ServiceError> {
        let exporter = crate::diagnostics::PrometheusExporter::new(self.diagnostics.clone())?;
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.metrics_port));
        let cancel = self.cancel.clone();

        self.background_tasks.push(tokio::spawn(async move {
            if let Err(e) = exporter.serve(addr, cancel).await {
                warn!("Metrics server stopped: {}", e);
            }
        }));
        Ok(())
    }

    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    pub fn diagnostics(&self) -> Arc<Diagnostics> {
        self.diagnostics.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        self.engine_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Cancel, wait for the engine to drain and flush, and return the final
    /// counters.
    pub async fn shutdown(&mut self) -> Result<DiagnosticsSnapshot, ServiceError> {
        let task = self.engine_task.take().ok_or(ServiceError::NotRunning)?;

        info!("Initiating graceful shutdown...");
        self.cancel.cancel();

        match tokio::time::timeout(self.shutdown_timeout, task).await {
            Err(_) => return Err(ServiceError::ShutdownTimeout),
            Ok(Err(e)) => return Err(ServiceError::TaskFailed(e.to_string())),
            Ok(Ok(())) => {}
        }

        for task in self.background_tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Background task failed: {}", e);
            }
        }

        let snapshot = self.diagnostics.snapshot();
        info!(
            sent_batches = snapshot.sent_batches,
            dropped = snapshot.dropped_count,
            "Graceful shutdown completed"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataChange, NotificationHeader, NotificationRecord};
    use crate::sender::ChannelSink;

    fn config() -> Config {
        let mut config = Config {
            publisher_id: Some("svc".to_string()),
            send_interval_secs: 60,
            diagnostics_interval_secs: 0,
            ..Config::default()
        };
        config.post_process().unwrap();
        config
    }

    fn record(status_code: u32) -> NotificationRecord {
        let mut change = DataChange::new(serde_json::json!(true));
        change.status_code = status_code;
        NotificationRecord::data_change(
            NotificationHeader::new("opc.tcp://h:4840", "urn:h", "Run", "i=9", 250.0),
            change,
        )
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending_notifications() {
        let mut service = PublisherService::new(config()).unwrap();
        let (sink, mut rx) = ChannelSink::new();
        service.start(JsonMessageEncoder::new(), sink).unwrap();
        assert!(service.is_running());

        let publisher = service.publisher();
        assert!(publisher.publish(record(0)));
        assert!(publisher.publish(record(0)));
        assert!(!publisher.publish(record(0x8000_0000)));

        let snapshot = service.shutdown().await.unwrap();
        assert_eq!(snapshot.sent_batches, 1);
        assert_eq!(snapshot.filtered_count, 1);

        let batch: serde_json::Value = serde_json::from_slice(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(batch["PublisherId"], "svc");
        assert_eq!(batch["Messages"].as_array().unwrap().len(), 2);

        // the queue is closed after shutdown
        assert!(!publisher.publish(record(0)));
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let mut service = PublisherService::new(config()).unwrap();
        let (sink, _rx) = ChannelSink::new();
        service.start(JsonMessageEncoder::new(), sink.clone()).unwrap();

        assert!(matches!(
            service.start(JsonMessageEncoder::new(), sink),
            Err(ServiceError::AlreadyRunning)
        ));
        service.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_derives_values_left_unprocessed() {
        // built directly, so the Duration fields still hold their defaults
        let config = Config {
            publisher_id: None,
            send_interval_secs: 0,
            max_batch_bytes: 0,
            diagnostics_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.send_interval, Duration::from_secs(10));

        let mut service = PublisherService::new(config).unwrap();
        let (sink, mut rx) = ChannelSink::new();
        service.start(JsonMessageEncoder::new(), sink).unwrap();

        let start = tokio::time::Instant::now();
        assert!(service.publisher().publish(record(0)));
        let batch = rx.recv().await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));

        let batch: serde_json::Value = serde_json::from_slice(&batch).unwrap();
        assert!(!batch["PublisherId"].as_str().unwrap().is_empty());
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = Config {
            queue_capacity: 0,
            ..config()
        };
        assert!(matches!(
            PublisherService::new(config),
            Err(ServiceError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_without_start() {
        let mut service = PublisherService::new(config()).unwrap();
        assert!(matches!(
            service.shutdown().await,
            Err(ServiceError::NotRunning)
        ));
    }
}
