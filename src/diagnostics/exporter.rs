use super::{Diagnostics, DiagnosticsSnapshot};
use prometheus::{Encoder, Gauge, IntGauge, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use warp::{Filter, Reply};

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),
    #[error("Failed to bind metrics server: {0}")]
    BindError(#[from] warp::Error),
}

/// Serves the diagnostics counters in Prometheus text format.
///
/// Gauges are refreshed from a fresh snapshot on every scrape, so the
/// exporter holds no state of its own beyond the registry.
#[derive(Clone)]
pub struct PrometheusExporter {
    diagnostics: Arc<Diagnostics>,
    registry: Arc<Registry>,
    gauges: Arc<ExportedGauges>,
}

struct ExportedGauges {
    enqueued: IntGauge,
    queued: IntGauge,
    dropped: IntGauge,
    filtered: IntGauge,
    oversize_dropped: IntGauge,
    encoding_failures: IntGauge,
    sent_batches: IntGauge,
    sent_bytes: IntGauge,
    failed_batches: IntGauge,
    missed_deadlines: IntGauge,
    average_per_batch: Gauge,
}

impl PrometheusExporter {
    pub fn new(diagnostics: Arc<Diagnostics>) -> Result<Self, ExporterError> {
        let registry = Registry::new();

        let int_gauge = |name: &str, help: &str| -> Result<IntGauge, ExporterError> {
            let gauge = IntGauge::new(name, help)?;
            registry.register(Box::new(gauge.clone()))?;
            Ok(gauge)
        };

        let gauges = ExportedGauges {
            enqueued: int_gauge("ua_notifications_enqueued_total", "Notifications accepted by the intake queue")?,
            queued: int_gauge("ua_notifications_queued", "Notifications currently waiting in the intake queue")?,
            dropped: int_gauge("ua_notifications_dropped_total", "Notifications rejected because the queue was full")?,
            filtered: int_gauge("ua_notifications_filtered_total", "Data changes rejected for a bad status code")?,
            oversize_dropped: int_gauge("ua_notifications_oversize_dropped_total", "Notifications too large for any batch")?,
            encoding_failures: int_gauge("ua_encoding_failures_total", "Notifications the encoder failed on")?,
            sent_batches: int_gauge("ua_batches_sent_total", "Batches accepted by the sink")?,
            sent_bytes: int_gauge("ua_batch_bytes_sent_total", "Bytes accepted by the sink")?,
            failed_batches: int_gauge("ua_batches_failed_total", "Batches lost to sink failures")?,
            missed_deadlines: int_gauge("ua_send_deadlines_missed_total", "Send intervals the engine fell behind on")?,
            average_per_batch: {
                let gauge = Gauge::new(
                    "ua_notifications_per_batch_avg",
                    "Average notifications per batch over the last 100 batches",
                )?;
                registry.register(Box::new(gauge.clone()))?;
                gauge
            },
        };

        Ok(Self {
            diagnostics,
            registry: Arc::new(registry),
            gauges: Arc::new(gauges),
        })
    }

    pub fn export_metrics(&self) -> Result<String, ExporterError> {
        self.refresh(&self.diagnostics.snapshot());

        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8_lossy(&buffer).to_string())
    }

    fn refresh(&self, snapshot: &DiagnosticsSnapshot) {
        let g = &self.gauges;
        g.enqueued.set(snapshot.enqueued_count as i64);
        g.queued.set(snapshot.queued_count as i64);
        g.dropped.set(snapshot.dropped_count as i64);
        g.filtered.set(snapshot.filtered_count as i64);
        g.oversize_dropped.set(snapshot.oversize_dropped_count as i64);
        g.encoding_failures.set(snapshot.encoding_failure_count as i64);
        g.sent_batches.set(snapshot.sent_batches as i64);
        g.sent_bytes.set(snapshot.sent_bytes as i64);
        g.failed_batches.set(snapshot.failed_batches as i64);
        g.missed_deadlines.set(snapshot.missed_deadline_count as i64);
        g.average_per_batch
            .set(snapshot.average_notifications_per_batch);
    }

    /// Serve `/metrics` and `/health` until `cancel` fires.
    pub async fn serve(self, addr: SocketAddr, cancel: CancellationToken) -> Result<(), ExporterError> {
        let exporter = self.clone();
        let metrics = warp::path!("metrics")
            .and(warp::get())
            .map(move || match exporter.export_metrics() {
                Ok(metrics_text) => warp::reply::with_header(
                    metrics_text,
                    "content-type",
                    "text/plain; version=0.0.4",
                )
                .into_response(),
                Err(_) => warp::reply::with_status(
                    "Internal Server Error",
                    warp::http::StatusCode::INTERNAL_SERVER_ERROR,
                )
                .into_response(),
            });

        let health = warp::path!("health").and(warp::get()).map(|| "OK");

        let routes = metrics.or(health);

        let (bound, server) =
            warp::serve(routes).try_bind_with_graceful_shutdown(addr, async move {
                cancel.cancelled().await;
            })?;
        tracing::info!("Prometheus metrics server listening on {}", bound);

        server.await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_reflects_current_counters() {
        let diag = Arc::new(Diagnostics::new());
        let exporter = PrometheusExporter::new(diag.clone()).unwrap();

        diag.record_enqueued(1);
        diag.record_dropped();
        diag.record_sent(512);
        diag.record_average_per_batch(2.5);

        let text = exporter.export_metrics().unwrap();
        assert!(text.contains("ua_notifications_enqueued_total 1"));
        assert!(text.contains("ua_notifications_dropped_total 1"));
        assert!(text.contains("ua_batch_bytes_sent_total 512"));
        assert!(text.contains("ua_notifications_per_batch_avg 2.5"));
    }
}
