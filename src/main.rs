use anyhow::Context;
use ua_batch_publisher::app::{self, App, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args_and_env(std::env::args()).context("Invalid configuration")?;
    app::setup_logging(config.log_level, config.log_format)?;

    tracing::info!("Starting ua-batch-publisher v{}", app::get_version());

    let snapshot = App::from_config(config)?.run().await?;
    tracing::info!(
        sent_batches = snapshot.sent_batches,
        sent_bytes = snapshot.sent_bytes,
        dropped = snapshot.dropped_count,
        failed_batches = snapshot.failed_batches,
        "Final diagnostics"
    );

    Ok(())
}
