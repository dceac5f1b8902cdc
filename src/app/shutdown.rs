use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Wait for SIGINT or SIGTERM. Returns the name of the signal received.
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        let mut sigterm = unix_signal(SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result.map(|()| "SIGINT"),
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map(|()| "SIGINT")
    }
}

/// Cancel `cancel` on the first termination signal.
///
/// The task also ends quietly when `cancel` fires for another reason.
pub fn spawn_signal_handler(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = wait_for_signal() => match result {
                Ok(name) => {
                    info!("Received {}, initiating graceful shutdown", name);
                    cancel.cancel();
                }
                Err(e) => error!("Failed to listen for shutdown signals: {}", e),
            },
            _ = cancel.cancelled() => {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handler_exits_when_cancelled_elsewhere() {
        let cancel = CancellationToken::new();
        let handle = spawn_signal_handler(cancel.clone());

        cancel.cancel();
        handle.await.unwrap();
    }
}
