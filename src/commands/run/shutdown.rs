use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancel `token` on SIGTERM or Ctrl+C. The scheduler finishes its in-flight
/// cycle before returning.
pub(crate) fn spawn_shutdown_handler(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    error!("Failed to register SIGTERM handler: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, finishing current cycle..."),
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => info!("Received SIGINT (Ctrl+C), finishing current cycle..."),
                    Err(e) => {
                        error!("Failed to listen for SIGINT: {}", e);
                        return;
                    }
                },
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for SIGINT: {}", e);
                return;
            }
            info!("Received SIGINT (Ctrl+C), finishing current cycle...");
        }

        token.cancel();
    });
}
