//! Shutdown signal wiring

use tokio_util::sync::CancellationToken;

/// Cancel `token` on the first SIGINT or SIGTERM
#[cfg(unix)]
pub async fn cancel_on_signal(token: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "Failed to install signal handlers");
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down gracefully"),
        _ = sigint.recv() => tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
        _ = token.cancelled() => return,
    }
    token.cancel();
}

/// Cancel `token` on Ctrl+C
#[cfg(not(unix))]
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down gracefully"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }
        },
        _ = token.cancelled() => return,
    }
    token.cancel();
}
