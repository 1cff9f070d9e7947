//! Process shutdown signal

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Token cancelled on SIGINT (Ctrl+C) or, on unix, SIGTERM
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        token_clone.cancel();
        debug!("Shutdown signal handler completed");
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!("Failed to install SIGTERM handler, only Ctrl+C will stop the process: {}", e);
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
