//! Wait for Ctrl+C or SIGTERM so `main` can drain held transactions before
//! the process exits.

/// Resolves once a termination signal arrives, or immediately if signal
/// handler installation itself fails (Ctrl+C is always available).
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "error handling Ctrl+C signal");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, initiating graceful shutdown"),
        () = terminate => tracing::info!("received SIGTERM, initiating graceful shutdown"),
    }
}
