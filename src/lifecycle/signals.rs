//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGTERM (pod deletion) or SIGINT (interactive runs)
//! - Translate either into a stop request
//!
//! Reloads are driven by file events only; SIGHUP is not handled.

use crate::lifecycle::Shutdown;

/// Resolve once SIGINT or SIGTERM arrives.
pub async fn wait_for_stop_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
    }
}

/// Wait for a stop signal and forward it to `shutdown`.
///
/// If the handlers cannot be installed the error is logged and the stop is
/// triggered anyway, since the process could not be stopped cleanly otherwise.
pub async fn forward_stop_signal(shutdown: &Shutdown) {
    match wait_for_stop_signal().await {
        Ok(signal) => tracing::info!(signal, "Stop signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
    }
    shutdown.trigger();
}
