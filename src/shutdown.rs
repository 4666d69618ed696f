// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process shutdown.
//!
//! The shared token is cancelled as soon as shutdown starts. Requests held
//! by work retries then return while the HTTP server drains.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Resolves when `signal` fires or `shutdown` is cancelled elsewhere, and
/// cancels `shutdown` in both cases.
pub async fn cancel_on<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = signal => tracing::info!("Shutdown requested"),
        _ = shutdown.cancelled() => {},
    }
    shutdown.cancel();
}

/// Ctrl-C, or SIGTERM on unix.
pub async fn os_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
