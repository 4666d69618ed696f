// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use wallet_account_server::{
    account::{AccountRegistry, ReceivableIngestion, TransactionPublisher},
    api::router,
    config::{Config, LogFormat},
    error::{WalletError, WalletResult},
    node::{HttpLedgerNode, HttpWorker, LedgerNode, Worker},
    notification::{NoopSink, NotificationSink, Notifier, WebhookSink},
    shutdown,
    state::AppState,
    storage::{AccountRepository, CursorRepository, RecordStore, WalletRepository, DATABASE_FILE},
    telemetry,
    vault::KeyVault,
};

#[tokio::main]
async fn main() {
    if let Err(e) = telemetry::init(LogFormat::from_env()) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Wallet account server stopped");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> WalletResult<()> {
    let store = RecordStore::open(&config.data_dir.join(DATABASE_FILE))
        .map_err(|e| WalletError::Fatal(format!("Failed to open database: {e}")))?;

    let vault = Arc::new(KeyVault::new(
        WalletRepository::new(store.clone()),
        config.master_key.clone(),
    ));
    vault.load()?;

    let node: Arc<dyn LedgerNode> = Arc::new(
        HttpLedgerNode::new(config.node_base_url.as_str())
            .map_err(|e| WalletError::Fatal(e.to_string()))?,
    );
    let worker: Arc<dyn Worker> = Arc::new(
        HttpWorker::new(config.work_base_url.as_str())
            .map_err(|e| WalletError::Fatal(e.to_string()))?,
    );

    let shutdown = CancellationToken::new();
    let publisher = Arc::new(TransactionPublisher::new(
        vault.clone(),
        worker,
        node.clone(),
        shutdown.clone(),
    ));
    let registry = AccountRegistry::load(
        config.network,
        vault.clone(),
        AccountRepository::new(store.clone()),
        node.clone(),
        publisher,
    )
    .await?;

    let sink: Arc<dyn NotificationSink> = match &config.notification.callback_url {
        Some(url) => {
            let header = config
                .notification
                .header
                .as_ref()
                .map(|(name, value)| (name.as_str(), value.as_str()));
            Arc::new(
                WebhookSink::new(url.as_str(), header)
                    .map_err(|e| WalletError::Fatal(e.to_string()))?,
            )
        }
        None => {
            tracing::info!("No notification callback configured, entries are not delivered");
            Arc::new(NoopSink)
        }
    };
    let notifier = Notifier::load(
        CursorRepository::new(store),
        registry.clone(),
        node.clone(),
        sink,
    )?;

    let ingestion = tokio::spawn(
        ReceivableIngestion::new(registry.clone(), node.clone()).run(shutdown.clone()),
    );
    let notifications = tokio::spawn(notifier.run(shutdown.clone()));

    let app = router(AppState::new(vault, registry, node));
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| WalletError::Fatal(format!("Failed to bind {}: {e}", config.bind_addr)))?;

    tracing::info!(
        addr = %config.bind_addr,
        network = ?config.network,
        "Wallet account server listening"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::cancel_on(
            shutdown::os_signal(),
            shutdown.clone(),
        ))
        .await;

    shutdown.cancel();
    let _ = tokio::join!(ingestion, notifications);
    tracing::info!("Background tasks stopped");

    served.map_err(|e| WalletError::Fatal(format!("HTTP server failed: {e}")))
}
