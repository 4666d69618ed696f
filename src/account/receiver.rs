// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Receivable Ingestion
//!
//! Background task holding the single subscription to the ledger's stream of
//! incoming transfers.
//!
//! ## Strategy
//!
//! 1. Subscribe for the current active set (no subscription while empty).
//! 2. Dispatch every transfer to its account on its own task, tagged with
//!    the generation it was observed under.
//! 3. When the active set changes, drop the stream and resubscribe.
//! 4. When the stream fails or ends, or a transfer cannot be applied, wait
//!    `retry_delay` (default 10 s) and resubscribe to the then-current set.
//!    The new subscription redelivers transfers that are still receivable.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`. In-flight receive tasks are
//! tracked and awaited before `run` returns.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::registry::{AccountRegistry, ActiveSet};
use crate::ledger::Receivable;
use crate::node::{LedgerNode, NodeStream};

/// Default delay before resubscribing after a stream failure.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

enum Interrupted {
    Shutdown,
    SetChanged,
    StreamLost(String),
}

struct Dispatch<'a> {
    tracker: &'a TaskTracker,
    failed_tx: &'a mpsc::UnboundedSender<String>,
    failed_rx: &'a mut mpsc::UnboundedReceiver<String>,
}

pub struct ReceivableIngestion {
    registry: Arc<AccountRegistry>,
    node: Arc<dyn LedgerNode>,
    retry_delay: Duration,
}

impl ReceivableIngestion {
    pub fn new(registry: Arc<AccountRegistry>, node: Arc<dyn LedgerNode>) -> Self {
        Self {
            registry,
            node,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(ingestion.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            retry_delay_secs = self.retry_delay.as_secs(),
            "Receivable ingestion starting"
        );

        let tracker = TaskTracker::new();
        let mut active = self.registry.subscribe_active();
        let (failed_tx, mut failed_rx) = mpsc::unbounded_channel::<String>();

        loop {
            let set = active.borrow_and_update().clone();
            // Failures from a previous subscription are covered by the next one
            while failed_rx.try_recv().is_ok() {}

            if set.addresses.is_empty() {
                debug!(generation = set.generation, "No active accounts, not subscribed");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = active.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                }
            }

            let subscribed = tokio::select! {
                _ = shutdown.cancelled() => break,
                subscribed = self.node.receivable_stream(&set.addresses) => subscribed,
            };

            let reason = match subscribed {
                Ok(stream) => {
                    info!(
                        generation = set.generation,
                        accounts = set.addresses.len(),
                        "Subscribed to receivables"
                    );
                    let listened = self
                        .listen(
                            stream,
                            &set,
                            &mut active,
                            Dispatch {
                                tracker: &tracker,
                                failed_tx: &failed_tx,
                                failed_rx: &mut failed_rx,
                            },
                            &shutdown,
                        )
                        .await;
                    match listened {
                        Interrupted::Shutdown => break,
                        Interrupted::SetChanged => continue,
                        Interrupted::StreamLost(reason) => reason,
                    }
                }
                Err(e) => e.to_string(),
            };

            warn!(
                error = %reason,
                retry_in_secs = self.retry_delay.as_secs(),
                "Receivable subscription lost"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.retry_delay) => {},
                _ = shutdown.cancelled() => break,
            }
        }

        tracker.close();
        tracker.wait().await;
        info!("Receivable ingestion shutting down");
    }

    async fn listen(
        &self,
        mut stream: NodeStream<Receivable>,
        set: &ActiveSet,
        active: &mut watch::Receiver<ActiveSet>,
        mut tasks: Dispatch<'_>,
        shutdown: &CancellationToken,
    ) -> Interrupted {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Interrupted::Shutdown,
                changed = active.changed() => {
                    return match changed {
                        Ok(()) => Interrupted::SetChanged,
                        Err(_) => Interrupted::Shutdown,
                    };
                }
                Some(reason) = tasks.failed_rx.recv() => {
                    return Interrupted::StreamLost(reason);
                }
                item = stream.next() => match item {
                    Some(Ok(receivable)) => self.dispatch(
                        receivable,
                        set.generation,
                        tasks.tracker,
                        tasks.failed_tx.clone(),
                    ),
                    Some(Err(e)) => return Interrupted::StreamLost(e.to_string()),
                    None => return Interrupted::StreamLost("stream ended".to_string()),
                },
            }
        }
    }

    /// Apply `receivable` on its own task. A failure is reported on
    /// `failed_tx`; transfers for inactive accounts are dropped silently.
    fn dispatch(
        &self,
        receivable: Receivable,
        generation: u64,
        tracker: &TaskTracker,
        failed_tx: mpsc::UnboundedSender<String>,
    ) {
        let registry = self.registry.clone();
        tracker.spawn(async move {
            match registry.receive(&receivable, generation).await {
                Ok(Some(entry)) => debug!(
                    address = %entry.address,
                    height = entry.height,
                    "Receivable applied"
                ),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        receiver = %receivable.receiver,
                        hash = %receivable.hash,
                        error = %e,
                        "Failed to apply receivable"
                    );
                    let _ = failed_tx.send(format!(
                        "receivable {} for {} not applied: {e}",
                        receivable.hash, receivable.receiver
                    ));
                }
            }
        });
    }
}
