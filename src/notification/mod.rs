// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Notification Cursor
//!
//! Replays account-chain entries to a webhook, one height at a time, in
//! order, at least once.
//!
//! ## Strategy
//!
//! Every tick (default 1 s), for each known account with cursor `H` and
//! current height `L`:
//! 1. `H >= L`: nothing to do.
//! 2. Fetch the entry at `H + 1` (default 60 s timeout). Timeout, error or
//!    missing entry: try again next tick.
//! 3. Deliver it. On success persist `H + 1`; on failure keep `H`.
//!
//! Accounts are processed concurrently within a tick. A tick that would
//! overlap a running one is skipped.
//!
//! Cursors are created at height 0 the first time an address is observed.
//! Disabled accounts are still observed.

pub mod webhook;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WalletResult;
use crate::ledger::{AccountEntry, Address};
use crate::node::{LedgerNode, NodeError};
use crate::storage::{CursorRecord, CursorRepository, Versioned};

pub use webhook::{NoopSink, WebhookSink};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    #[error("webhook request failed: {0}")]
    Request(String),

    #[error("webhook answered {status}")]
    Rejected { status: u16 },

    #[error("invalid webhook configuration: {0}")]
    Config(String),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, entry: &AccountEntry) -> Result<(), SinkError>;
}

/// Source of the current height of every observed account.
pub trait AccountHeights: Send + Sync {
    fn account_heights(&self) -> Vec<(Address, u64)>;
}

type Cursor = Versioned<CursorRecord>;

pub struct Notifier {
    cursors: CursorRepository,
    heights: Arc<dyn AccountHeights>,
    node: Arc<dyn LedgerNode>,
    sink: Arc<dyn NotificationSink>,
    state: Mutex<HashMap<Address, Cursor>>,
    interval: Duration,
    fetch_timeout: Duration,
}

impl Notifier {
    /// Build a notifier primed with every persisted cursor.
    pub fn load(
        cursors: CursorRepository,
        heights: Arc<dyn AccountHeights>,
        node: Arc<dyn LedgerNode>,
        sink: Arc<dyn NotificationSink>,
    ) -> WalletResult<Self> {
        let state: HashMap<Address, Cursor> = cursors
            .list()?
            .into_iter()
            .map(|cursor| (cursor.record.address, cursor))
            .collect();
        info!(cursors = state.len(), "Notification cursors loaded");

        Ok(Self {
            cursors,
            heights,
            node,
            sink,
            state: Mutex::new(state),
            interval: DEFAULT_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Delivered height of `address`, if it has a cursor.
    pub async fn cursor_height(&self, address: &Address) -> Option<u64> {
        self.state
            .lock()
            .await
            .get(address)
            .map(|cursor| cursor.record.height)
    }

    /// Run until the cancellation token is triggered.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Notifier starting"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {},
                _ = shutdown.cancelled() => break,
            }
            tokio::select! {
                _ = self.tick() => {},
                _ = shutdown.cancelled() => break,
            }
        }
        info!("Notifier shutting down");
    }

    /// One sweep over every account. Returns false if a sweep was already
    /// running.
    pub async fn tick(&self) -> bool {
        let Ok(mut state) = self.state.try_lock() else {
            debug!("Notifier sweep still running, skipping tick");
            return false;
        };

        let mut steps = Vec::new();
        for (address, height) in self.heights.account_heights() {
            let cursor = match state.get(&address) {
                Some(cursor) => cursor.clone(),
                None => match self.cursors.create(address) {
                    Ok(cursor) => {
                        state.insert(address, cursor.clone());
                        cursor
                    }
                    Err(e) => {
                        warn!(address = %address, error = %e, "Failed to create cursor");
                        continue;
                    }
                },
            };
            steps.push(self.step(cursor, height));
        }

        for advanced in join_all(steps).await.into_iter().flatten() {
            state.insert(advanced.record.address, advanced);
        }
        true
    }

    /// Try to deliver the entry right after `cursor`. Returns the advanced
    /// cursor on success.
    async fn step(&self, cursor: Cursor, ledger_height: u64) -> Option<Cursor> {
        let address = cursor.record.address;
        if cursor.record.height >= ledger_height {
            return None;
        }
        let target = cursor.record.height + 1;

        let entry = match tokio::time::timeout(self.fetch_timeout, self.fetch(&address, target)).await
        {
            Ok(Ok(Some(entry))) => entry,
            Ok(Ok(None)) => {
                debug!(address = %address, height = target, "Entry not available yet");
                return None;
            }
            Ok(Err(e)) => {
                warn!(address = %address, height = target, error = %e, "Entry fetch failed");
                return None;
            }
            Err(_) => {
                warn!(address = %address, height = target, "Entry fetch timed out");
                return None;
            }
        };

        if let Err(e) = self.sink.deliver(&entry).await {
            warn!(address = %address, height = target, error = %e, "Notification delivery failed");
            return None;
        }

        match self.cursors.advance(&cursor) {
            Ok(advanced) => {
                debug!(address = %address, height = target, "Notification delivered");
                Some(advanced)
            }
            Err(e) => {
                warn!(address = %address, height = target, error = %e, "Failed to persist cursor");
                None
            }
        }
    }

    async fn fetch(&self, address: &Address, height: u64) -> Result<Option<AccountEntry>, NodeError> {
        let mut entries = self.node.account_entries(address, height, height).await?;
        while let Some(entry) = entries.next().await {
            let entry = entry?;
            if entry.height == height {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}
