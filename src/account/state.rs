// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mutable mirror of one account chain.
//!
//! Every mutation runs under the account's mutex: compute the next snapshot
//! from the current one, hand the block to the publisher, then swap the
//! snapshot in. A publisher failure leaves the snapshot untouched.
//!
//! The enabled flag and the snapshot can be read without the mutex; those
//! reads may be momentarily stale.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, Mutex};

use crate::error::{WalletError, WalletResult};
use crate::ledger::{
    AccountEntry, Address, Amount, Block, LedgerSnapshot, Mutation, Network, Receivable,
    Transaction,
};

/// Who owns an account and how its key is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    pub address: Address,
    pub wallet_name: String,
    pub account_index: u32,
}

/// Signs and submits a block on behalf of an account.
#[async_trait]
pub trait Publish: Send + Sync {
    async fn publish(&self, identity: &AccountIdentity, block: Block) -> WalletResult<Transaction>;
}

pub struct AccountState {
    identity: AccountIdentity,
    network: Network,
    enabled: AtomicBool,
    snapshot: watch::Sender<Option<LedgerSnapshot>>,
    lock: Mutex<()>,
    publisher: Arc<dyn Publish>,
}

impl AccountState {
    pub fn new(
        identity: AccountIdentity,
        network: Network,
        enabled: bool,
        snapshot: Option<LedgerSnapshot>,
        publisher: Arc<dyn Publish>,
    ) -> Self {
        Self {
            identity,
            network,
            enabled: AtomicBool::new(enabled),
            snapshot: watch::Sender::new(snapshot),
            lock: Mutex::new(()),
            publisher,
        }
    }

    pub fn identity(&self) -> &AccountIdentity {
        &self.identity
    }

    pub fn address(&self) -> Address {
        self.identity.address
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn snapshot(&self) -> Option<LedgerSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Current height, 0 while unopened.
    pub fn height(&self) -> u64 {
        self.snapshot.borrow().as_ref().map_or(0, |s| s.height)
    }

    pub async fn open(&self, receivable: &Receivable) -> WalletResult<AccountEntry> {
        let _guard = self.lock.lock().await;
        if self.snapshot.borrow().is_some() {
            return Err(WalletError::Conflict(format!(
                "Account {} is already opened",
                self.identity.address
            )));
        }
        let mutation = Mutation::open(self.network, self.identity.address, receivable, Utc::now());
        self.commit(mutation).await
    }

    /// Apply an incoming transfer; opens the account on its first one.
    pub async fn receive(&self, receivable: &Receivable) -> WalletResult<AccountEntry> {
        let _guard = self.lock.lock().await;
        let current = self.snapshot();
        let mutation = match current {
            None => Mutation::open(self.network, self.identity.address, receivable, Utc::now()),
            Some(snapshot) => Mutation::receive(&snapshot, receivable, Utc::now())?,
        };
        self.commit(mutation).await
    }

    /// Transfer `amount` to `receiver`. With `expected_height`, the send only
    /// goes through if the chain is still at that height.
    pub async fn send(
        &self,
        receiver: Address,
        amount: Amount,
        expected_height: Option<u64>,
    ) -> WalletResult<AccountEntry> {
        let _guard = self.lock.lock().await;
        let snapshot = self.opened()?;
        if let Some(expected) = expected_height {
            if expected != snapshot.height {
                return Err(WalletError::Conflict(format!(
                    "Account {} is at height {}, expected {expected}",
                    self.identity.address, snapshot.height
                )));
            }
        }
        let mutation = Mutation::send(&snapshot, receiver, amount, Utc::now())?;
        self.commit(mutation).await
    }

    pub async fn change(&self, representative: Address) -> WalletResult<AccountEntry> {
        let _guard = self.lock.lock().await;
        let snapshot = self.opened()?;
        let mutation = Mutation::change(&snapshot, representative, Utc::now());
        self.commit(mutation).await
    }

    /// Adopt the ledger's view when it is at or beyond the local height.
    pub async fn reconcile(&self, ledger: LedgerSnapshot) -> bool {
        let _guard = self.lock.lock().await;
        let local = self.height();
        if ledger.height < local {
            tracing::warn!(
                address = %self.identity.address,
                local_height = local,
                ledger_height = ledger.height,
                "Ledger is behind local state, keeping local snapshot"
            );
            return false;
        }
        self.snapshot.send_replace(Some(ledger));
        true
    }

    fn opened(&self) -> WalletResult<LedgerSnapshot> {
        self.snapshot().ok_or_else(|| {
            WalletError::NotFound(format!(
                "Account {} is not opened",
                self.identity.address
            ))
        })
    }

    /// Must be called with the account lock held.
    async fn commit(&self, mutation: Mutation) -> WalletResult<AccountEntry> {
        let transaction = self
            .publisher
            .publish(&self.identity, mutation.block.clone())
            .await?;

        let entry = mutation.entry(transaction.hash());
        self.snapshot.send_replace(Some(mutation.next));

        tracing::info!(
            address = %entry.address,
            height = entry.height,
            block_type = ?entry.block_type,
            balance = %entry.balance,
            "Account block published"
        );
        Ok(entry)
    }
}
