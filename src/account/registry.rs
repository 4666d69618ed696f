// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registry of every account known to this server.
//!
//! Owns the `Address → AccountState` table and publishes the *active set*:
//! accounts that are enabled and whose wallet is unlocked. The set is
//! recomputed on account create/enable/disable and on wallet events, and
//! published through a `watch` channel with a generation that bumps only
//! when membership actually changes.
//!
//! Structural changes are serialized by `membership`. It is never held
//! while waiting on an account lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use chrono::Utc;
use tokio::sync::{watch, Mutex};

use super::state::{AccountIdentity, AccountState, Publish};
use crate::error::{WalletError, WalletResult};
use crate::ledger::{AccountEntry, AccountSigner, Address, Amount, LedgerSnapshot, Network, Receivable};
use crate::node::LedgerNode;
use crate::notification::AccountHeights;
use crate::storage::{AccountRecord, AccountRepository};
use crate::vault::{KeyVault, WalletEvent, WalletEventListener};

/// Versioned list of active addresses, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSet {
    pub generation: u64,
    pub addresses: Vec<Address>,
}

impl ActiveSet {
    pub fn contains(&self, address: &Address) -> bool {
        self.addresses.binary_search(address).is_ok()
    }
}

pub struct AccountRegistry {
    network: Network,
    accounts: RwLock<HashMap<Address, Arc<AccountState>>>,
    membership: Mutex<()>,
    vault: Arc<KeyVault>,
    repo: AccountRepository,
    node: Arc<dyn LedgerNode>,
    publisher: Arc<dyn Publish>,
    active: watch::Sender<ActiveSet>,
}

impl AccountRegistry {
    /// Load every persisted account, reconcile it against the ledger and
    /// publish the first active set. An unreachable ledger is fatal.
    pub async fn load(
        network: Network,
        vault: Arc<KeyVault>,
        repo: AccountRepository,
        node: Arc<dyn LedgerNode>,
        publisher: Arc<dyn Publish>,
    ) -> WalletResult<Arc<Self>> {
        let records = repo.list()?;
        let addresses: Vec<Address> = records.iter().map(|r| r.record.address).collect();

        let snapshots = node
            .account_snapshots(&addresses)
            .await
            .map_err(|e| WalletError::Fatal(format!("Ledger unreachable at startup: {e}")))?;
        let mut snapshots: HashMap<Address, LedgerSnapshot> =
            snapshots.into_iter().map(|s| (s.address, s)).collect();

        let mut accounts = HashMap::with_capacity(records.len());
        for stored in records {
            let record = stored.record;
            let state = Arc::new(AccountState::new(
                identity(&record),
                network,
                record.is_enabled(),
                None,
                publisher.clone(),
            ));
            if let Some(snapshot) = snapshots.remove(&record.address) {
                state.reconcile(snapshot).await;
            }
            accounts.insert(record.address, state);
        }

        let registry = Arc::new(Self {
            network,
            accounts: RwLock::new(accounts),
            membership: Mutex::new(()),
            vault: vault.clone(),
            repo,
            node,
            publisher,
            active: watch::Sender::new(ActiveSet::default()),
        });

        let listener: Weak<dyn WalletEventListener> = Arc::downgrade(&registry) as _;
        vault.add_listener(listener);
        registry.refresh();

        tracing::info!(
            accounts = addresses.len(),
            active = registry.active_set().addresses.len(),
            "Account registry loaded"
        );
        Ok(registry)
    }

    // =========================================================================
    // Active set
    // =========================================================================

    pub fn subscribe_active(&self) -> watch::Receiver<ActiveSet> {
        self.active.subscribe()
    }

    pub fn active_set(&self) -> ActiveSet {
        self.active.borrow().clone()
    }

    /// Recompute the active set and publish it if membership changed.
    fn refresh(&self) {
        self.active.send_if_modified(|current| {
            let mut addresses: Vec<Address> = self
                .read_accounts()
                .values()
                .filter(|s| s.is_enabled() && self.vault.is_unlocked(&s.identity().wallet_name))
                .map(|s| s.address())
                .collect();
            addresses.sort();

            if addresses == current.addresses {
                return false;
            }
            current.generation += 1;
            current.addresses = addresses;
            tracing::info!(
                generation = current.generation,
                active = current.addresses.len(),
                "Active account set changed"
            );
            true
        });
    }

    // =========================================================================
    // Structural changes
    // =========================================================================

    /// Derive the wallet's next account and start tracking it.
    pub async fn create(&self, wallet_name: &str) -> WalletResult<AccountRecord> {
        let _membership = self.membership.lock().await;

        let seed = self.vault.seed(wallet_name)?;
        let account_index = self
            .read_accounts()
            .values()
            .filter(|s| s.identity().wallet_name == wallet_name)
            .count() as u32;
        let address = AccountSigner::derive(&seed, account_index)?.address();

        let snapshot = self
            .node
            .account_snapshots(&[address])
            .await?
            .into_iter()
            .find(|s| s.address == address);

        let record = AccountRecord {
            address,
            account_index,
            wallet_name: wallet_name.to_string(),
            disabled_at: None,
        };
        let stored = self.repo.create(record)?;

        let state = Arc::new(AccountState::new(
            identity(&stored.record),
            self.network,
            true,
            snapshot,
            self.publisher.clone(),
        ));
        self.write_accounts().insert(address, state);
        self.refresh();

        tracing::info!(
            wallet = %wallet_name,
            account_index,
            address = %address,
            "Account created"
        );
        Ok(stored.record)
    }

    pub async fn enable(&self, address: &Address) -> WalletResult<AccountRecord> {
        self.set_enabled(address, true).await
    }

    pub async fn disable(&self, address: &Address) -> WalletResult<AccountRecord> {
        self.set_enabled(address, false).await
    }

    async fn set_enabled(&self, address: &Address, enabled: bool) -> WalletResult<AccountRecord> {
        let _membership = self.membership.lock().await;

        let state = self.state(address)?;
        let stored = self
            .repo
            .get(address)?
            .ok_or_else(|| not_found(address))?;
        if stored.record.is_enabled() == enabled {
            return Ok(stored.record);
        }

        let mut record = stored.record;
        record.disabled_at = if enabled { None } else { Some(Utc::now()) };
        let updated = self.repo.update(record, stored.version)?;

        state.set_enabled(enabled);
        self.refresh();

        tracing::info!(address = %address, enabled, "Account state changed");
        Ok(updated.record)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub async fn send(
        &self,
        address: &Address,
        receiver: Address,
        amount: Amount,
        expected_height: Option<u64>,
    ) -> WalletResult<AccountEntry> {
        self.state(address)?
            .send(receiver, amount, expected_height)
            .await
    }

    pub async fn change(
        &self,
        address: &Address,
        representative: Address,
    ) -> WalletResult<AccountEntry> {
        self.state(address)?.change(representative).await
    }

    /// Apply a transfer observed under active-set `generation`. Transfers for
    /// unknown or inactive accounts, or from a stale generation, are dropped.
    pub async fn receive(
        &self,
        receivable: &Receivable,
        generation: u64,
    ) -> WalletResult<Option<AccountEntry>> {
        let receiver = receivable.receiver;
        let admitted = {
            let active = self.active.borrow();
            active.generation == generation && active.contains(&receiver)
        };
        let state = admitted.then(|| self.read_accounts().get(&receiver).cloned()).flatten();

        match state {
            Some(state) => state.receive(receivable).await.map(Some),
            None => {
                tracing::debug!(
                    receiver = %receiver,
                    hash = %receivable.hash,
                    generation,
                    "Dropping receivable for inactive account"
                );
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn record(&self, address: &Address) -> WalletResult<AccountRecord> {
        Ok(self
            .repo
            .get(address)?
            .ok_or_else(|| not_found(address))?
            .record)
    }

    /// Accounts of a wallet, by derivation index.
    pub fn records_by_wallet(&self, wallet_name: &str) -> WalletResult<Vec<AccountRecord>> {
        self.vault.get(wallet_name)?;
        let mut records: Vec<AccountRecord> = self
            .repo
            .list()?
            .into_iter()
            .map(|stored| stored.record)
            .filter(|r| r.wallet_name == wallet_name)
            .collect();
        records.sort_by_key(|r| r.account_index);
        Ok(records)
    }

    pub fn snapshot(&self, address: &Address) -> WalletResult<LedgerSnapshot> {
        self.state(address)?.snapshot().ok_or_else(|| {
            WalletError::NotFound(format!("Account {address} is not opened"))
        })
    }

    /// `(address, height)` of every enabled account.
    pub fn enabled_heights(&self) -> Vec<(Address, u64)> {
        self.read_accounts()
            .values()
            .filter(|s| s.is_enabled())
            .map(|s| (s.address(), s.height()))
            .collect()
    }

    pub fn state(&self, address: &Address) -> WalletResult<Arc<AccountState>> {
        self.read_accounts()
            .get(address)
            .cloned()
            .ok_or_else(|| not_found(address))
    }

    fn read_accounts(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Address, Arc<AccountState>>> {
        self.accounts.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_accounts(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<Address, Arc<AccountState>>> {
        self.accounts.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl WalletEventListener for AccountRegistry {
    fn on_wallet_event(&self, event: &WalletEvent) {
        tracing::debug!(wallet = %event.wallet_name(), ?event, "Wallet event");
        self.refresh();
    }
}

impl AccountHeights for AccountRegistry {
    fn account_heights(&self) -> Vec<(Address, u64)> {
        self.read_accounts()
            .values()
            .map(|s| (s.address(), s.height()))
            .collect()
    }
}

fn identity(record: &AccountRecord) -> AccountIdentity {
    AccountIdentity {
        address: record.address,
        wallet_name: record.wallet_name.clone(),
        account_index: record.account_index,
    }
}

fn not_found(address: &Address) -> WalletError {
    WalletError::NotFound(format!("Account {address} not found"))
}
