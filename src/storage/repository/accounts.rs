// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account repository.
//!
//! One record per derived account, keyed by its textual address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::record_store::{RecordStore, StoreResult, Table, Versioned};
use crate::ledger::Address;

/// Account record stored in the `accounts` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub address: Address,
    /// Derivation index within the wallet
    pub account_index: u32,
    pub wallet_name: String,
    /// Set while the account is disabled
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub disabled_at: Option<DateTime<Utc>>,
}

impl AccountRecord {
    pub fn is_enabled(&self) -> bool {
        self.disabled_at.is_none()
    }
}

#[derive(Clone)]
pub struct AccountRepository {
    store: RecordStore,
}

impl AccountRepository {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn get(&self, address: &Address) -> StoreResult<Option<Versioned<AccountRecord>>> {
        self.store.get(Table::Accounts, &address.to_string())
    }

    pub fn list(&self) -> StoreResult<Vec<Versioned<AccountRecord>>> {
        self.store.list(Table::Accounts)
    }

    /// Insert a new account. Fails with a conflict if the address exists.
    pub fn create(&self, record: AccountRecord) -> StoreResult<Versioned<AccountRecord>> {
        let key = record.address.to_string();
        self.store.put(Table::Accounts, &key, record, None)
    }

    pub fn update(
        &self,
        record: AccountRecord,
        version: u64,
    ) -> StoreResult<Versioned<AccountRecord>> {
        let key = record.address.to_string();
        self.store.put(Table::Accounts, &key, record, Some(version))
    }
}
