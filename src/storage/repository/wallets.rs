// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet key-material repository.
//!
//! ## Security
//!
//! - Seed entropy is stored encrypted under the wallet's own key
//! - The wallet key is stored only while unlocked, wrapped by the master key
//! - Unwrapped seeds are never persisted

use serde::{Deserialize, Serialize};

use super::super::record_store::{RecordStore, StoreResult, Table, UnitOfWork, Versioned};

/// Wallet record stored in the `wallets` table.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub name: String,
    /// Mnemonic entropy, encrypted with the wallet key
    #[serde(with = "hex::serde")]
    pub encrypted_entropy: Vec<u8>,
    /// Wallet key, encrypted with the master key. Present iff unlocked.
    #[serde(with = "opt_hex", default, skip_serializing_if = "Option::is_none")]
    pub encrypted_encryption_key: Option<Vec<u8>>,
}

impl WalletRecord {
    pub fn is_unlocked(&self) -> bool {
        self.encrypted_encryption_key.is_some()
    }
}

impl std::fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletRecord")
            .field("name", &self.name)
            .field("unlocked", &self.is_unlocked())
            .finish_non_exhaustive()
    }
}

mod opt_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[derive(Clone)]
pub struct WalletRepository {
    store: RecordStore,
}

impl WalletRepository {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn get(&self, name: &str) -> StoreResult<Option<Versioned<WalletRecord>>> {
        self.store.get(Table::Wallets, name)
    }

    pub fn list(&self) -> StoreResult<Vec<Versioned<WalletRecord>>> {
        self.store.list(Table::Wallets)
    }

    pub fn unit_of_work(&self) -> UnitOfWork {
        self.store.unit_of_work()
    }

    /// Stage a write of `record`; `expected = None` inserts.
    pub fn stage(
        &self,
        uow: &mut UnitOfWork,
        record: &WalletRecord,
        expected: Option<u64>,
    ) -> StoreResult<()> {
        uow.put(Table::Wallets, &record.name, record, expected)
    }
}
