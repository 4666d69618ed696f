// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Notification cursor repository.

use serde::{Deserialize, Serialize};

use super::super::record_store::{RecordStore, StoreResult, Table, Versioned};
use crate::ledger::Address;

/// Last height delivered to the webhook for one address (0 = nothing yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorRecord {
    pub address: Address,
    pub height: u64,
}

#[derive(Clone)]
pub struct CursorRepository {
    store: RecordStore,
}

impl CursorRepository {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn list(&self) -> StoreResult<Vec<Versioned<CursorRecord>>> {
        self.store.list(Table::NotificationCursors)
    }

    /// Persist a fresh cursor at height 0.
    pub fn create(&self, address: Address) -> StoreResult<Versioned<CursorRecord>> {
        let record = CursorRecord { address, height: 0 };
        self.store
            .put(Table::NotificationCursors, &address.to_string(), record, None)
    }

    /// Move the cursor one height forward.
    pub fn advance(&self, cursor: &Versioned<CursorRecord>) -> StoreResult<Versioned<CursorRecord>> {
        let record = CursorRecord {
            address: cursor.record.address,
            height: cursor.record.height + 1,
        };
        self.store.put(
            Table::NotificationCursors,
            &record.address.to_string(),
            record,
            Some(cursor.version),
        )
    }
}
