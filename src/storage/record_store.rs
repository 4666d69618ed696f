// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keyed record store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `accounts`: address → envelope(AccountRecord)
//! - `wallets`: wallet name → envelope(WalletRecord)
//! - `notification_cursors`: address → envelope(CursorRecord)
//!
//! Every value is a JSON envelope `{version, persisted_at, updated_at, record}`.
//! Writes carry an expected version; a mismatch is a conflict.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

// =============================================================================
// Table Definitions
// =============================================================================

const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");
const WALLETS: TableDefinition<&str, &[u8]> = TableDefinition::new("wallets");
const NOTIFICATION_CURSORS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("notification_cursors");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Accounts,
    Wallets,
    NotificationCursors,
}

impl Table {
    const ALL: [Table; 3] = [Table::Accounts, Table::Wallets, Table::NotificationCursors];

    fn definition(self) -> TableDefinition<'static, &'static str, &'static [u8]> {
        match self {
            Table::Accounts => ACCOUNTS,
            Table::Wallets => WALLETS,
            Table::NotificationCursors => NOTIFICATION_CURSORS,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Table::Accounts => "account",
            Table::Wallets => "wallet",
            Table::NotificationCursors => "notification cursor",
        }
    }
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to prepare data directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for WalletError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(message) => WalletError::Conflict(message),
            StoreError::NotFound(message) => WalletError::NotFound(message),
            other => WalletError::Transient(format!("Store unavailable: {other}")),
        }
    }
}

// =============================================================================
// Envelope
// =============================================================================

/// A stored record together with its store-managed metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub persisted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub record: T,
}

type Envelope = Versioned<serde_json::Value>;

// =============================================================================
// RecordStore
// =============================================================================

#[derive(Clone)]
pub struct RecordStore {
    db: Arc<Database>,
}

impl RecordStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        for table in Table::ALL {
            let _ = write_txn.open_table(table.definition())?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        table: Table,
        key: &str,
    ) -> StoreResult<Option<Versioned<T>>> {
        let read_txn = self.db.begin_read()?;
        let t = read_txn.open_table(table.definition())?;
        match t.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All records of a table, in key order.
    pub fn list<T: DeserializeOwned>(&self, table: Table) -> StoreResult<Vec<Versioned<T>>> {
        let read_txn = self.db.begin_read()?;
        let t = read_txn.open_table(table.definition())?;

        let mut records = Vec::new();
        for item in t.iter()? {
            let (_, value) = item?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }

    /// Insert (`expected = None`) or update (`expected = Some(version)`) a record.
    pub fn put<T: Serialize>(
        &self,
        table: Table,
        key: &str,
        record: T,
        expected: Option<u64>,
    ) -> StoreResult<Versioned<T>> {
        let value = serde_json::to_value(&record)?;
        let write_txn = self.db.begin_write()?;

        match apply_put(&write_txn, table, key, value, expected, Utc::now()) {
            Ok(envelope) => {
                write_txn.commit()?;
                Ok(Versioned {
                    version: envelope.version,
                    persisted_at: envelope.persisted_at,
                    updated_at: envelope.updated_at,
                    record,
                })
            }
            Err(e) => {
                write_txn.abort()?;
                Err(e)
            }
        }
    }

    pub fn delete(&self, table: Table, key: &str, expected: Option<u64>) -> StoreResult<()> {
        let mut uow = self.unit_of_work();
        uow.delete(table, key, expected);
        uow.commit()
    }

    pub fn unit_of_work(&self) -> UnitOfWork {
        UnitOfWork {
            store: self.clone(),
            ops: Vec::new(),
            hooks: Vec::new(),
        }
    }
}

// =============================================================================
// Unit of Work
// =============================================================================

enum Op {
    Put {
        table: Table,
        key: String,
        value: serde_json::Value,
        expected: Option<u64>,
    },
    Delete {
        table: Table,
        key: String,
        expected: Option<u64>,
    },
}

type Hook = Box<dyn FnOnce() + Send + 'static>;

/// Batch of writes committed in one redb write transaction.
///
/// Hooks registered with [`UnitOfWork::after_commit`] run only once the
/// commit is durable; a failed batch applies nothing and runs no hook.
pub struct UnitOfWork {
    store: RecordStore,
    ops: Vec<Op>,
    hooks: Vec<Hook>,
}

impl UnitOfWork {
    pub fn put<T: Serialize>(
        &mut self,
        table: Table,
        key: &str,
        record: &T,
        expected: Option<u64>,
    ) -> StoreResult<()> {
        self.ops.push(Op::Put {
            table,
            key: key.to_string(),
            value: serde_json::to_value(record)?,
            expected,
        });
        Ok(())
    }

    pub fn delete(&mut self, table: Table, key: &str, expected: Option<u64>) {
        self.ops.push(Op::Delete {
            table,
            key: key.to_string(),
            expected,
        });
    }

    pub fn after_commit(&mut self, hook: impl FnOnce() + Send + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn commit(self) -> StoreResult<()> {
        let write_txn = self.store.db.begin_write()?;
        let now = Utc::now();

        for op in self.ops {
            let applied = match op {
                Op::Put {
                    table,
                    key,
                    value,
                    expected,
                } => apply_put(&write_txn, table, &key, value, expected, now).map(|_| ()),
                Op::Delete {
                    table,
                    key,
                    expected,
                } => apply_delete(&write_txn, table, &key, expected),
            };
            if let Err(e) = applied {
                write_txn.abort()?;
                return Err(e);
            }
        }
        write_txn.commit()?;

        for hook in self.hooks {
            hook();
        }
        Ok(())
    }
}

fn read_envelope(
    t: &redb::Table<'_, &'static str, &'static [u8]>,
    key: &str,
) -> StoreResult<Option<Envelope>> {
    let current = t
        .get(key)?
        .map(|value| serde_json::from_slice(value.value()))
        .transpose()?;
    Ok(current)
}

fn check_version(table: Table, key: &str, current: u64, expected: u64) -> StoreResult<()> {
    if current != expected {
        return Err(StoreError::Conflict(format!(
            "{} {key} is at version {current}, expected {expected}",
            table.name()
        )));
    }
    Ok(())
}

fn apply_put(
    write_txn: &WriteTransaction,
    table: Table,
    key: &str,
    record: serde_json::Value,
    expected: Option<u64>,
    now: DateTime<Utc>,
) -> StoreResult<Envelope> {
    let mut t = write_txn.open_table(table.definition())?;

    let envelope = match (read_envelope(&t, key)?, expected) {
        (None, None) => Versioned {
            version: 1,
            persisted_at: now,
            updated_at: now,
            record,
        },
        (Some(_), None) => {
            return Err(StoreError::Conflict(format!(
                "{} {key} already exists",
                table.name()
            )));
        }
        (None, Some(expected)) => {
            return Err(StoreError::Conflict(format!(
                "{} {key} was removed (expected version {expected})",
                table.name()
            )));
        }
        (Some(current), Some(expected)) => {
            check_version(table, key, current.version, expected)?;
            Versioned {
                version: current.version + 1,
                persisted_at: current.persisted_at,
                updated_at: now,
                record,
            }
        }
    };

    let bytes = serde_json::to_vec(&envelope)?;
    t.insert(key, bytes.as_slice())?;
    Ok(envelope)
}

fn apply_delete(
    write_txn: &WriteTransaction,
    table: Table,
    key: &str,
    expected: Option<u64>,
) -> StoreResult<()> {
    let mut t = write_txn.open_table(table.definition())?;

    let current = read_envelope(&t, key)?
        .ok_or_else(|| StoreError::NotFound(format!("{} {key} not found", table.name())))?;
    if let Some(expected) = expected {
        check_version(table, key, current.version, expected)?;
    }

    t.remove(key)?;
    Ok(())
}
