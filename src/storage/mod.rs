// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state lives in a single redb database under `DATA_DIR`.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   wallet-server.redb
//!     accounts              # address → AccountRecord
//!     wallets               # name → WalletRecord (encrypted key material)
//!     notification_cursors  # address → CursorRecord
//! ```
//!
//! ## Important Notes
//!
//! - Store calls are synchronous and short; callers invoke them inline
//! - Unwrapped seed material is never written here

pub mod record_store;
pub mod repository;

pub use record_store::{RecordStore, StoreError, StoreResult, Table, UnitOfWork, Versioned};
pub use repository::{
    AccountRecord, AccountRepository, CursorRecord, CursorRepository, WalletRecord,
    WalletRepository,
};

/// Database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "wallet-server.redb";
