// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the record store.
//!
//! Each repository wraps one table and exposes the operations its owner
//! needs; version checks are left to the store.

pub mod accounts;
pub mod cursors;
pub mod wallets;

pub use accounts::{AccountRecord, AccountRepository};
pub use cursors::{CursorRecord, CursorRepository};
pub use wallets::{WalletRecord, WalletRepository};
