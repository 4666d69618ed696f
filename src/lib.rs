// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet Account Server
//!
//! Self-hosted wallet service for an append-only, per-account ledger. Keeps
//! one chain per derived account in sync with a remote ledger node, signs
//! and publishes blocks, and replays account activity to a webhook.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `vault` - Envelope-encrypted wallet seeds
//! - `ledger` - Ledger data model, block construction and signing
//! - `account` - Account state machine, registry, receivable listener, publisher
//! - `notification` - Webhook replay of account entries
//! - `node` - Ledger node and work service clients
//! - `storage` - Versioned records on redb

pub mod account;
pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod node;
pub mod notification;
pub mod shutdown;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod vault;

#[cfg(test)]
pub(crate) mod testing;
