// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External collaborators: the ledger node and the proof-of-work service.
//!
//! The engine only depends on the [`LedgerNode`] and [`Worker`] traits;
//! [`http`] provides the reqwest-backed implementations used in production.

pub mod http;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::WalletError;
use crate::ledger::{AccountEntry, Address, Block, LedgerSnapshot, Receivable, Transaction, Work};

pub use http::{HttpLedgerNode, HttpWorker};

#[derive(Debug, Clone, thiserror::Error)]
pub enum NodeError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request rejected with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("stream failed: {0}")]
    Stream(String),
}

/// A 4xx answer is final for the request that caused it, except timeouts
/// and throttling. Everything else may succeed on retry.
impl From<NodeError> for WalletError {
    fn from(error: NodeError) -> Self {
        match &error {
            NodeError::Rejected { status: 409, .. } => WalletError::Conflict(error.to_string()),
            NodeError::Rejected { status: 408 | 429, .. } => {
                WalletError::Transient(error.to_string())
            }
            NodeError::Rejected { status: 400..=499, .. } => {
                WalletError::InvalidInput(error.to_string())
            }
            _ => WalletError::Transient(error.to_string()),
        }
    }
}

pub type NodeStream<T> = BoxStream<'static, Result<T, NodeError>>;

#[async_trait]
pub trait LedgerNode: Send + Sync {
    /// Current snapshots of the given accounts. Unopened accounts are absent.
    async fn account_snapshots(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<LedgerSnapshot>, NodeError>;

    /// Submit a signed transaction. Returns once accepted, not once final.
    async fn publish(&self, transaction: &Transaction) -> Result<(), NodeError>;

    /// Live stream of transfers receivable by any of `addresses`.
    async fn receivable_stream(
        &self,
        addresses: &[Address],
    ) -> Result<NodeStream<Receivable>, NodeError>;

    /// Entries of one account chain, heights `from_height..=to_height`.
    async fn account_entries(
        &self,
        address: &Address,
        from_height: u64,
        to_height: u64,
    ) -> Result<NodeStream<AccountEntry>, NodeError>;
}

#[async_trait]
pub trait Worker: Send + Sync {
    async fn work(&self, block: &Block) -> Result<Work, NodeError>;
}
