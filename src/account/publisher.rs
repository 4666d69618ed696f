// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Turns an unsigned block into a submitted transaction.
//!
//! Seed lookup, key derivation, proof of work, signature, submission. The
//! work request is retried every `retry_delay` (default 10 s) until it
//! succeeds or the process shuts down.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::state::{AccountIdentity, Publish};
use crate::error::{WalletError, WalletResult};
use crate::ledger::{AccountSigner, Block, Transaction, Work};
use crate::node::{LedgerNode, Worker};
use crate::vault::KeyVault;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

pub struct TransactionPublisher {
    vault: Arc<KeyVault>,
    worker: Arc<dyn Worker>,
    node: Arc<dyn LedgerNode>,
    retry_delay: Duration,
    shutdown: CancellationToken,
}

impl TransactionPublisher {
    pub fn new(
        vault: Arc<KeyVault>,
        worker: Arc<dyn Worker>,
        node: Arc<dyn LedgerNode>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            vault,
            worker,
            node,
            retry_delay: DEFAULT_RETRY_DELAY,
            shutdown,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    async fn work(&self, block: &Block) -> WalletResult<Work> {
        let mut attempt: u32 = 1;
        loop {
            let result = tokio::select! {
                _ = self.shutdown.cancelled() => return Err(WalletError::Cancelled),
                result = self.worker.work(block) => result,
            };
            match result {
                Ok(work) => return Ok(work),
                Err(e) => warn!(
                    address = %block.address,
                    height = block.height,
                    attempt,
                    error = %e,
                    "Work request failed, retrying"
                ),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.retry_delay) => {},
                _ = self.shutdown.cancelled() => return Err(WalletError::Cancelled),
            }
            attempt += 1;
        }
    }
}

#[async_trait]
impl Publish for TransactionPublisher {
    async fn publish(&self, identity: &AccountIdentity, block: Block) -> WalletResult<Transaction> {
        let seed = self.vault.seed(&identity.wallet_name)?;
        let signer = AccountSigner::derive(&seed, identity.account_index)?;
        drop(seed);
        if signer.address() != identity.address {
            return Err(WalletError::Fatal(format!(
                "Key of account {} (index {}) does not match its address",
                identity.address, identity.account_index
            )));
        }

        let work = self.work(&block).await?;
        let signature = signer.sign(&block.hash());
        let transaction = Transaction {
            block,
            signature,
            work,
        };

        self.node.publish(&transaction).await?;

        info!(
            address = %identity.address,
            height = transaction.block.height,
            hash = %transaction.hash(),
            "Transaction published"
        );
        Ok(transaction)
    }
}
