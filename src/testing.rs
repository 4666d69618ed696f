// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory doubles for the ledger node, the work service, the publisher
//! and the webhook, shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::account::{AccountIdentity, AccountRegistry, Publish, TransactionPublisher};
use crate::error::{WalletError, WalletResult};
use crate::ledger::{
    AccountEntry, Address, Algorithm, Amount, Block, BlockBody, BlockHash, BlockType,
    LedgerSnapshot, Network, PublicKey, Receivable, Signature, Transaction, Work,
};
use crate::node::{LedgerNode, NodeError, NodeStream, Worker};
use crate::notification::{NotificationSink, SinkError};
use crate::state::AppState;
use crate::storage::{AccountRepository, RecordStore, WalletRepository};
use crate::vault::{EncryptionKey, KeyVault};

pub fn address(byte: u8) -> Address {
    Address::new(Algorithm::V1, PublicKey([byte; 32]))
}

fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
}

pub fn snapshot(address: Address, height: u64, balance: u64) -> LedgerSnapshot {
    LedgerSnapshot {
        network: Network::Local,
        address,
        height,
        balance: Amount(balance),
        representative: address,
        last_hash: BlockHash([height as u8; 32]),
        last_timestamp: at(height as i64),
    }
}

/// Receivable of `amount` for `receiver`; `tag` makes the hash unique.
pub fn receivable(receiver: Address, amount: u64, tag: u8) -> Receivable {
    Receivable {
        hash: BlockHash([tag; 32]),
        sender: address(0xee),
        receiver,
        amount: Amount(amount),
        timestamp: at(tag as i64),
    }
}

pub fn entry(address: Address, height: u64) -> AccountEntry {
    AccountEntry {
        hash: BlockHash([height as u8; 32]),
        address,
        height,
        block_type: BlockType::Receive,
        subject_address: self::address(0xee),
        previous_balance: Amount(height - 1),
        balance: Amount(height),
        timestamp: at(height as i64),
    }
}

pub fn transaction(address: Address) -> Transaction {
    Transaction {
        block: Block {
            network: Network::Local,
            address,
            height: 2,
            balance: Amount(1),
            timestamp: at(2),
            body: BlockBody::Change {
                previous: BlockHash([1; 32]),
                representative: address,
            },
        },
        signature: Signature([0; 64]),
        work: Work([0; 8]),
    }
}

// =============================================================================
// Ledger node
// =============================================================================

type ReceivableSender = mpsc::UnboundedSender<Result<Receivable, NodeError>>;

pub struct MockLedgerNode {
    snapshots: Mutex<HashMap<Address, LedgerSnapshot>>,
    entries: Mutex<HashMap<Address, Vec<AccountEntry>>>,
    entry_failures: Mutex<HashMap<(Address, u64), usize>>,
    published: Mutex<Vec<Transaction>>,
    subscriptions: Mutex<Vec<Vec<Address>>>,
    subscription_count: watch::Sender<usize>,
    receivables: Mutex<Option<ReceivableSender>>,
    fail_lookups: AtomicBool,
    fail_publish: AtomicBool,
}

impl Default for MockLedgerNode {
    fn default() -> Self {
        Self {
            snapshots: Mutex::default(),
            entries: Mutex::default(),
            entry_failures: Mutex::default(),
            published: Mutex::default(),
            subscriptions: Mutex::default(),
            subscription_count: watch::Sender::new(0),
            receivables: Mutex::default(),
            fail_lookups: AtomicBool::new(false),
            fail_publish: AtomicBool::new(false),
        }
    }
}

impl MockLedgerNode {
    pub fn set_snapshot(&self, snapshot: LedgerSnapshot) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(snapshot.address, snapshot);
    }

    pub fn ledger_snapshot(&self, address: &Address) -> Option<LedgerSnapshot> {
        self.snapshots.lock().unwrap().get(address).cloned()
    }

    pub fn push_entry(&self, entry: AccountEntry) {
        self.entries
            .lock()
            .unwrap()
            .entry(entry.address)
            .or_default()
            .push(entry);
    }

    /// The next `times` fetches of `height` fail.
    pub fn fail_entry(&self, address: Address, height: u64, times: usize) {
        self.entry_failures
            .lock()
            .unwrap()
            .insert((address, height), times);
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<Transaction> {
        self.published.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<Vec<Address>> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Wait until at least `count` subscriptions have been opened.
    pub async fn wait_for_subscriptions(&self, count: usize) {
        let mut rx = self.subscription_count.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|n| *n >= count))
            .await
            .expect("subscription timeout")
            .expect("mock dropped");
    }

    /// Push an item into the live subscription. Returns false without one.
    pub fn emit(&self, item: Result<Receivable, NodeError>) -> bool {
        match self.receivables.lock().unwrap().as_ref() {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }

    /// Close the live subscription stream.
    pub fn end_stream(&self) {
        self.receivables.lock().unwrap().take();
    }
}

#[async_trait]
impl LedgerNode for MockLedgerNode {
    async fn account_snapshots(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<LedgerSnapshot>, NodeError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(NodeError::Request("connection refused".into()));
        }
        let snapshots = self.snapshots.lock().unwrap();
        Ok(addresses
            .iter()
            .filter_map(|a| snapshots.get(a).cloned())
            .collect())
    }

    async fn publish(&self, transaction: &Transaction) -> Result<(), NodeError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(NodeError::Rejected {
                status: 503,
                body: "node busy".into(),
            });
        }
        let block = &transaction.block;
        let representative = match &block.body {
            BlockBody::Open { representative, .. } | BlockBody::Change { representative, .. } => {
                Some(*representative)
            }
            _ => None,
        };
        let mut snapshots = self.snapshots.lock().unwrap();
        let representative = representative
            .or_else(|| snapshots.get(&block.address).map(|s| s.representative))
            .unwrap_or(block.address);
        snapshots.insert(
            block.address,
            LedgerSnapshot {
                network: block.network,
                address: block.address,
                height: block.height,
                balance: block.balance,
                representative,
                last_hash: block.hash(),
                last_timestamp: block.timestamp,
            },
        );
        self.published.lock().unwrap().push(transaction.clone());
        Ok(())
    }

    async fn receivable_stream(
        &self,
        addresses: &[Address],
    ) -> Result<NodeStream<Receivable>, NodeError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.receivables.lock().unwrap() = Some(tx);
        self.subscriptions.lock().unwrap().push(addresses.to_vec());
        self.subscription_count.send_modify(|n| *n += 1);

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }

    async fn account_entries(
        &self,
        address: &Address,
        from_height: u64,
        to_height: u64,
    ) -> Result<NodeStream<AccountEntry>, NodeError> {
        {
            let mut failures = self.entry_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&(*address, from_height)) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(NodeError::Request("entry lookup failed".into()));
                }
            }
        }
        let entries: Vec<_> = self
            .entries
            .lock()
            .unwrap()
            .get(address)
            .map(|all| {
                all.iter()
                    .filter(|e| e.height >= from_height && e.height <= to_height)
                    .cloned()
                    .map(Ok)
                    .collect()
            })
            .unwrap_or_default();
        Ok(futures::stream::iter(entries).boxed())
    }
}

// =============================================================================
// Worker
// =============================================================================

#[derive(Default)]
pub struct MockWorker {
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl MockWorker {
    pub fn failing(times: usize) -> Self {
        Self {
            failures: AtomicUsize::new(times),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for MockWorker {
    async fn work(&self, _block: &Block) -> Result<Work, NodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(NodeError::Request("work service down".into()));
        }
        Ok(Work([0xaa; 8]))
    }
}

// =============================================================================
// Publisher
// =============================================================================

/// Publisher that accepts every block without signing.
#[derive(Default)]
pub struct StubPublisher {
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    blocks: Mutex<Vec<Block>>,
}

impl StubPublisher {
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publish for StubPublisher {
    async fn publish(&self, _identity: &AccountIdentity, block: Block) -> WalletResult<Transaction> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(WalletError::Transient("ledger unavailable".into()));
        }
        self.blocks.lock().unwrap().push(block.clone());
        Ok(Transaction {
            block,
            signature: Signature([0; 64]),
            work: Work([0; 8]),
        })
    }
}

// =============================================================================
// Notification sink
// =============================================================================

#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<AccountEntry>>,
    failures: Mutex<HashMap<u64, usize>>,
}

impl RecordingSink {
    /// The next `times` deliveries of `height` fail.
    pub fn fail_height(&self, height: u64, times: usize) {
        self.failures.lock().unwrap().insert(height, times);
    }

    pub fn delivered_heights(&self) -> Vec<u64> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.height)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, entry: &AccountEntry) -> Result<(), SinkError> {
        if let Some(remaining) = self.failures.lock().unwrap().get_mut(&entry.height) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SinkError::Rejected { status: 500 });
            }
        }
        self.delivered.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

// =============================================================================
// HTTP application
// =============================================================================

/// Full application state over a scratch database, a mock ledger and a
/// mock work service.
pub struct TestApp {
    _dir: tempfile::TempDir,
    pub state: AppState,
    pub node: Arc<MockLedgerNode>,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        let store = RecordStore::open(&dir.path().join("db")).unwrap();
        let vault = Arc::new(KeyVault::new(
            WalletRepository::new(store.clone()),
            EncryptionKey::generate(),
        ));
        let node = Arc::new(MockLedgerNode::default());
        let publisher = Arc::new(TransactionPublisher::new(
            vault.clone(),
            Arc::new(MockWorker::default()),
            node.clone(),
            CancellationToken::new(),
        ));
        let registry = AccountRegistry::load(
            Network::Local,
            vault.clone(),
            AccountRepository::new(store),
            node.clone(),
            publisher,
        )
        .await
        .unwrap();

        Self {
            _dir: dir,
            state: AppState::new(vault, registry, node.clone()),
            node,
        }
    }

    /// Create an unlocked wallet with one account funded with `amount`.
    pub async fn funded_account(&self, wallet: &str, amount: u64) -> Address {
        if self.state.vault.get(wallet).is_err() {
            self.state.vault.create(wallet).unwrap();
        }
        let record = self.state.registry.create(wallet).await.unwrap();
        let generation = self.state.registry.active_set().generation;
        self.state
            .registry
            .receive(&receivable(record.address, amount, 1), generation)
            .await
            .unwrap();
        record.address
    }
}
