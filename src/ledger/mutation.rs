// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pure next-state computation for account-chain mutations.
//!
//! A [`Mutation`] pairs the unsigned block to publish with the snapshot the
//! account adopts once the block is accepted. Nothing here touches I/O.

use chrono::{DateTime, SubsecRound, Utc};

use super::types::{
    AccountEntry, Address, Amount, Block, BlockBody, BlockHash, LedgerSnapshot, Network,
    Receivable,
};
use crate::error::{WalletError, WalletResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub block: Block,
    pub next: LedgerSnapshot,
    /// Sender, receiver or representative, depending on the block type.
    pub subject: Address,
    pub previous_balance: Amount,
}

impl Mutation {
    /// First block of a chain, funded by `receivable`.
    pub fn open(
        network: Network,
        address: Address,
        receivable: &Receivable,
        now: DateTime<Utc>,
    ) -> Mutation {
        let timestamp = stamp(now, &[receivable.timestamp]);
        let block = Block {
            network,
            address,
            height: 1,
            balance: receivable.amount,
            timestamp,
            body: BlockBody::Open {
                send_hash: receivable.hash,
                representative: address,
            },
        };

        Self::build(block, address, receivable.sender, Amount::ZERO)
    }

    pub fn receive(
        snapshot: &LedgerSnapshot,
        receivable: &Receivable,
        now: DateTime<Utc>,
    ) -> WalletResult<Mutation> {
        let balance = snapshot
            .balance
            .checked_add(receivable.amount)
            .ok_or_else(|| {
                WalletError::InvalidInput(format!(
                    "Receiving {} would overflow the balance of {}",
                    receivable.amount, snapshot.address
                ))
            })?;

        let block = Block {
            network: snapshot.network,
            address: snapshot.address,
            height: snapshot.height + 1,
            balance,
            timestamp: stamp(now, &[snapshot.last_timestamp, receivable.timestamp]),
            body: BlockBody::Receive {
                previous: snapshot.last_hash,
                send_hash: receivable.hash,
            },
        };

        Ok(Self::build(
            block,
            snapshot.representative,
            receivable.sender,
            snapshot.balance,
        ))
    }

    pub fn send(
        snapshot: &LedgerSnapshot,
        receiver: Address,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> WalletResult<Mutation> {
        if amount == Amount::ZERO {
            return Err(WalletError::InvalidInput(
                "Amount must be greater than zero".to_string(),
            ));
        }
        let balance = snapshot.balance.checked_sub(amount).ok_or_else(|| {
            WalletError::InvalidInput(format!(
                "Insufficient balance: {} available, {} requested",
                snapshot.balance, amount
            ))
        })?;

        let block = Block {
            network: snapshot.network,
            address: snapshot.address,
            height: snapshot.height + 1,
            balance,
            timestamp: stamp(now, &[snapshot.last_timestamp]),
            body: BlockBody::Send {
                previous: snapshot.last_hash,
                receiver,
                amount,
            },
        };

        Ok(Self::build(
            block,
            snapshot.representative,
            receiver,
            snapshot.balance,
        ))
    }

    pub fn change(
        snapshot: &LedgerSnapshot,
        representative: Address,
        now: DateTime<Utc>,
    ) -> Mutation {
        let block = Block {
            network: snapshot.network,
            address: snapshot.address,
            height: snapshot.height + 1,
            balance: snapshot.balance,
            timestamp: stamp(now, &[snapshot.last_timestamp]),
            body: BlockBody::Change {
                previous: snapshot.last_hash,
                representative,
            },
        };

        Self::build(block, representative, representative, snapshot.balance)
    }

    fn build(
        block: Block,
        representative: Address,
        subject: Address,
        previous_balance: Amount,
    ) -> Mutation {
        let next = LedgerSnapshot {
            network: block.network,
            address: block.address,
            height: block.height,
            balance: block.balance,
            representative,
            last_hash: block.hash(),
            last_timestamp: block.timestamp,
        };

        Mutation {
            block,
            next,
            subject,
            previous_balance,
        }
    }

    /// Entry describing the confirmed block.
    pub fn entry(&self, hash: BlockHash) -> AccountEntry {
        AccountEntry {
            hash,
            address: self.block.address,
            height: self.block.height,
            block_type: self.block.block_type(),
            subject_address: self.subject,
            previous_balance: self.previous_balance,
            balance: self.block.balance,
            timestamp: self.block.timestamp,
        }
    }
}

/// Block timestamps never go backwards; millisecond precision matches the
/// hashed layout.
fn stamp(now: DateTime<Utc>, floors: &[DateTime<Utc>]) -> DateTime<Utc> {
    floors
        .iter()
        .copied()
        .fold(now, |latest, floor| latest.max(floor))
        .trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::{Algorithm, BlockType, PublicKey};
    use chrono::Duration;

    fn address(byte: u8) -> Address {
        Address::new(Algorithm::V1, PublicKey([byte; 32]))
    }

    fn receivable(amount: u64, at: DateTime<Utc>) -> Receivable {
        Receivable {
            hash: BlockHash([9; 32]),
            sender: address(2),
            receiver: address(1),
            amount: Amount(amount),
            timestamp: at,
        }
    }

    fn opened(balance: u64) -> LedgerSnapshot {
        let now = Utc::now();
        Mutation::open(Network::Local, address(1), &receivable(balance, now), now).next
    }

    #[test]
    fn open_starts_chain_at_height_one() {
        let now = Utc::now();
        let m = Mutation::open(Network::Local, address(1), &receivable(100, now), now);

        assert_eq!(m.next.height, 1);
        assert_eq!(m.next.balance, Amount(100));
        assert_eq!(m.next.representative, address(1));
        assert_eq!(m.next.last_hash, m.block.hash());

        let entry = m.entry(m.block.hash());
        assert_eq!(entry.block_type, BlockType::Open);
        assert_eq!(entry.subject_address, address(2));
        assert_eq!(entry.previous_balance, Amount::ZERO);
    }

    #[test]
    fn send_debits_and_rejects_overdraft() {
        let snapshot = opened(100);

        let m = Mutation::send(&snapshot, address(3), Amount(30), Utc::now()).unwrap();
        assert_eq!(m.next.height, 2);
        assert_eq!(m.next.balance, Amount(70));
        assert_eq!(m.previous_balance, Amount(100));

        let err = Mutation::send(&snapshot, address(3), Amount(101), Utc::now()).unwrap_err();
        assert!(matches!(err, WalletError::InvalidInput(_)));

        let err = Mutation::send(&snapshot, address(3), Amount::ZERO, Utc::now()).unwrap_err();
        assert!(matches!(err, WalletError::InvalidInput(_)));
    }

    #[test]
    fn receive_rejects_overflow() {
        let snapshot = opened(u64::MAX);
        let err = Mutation::receive(&snapshot, &receivable(1, Utc::now()), Utc::now()).unwrap_err();
        assert!(matches!(err, WalletError::InvalidInput(_)));
    }

    #[test]
    fn change_keeps_balance_and_updates_representative() {
        let snapshot = opened(10);
        let m = Mutation::change(&snapshot, address(5), Utc::now());
        assert_eq!(m.next.balance, Amount(10));
        assert_eq!(m.next.representative, address(5));
        assert_eq!(m.entry(m.block.hash()).subject_address, address(5));
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let snapshot = opened(10);
        let past = snapshot.last_timestamp - Duration::hours(1);
        let m = Mutation::change(&snapshot, address(5), past);
        assert_eq!(m.block.timestamp, snapshot.last_timestamp);

        let future = Utc::now() + Duration::hours(1);
        let m = Mutation::receive(&snapshot, &receivable(1, future), Utc::now()).unwrap();
        assert_eq!(m.block.timestamp, future.trunc_subsecs(3));
    }
}
