// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account-chain model: addresses, blocks, snapshots and key derivation.

pub mod mutation;
pub mod signing;
pub mod types;

pub use mutation::Mutation;
pub use signing::{AccountSigner, Seed};
pub use types::{
    AccountEntry, Address, Algorithm, Amount, Block, BlockBody, BlockHash, BlockType,
    LedgerSnapshot, Network, PublicKey, Receivable, Signature, Transaction, Work,
};
