// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger data types shared by the account engine, the node client and the
//! notifier.
//!
//! Byte-oriented newtypes (public keys, hashes, signatures, work) serialize
//! as hex strings. Addresses serialize as `<algorithm>:<hex public key>`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::WalletError;

macro_rules! hex_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode_upper(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = WalletError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = [0u8; $len];
                hex::decode_to_slice(s, &mut bytes).map_err(|e| {
                    WalletError::InvalidInput(format!("Invalid {}: {e}", stringify!($name)))
                })?;
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_bytes!(
    /// Ed25519 public key of an account.
    PublicKey,
    32
);
hex_bytes!(
    /// SHA-256 hash of a block.
    BlockHash,
    32
);
hex_bytes!(
    /// Ed25519 signature over a block hash.
    Signature,
    64
);
hex_bytes!(
    /// Proof-of-work credential attached to a transaction.
    Work,
    8
);

// =============================================================================
// Network / Algorithm
// =============================================================================

/// Ledger network an account chain lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Network {
    Live,
    Beta,
    Dev,
    Local,
}

impl Network {
    fn code(self) -> u8 {
        match self {
            Network::Live => 0,
            Network::Beta => 1,
            Network::Dev => 2,
            Network::Local => 3,
        }
    }
}

impl FromStr for Network {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LIVE" => Ok(Network::Live),
            "BETA" => Ok(Network::Beta),
            "DEV" => Ok(Network::Dev),
            "LOCAL" => Ok(Network::Local),
            other => Err(WalletError::InvalidInput(format!("Unknown network {other}"))),
        }
    }
}

/// Key algorithm tag carried by every address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Algorithm {
    V1,
}

impl Algorithm {
    fn code(self) -> u8 {
        match self {
            Algorithm::V1 => 0,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::V1 => f.write_str("v1"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" => Ok(Algorithm::V1),
            other => Err(WalletError::InvalidInput(format!("Unknown algorithm {other}"))),
        }
    }
}

// =============================================================================
// Address
// =============================================================================

/// Account identity: algorithm tag + public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub algorithm: Algorithm,
    pub public_key: PublicKey,
}

impl Address {
    pub fn new(algorithm: Algorithm, public_key: PublicKey) -> Self {
        Self {
            algorithm,
            public_key,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, hex::encode(self.public_key.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, public_key) = s
            .split_once(':')
            .ok_or_else(|| WalletError::InvalidInput(format!("Invalid address {s}")))?;
        Ok(Self {
            algorithm: algorithm.parse()?,
            public_key: public_key.parse()?,
        })
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Amount
// =============================================================================

/// Raw ledger amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(pub u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Snapshot / Blocks
// =============================================================================

/// Point-in-time summary of an account chain as known to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub network: Network,
    pub address: Address,
    pub height: u64,
    pub balance: Amount,
    pub representative: Address,
    pub last_hash: BlockHash,
    pub last_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockType {
    Open,
    Receive,
    Send,
    Change,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum BlockBody {
    Open {
        send_hash: BlockHash,
        representative: Address,
    },
    Receive {
        previous: BlockHash,
        send_hash: BlockHash,
    },
    Send {
        previous: BlockHash,
        receiver: Address,
        amount: Amount,
    },
    Change {
        previous: BlockHash,
        representative: Address,
    },
}

/// Unsigned account-chain block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub network: Network,
    pub address: Address,
    pub height: u64,
    /// Balance after this block is applied.
    pub balance: Amount,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: BlockBody,
}

impl Block {
    pub fn block_type(&self) -> BlockType {
        match self.body {
            BlockBody::Open { .. } => BlockType::Open,
            BlockBody::Receive { .. } => BlockType::Receive,
            BlockBody::Send { .. } => BlockType::Send,
            BlockBody::Change { .. } => BlockType::Change,
        }
    }

    /// SHA-256 over the fixed byte layout of the block.
    pub fn hash(&self) -> BlockHash {
        let mut hasher = Sha256::new();
        hasher.update([self.block_type() as u8, self.network.code()]);
        hasher.update(address_bytes(&self.address));
        hasher.update(self.height.to_be_bytes());
        hasher.update(self.balance.0.to_be_bytes());
        hasher.update(self.timestamp.timestamp_millis().to_be_bytes());

        match &self.body {
            BlockBody::Open {
                send_hash,
                representative,
            } => {
                hasher.update(send_hash.0);
                hasher.update(address_bytes(representative));
            }
            BlockBody::Receive {
                previous,
                send_hash,
            } => {
                hasher.update(previous.0);
                hasher.update(send_hash.0);
            }
            BlockBody::Send {
                previous,
                receiver,
                amount,
            } => {
                hasher.update(previous.0);
                hasher.update(address_bytes(receiver));
                hasher.update(amount.0.to_be_bytes());
            }
            BlockBody::Change {
                previous,
                representative,
            } => {
                hasher.update(previous.0);
                hasher.update(address_bytes(representative));
            }
        }

        BlockHash(hasher.finalize().into())
    }
}

fn address_bytes(address: &Address) -> [u8; 33] {
    let mut bytes = [0u8; 33];
    bytes[0] = address.algorithm.code();
    bytes[1..].copy_from_slice(&address.public_key.0);
    bytes
}

/// Signed block ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub block: Block,
    pub signature: Signature,
    pub work: Work,
}

impl Transaction {
    pub fn hash(&self) -> BlockHash {
        self.block.hash()
    }
}

/// Incoming transfer not yet applied to the receiver's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receivable {
    pub hash: BlockHash,
    pub sender: Address,
    pub receiver: Address,
    pub amount: Amount,
    pub timestamp: DateTime<Utc>,
}

/// User-facing view of one block of an account chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub hash: BlockHash,
    pub address: Address,
    pub height: u64,
    pub block_type: BlockType,
    /// Sender, receiver or representative, depending on the block type.
    pub subject_address: Address,
    pub previous_balance: Amount,
    pub balance: Amount,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(byte: u8) -> Address {
        Address::new(Algorithm::V1, PublicKey([byte; 32]))
    }

    fn send_block() -> Block {
        Block {
            network: Network::Local,
            address: address(1),
            height: 2,
            balance: Amount(40),
            timestamp: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            body: BlockBody::Send {
                previous: BlockHash([7; 32]),
                receiver: address(2),
                amount: Amount(60),
            },
        }
    }

    #[test]
    fn address_parses_its_display_form() {
        let addr = address(0xab);
        let text = addr.to_string();
        assert!(text.starts_with("v1:abab"));
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn malformed_address_is_invalid_input() {
        for bad in ["abab", "v2:00", "v1:zz", "v1:00"] {
            assert!(matches!(
                bad.parse::<Address>(),
                Err(WalletError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn hash_depends_on_every_field() {
        let block = send_block();
        let hash = block.hash();
        assert_eq!(hash, send_block().hash());

        let mut other = send_block();
        other.height = 3;
        assert_ne!(other.hash(), hash);

        let mut other = send_block();
        other.body = BlockBody::Send {
            previous: BlockHash([7; 32]),
            receiver: address(3),
            amount: Amount(60),
        };
        assert_ne!(other.hash(), hash);
    }

    #[test]
    fn block_serializes_with_type_tag() {
        let json = serde_json::to_value(send_block()).unwrap();
        assert_eq!(json["type"], "SEND");
        assert_eq!(json["network"], "LOCAL");
        assert_eq!(json["amount"], 60);

        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back, send_block());
    }

    #[test]
    fn network_parses_case_insensitively() {
        assert_eq!("live".parse::<Network>().unwrap(), Network::Live);
        assert_eq!("LOCAL".parse::<Network>().unwrap(), Network::Local);
        assert!("mainnet".parse::<Network>().is_err());
    }
}
