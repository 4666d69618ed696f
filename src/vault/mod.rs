// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Vault
//!
//! Envelope encryption of wallet seed material.
//!
//! ## Key hierarchy
//!
//! ```text
//! master key (WALLET_MASTER_KEY, process-wide)
//!   └── wallet key (32 bytes, held by the user; stored wrapped while unlocked)
//!         └── mnemonic entropy (always stored, encrypted)
//! ```
//!
//! Unlocking re-wraps the wallet key under the master key so that a restart
//! keeps the wallet usable. Unwrapped seeds only live in memory.
//!
//! State changes are announced to [`WalletEventListener`]s after the store
//! commit is durable.

pub mod cipher;

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use bip39::{Language, Mnemonic};
use serde::Serialize;
use zeroize::Zeroizing;

pub use cipher::{CipherError, EncryptionKey};

use crate::error::{WalletError, WalletResult};
use crate::ledger::signing::{self, Seed};
use crate::storage::{Versioned, WalletRecord, WalletRepository};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    Created(String),
    Unlocked(String),
    Locked(String),
}

impl WalletEvent {
    pub fn wallet_name(&self) -> &str {
        match self {
            WalletEvent::Created(name) | WalletEvent::Unlocked(name) | WalletEvent::Locked(name) => {
                name
            }
        }
    }
}

pub trait WalletEventListener: Send + Sync {
    fn on_wallet_event(&self, event: &WalletEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LockState {
    Locked,
    Unlocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletSummary {
    pub name: String,
    pub lock: LockState,
}

impl From<&WalletRecord> for WalletSummary {
    fn from(record: &WalletRecord) -> Self {
        Self {
            name: record.name.clone(),
            lock: if record.is_unlocked() {
                LockState::Unlocked
            } else {
                LockState::Locked
            },
        }
    }
}

/// Credentials handed back once, when a wallet is created or imported.
#[derive(Debug)]
pub struct IssuedWallet {
    pub mnemonic: Mnemonic,
    pub encryption_key: EncryptionKey,
}

#[derive(Default)]
struct Shared {
    seeds: RwLock<HashMap<String, Arc<Seed>>>,
    listeners: RwLock<Vec<Weak<dyn WalletEventListener>>>,
}

impl Shared {
    /// Update the seed cache, then notify listeners.
    fn apply(&self, seed: Option<Seed>, event: WalletEvent) {
        {
            let mut seeds = self.seeds.write().unwrap_or_else(|e| e.into_inner());
            let name = event.wallet_name().to_string();
            match seed {
                Some(seed) => seeds.insert(name, Arc::new(seed)),
                None => seeds.remove(&name),
            };
        }

        let listeners: Vec<_> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for listener in listeners {
            listener.on_wallet_event(&event);
        }
    }
}

pub struct KeyVault {
    wallets: WalletRepository,
    master_key: EncryptionKey,
    shared: Arc<Shared>,
}

impl KeyVault {
    pub fn new(wallets: WalletRepository, master_key: EncryptionKey) -> Self {
        Self {
            wallets,
            master_key,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn add_listener(&self, listener: Weak<dyn WalletEventListener>) {
        self.shared
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    /// Unwrap every unlocked wallet with the master key and cache its seed.
    ///
    /// A wrapped key the master key cannot open is fatal.
    pub fn load(&self) -> WalletResult<usize> {
        let mut loaded = 0;
        for stored in self.wallets.list()? {
            let record = stored.record;
            let Some(wrapped) = &record.encrypted_encryption_key else {
                continue;
            };

            let key = self.unwrap_key(wrapped).map_err(|e| {
                WalletError::Fatal(format!(
                    "Master key cannot unwrap wallet {}: {e}",
                    record.name
                ))
            })?;
            let mnemonic = decrypt_mnemonic(&record, &key).map_err(|e| {
                WalletError::Fatal(format!(
                    "Stored key cannot decrypt wallet {}: {e}",
                    record.name
                ))
            })?;

            self.shared
                .seeds
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(record.name.clone(), Arc::new(Seed::from_mnemonic(&mnemonic)));
            loaded += 1;
        }

        tracing::info!(unlocked_wallets = loaded, "Key vault loaded");
        Ok(loaded)
    }

    /// Store a new wallet from a mnemonic. Generates the wallet key when
    /// none is supplied.
    pub fn import(
        &self,
        name: &str,
        phrase: &str,
        encryption_key: Option<EncryptionKey>,
    ) -> WalletResult<IssuedWallet> {
        let mnemonic = signing::parse_mnemonic(phrase)?;
        self.store_new(name, mnemonic, encryption_key.unwrap_or_else(EncryptionKey::generate))
    }

    /// Generate a fresh 24-word mnemonic and wallet key.
    pub fn create(&self, name: &str) -> WalletResult<IssuedWallet> {
        let mnemonic = signing::generate_mnemonic()?;
        self.store_new(name, mnemonic, EncryptionKey::generate())
    }

    fn store_new(
        &self,
        name: &str,
        mnemonic: Mnemonic,
        encryption_key: EncryptionKey,
    ) -> WalletResult<IssuedWallet> {
        validate_name(name)?;

        let entropy = Zeroizing::new(mnemonic.to_entropy());
        let record = WalletRecord {
            name: name.to_string(),
            encrypted_entropy: encryption_key.encrypt(&entropy)?,
            encrypted_encryption_key: Some(self.master_key.encrypt(encryption_key.as_bytes())?),
        };

        let mut uow = self.wallets.unit_of_work();
        self.wallets.stage(&mut uow, &record, None)?;
        let shared = self.shared.clone();
        let seed = Seed::from_mnemonic(&mnemonic);
        let event = WalletEvent::Created(name.to_string());
        uow.after_commit(move || shared.apply(Some(seed), event));
        uow.commit()?;

        tracing::info!(wallet = %name, "Wallet stored");
        Ok(IssuedWallet {
            mnemonic,
            encryption_key,
        })
    }

    /// Decrypt the wallet with `encryption_key` and keep it unlocked.
    pub fn unlock(&self, name: &str, encryption_key: &EncryptionKey) -> WalletResult<Mnemonic> {
        let stored = self.record(name)?;
        let mnemonic = decrypt_mnemonic(&stored.record, encryption_key)?;

        let mut record = stored.record;
        record.encrypted_encryption_key = Some(self.master_key.encrypt(encryption_key.as_bytes())?);

        let mut uow = self.wallets.unit_of_work();
        self.wallets.stage(&mut uow, &record, Some(stored.version))?;
        let shared = self.shared.clone();
        let seed = Seed::from_mnemonic(&mnemonic);
        let event = WalletEvent::Unlocked(name.to_string());
        uow.after_commit(move || shared.apply(Some(seed), event));
        uow.commit()?;

        tracing::info!(wallet = %name, "Wallet unlocked");
        Ok(mnemonic)
    }

    /// Forget the wrapped wallet key. The encrypted entropy is kept.
    pub fn lock(&self, name: &str) -> WalletResult<()> {
        let stored = self.record(name)?;
        if !stored.record.is_unlocked() {
            return Ok(());
        }

        let mut record = stored.record;
        record.encrypted_encryption_key = None;

        let mut uow = self.wallets.unit_of_work();
        self.wallets.stage(&mut uow, &record, Some(stored.version))?;
        let shared = self.shared.clone();
        let event = WalletEvent::Locked(name.to_string());
        uow.after_commit(move || shared.apply(None, event));
        uow.commit()?;

        tracing::info!(wallet = %name, "Wallet locked");
        Ok(())
    }

    /// Unwrapped seed of an unlocked wallet.
    pub fn seed(&self, name: &str) -> WalletResult<Arc<Seed>> {
        let cached = self
            .shared
            .seeds
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned();
        match cached {
            Some(seed) => Ok(seed),
            None => {
                self.record(name)?;
                Err(WalletError::Locked(format!("Wallet {name} is locked")))
            }
        }
    }

    pub fn is_unlocked(&self, name: &str) -> bool {
        self.shared
            .seeds
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    pub fn get(&self, name: &str) -> WalletResult<WalletSummary> {
        Ok(WalletSummary::from(&self.record(name)?.record))
    }

    pub fn list(&self) -> WalletResult<Vec<WalletSummary>> {
        Ok(self
            .wallets
            .list()?
            .iter()
            .map(|stored| WalletSummary::from(&stored.record))
            .collect())
    }

    fn record(&self, name: &str) -> WalletResult<Versioned<WalletRecord>> {
        self.wallets
            .get(name)?
            .ok_or_else(|| WalletError::NotFound(format!("Wallet {name} not found")))
    }

    fn unwrap_key(&self, wrapped: &[u8]) -> Result<EncryptionKey, CipherError> {
        let bytes = Zeroizing::new(self.master_key.decrypt(wrapped)?);
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CipherError::Decrypt)?;
        Ok(EncryptionKey::from_bytes(bytes))
    }
}

/// Names that collide with fixed API paths.
const RESERVED_NAMES: &[&str] = &["accounts"];

fn validate_name(name: &str) -> WalletResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(WalletError::InvalidInput(format!(
            "Invalid wallet name {name:?}: use 1-64 characters of [A-Za-z0-9_-]"
        )));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(WalletError::InvalidInput(format!(
            "Wallet name {name:?} is reserved"
        )));
    }
    Ok(())
}

fn decrypt_mnemonic(record: &WalletRecord, key: &EncryptionKey) -> WalletResult<Mnemonic> {
    let entropy = Zeroizing::new(key.decrypt(&record.encrypted_entropy)?);
    Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| WalletError::InvalidInput(format!("Stored entropy is invalid: {e}")))
}
