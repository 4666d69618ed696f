// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Seed handling and per-account key derivation.
//!
//! - Mnemonics are BIP-39, 24 words, English wordlist
//! - Seed = BIP-39 seed with an empty passphrase
//! - Account key `i` = first 32 bytes of HMAC-SHA512(seed, i as u32 BE)
//! - Blocks are signed with Ed25519 over their hash

use std::fmt;

use bip39::{Language, Mnemonic};
use ed25519_dalek::{Signer, SigningKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

use super::types::{Address, Algorithm, BlockHash, PublicKey, Signature};
use crate::error::{WalletError, WalletResult};

type HmacSha512 = Hmac<Sha512>;

pub const MNEMONIC_WORDS: usize = 24;

/// Parse a user-supplied English mnemonic.
pub fn parse_mnemonic(phrase: &str) -> WalletResult<Mnemonic> {
    Mnemonic::parse_in_normalized(Language::English, phrase.trim())
        .map_err(|e| WalletError::InvalidInput(format!("Invalid mnemonic: {e}")))
}

pub fn generate_mnemonic() -> WalletResult<Mnemonic> {
    Mnemonic::generate_in(Language::English, MNEMONIC_WORDS)
        .map_err(|e| WalletError::Fatal(format!("Mnemonic generation failed: {e}")))
}

/// Unwrapped wallet seed. Only ever held in memory.
#[derive(Clone)]
pub struct Seed(Zeroizing<[u8; 64]>);

impl Seed {
    pub fn from_mnemonic(mnemonic: &Mnemonic) -> Self {
        Self(Zeroizing::new(mnemonic.to_seed_normalized("")))
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}

/// Signing key of one account of a wallet.
pub struct AccountSigner {
    key: SigningKey,
}

impl AccountSigner {
    pub fn derive(seed: &Seed, index: u32) -> WalletResult<Self> {
        let mut mac = HmacSha512::new_from_slice(seed.as_bytes())
            .map_err(|e| WalletError::Fatal(format!("Key derivation failed: {e}")))?;
        mac.update(&index.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(&digest[..32]);

        Ok(Self {
            key: SigningKey::from_bytes(&secret),
        })
    }

    pub fn address(&self) -> Address {
        Address::new(
            Algorithm::V1,
            PublicKey(self.key.verifying_key().to_bytes()),
        )
    }

    pub fn sign(&self, hash: &BlockHash) -> Signature {
        Signature(self.key.sign(hash.as_bytes()).to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Verifier, VerifyingKey};

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon \
        abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon \
        abandon abandon abandon abandon abandon art";

    #[test]
    fn derivation_is_deterministic_per_index() {
        let seed = Seed::from_mnemonic(&parse_mnemonic(PHRASE).unwrap());

        let first = AccountSigner::derive(&seed, 0).unwrap().address();
        let again = AccountSigner::derive(&seed, 0).unwrap().address();
        let second = AccountSigner::derive(&seed, 1).unwrap().address();

        assert_eq!(first, again);
        assert_ne!(first, second);
    }

    #[test]
    fn signature_verifies_against_address_key() {
        let seed = Seed::from_mnemonic(&parse_mnemonic(PHRASE).unwrap());
        let signer = AccountSigner::derive(&seed, 3).unwrap();
        let hash = BlockHash([42; 32]);

        let signature = signer.sign(&hash);
        let key = VerifyingKey::from_bytes(signer.address().public_key.as_bytes()).unwrap();
        let signature = ed25519_dalek::Signature::from_bytes(&signature.0);
        assert!(key.verify(hash.as_bytes(), &signature).is_ok());
    }

    #[test]
    fn generated_mnemonic_has_24_words() {
        let mnemonic = generate_mnemonic().unwrap();
        assert_eq!(mnemonic.word_count(), MNEMONIC_WORDS);
        assert!(parse_mnemonic(&mnemonic.to_string()).is_ok());
    }

    #[test]
    fn garbage_mnemonic_is_invalid_input() {
        assert!(matches!(
            parse_mnemonic("not a real phrase"),
            Err(WalletError::InvalidInput(_))
        ));
    }
}
