// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ChaCha20-Poly1305 envelope encryption.
//!
//! Ciphertexts are `nonce (12 bytes) || ciphertext+tag`. Keys are 32 bytes,
//! hex encoded at the edges, and wiped on drop.

use std::fmt;
use std::str::FromStr;

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Nonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::WalletError;

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("ciphertext too short")]
    Truncated,

    #[error("encryption failed")]
    Encrypt,

    /// Wrong key or tampered ciphertext.
    #[error("decryption failed: wrong key or corrupted data")]
    Decrypt,
}

impl From<CipherError> for WalletError {
    fn from(error: CipherError) -> Self {
        match error {
            CipherError::Encrypt => WalletError::Fatal(error.to_string()),
            _ => WalletError::InvalidInput(error.to_string()),
        }
    }
}

/// 256-bit symmetric key.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        Self(ChaCha20Poly1305::generate_key(&mut OsRng).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let cipher = ChaCha20Poly1305::new(self.as_bytes().into());
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CipherError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        if data.len() < NONCE_LEN {
            return Err(CipherError::Truncated);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(self.as_bytes().into());

        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Decrypt)
    }
}

impl FromStr for EncryptionKey {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut bytes).map_err(|_| {
            WalletError::InvalidInput("Encryption key must be 32 bytes of hex".to_string())
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = EncryptionKey::generate();
        let sealed = key.encrypt(b"entropy").unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + b"entropy".len() + 16);
        assert_eq!(key.decrypt(&sealed).unwrap(), b"entropy");
    }

    #[test]
    fn wrong_key_and_tampering_fail() {
        let key = EncryptionKey::generate();
        let mut sealed = key.encrypt(b"entropy").unwrap();

        assert_eq!(
            EncryptionKey::generate().decrypt(&sealed),
            Err(CipherError::Decrypt)
        );

        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        assert_eq!(key.decrypt(&sealed), Err(CipherError::Decrypt));
        assert_eq!(key.decrypt(&[0u8; 4]), Err(CipherError::Truncated));
    }

    #[test]
    fn parses_hex_keys_only_of_the_right_length() {
        let key = EncryptionKey::generate();
        let parsed: EncryptionKey = key.to_hex().parse().unwrap();
        assert_eq!(parsed, key);

        for bad in ["", "abcd", "zz".repeat(32).as_str()] {
            assert!(matches!(
                bad.parse::<EncryptionKey>(),
                Err(WalletError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn debug_does_not_leak_key_bytes() {
        let key = EncryptionKey::from_bytes([0xab; 32]);
        assert_eq!(format!("{key:?}"), "EncryptionKey(..)");
    }
}
