// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PIN verification.
//!
//! The service never holds the PIN itself, only `HMAC-SHA256(key, pin)`.
//! Comparison is constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub trait PinVerifier: Send + Sync {
    fn verify_pin(&self, pin: &str) -> bool;
}

#[derive(Debug, thiserror::Error)]
#[error("PIN key must not be empty")]
pub struct EmptyPinKey;

#[derive(Clone)]
pub struct HashedPinVerifier {
    mac: HmacSha256,
    digest: Vec<u8>,
}

impl HashedPinVerifier {
    pub fn new(key: &[u8], digest: Vec<u8>) -> Result<Self, EmptyPinKey> {
        if key.is_empty() {
            return Err(EmptyPinKey);
        }
        let mac = HmacSha256::new_from_slice(key).map_err(|_| EmptyPinKey)?;
        Ok(Self { mac, digest })
    }

    pub fn from_pin(key: &[u8], pin: &str) -> Result<Self, EmptyPinKey> {
        let digest = digest_pin(key, pin)?;
        Self::new(key, digest)
    }
}

impl PinVerifier for HashedPinVerifier {
    fn verify_pin(&self, pin: &str) -> bool {
        let mut mac = self.mac.clone();
        mac.update(pin.as_bytes());
        mac.verify_slice(&self.digest).is_ok()
    }
}

/// Digest stored in place of the PIN.
pub fn digest_pin(key: &[u8], pin: &str) -> Result<Vec<u8>, EmptyPinKey> {
    if key.is_empty() {
        return Err(EmptyPinKey);
    }
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| EmptyPinKey)?;
    mac.update(pin.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// No PIN configured; every attempt is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPinVerifier;

impl PinVerifier for DisabledPinVerifier {
    fn verify_pin(&self, _pin: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_pin_verifies() {
        let verifier = HashedPinVerifier::from_pin(b"server-key", "4321").unwrap();
        assert!(verifier.verify_pin("4321"));
        assert!(!verifier.verify_pin("1234"));
        assert!(!verifier.verify_pin(""));
    }

    #[test]
    fn digest_depends_on_key() {
        let a = digest_pin(b"key-a", "4321").unwrap();
        let b = digest_pin(b"key-b", "4321").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);

        let verifier = HashedPinVerifier::new(b"key-b", a).unwrap();
        assert!(!verifier.verify_pin("4321"));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(HashedPinVerifier::from_pin(b"", "4321").is_err());
        assert!(!DisabledPinVerifier.verify_pin("4321"));
    }
}
