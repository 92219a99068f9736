// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! SHA-256 and HMAC-SHA256
//!
//! Software implementations of the [`Hash`] and [`Mac`] traits backed by the
//! `sha2` and `hmac` crates.

use crate::error::CryptoError;
use crate::traits::{Hash, Mac};
use hmac::Mac as _;
use sha2::Digest;

type HmacSha256Impl = hmac::Hmac<sha2::Sha256>;

/// SHA-256 output size in bytes
pub const SHA256_OUTPUT_SIZE: usize = 32;

/// SHA-256 hash output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sha256Output([u8; SHA256_OUTPUT_SIZE]);

impl Sha256Output {
    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; SHA256_OUTPUT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the digest bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SHA256_OUTPUT_SIZE] {
        &self.0
    }
}

impl AsRef<[u8]> for Sha256Output {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; SHA256_OUTPUT_SIZE]> for Sha256Output {
    fn from(bytes: [u8; SHA256_OUTPUT_SIZE]) -> Self {
        Self(bytes)
    }
}

/// SHA-256 hasher
pub struct Sha256 {
    inner: sha2::Sha256,
}

impl Hash for Sha256 {
    const OUTPUT_SIZE: usize = SHA256_OUTPUT_SIZE;
    const BLOCK_SIZE: usize = 64;

    type Output = Sha256Output;

    fn hash(message: &[u8]) -> Self::Output {
        Sha256Output(sha2::Sha256::digest(message).into())
    }

    fn new() -> Self {
        Self {
            inner: sha2::Sha256::new(),
        }
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.inner, data);
    }

    fn finalize(self) -> Self::Output {
        Sha256Output(self.inner.finalize().into())
    }

    fn reset(&mut self) {
        Digest::reset(&mut self.inner);
    }
}

impl Default for Sha256 {
    fn default() -> Self {
        <Self as Hash>::new()
    }
}

/// HMAC-SHA256 instance
pub struct HmacSha256 {
    inner: HmacSha256Impl,
}

impl Mac for HmacSha256 {
    const TAG_SIZE: usize = SHA256_OUTPUT_SIZE;

    type Tag = Sha256Output;

    fn new_with_key(key: &[u8]) -> Result<Self, CryptoError> {
        let inner = HmacSha256Impl::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { inner })
    }

    fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    fn finalize(self) -> Self::Tag {
        Sha256Output(self.inner.finalize().into_bytes().into())
    }

    fn verify(self, expected: &[u8]) -> Result<(), CryptoError> {
        self.inner
            .verify_slice(expected)
            .map_err(|_| CryptoError::InvalidMac)
    }
}

/// One-shot HMAC-SHA256 over the concatenation of `parts`
///
/// # Errors
///
/// Returns `CryptoError::InvalidKey` if the key is rejected.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<Sha256Output, CryptoError> {
    let mut mac = HmacSha256::new_with_key(key)?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    // FIPS 180-4 "abc"
    const ABC_DIGEST: [u8; 32] = [
        0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22,
        0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00,
        0x15, 0xad,
    ];

    #[test]
    fn test_sha256_known_answer() {
        assert_eq!(Sha256::hash(b"abc").as_bytes(), &ABC_DIGEST);
    }

    #[test]
    fn test_sha256_incremental_matches_one_shot() {
        let mut h = <Sha256 as Hash>::new();
        h.update(b"a");
        h.update(b"bc");
        assert_eq!(h.finalize(), Sha256::hash(b"abc"));
    }

    #[test]
    fn test_hmac_rfc4231_case2() {
        let tag = hmac_sha256(b"Jefe", &[b"what do ya want ".as_slice(), b"for nothing?".as_slice()]).unwrap();
        assert_eq!(
            &tag.as_bytes()[..8],
            &[0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e]
        );
    }

    #[test]
    fn test_hmac_verify_detects_flip() {
        let key = [0x0b; 20];
        let mut tag = hmac_sha256(&key, &[b"Hi There".as_slice()]).unwrap();
        let mut mac = HmacSha256::new_with_key(&key).unwrap();
        mac.update(b"Hi There");
        assert!(mac.verify(tag.as_ref()).is_ok());

        let mut bytes = *tag.as_bytes();
        bytes[0] ^= 0xff;
        tag = Sha256Output::from_bytes(bytes);
        let mut mac = HmacSha256::new_with_key(&key).unwrap();
        mac.update(b"Hi There");
        assert_eq!(mac.verify(tag.as_ref()), Err(CryptoError::InvalidMac));
    }
}
