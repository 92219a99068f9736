// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Core cryptographic traits
//!
//! The control plane never touches primitive internals. It hashes through
//! [`Hash`], authenticates through [`Mac`] and draws randomness through
//! [`CryptoRng`]; platforms with hardware engines implement these traits
//! over their accelerators.

use crate::error::CryptoError;

/// Hash function trait
///
/// Provides both one-shot and incremental hashing.
pub trait Hash: Sized {
    /// Output size in bytes
    const OUTPUT_SIZE: usize;
    /// Block size in bytes (for HMAC)
    const BLOCK_SIZE: usize;

    /// Output type
    type Output: AsRef<[u8]> + Clone;

    /// Hash a message in one shot
    fn hash(message: &[u8]) -> Self::Output;

    /// Create a new incremental hasher
    fn new() -> Self;

    /// Update the hasher with data
    fn update(&mut self, data: &[u8]);

    /// Finalize and return the hash
    fn finalize(self) -> Self::Output;

    /// Reset the hasher for reuse
    fn reset(&mut self);
}

/// Keyed message authentication trait
pub trait Mac: Sized {
    /// Tag size in bytes
    const TAG_SIZE: usize;

    /// Tag type
    type Tag: AsRef<[u8]> + Clone;

    /// Create a MAC instance keyed with `key`
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the key is rejected.
    fn new_with_key(key: &[u8]) -> Result<Self, CryptoError>;

    /// Feed data into the MAC
    fn update(&mut self, data: &[u8]);

    /// Finalize and return the tag
    fn finalize(self) -> Self::Tag;

    /// Finalize and compare against `expected` in constant time
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidMac` on mismatch.
    fn verify(self, expected: &[u8]) -> Result<(), CryptoError>;
}

/// Cryptographically secure random number generator trait
pub trait CryptoRng {
    /// Fill buffer with random bytes
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngFailure` if the RNG fails.
    fn fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), CryptoError>;

    /// Generate a random u8
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngFailure` if the RNG fails.
    fn next_u8(&mut self) -> Result<u8, CryptoError> {
        let mut buf = [0u8; 1];
        self.fill_bytes(&mut buf)?;
        Ok(buf[0])
    }

    /// Generate a random u32
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngFailure` if the RNG fails.
    fn next_u32(&mut self) -> Result<u32, CryptoError> {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Generate a random u64
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngFailure` if the RNG fails.
    fn next_u64(&mut self) -> Result<u64, CryptoError> {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}
