// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! HMAC-DRBG random number generation
//!
//! NIST SP 800-90A Section 10.1.2 HMAC_DRBG over HMAC-SHA256, seeded from a
//! platform entropy source. Used for partition IDs, data versions, MLE
//! challenges, ML-EID interface identifiers and attach jitter.
//!
//! Entropy input passes a repetition count health test (SP 800-90B 4.4.1)
//! before it is mixed into the state.

use crate::error::CryptoError;
use crate::hash::{hmac_sha256, SHA256_OUTPUT_SIZE};
use crate::traits::CryptoRng;
use zeroize::Zeroize;

/// Minimum entropy input length in bytes (256-bit security strength)
pub const MIN_ENTROPY_LEN: usize = 32;

/// Maximum bytes per generate request
pub const MAX_REQUEST_LEN: usize = 1 << 16;

/// Generate requests allowed between reseeds
pub const RESEED_INTERVAL: u64 = 1 << 20;

/// Largest run of identical entropy bytes accepted (H = 8, alpha = 2^-40)
const REPETITION_CUTOFF: u8 = 6;

/// Repetition count test over a block of entropy
fn check_entropy(entropy: &[u8]) -> Result<(), CryptoError> {
    if entropy.len() < MIN_ENTROPY_LEN {
        return Err(CryptoError::RngFailure);
    }
    let mut last = entropy[0];
    let mut run = 1u8;
    for &b in &entropy[1..] {
        if b == last {
            run = run.saturating_add(1);
            if run >= REPETITION_CUTOFF {
                return Err(CryptoError::RngFailure);
            }
        } else {
            last = b;
            run = 1;
        }
    }
    Ok(())
}

/// HMAC-DRBG state
pub struct HmacDrbg {
    key: [u8; SHA256_OUTPUT_SIZE],
    v: [u8; SHA256_OUTPUT_SIZE],
    reseed_counter: u64,
}

impl HmacDrbg {
    /// Instantiate from entropy, nonce and an optional personalization string
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngFailure` if the entropy is short or fails the
    /// health test.
    pub fn instantiate(
        entropy: &[u8],
        nonce: &[u8],
        personalization: &[u8],
    ) -> Result<Self, CryptoError> {
        check_entropy(entropy)?;

        let mut drbg = Self {
            key: [0x00; SHA256_OUTPUT_SIZE],
            v: [0x01; SHA256_OUTPUT_SIZE],
            reseed_counter: 1,
        };
        drbg.update(&[entropy, nonce, personalization])?;
        Ok(drbg)
    }

    /// Instantiate from a fixed 32-byte seed
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngFailure` if the seed fails the health test.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CryptoError> {
        Self::instantiate(seed, &[], b"thread-control-plane")
    }

    /// HMAC_DRBG_Update (SP 800-90A 10.1.2.2)
    fn update(&mut self, provided: &[&[u8]]) -> Result<(), CryptoError> {
        let has_input = provided.iter().any(|p| !p.is_empty());

        for round in [0x00u8, 0x01] {
            let round = [round];
            let mut parts: [&[u8]; 5] = [self.v.as_slice(), round.as_slice(), &[], &[], &[]];
            for (slot, p) in parts[2..].iter_mut().zip(provided.iter()) {
                *slot = *p;
            }
            let new_key = hmac_sha256(&self.key, &parts)?;
            self.key.copy_from_slice(new_key.as_ref());
            let new_v = hmac_sha256(&self.key, &[self.v.as_slice()])?;
            self.v.copy_from_slice(new_v.as_ref());

            if !has_input {
                break;
            }
        }
        Ok(())
    }

    /// Reseed with fresh entropy
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RngFailure` if the entropy fails the health test.
    pub fn reseed(&mut self, entropy: &[u8], additional: &[u8]) -> Result<(), CryptoError> {
        check_entropy(entropy)?;
        self.update(&[entropy, additional])?;
        self.reseed_counter = 1;
        Ok(())
    }

    /// Generate up to `MAX_REQUEST_LEN` bytes
    fn generate(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        if self.needs_reseed() {
            return Err(CryptoError::RngFailure);
        }
        if out.len() > MAX_REQUEST_LEN {
            return Err(CryptoError::BufferTooSmall);
        }

        let mut offset = 0;
        while offset < out.len() {
            let block = hmac_sha256(&self.key, &[self.v.as_slice()])?;
            self.v.copy_from_slice(block.as_ref());
            let n = (out.len() - offset).min(SHA256_OUTPUT_SIZE);
            out[offset..offset + n].copy_from_slice(&self.v[..n]);
            offset += n;
        }

        self.update(&[])?;
        self.reseed_counter += 1;
        Ok(())
    }

    /// Check if the generator must be reseeded before further use
    #[must_use]
    pub const fn needs_reseed(&self) -> bool {
        self.reseed_counter > RESEED_INTERVAL
    }

    /// Generate requests since the last (re)seed
    #[must_use]
    pub const fn reseed_counter(&self) -> u64 {
        self.reseed_counter
    }
}

impl CryptoRng for HmacDrbg {
    fn fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), CryptoError> {
        for chunk in dest.chunks_mut(MAX_REQUEST_LEN) {
            self.generate(chunk)?;
        }
        Ok(())
    }
}

impl Drop for HmacDrbg {
    fn drop(&mut self) {
        self.key.zeroize();
        self.v.zeroize();
        self.reseed_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(tag: u8) -> [u8; 32] {
        let mut s = [0u8; 32];
        for (i, b) in s.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37) ^ tag;
        }
        s
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let mut a = HmacDrbg::from_seed(&seed(1)).unwrap();
        let mut b = HmacDrbg::from_seed(&seed(1)).unwrap();
        assert_eq!(a.next_u64().unwrap(), b.next_u64().unwrap());
        assert_eq!(a.next_u32().unwrap(), b.next_u32().unwrap());
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = HmacDrbg::from_seed(&seed(1)).unwrap();
        let mut b = HmacDrbg::from_seed(&seed(2)).unwrap();
        assert_ne!(a.next_u64().unwrap(), b.next_u64().unwrap());
    }

    #[test]
    fn test_short_or_stuck_entropy_rejected() {
        assert_eq!(
            HmacDrbg::instantiate(&[1u8; 16], &[], &[]).err(),
            Some(CryptoError::RngFailure)
        );
        assert_eq!(
            HmacDrbg::instantiate(&[0u8; 32], &[], &[]).err(),
            Some(CryptoError::RngFailure)
        );
    }

    #[test]
    fn test_reseed_resets_counter_and_changes_stream() {
        let mut a = HmacDrbg::from_seed(&seed(3)).unwrap();
        let mut b = HmacDrbg::from_seed(&seed(3)).unwrap();
        a.next_u32().unwrap();
        b.next_u32().unwrap();
        assert_eq!(a.reseed_counter(), 2);
        a.reseed(&seed(9), b"extra").unwrap();
        assert_eq!(a.reseed_counter(), 1);
        assert_ne!(a.next_u64().unwrap(), b.next_u64().unwrap());
    }

    #[test]
    fn test_long_fill_spans_blocks() {
        let mut a = HmacDrbg::from_seed(&seed(4)).unwrap();
        let mut buf = [0u8; 100];
        a.fill_bytes(&mut buf).unwrap();
        assert_ne!(&buf[..32], &buf[32..64]);
    }
}
