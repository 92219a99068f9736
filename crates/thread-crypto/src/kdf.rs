// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Per-sequence key derivation
//!
//! Every key sequence yields one MLE key and one MAC key:
//!
//! ```text
//! okm     = HMAC-SHA256(network_key, BE32(key_sequence) || "Thread")
//! mle_key = okm[0..16]
//! mac_key = okm[16..32]
//! ```
//!
//! When the network key lives in an external key store only the HMAC step
//! runs there; [`DerivedKeys::from_okm`] splits the output here.

use crate::error::CryptoError;
use crate::hash::{hmac_sha256, SHA256_OUTPUT_SIZE};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Label appended to the key sequence
pub const KEY_DERIVATION_LABEL: &[u8] = b"Thread";

/// Derived key size in bytes
pub const DERIVED_KEY_SIZE: usize = 16;

/// Size of the HMAC input: BE32 sequence followed by the label
pub const KDF_INPUT_SIZE: usize = 4 + KEY_DERIVATION_LABEL.len();

/// Build the HMAC input for a key sequence
#[must_use]
pub fn kdf_input(key_sequence: u32) -> [u8; KDF_INPUT_SIZE] {
    let mut input = [0u8; KDF_INPUT_SIZE];
    input[..4].copy_from_slice(&key_sequence.to_be_bytes());
    input[4..].copy_from_slice(KEY_DERIVATION_LABEL);
    input
}

/// MLE and MAC keys of one key sequence
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeys {
    key_sequence: u32,
    mle_key: [u8; DERIVED_KEY_SIZE],
    mac_key: [u8; DERIVED_KEY_SIZE],
}

impl DerivedKeys {
    /// Derive both keys from a literal network key
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyDerivationFailed` if the MAC cannot be keyed.
    pub fn derive(network_key: &[u8], key_sequence: u32) -> Result<Self, CryptoError> {
        let okm = hmac_sha256(network_key, &[kdf_input(key_sequence).as_slice()])
            .map_err(|_| CryptoError::KeyDerivationFailed)?;
        Ok(Self::from_okm(key_sequence, okm.as_bytes()))
    }

    /// Split HMAC output computed elsewhere (e.g. inside a key store)
    #[must_use]
    pub fn from_okm(key_sequence: u32, okm: &[u8; SHA256_OUTPUT_SIZE]) -> Self {
        let mut mle_key = [0u8; DERIVED_KEY_SIZE];
        let mut mac_key = [0u8; DERIVED_KEY_SIZE];
        mle_key.copy_from_slice(&okm[..DERIVED_KEY_SIZE]);
        mac_key.copy_from_slice(&okm[DERIVED_KEY_SIZE..]);
        Self {
            key_sequence,
            mle_key,
            mac_key,
        }
    }

    /// Key sequence these keys belong to
    #[must_use]
    pub const fn key_sequence(&self) -> u32 {
        self.key_sequence
    }

    /// MLE key
    #[must_use]
    pub const fn mle_key(&self) -> &[u8; DERIVED_KEY_SIZE] {
        &self.mle_key
    }

    /// MAC key
    #[must_use]
    pub const fn mac_key(&self) -> &[u8; DERIVED_KEY_SIZE] {
        &self.mac_key
    }
}

impl core::fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "DerivedKeys(seq={}, [REDACTED])", self.key_sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 16] = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ];

    #[test]
    fn test_input_layout() {
        let input = kdf_input(0x0102_0304);
        assert_eq!(&input[..4], &[1, 2, 3, 4]);
        assert_eq!(&input[4..], b"Thread");
    }

    #[test]
    fn test_halves_differ_and_depend_on_sequence() {
        let k0 = DerivedKeys::derive(&KEY, 0).unwrap();
        let k1 = DerivedKeys::derive(&KEY, 1).unwrap();
        assert_ne!(k0.mle_key(), k0.mac_key());
        assert_ne!(k0.mle_key(), k1.mle_key());
        assert_eq!(k1.key_sequence(), 1);
    }

    #[test]
    fn test_from_okm_matches_derive() {
        let okm = hmac_sha256(&KEY, &[kdf_input(7).as_slice()]).unwrap();
        let split = DerivedKeys::from_okm(7, okm.as_bytes());
        let direct = DerivedKeys::derive(&KEY, 7).unwrap();
        assert_eq!(split.mle_key(), direct.mle_key());
        assert_eq!(split.mac_key(), direct.mac_key());
    }

    #[test]
    fn test_zeroize_clears_keys() {
        let mut k = DerivedKeys::derive(&KEY, 3).unwrap();
        k.zeroize();
        assert_eq!(k.mle_key(), &[0u8; 16]);
        assert_eq!(k.mac_key(), &[0u8; 16]);
    }
}
