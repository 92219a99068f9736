// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Cryptographic error types
//!
//! Errors of the hash, MAC, key derivation and random number capability.

use core::fmt;

/// Error type for cryptographic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid key format or size
    InvalidKey,
    /// MAC verification failed
    InvalidMac,
    /// Random number generator failure
    RngFailure,
    /// Buffer is too small for the operation
    BufferTooSmall,
    /// Key derivation failed
    KeyDerivationFailed,
    /// Internal error (should not occur)
    InternalError,
}

impl CryptoError {
    /// Get error code for logging/debugging
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidKey => 0x0501,
            Self::InvalidMac => 0x0502,
            Self::RngFailure => 0x0503,
            Self::BufferTooSmall => 0x0504,
            Self::KeyDerivationFailed => 0x0505,
            Self::InternalError => 0x05FF,
        }
    }

    /// Get error description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidKey => "invalid key",
            Self::InvalidMac => "MAC verification failed",
            Self::RngFailure => "RNG failure",
            Self::BufferTooSmall => "buffer too small",
            Self::KeyDerivationFailed => "key derivation failed",
            Self::InternalError => "internal error",
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CryptoError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "[0x{:04X}] {}", self.code(), self.description());
    }
}

impl From<CryptoError> for thread_common::Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidKey | CryptoError::KeyDerivationFailed => Self::KeyDerivationFailed,
            CryptoError::InvalidMac => Self::Security,
            CryptoError::RngFailure | CryptoError::InternalError => Self::Failed,
            CryptoError::BufferTooSmall => Self::NoBufs,
        }
    }
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
