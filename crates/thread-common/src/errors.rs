// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Error types for the mesh control plane
//!
//! This module defines the closed error set returned by every fallible
//! operation of the control plane. Errors are `Copy`, carry no heap data and
//! map onto stable numeric codes for diagnostics.

use core::fmt;

/// Result type alias for control plane operations
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the mesh control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Role / Lifecycle Errors (0x01xx)
    // =========================================================================
    /// Operation requires a role or lifecycle state not currently held
    InvalidState,
    /// Attach-dependent data is unavailable while detached
    Detached,
    /// A procedure of the same kind is already running
    Busy,
    /// The requested change is already in effect
    Already,

    // =========================================================================
    // Argument Errors (0x02xx)
    // =========================================================================
    /// Malformed, zero or oversized input
    InvalidArgs,
    /// Requested item not found (also signals end of an enumeration)
    NotFound,

    // =========================================================================
    // Storage Errors (0x03xx)
    // =========================================================================
    /// Settings read failed
    StorageReadFailed,
    /// Settings write failed
    StorageWriteFailed,
    /// A fixed-capacity table or queue is full
    NoBufs,

    // =========================================================================
    // Security Errors (0x04xx)
    // =========================================================================
    /// Key derivation through the hash capability failed
    KeyDerivationFailed,
    /// Security check failed (key mismatch, stale key sequence)
    Security,
    /// Opaque key reference is unknown to the key store
    InvalidKeyRef,

    // =========================================================================
    // General Errors (0xFFxx)
    // =========================================================================
    /// Generic operation failure (e.g. requested value is undefined)
    Failed,
    /// Feature not available in this build or configuration
    NotImplemented,
    /// Internal error (should not occur)
    InternalError,
}

impl Error {
    /// Get the error code for this error
    ///
    /// Error codes are organized by category:
    /// - 0x01xx: Role / lifecycle errors
    /// - 0x02xx: Argument errors
    /// - 0x03xx: Storage errors
    /// - 0x04xx: Security errors
    /// - 0xFFxx: General errors
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidState => 0x0101,
            Self::Detached => 0x0102,
            Self::Busy => 0x0103,
            Self::Already => 0x0104,

            Self::InvalidArgs => 0x0201,
            Self::NotFound => 0x0202,

            Self::StorageReadFailed => 0x0301,
            Self::StorageWriteFailed => 0x0302,
            Self::NoBufs => 0x0303,

            Self::KeyDerivationFailed => 0x0401,
            Self::Security => 0x0402,
            Self::InvalidKeyRef => 0x0403,

            Self::Failed => 0xFF01,
            Self::NotImplemented => 0xFF02,
            Self::InternalError => 0xFFFF,
        }
    }

    /// Check if this is a security-critical error
    #[must_use]
    pub const fn is_security_error(&self) -> bool {
        matches!(
            self,
            Self::KeyDerivationFailed | Self::Security | Self::InvalidKeyRef
        )
    }

    /// Get a short description of the error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidState => "invalid state",
            Self::Detached => "detached",
            Self::Busy => "busy",
            Self::Already => "already",
            Self::InvalidArgs => "invalid arguments",
            Self::NotFound => "not found",
            Self::StorageReadFailed => "storage read failed",
            Self::StorageWriteFailed => "storage write failed",
            Self::NoBufs => "no buffers",
            Self::KeyDerivationFailed => "key derivation failed",
            Self::Security => "security check failed",
            Self::InvalidKeyRef => "invalid key reference",
            Self::Failed => "failed",
            Self::NotImplemented => "not implemented",
            Self::InternalError => "internal error",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "[0x{:04X}] {}", self.code(), self.description());
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_grouped_by_category() {
        assert_eq!(Error::InvalidState.code() >> 8, 0x01);
        assert_eq!(Error::Detached.code() >> 8, 0x01);
        assert_eq!(Error::InvalidArgs.code() >> 8, 0x02);
        assert_eq!(Error::NoBufs.code() >> 8, 0x03);
        assert_eq!(Error::Security.code() >> 8, 0x04);
        assert_eq!(Error::Failed.code() >> 8, 0xFF);
    }

    #[test]
    fn test_detached_distinct_from_invalid_state() {
        assert_ne!(Error::Detached, Error::InvalidState);
        assert_ne!(Error::Detached.code(), Error::InvalidState.code());
    }

    #[test]
    fn test_security_classification() {
        assert!(Error::Security.is_security_error());
        assert!(Error::KeyDerivationFailed.is_security_error());
        assert!(!Error::Busy.is_security_error());
    }
}
