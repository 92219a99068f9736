// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Key derivation capability for the mesh control plane
//!
//! The control plane calls into this crate for every cryptographic step it
//! needs and never touches primitive internals:
//!
//! - **Hashing**: SHA-256 (joiner IDs, steering data)
//! - **MAC**: HMAC-SHA256 (MLE response tags, key derivation)
//! - **KDF**: per-sequence MLE and MAC keys from the network key
//! - **RNG**: HMAC-DRBG behind the [`CryptoRng`] trait
//!
//! # Security Requirements
//!
//! - Derived keys are zeroized on drop
//! - Tag comparison is constant time
//! - Key material never appears in `Debug` output

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod hash;
pub mod kdf;
pub mod rng;
pub mod traits;
pub mod zeroize_utils;

// Re-export main traits and types
pub use error::{CryptoError, CryptoResult};
pub use hash::{hmac_sha256, HmacSha256, Sha256, Sha256Output};
pub use kdf::DerivedKeys;
pub use rng::HmacDrbg;
pub use traits::{CryptoRng, Hash, Mac};
