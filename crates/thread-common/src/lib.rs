// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Common definitions for the mesh control plane
//!
//! This crate provides the error taxonomy, configuration, logging ring buffer,
//! time types, protocol constants and identity types shared by the key
//! derivation crate and the control plane core.
//!
//! # Features
//!
//! - `std`: Enable standard library support (disabled by default for embedded)
//! - `defmt`: Enable defmt formatting of errors for embedded debugging
//!
//! # Security
//!
//! The network key type implements `Zeroize` and is wiped on drop.
//! No heap allocations are performed; all buffers use fixed-size arrays or heapless collections.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod constants;
pub mod errors;
pub mod log;
pub mod time;
pub mod types;

// Re-export commonly used items
pub use config::ThreadConfig;
pub use errors::{Error, Result};
pub use time::{Deadline, Instant, Millis};
pub use types::*;
