// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Mesh control plane core
//!
//! Control plane of a Thread-style 802.15.4 mesh node:
//!
//! - **Roles**: attach, child supervision, router and leader duties ([`mle`])
//! - **Keys**: network key, key sequence rotation, derived keys ([`key_manager`])
//! - **Neighbors**: parent, children and router neighbors ([`neighbor`])
//! - **Leader Data**: partition identity and data versions ([`leader`])
//! - **Addresses**: RLOC, ALOC, ML-EID and multicast views ([`address`])
//! - **Discovery**: active network scan and joiner filtering ([`discover`])
//!
//! [`Instance`] ties them together with the network identity, operational
//! datasets and the platform services (settings store, key store, RNG).
//!
//! # Example
//!
//! ```no_run
//! use thread_common::{Eui64, Instant, ThreadConfig};
//! use thread_core::{Instance, SoftwarePlatform};
//!
//! let platform = SoftwarePlatform::new(Eui64::new([0x18, 0xb4, 0x30, 0, 0, 0, 0, 1]), &[7u8; 32])?;
//! let mut node = Instance::new(ThreadConfig::DEFAULT, platform)?;
//! node.set_network_name("Garden")?;
//! node.set_enabled(true, Instant::ZERO)?;
//! while let Some(frame) = node.next_outbound() {
//!     // hand `frame` to the radio
//!     let _ = frame;
//! }
//! # Ok::<(), thread_common::Error>(())
//! ```

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "std")]
extern crate std;

pub mod address;
pub mod counters;
pub mod dataset;
pub mod discover;
pub mod identity;
pub mod instance;
pub mod key_manager;
pub mod leader;
pub mod message;
pub mod mle;
pub mod neighbor;
pub mod notifier;
pub mod platform;
pub mod route;
pub mod settings;

pub use counters::{Ip6Counters, MleCounters};
pub use dataset::{DatasetKind, OperationalDataset};
pub use discover::{ActiveScanResult, DiscoverEvent, JoinerId, SteeringData, BROADCAST_PAN_ID};
pub use instance::Instance;
pub use key_manager::{KeyManager, KeySequenceCheck};
pub use leader::LeaderData;
pub use message::{Destination, MleFrame, MleMessage};
pub use mle::{AttachFailure, AttachState, ParentInfo, ParentResponseCallback, ParentResponseInfo, Role};
pub use neighbor::{NeighborInfo, NeighborIterator};
pub use notifier::ChangedFlags;
pub use platform::{KeyStore, Platform, SoftwarePlatform};
pub use settings::{MemorySettings, NetworkInfo, SettingsStore};
