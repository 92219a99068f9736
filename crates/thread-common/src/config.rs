// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Control plane configuration
//!
//! Configuration is fixed when an `Instance` is created. Each sub-config
//! carries a `DEFAULT` constant so a full configuration can be built in a
//! `const` context.

use crate::constants::SUPPORTED_CHANNEL_MASK;
use crate::time::Millis;

/// Top level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadConfig {
    /// Device mode
    pub mode: DeviceModeConfig,
    /// Key management policy
    pub keys: KeyConfig,
    /// Attach procedure timing
    pub attach: AttachConfig,
    /// Child supervision
    pub child: ChildConfig,
    /// Router / leader behavior
    pub router: RouterConfig,
    /// Discovery scanning
    pub discovery: DiscoveryConfig,
    /// Reference device build: relaxes role checks on diagnostic getters
    pub reference_device: bool,
}

impl ThreadConfig {
    /// Default configuration (router-eligible full device)
    pub const DEFAULT: Self = Self {
        mode: DeviceModeConfig::DEFAULT,
        keys: KeyConfig::DEFAULT,
        attach: AttachConfig::DEFAULT,
        child: ChildConfig::DEFAULT,
        router: RouterConfig::DEFAULT,
        discovery: DiscoveryConfig::DEFAULT,
        reference_device: false,
    };

    /// Configuration for a minimal end device that never routes
    pub const END_DEVICE: Self = Self {
        mode: DeviceModeConfig::MINIMAL_END_DEVICE,
        router: RouterConfig {
            router_eligible: false,
            ..RouterConfig::DEFAULT
        },
        ..Self::DEFAULT
    };

    /// Check whether the device may take the router or leader role
    #[must_use]
    pub const fn is_router_eligible(&self) -> bool {
        self.router.router_eligible && self.mode.full_thread_device
    }
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Device mode flags advertised during attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceModeConfig {
    /// Receiver stays on while idle
    pub rx_on_when_idle: bool,
    /// Full Thread device (can hold router state)
    pub full_thread_device: bool,
    /// Requests full network data
    pub full_network_data: bool,
}

impl DeviceModeConfig {
    /// Router-capable, always-on device
    pub const DEFAULT: Self = Self {
        rx_on_when_idle: true,
        full_thread_device: true,
        full_network_data: true,
    };

    /// Minimal end device
    pub const MINIMAL_END_DEVICE: Self = Self {
        rx_on_when_idle: true,
        full_thread_device: false,
        full_network_data: false,
    };
}

impl Default for DeviceModeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// How the network key is materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStorageMode {
    /// Key bytes are held in memory by the key manager
    #[default]
    Literal,
    /// Key bytes live in an external key store; only a reference is held
    Reference,
}

/// Key management policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyConfig {
    /// Minimum hours between sequence advances through the rotation path
    pub key_switch_guard_time_hours: u32,
    /// Hours after which the leader rotates the key sequence
    pub key_rotation_time_hours: u32,
    /// Network key storage mode
    pub storage: KeyStorageMode,
}

impl KeyConfig {
    /// Default key policy
    pub const DEFAULT: Self = Self {
        key_switch_guard_time_hours: 624,
        key_rotation_time_hours: 672,
        storage: KeyStorageMode::Literal,
    };
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Attach procedure timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachConfig {
    /// Response window for a Parent Request sent to routers only
    pub parent_request_router_timeout: Millis,
    /// Response window for a Parent Request sent to routers and REEDs
    pub parent_request_reed_timeout: Millis,
    /// Window for the Child ID Response
    pub child_id_request_timeout: Millis,
    /// First retry backoff after a failed attempt
    pub attach_backoff_min: Millis,
    /// Backoff ceiling
    pub attach_backoff_max: Millis,
    /// Failed attempts before a router-eligible device starts its own partition
    pub max_attach_attempts: u8,
}

impl AttachConfig {
    /// Default attach timing
    pub const DEFAULT: Self = Self {
        parent_request_router_timeout: Millis::new(750),
        parent_request_reed_timeout: Millis::new(1_250),
        child_id_request_timeout: Millis::new(1_000),
        attach_backoff_min: Millis::new(1_000),
        attach_backoff_max: Millis::new(32_000),
        max_attach_attempts: 2,
    };
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Child supervision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildConfig {
    /// Child timeout in seconds
    pub timeout_secs: u32,
}

impl ChildConfig {
    /// Default child supervision
    pub const DEFAULT: Self = Self { timeout_secs: 240 };
}

impl Default for ChildConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Router and leader behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Device may become router or leader
    pub router_eligible: bool,
    /// Leader weighting used when creating a partition
    pub leader_weight: u8,
    /// Advertisement period
    pub advertisement_interval: Millis,
    /// Router neighbor is dropped when not heard for this long
    pub router_neighbor_timeout: Millis,
    /// Window for the Address Solicit Response
    pub address_solicit_timeout: Millis,
    /// A released router ID cannot be reassigned for this long
    pub router_id_reuse_delay: Millis,
    /// A router-eligible child requests a router ID while the partition has
    /// fewer active routers than this
    pub router_upgrade_threshold: u8,
    /// Upper bound of the random delay before a child requests a router ID
    pub router_selection_jitter: Millis,
}

impl RouterConfig {
    /// Default router behavior
    pub const DEFAULT: Self = Self {
        router_eligible: true,
        leader_weight: 64,
        advertisement_interval: Millis::new(32_000),
        router_neighbor_timeout: Millis::new(120_000),
        address_solicit_timeout: Millis::new(2_000),
        router_id_reuse_delay: Millis::new(100_000),
        router_upgrade_threshold: 16,
        router_selection_jitter: Millis::new(120_000),
    };
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Discovery scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Dwell time per scanned channel
    pub scan_duration: Millis,
    /// Channels the radio supports (bit N = channel N)
    pub supported_channel_mask: u32,
}

impl DiscoveryConfig {
    /// Default discovery scanning
    pub const DEFAULT: Self = Self {
        scan_duration: Millis::new(300),
        supported_channel_mask: SUPPORTED_CHANNEL_MASK,
    };
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_key_policy() {
        let c = ThreadConfig::default();
        assert_eq!(c.keys.key_switch_guard_time_hours, 624);
        assert_eq!(c.keys.key_rotation_time_hours, 672);
        assert_eq!(c.keys.storage, KeyStorageMode::Literal);
    }

    #[test]
    fn test_end_device_not_router_eligible() {
        assert!(ThreadConfig::DEFAULT.is_router_eligible());
        assert!(!ThreadConfig::END_DEVICE.is_router_eligible());
    }

    #[test]
    fn test_backoff_bounds_ordered() {
        let a = AttachConfig::DEFAULT;
        assert!(a.attach_backoff_min <= a.attach_backoff_max);
        assert!(a.parent_request_router_timeout < a.parent_request_reed_timeout);
    }
}
