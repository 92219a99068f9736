// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Protocol constants for the mesh control plane
//!
//! Table capacities are compile-time constants; every table and queue in the
//! control plane is a fixed-size array or heapless collection.

// =============================================================================
// Identity Sizes
// =============================================================================

/// Network key size in bytes
pub const NETWORK_KEY_SIZE: usize = 16;

/// Extended PAN ID size in bytes
pub const EXT_PAN_ID_SIZE: usize = 8;

/// Extended (IEEE 802.15.4) address size in bytes
pub const EXT_ADDRESS_SIZE: usize = 8;

/// Mesh-local prefix size in bytes
pub const MESH_LOCAL_PREFIX_SIZE: usize = 8;

/// IPv6 interface identifier size in bytes
pub const IID_SIZE: usize = 8;

/// Maximum network name length in bytes
pub const MAX_NETWORK_NAME_LEN: usize = 16;

/// Maximum domain name length in bytes
pub const MAX_DOMAIN_NAME_LEN: usize = 16;

/// Joiner ID size in bytes
pub const JOINER_ID_SIZE: usize = 8;

/// Maximum steering data length in bytes
pub const MAX_STEERING_DATA_LEN: usize = 16;

/// Maximum joiner advertisement data length in bytes
pub const MAX_JOINER_ADV_DATA_LEN: usize = 64;

/// Largest valid vendor OUI
pub const MAX_JOINER_ADV_OUI: u32 = 0x00FF_FFFF;

/// MLE challenge size in bytes
pub const CHALLENGE_SIZE: usize = 8;

/// MLE response tag size in bytes
pub const RESPONSE_TAG_SIZE: usize = 8;

// =============================================================================
// Default Network Identity
// =============================================================================

/// Default network name
pub const DEFAULT_NETWORK_NAME: &str = "ThreadNet";

/// Default domain name
pub const DEFAULT_DOMAIN_NAME: &str = "DefaultDomain";

/// Default extended PAN ID
pub const DEFAULT_EXT_PAN_ID: [u8; EXT_PAN_ID_SIZE] =
    [0xde, 0xad, 0x00, 0xbe, 0xef, 0x00, 0xca, 0xfe];

/// Default mesh-local prefix (`fdde:ad00:beef:0::/64`)
pub const DEFAULT_MESH_LOCAL_PREFIX: [u8; MESH_LOCAL_PREFIX_SIZE] =
    [0xfd, 0xde, 0xad, 0x00, 0xbe, 0xef, 0x00, 0x00];

/// Default PAN ID
pub const DEFAULT_PAN_ID: u16 = 0xface;

/// Default channel
pub const DEFAULT_CHANNEL: u8 = 11;

/// Default network key
pub const DEFAULT_NETWORK_KEY: [u8; NETWORK_KEY_SIZE] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
    0xff,
];

// =============================================================================
// Addressing
// =============================================================================

/// RLOC16 value meaning "no short address assigned"
pub const INVALID_RLOC16: u16 = 0xfffe;

/// Router ID value meaning "none"
pub const INVALID_ROUTER_ID: u8 = 0xff;

/// Largest allocatable router ID
pub const MAX_ROUTER_ID: u8 = 62;

/// Number of router IDs in the router ID set
pub const ROUTER_ID_SET_SIZE: usize = MAX_ROUTER_ID as usize + 1;

/// Bit shift of the router ID within an RLOC16
pub const ROUTER_ID_SHIFT: u16 = 10;

/// Mask of the child ID bits within an RLOC16
pub const CHILD_ID_MASK: u16 = 0x01ff;

/// Leader anycast locator
pub const ALOC16_LEADER: u16 = 0xfc00;

/// First service anycast locator
pub const ALOC16_SERVICE_START: u16 = 0xfc10;

/// Last service anycast locator
pub const ALOC16_SERVICE_END: u16 = 0xfc2f;

/// Largest service ID that maps onto a service ALOC
pub const MAX_SERVICE_ID: u8 = 15;

// =============================================================================
// Table Capacities
// =============================================================================

/// Child table capacity
pub const MAX_CHILDREN: usize = 10;

/// Router neighbor table capacity
pub const MAX_ROUTERS: usize = 32;

/// Parent candidates remembered during one attach phase
pub const MAX_PARENT_CANDIDATES: usize = 4;

/// Outbound frame queue depth
pub const OUTBOX_DEPTH: usize = 16;

/// Scan results one discovery scan can hold for the caller
pub const MAX_DISCOVER_RESULTS: usize = 32;

/// Discovery notification queue depth (results plus the terminal event)
pub const DISCOVER_QUEUE_DEPTH: usize = MAX_DISCOVER_RESULTS + 1;

/// Route entries carried in one advertisement
pub const MAX_ROUTE_ENTRIES: usize = ROUTER_ID_SET_SIZE;

// =============================================================================
// Link Quality
// =============================================================================

/// Sentinel for an RSSI value that has never been measured
pub const INVALID_RSSI: i8 = 127;

/// Assumed radio noise floor in dBm
pub const NOISE_FLOOR_DBM: i8 = -100;

/// Link margin (dB) above which link quality is 3
pub const LQ3_MARGIN_DB: u8 = 20;

/// Link margin (dB) above which link quality is 2
pub const LQ2_MARGIN_DB: u8 = 10;

/// Link margin (dB) above which link quality is 1
pub const LQ1_MARGIN_DB: u8 = 2;

/// Route cost that means "unreachable"
pub const MAX_ROUTE_COST: u8 = 16;

// =============================================================================
// Persistence
// =============================================================================

/// Frame counters are persisted this far ahead of the live value
pub const FRAME_COUNTER_STORE_AHEAD: u32 = 1000;

// =============================================================================
// Radio
// =============================================================================

/// First 2.4 GHz O-QPSK channel
pub const MIN_CHANNEL: u8 = 11;

/// Last 2.4 GHz O-QPSK channel
pub const MAX_CHANNEL: u8 = 26;

/// All supported channels as a mask (bit N = channel N)
pub const SUPPORTED_CHANNEL_MASK: u32 = 0x07ff_f800;

/// Commissioning joiner UDP port advertised in discovery responses
pub const DEFAULT_JOINER_UDP_PORT: u16 = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_mask_matches_range() {
        for ch in 0..32u8 {
            let supported = SUPPORTED_CHANNEL_MASK & (1 << ch) != 0;
            assert_eq!(supported, (MIN_CHANNEL..=MAX_CHANNEL).contains(&ch));
        }
    }

    #[test]
    fn test_service_aloc_range() {
        assert_eq!(
            ALOC16_SERVICE_START + u16::from(MAX_SERVICE_ID),
            0xfc1f
        );
        assert!(ALOC16_SERVICE_START + u16::from(MAX_SERVICE_ID) <= ALOC16_SERVICE_END);
    }

    #[test]
    fn test_default_prefix_is_ula() {
        assert_eq!(DEFAULT_MESH_LOCAL_PREFIX[0], 0xfd);
    }
}
