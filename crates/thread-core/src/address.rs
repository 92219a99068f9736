// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Mesh-local address derivation
//!
//! All functions are pure: they combine the mesh-local prefix (or the
//! extended address) with a short address or interface identifier.
//!
//! | Address                       | Form                                   |
//! |-------------------------------|----------------------------------------|
//! | RLOC                          | `prefix:0000:00ff:fe00:<rloc16>`       |
//! | ALOC                          | `prefix:0000:00ff:fe00:<aloc16>`       |
//! | Mesh-local EID                | `prefix:<random persisted IID>`        |
//! | Link-local                    | `fe80::<ext address, U/L bit flipped>` |
//! | Link-local all Thread nodes   | `ff32:0040:<prefix>:0000:0001`         |
//! | Realm-local all Thread nodes  | `ff33:0040:<prefix>:0000:0001`         |

use thread_common::constants::{ALOC16_LEADER, ALOC16_SERVICE_START, MAX_SERVICE_ID};
use thread_common::{
    rloc16_from_router_id, Error, ExtAddress, InterfaceIdentifier, Ip6Address, MeshLocalPrefix,
    Result,
};

const LINK_LOCAL_PREFIX: MeshLocalPrefix = MeshLocalPrefix::new([0xfe, 0x80, 0, 0, 0, 0, 0, 0]);

/// Prefix length byte of a unicast-prefix-based multicast address (/64)
const MULTICAST_PREFIX_LENGTH: u8 = 0x40;

/// Scope nibble: link-local
const SCOPE_LINK_LOCAL: u8 = 0x2;

/// Scope nibble: realm-local
const SCOPE_REALM_LOCAL: u8 = 0x3;

/// Routing locator for a short address
#[must_use]
pub fn rloc(prefix: &MeshLocalPrefix, rloc16: u16) -> Ip6Address {
    Ip6Address::from_parts(prefix, &InterfaceIdentifier::from_locator(rloc16))
}

/// Anycast locator for an ALOC16
#[must_use]
pub fn aloc(prefix: &MeshLocalPrefix, aloc16: u16) -> Ip6Address {
    Ip6Address::from_parts(prefix, &InterfaceIdentifier::from_locator(aloc16))
}

/// Leader anycast locator
#[must_use]
pub fn leader_aloc(prefix: &MeshLocalPrefix) -> Ip6Address {
    aloc(prefix, ALOC16_LEADER)
}

/// Leader routing locator for the leader's router ID
#[must_use]
pub fn leader_rloc(prefix: &MeshLocalPrefix, leader_router_id: u8) -> Ip6Address {
    rloc(prefix, rloc16_from_router_id(leader_router_id))
}

/// Service anycast locator
///
/// # Errors
///
/// Returns `Error::InvalidArgs` if `service_id` exceeds 15.
pub fn service_aloc(prefix: &MeshLocalPrefix, service_id: u8) -> Result<Ip6Address> {
    if service_id > MAX_SERVICE_ID {
        return Err(Error::InvalidArgs);
    }
    Ok(aloc(prefix, ALOC16_SERVICE_START + u16::from(service_id)))
}

/// Mesh-local endpoint identifier
#[must_use]
pub fn mesh_local_eid(prefix: &MeshLocalPrefix, iid: &InterfaceIdentifier) -> Ip6Address {
    Ip6Address::from_parts(prefix, iid)
}

/// Link-local address of an extended address
#[must_use]
pub fn link_local(ext_address: &ExtAddress) -> Ip6Address {
    Ip6Address::from_parts(&LINK_LOCAL_PREFIX, &ext_address.to_iid())
}

fn all_thread_nodes(prefix: &MeshLocalPrefix, scope: u8) -> Ip6Address {
    let mut bytes = [0u8; 16];
    bytes[0] = 0xff;
    bytes[1] = 0x30 | scope;
    bytes[2] = 0x00;
    bytes[3] = MULTICAST_PREFIX_LENGTH;
    bytes[4..12].copy_from_slice(prefix.as_bytes());
    bytes[15] = 0x01;
    Ip6Address::new(bytes)
}

/// Link-local all-Thread-nodes multicast address
#[must_use]
pub fn link_local_all_thread_nodes(prefix: &MeshLocalPrefix) -> Ip6Address {
    all_thread_nodes(prefix, SCOPE_LINK_LOCAL)
}

/// Realm-local all-Thread-nodes multicast address
#[must_use]
pub fn realm_local_all_thread_nodes(prefix: &MeshLocalPrefix) -> Ip6Address {
    all_thread_nodes(prefix, SCOPE_REALM_LOCAL)
}

/// Validate a fixed Domain Unicast Address interface identifier
///
/// # Errors
///
/// Returns `Error::InvalidArgs` for reserved identifiers.
pub fn validate_dua_iid(iid: &InterfaceIdentifier) -> Result<()> {
    if iid.is_reserved() {
        return Err(Error::InvalidArgs);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;
    use thread_common::constants::DEFAULT_MESH_LOCAL_PREFIX;

    fn prefix() -> MeshLocalPrefix {
        MeshLocalPrefix::new(DEFAULT_MESH_LOCAL_PREFIX)
    }

    fn text(addr: &Ip6Address) -> heapless::String<48> {
        let mut s = heapless::String::new();
        write!(s, "{addr}").unwrap();
        s
    }

    #[test]
    fn test_rloc_form() {
        let a = rloc(&prefix(), 0x0400);
        assert_eq!(text(&a).as_str(), "fdde:ad00:beef::ff:fe00:400");
        assert!(a.iid().is_locator());
    }

    #[test]
    fn test_leader_aloc_and_rloc() {
        assert_eq!(text(&leader_aloc(&prefix())).as_str(), "fdde:ad00:beef::ff:fe00:fc00");
        assert_eq!(text(&leader_rloc(&prefix(), 1)).as_str(), "fdde:ad00:beef::ff:fe00:400");
    }

    #[test]
    fn test_service_aloc_range() {
        assert_eq!(
            text(&service_aloc(&prefix(), 0).unwrap()).as_str(),
            "fdde:ad00:beef::ff:fe00:fc10"
        );
        assert_eq!(
            text(&service_aloc(&prefix(), 15).unwrap()).as_str(),
            "fdde:ad00:beef::ff:fe00:fc1f"
        );
        assert_eq!(service_aloc(&prefix(), 16), Err(Error::InvalidArgs));
    }

    #[test]
    fn test_link_local_flips_universal_local_bit() {
        let ext = ExtAddress::new([0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0]);
        let a = link_local(&ext);
        assert_eq!(text(&a).as_str(), "fe80::1034:5678:9abc:def0");
    }

    #[test]
    fn test_all_thread_nodes_multicast() {
        assert_eq!(
            text(&link_local_all_thread_nodes(&prefix())).as_str(),
            "ff32:40:fdde:ad00:beef::1"
        );
        assert_eq!(
            text(&realm_local_all_thread_nodes(&prefix())).as_str(),
            "ff33:40:fdde:ad00:beef::1"
        );
    }

    #[test]
    fn test_reserved_dua_iid_rejected() {
        assert_eq!(
            validate_dua_iid(&InterfaceIdentifier::from_locator(0x0400)),
            Err(Error::InvalidArgs)
        );
        assert_eq!(validate_dua_iid(&InterfaceIdentifier::new([0; 8])), Err(Error::InvalidArgs));
        assert!(validate_dua_iid(&InterfaceIdentifier::new([1, 2, 3, 4, 5, 6, 7, 8])).is_ok());
    }
}
