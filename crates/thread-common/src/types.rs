// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Common types for the mesh control plane
//!
//! Identity values (addresses, PAN identifiers, prefixes, names) and the
//! network key. Secret material implements `Zeroize` and is wiped on drop.

use core::fmt;
use heapless::String;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{
    CHILD_ID_MASK, EXT_ADDRESS_SIZE, EXT_PAN_ID_SIZE, IID_SIZE, INVALID_RLOC16,
    MAX_DOMAIN_NAME_LEN, MAX_NETWORK_NAME_LEN, MAX_ROUTER_ID, MESH_LOCAL_PREFIX_SIZE,
    NETWORK_KEY_SIZE, ROUTER_ID_SHIFT,
};
use crate::errors::{Error, Result};

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for byte in bytes {
        write!(f, "{byte:02x}")?;
    }
    Ok(())
}

/// IEEE 802.15.4 extended address
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExtAddress([u8; EXT_ADDRESS_SIZE]);

impl ExtAddress {
    /// Create from bytes
    #[must_use]
    pub const fn new(bytes: [u8; EXT_ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the address bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; EXT_ADDRESS_SIZE] {
        &self.0
    }

    /// Interface identifier formed by flipping the universal/local bit
    #[must_use]
    pub const fn to_iid(&self) -> InterfaceIdentifier {
        let mut iid = self.0;
        iid[0] ^= 0x02;
        InterfaceIdentifier(iid)
    }
}

impl fmt::Debug for ExtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtAddress(")?;
        write_hex(f, &self.0)?;
        write!(f, ")")
    }
}

impl fmt::Display for ExtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

/// Factory-assigned IEEE EUI-64
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Eui64([u8; 8]);

impl Eui64 {
    /// Create from bytes
    #[must_use]
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Get the EUI-64 bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Debug for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Eui64(")?;
        write_hex(f, &self.0)?;
        write!(f, ")")
    }
}

/// Extended PAN identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExtendedPanId([u8; EXT_PAN_ID_SIZE]);

impl ExtendedPanId {
    /// Create from bytes
    #[must_use]
    pub const fn new(bytes: [u8; EXT_PAN_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; EXT_PAN_ID_SIZE] {
        &self.0
    }
}

impl fmt::Debug for ExtendedPanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtendedPanId(")?;
        write_hex(f, &self.0)?;
        write!(f, ")")
    }
}

/// 64-bit mesh-local prefix
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MeshLocalPrefix([u8; MESH_LOCAL_PREFIX_SIZE]);

impl MeshLocalPrefix {
    /// Create from bytes
    #[must_use]
    pub const fn new(bytes: [u8; MESH_LOCAL_PREFIX_SIZE]) -> Self {
        Self(bytes)
    }

    /// Derive the prefix from an extended PAN ID: `fd` + XPANID[0..5] + `0000`
    #[must_use]
    pub const fn from_extended_pan_id(xpanid: &ExtendedPanId) -> Self {
        let x = xpanid.as_bytes();
        Self([0xfd, x[0], x[1], x[2], x[3], x[4], 0x00, 0x00])
    }

    /// Get the bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; MESH_LOCAL_PREFIX_SIZE] {
        &self.0
    }
}

impl fmt::Debug for MeshLocalPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = Ip6Address::from_parts(self, &InterfaceIdentifier::default());
        write!(f, "MeshLocalPrefix({addr}/64)")
    }
}

/// IPv6 interface identifier (lower 64 bits of an address)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InterfaceIdentifier([u8; IID_SIZE]);

impl InterfaceIdentifier {
    /// Create from bytes
    #[must_use]
    pub const fn new(bytes: [u8; IID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Locator IID `0000:00ff:fe00:<locator16>`
    #[must_use]
    pub const fn from_locator(locator: u16) -> Self {
        let [hi, lo] = locator.to_be_bytes();
        Self([0x00, 0x00, 0x00, 0xff, 0xfe, 0x00, hi, lo])
    }

    /// Get the bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; IID_SIZE] {
        &self.0
    }

    /// Check whether the IID has the locator pattern `0000:00ff:fe00:xxxx`
    #[must_use]
    pub const fn is_locator(&self) -> bool {
        self.0[0] == 0
            && self.0[1] == 0
            && self.0[2] == 0
            && self.0[3] == 0xff
            && self.0[4] == 0xfe
            && self.0[5] == 0
    }

    /// Check whether the IID is reserved (RFC 5453 or locator form)
    ///
    /// Covers the subnet-router anycast IID, the reserved subnet anycast
    /// range `fdff:ffff:ffff:ff80..` and the locator pattern.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        if self.0 == [0u8; IID_SIZE] {
            return true;
        }
        if self.0[..7] == [0xfd, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff] && self.0[7] >= 0x80 {
            return true;
        }
        self.is_locator()
    }
}

impl fmt::Debug for InterfaceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iid(")?;
        write_hex(f, &self.0)?;
        write!(f, ")")
    }
}

/// IPv6 address
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ip6Address([u8; 16]);

impl Ip6Address {
    /// Create from bytes
    #[must_use]
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Concatenate a /64 prefix and an interface identifier
    #[must_use]
    pub fn from_parts(prefix: &MeshLocalPrefix, iid: &InterfaceIdentifier) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(prefix.as_bytes());
        bytes[8..].copy_from_slice(iid.as_bytes());
        Self(bytes)
    }

    /// Get the bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// The interface identifier part
    #[must_use]
    pub fn iid(&self) -> InterfaceIdentifier {
        let mut iid = [0u8; IID_SIZE];
        iid.copy_from_slice(&self.0[8..]);
        InterfaceIdentifier(iid)
    }

    /// Get the address as eight 16-bit groups
    #[must_use]
    pub fn segments(&self) -> [u16; 8] {
        let mut out = [0u16; 8];
        for (i, seg) in out.iter_mut().enumerate() {
            *seg = u16::from_be_bytes([self.0[2 * i], self.0[2 * i + 1]]);
        }
        out
    }
}

impl fmt::Display for Ip6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segs = self.segments();

        // Longest run of zero groups (length >= 2) is compressed to "::"
        let (mut best_start, mut best_len) = (8usize, 0usize);
        let mut i = 0;
        while i < 8 {
            if segs[i] == 0 {
                let start = i;
                while i < 8 && segs[i] == 0 {
                    i += 1;
                }
                if i - start > best_len {
                    best_start = start;
                    best_len = i - start;
                }
            } else {
                i += 1;
            }
        }
        if best_len < 2 {
            best_start = 8;
        }

        let mut i = 0;
        while i < 8 {
            if i == best_start {
                f.write_str("::")?;
                i += best_len;
                continue;
            }
            if i > 0 && i != best_start + best_len {
                f.write_str(":")?;
            }
            write!(f, "{:x}", segs[i])?;
            i += 1;
        }
        Ok(())
    }
}

impl fmt::Debug for Ip6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Length-bounded UTF-8 name (network name, domain name)
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct BoundedName<const N: usize>(String<N>);

/// Network name (at most 16 bytes)
pub type NetworkName = BoundedName<MAX_NETWORK_NAME_LEN>;

/// Domain name (at most 16 bytes)
pub type DomainName = BoundedName<MAX_DOMAIN_NAME_LEN>;

impl<const N: usize> BoundedName<N> {
    /// Create from a string slice
    ///
    /// # Errors
    ///
    /// `InvalidArgs` if the name is longer than `N` bytes.
    pub fn new(name: &str) -> Result<Self> {
        let mut s = String::new();
        s.push_str(name).map_err(|()| Error::InvalidArgs)?;
        Ok(Self(s))
    }

    /// Get the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the name is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> fmt::Debug for BoundedName<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0.as_str())
    }
}

impl<const N: usize> fmt::Display for BoundedName<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// 128-bit network master key
///
/// Wiped on drop. `Debug` never prints the key bytes, and equality is
/// checked in constant time.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct NetworkKey([u8; NETWORK_KEY_SIZE]);

impl NetworkKey {
    /// Create from bytes
    #[must_use]
    pub const fn new(bytes: [u8; NETWORK_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the key bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; NETWORK_KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for NetworkKey {
    fn eq(&self, other: &Self) -> bool {
        let mut diff: u8 = 0;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            diff |= a ^ b;
        }
        core::hint::black_box(diff) == 0
    }
}

impl Eq for NetworkKey {}

impl fmt::Debug for NetworkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkKey([REDACTED])")
    }
}

/// Opaque handle to a key held by an external key store
///
/// Zero is never a valid reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkKeyRef(u32);

impl NetworkKeyRef {
    /// Create a key reference
    ///
    /// # Errors
    ///
    /// `InvalidArgs` for the zero reference.
    pub const fn new(raw: u32) -> Result<Self> {
        if raw == 0 {
            return Err(Error::InvalidArgs);
        }
        Ok(Self(raw))
    }

    /// Raw reference value
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Router ID encoded in an RLOC16
#[must_use]
pub const fn router_id_from_rloc16(rloc16: u16) -> u8 {
    (rloc16 >> ROUTER_ID_SHIFT) as u8
}

/// Child ID encoded in an RLOC16 (0 for a router)
#[must_use]
pub const fn child_id_from_rloc16(rloc16: u16) -> u16 {
    rloc16 & CHILD_ID_MASK
}

/// RLOC16 of a router
#[must_use]
pub const fn rloc16_from_router_id(router_id: u8) -> u16 {
    (router_id as u16) << ROUTER_ID_SHIFT
}

/// Check whether an RLOC16 names a router (child ID bits zero)
#[must_use]
pub const fn is_router_rloc16(rloc16: u16) -> bool {
    rloc16 != INVALID_RLOC16
        && child_id_from_rloc16(rloc16) == 0
        && router_id_from_rloc16(rloc16) <= MAX_ROUTER_ID
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    fn render(addr: &Ip6Address) -> heapless::String<48> {
        let mut s = heapless::String::new();
        write!(s, "{addr}").unwrap();
        s
    }

    #[test]
    fn test_prefix_from_xpanid() {
        let x = ExtendedPanId::new([0xde, 0xad, 0x00, 0xbe, 0xef, 0x00, 0xca, 0xfe]);
        let p = MeshLocalPrefix::from_extended_pan_id(&x);
        assert_eq!(p.as_bytes(), &[0xfd, 0xde, 0xad, 0x00, 0xbe, 0xef, 0x00, 0x00]);
    }

    #[test]
    fn test_ext_address_iid_flips_ul_bit() {
        let ext = ExtAddress::new([0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0]);
        assert_eq!(ext.to_iid().as_bytes()[0], 0x10);
        assert_eq!(&ext.to_iid().as_bytes()[1..], &ext.as_bytes()[1..]);
    }

    #[test]
    fn test_ip6_display_compresses_zero_run() {
        let prefix = MeshLocalPrefix::new([0xfd, 0xde, 0xad, 0x00, 0xbe, 0xef, 0x00, 0x00]);
        let addr = Ip6Address::from_parts(&prefix, &InterfaceIdentifier::from_locator(0x0400));
        assert_eq!(render(&addr).as_str(), "fdde:ad00:beef::ff:fe00:400");

        let ll = Ip6Address::new([0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(render(&ll).as_str(), "fe80::1");
    }

    #[test]
    fn test_bounded_name_length() {
        assert!(NetworkName::new("0123456789abcdef").is_ok());
        assert_eq!(NetworkName::new("0123456789abcdefg"), Err(Error::InvalidArgs));
    }

    #[test]
    fn test_reserved_iids() {
        assert!(InterfaceIdentifier::new([0; 8]).is_reserved());
        assert!(InterfaceIdentifier::new([0xfd, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x80]).is_reserved());
        assert!(InterfaceIdentifier::from_locator(0x1234).is_reserved());
        assert!(!InterfaceIdentifier::new([0x02, 0, 0, 0, 0, 0, 0, 1]).is_reserved());
    }

    #[test]
    fn test_rloc16_helpers() {
        assert_eq!(rloc16_from_router_id(5), 0x1400);
        assert_eq!(router_id_from_rloc16(0x1401), 5);
        assert_eq!(child_id_from_rloc16(0x1401), 1);
        assert!(is_router_rloc16(0x1400));
        assert!(!is_router_rloc16(0x1401));
        assert!(!is_router_rloc16(INVALID_RLOC16));
    }

    #[test]
    fn test_key_ref_rejects_zero() {
        assert_eq!(NetworkKeyRef::new(0), Err(Error::InvalidArgs));
        assert_eq!(NetworkKeyRef::new(7).map(|r| r.get()), Ok(7));
    }

    #[test]
    fn test_network_key_equality() {
        let mut last_byte = [0x11; NETWORK_KEY_SIZE];
        last_byte[NETWORK_KEY_SIZE - 1] = 0x12;
        let key = NetworkKey::new([0x11; NETWORK_KEY_SIZE]);
        assert_eq!(key, NetworkKey::new([0x11; NETWORK_KEY_SIZE]));
        assert_ne!(key, NetworkKey::new(last_byte));
        assert_ne!(key, NetworkKey::new([0x91; NETWORK_KEY_SIZE]));
    }
}
