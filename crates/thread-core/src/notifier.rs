// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! State change notification flags
//!
//! Every externally visible state change sets one bit. The embedding
//! application drains the accumulated set with `Instance::take_changed_flags`.

/// Accumulated state change bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangedFlags(u32);

impl ChangedFlags {
    /// Device role changed
    pub const ROLE: Self = Self(1 << 0);
    /// Key sequence changed
    pub const KEY_SEQUENCE: Self = Self(1 << 1);
    /// Network key changed
    pub const NETWORK_KEY: Self = Self(1 << 2);
    /// Mesh-local addresses changed (RLOC, ML-EID, prefix)
    pub const MESH_LOCAL_ADDRESSES: Self = Self(1 << 3);
    /// Partition ID changed
    pub const PARTITION_ID: Self = Self(1 << 4);
    /// Leader data (weighting, leader router ID, data versions) changed
    pub const LEADER_DATA: Self = Self(1 << 5);
    /// Network name changed
    pub const NETWORK_NAME: Self = Self(1 << 6);
    /// Extended PAN ID changed
    pub const EXTENDED_PAN_ID: Self = Self(1 << 7);
    /// A child was added
    pub const CHILD_ADDED: Self = Self(1 << 8);
    /// A child was removed
    pub const CHILD_REMOVED: Self = Self(1 << 9);
    /// Parent changed
    pub const PARENT: Self = Self(1 << 10);
    /// Active operational dataset changed
    pub const ACTIVE_DATASET: Self = Self(1 << 11);
    /// Pending operational dataset changed
    pub const PENDING_DATASET: Self = Self(1 << 12);
    /// Domain name changed
    pub const DOMAIN_NAME: Self = Self(1 << 13);
    /// Router neighbor set changed
    pub const ROUTER_NEIGHBORS: Self = Self(1 << 14);
    /// Device mode changed
    pub const LINK_MODE: Self = Self(1 << 15);

    /// No flags
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check whether every bit of `other` is set
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two sets
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Set the bits of `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// No bits set
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bits
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// From raw bits
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut flags = ChangedFlags::empty();
        assert!(flags.is_empty());
        flags.insert(ChangedFlags::ROLE);
        flags.insert(ChangedFlags::PARTITION_ID);
        assert!(flags.contains(ChangedFlags::ROLE));
        assert!(flags.contains(ChangedFlags::ROLE.with(ChangedFlags::PARTITION_ID)));
        assert!(!flags.contains(ChangedFlags::KEY_SEQUENCE));
    }

    #[test]
    fn test_bits_roundtrip() {
        let flags = ChangedFlags::CHILD_ADDED.with(ChangedFlags::LEADER_DATA);
        assert_eq!(ChangedFlags::from_bits(flags.bits()), flags);
    }
}
