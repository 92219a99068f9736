// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Partition leader data
//!
//! Leader data identifies the partition a device belongs to and carries the
//! network data versions. It is only meaningful while attached; the getter
//! fails with `Error::Detached` otherwise.

use core::cmp::Ordering;

use thread_common::constants::INVALID_ROUTER_ID;
use thread_common::{Error, Result};

/// Serial number comparison on 8-bit versions (RFC 1982)
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn serial_newer_u8(candidate: u8, current: u8) -> bool {
    candidate != current && (candidate.wrapping_sub(current) as i8) > 0
}

/// Serial number comparison on 32-bit sequences (RFC 1982)
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn serial_newer_u32(candidate: u32, current: u32) -> bool {
    candidate != current && (candidate.wrapping_sub(current) as i32) > 0
}

/// Leader data of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderData {
    /// Partition identifier, chosen randomly by the leader
    pub partition_id: u32,
    /// Leader weighting, higher wins partition comparison
    pub weighting: u8,
    /// Full network data version
    pub data_version: u8,
    /// Stable network data version
    pub stable_data_version: u8,
    /// Router ID of the leader
    pub leader_router_id: u8,
}

impl LeaderData {
    /// Leader data before any partition was joined
    pub const EMPTY: Self = Self {
        partition_id: 0,
        weighting: 0,
        data_version: 0,
        stable_data_version: 0,
        leader_router_id: INVALID_ROUTER_ID,
    };

    /// Order two partitions: higher weighting wins, then higher partition ID
    #[must_use]
    pub fn compare_partition(&self, other: &Self) -> Ordering {
        self.weighting
            .cmp(&other.weighting)
            .then(self.partition_id.cmp(&other.partition_id))
    }

    /// Check whether `self` describes a strictly better partition than `other`
    #[must_use]
    pub fn is_better_partition_than(&self, other: &Self) -> bool {
        self.partition_id != other.partition_id
            && self.compare_partition(other) == Ordering::Greater
    }
}

impl Default for LeaderData {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// What changed when leader data was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LeaderDataUpdate {
    /// Partition ID differs from the previous value
    pub partition_changed: bool,
    /// Any field differs from the previous value
    pub data_changed: bool,
}

/// Tracks the leader data of the current partition
#[derive(Debug, Clone, Copy, Default)]
pub struct LeaderDataTracker {
    data: LeaderData,
}

impl LeaderDataTracker {
    /// Create an empty tracker
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: LeaderData::EMPTY,
        }
    }

    /// Leader data of the current partition
    ///
    /// # Errors
    ///
    /// Returns `Error::Detached` unless `attached` is set.
    pub fn get(&self, attached: bool) -> Result<LeaderData> {
        if !attached {
            return Err(Error::Detached);
        }
        Ok(self.data)
    }

    /// Last known leader data, regardless of attach state
    #[must_use]
    pub const fn last_known(&self) -> &LeaderData {
        &self.data
    }

    /// Current partition ID
    #[must_use]
    pub const fn partition_id(&self) -> u32 {
        self.data.partition_id
    }

    /// Leader weighting
    #[must_use]
    pub const fn weighting(&self) -> u8 {
        self.data.weighting
    }

    /// Leader router ID
    #[must_use]
    pub const fn leader_router_id(&self) -> u8 {
        self.data.leader_router_id
    }

    /// Replace leader data wholesale (joining or creating a partition)
    pub fn set(&mut self, data: LeaderData) -> LeaderDataUpdate {
        let update = LeaderDataUpdate {
            partition_changed: data.partition_id != self.data.partition_id,
            data_changed: data != self.data,
        };
        self.data = data;
        update
    }

    /// Adopt newer data versions heard from the same partition
    ///
    /// Versions only move forward in serial-number order.
    pub fn merge_versions(&mut self, heard: &LeaderData) -> bool {
        if heard.partition_id != self.data.partition_id {
            return false;
        }
        let mut changed = false;
        if serial_newer_u8(heard.data_version, self.data.data_version) {
            self.data.data_version = heard.data_version;
            changed = true;
        }
        if serial_newer_u8(heard.stable_data_version, self.data.stable_data_version) {
            self.data.stable_data_version = heard.stable_data_version;
            changed = true;
        }
        changed
    }

    /// Bump the data versions (leader only)
    pub fn increment_data_version(&mut self, stable: bool) {
        self.data.data_version = self.data.data_version.wrapping_add(1);
        if stable {
            self.data.stable_data_version = self.data.stable_data_version.wrapping_add(1);
        }
    }
}
