// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Router ID set and distance-vector route table
//!
//! Every router keeps the set of allocated router IDs (versioned by an ID
//! sequence that only the leader advances) and a cost / next hop per ID.
//! Routes are learned from advertisements:
//!
//! ```text
//! cost(dest) = min over neighbors n of link_cost(n) + advertised_cost(n, dest)
//! ```
//!
//! The leader additionally allocates router IDs, enforces the reuse delay on
//! released IDs and expires routers that stopped being heard.

use thread_common::constants::{INVALID_ROUTER_ID, MAX_ROUTE_COST, MAX_ROUTER_ID, ROUTER_ID_SET_SIZE};
use thread_common::{Instant, Millis};

use crate::leader::serial_newer_u8;

/// Bit set over router IDs 0..=62
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouterMask(u64);

impl RouterMask {
    /// Empty set
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check membership
    #[must_use]
    pub const fn contains(self, router_id: u8) -> bool {
        router_id <= MAX_ROUTER_ID && self.0 & (1 << router_id) != 0
    }

    /// Add a router ID
    pub fn insert(&mut self, router_id: u8) {
        if router_id <= MAX_ROUTER_ID {
            self.0 |= 1 << router_id;
        }
    }

    /// Remove a router ID
    pub fn remove(&mut self, router_id: u8) {
        if router_id <= MAX_ROUTER_ID {
            self.0 &= !(1 << router_id);
        }
    }

    /// Number of IDs in the set
    #[must_use]
    pub const fn count(self) -> u8 {
        #[allow(clippy::cast_possible_truncation)]
        let n = self.0.count_ones() as u8;
        n
    }

    /// Iterate the IDs in ascending order
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..=MAX_ROUTER_ID).filter(move |id| self.contains(*id))
    }

    /// Raw bits
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }
}

/// Route payload carried in advertisements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteData {
    /// ID sequence of the allocated set
    pub id_sequence: u8,
    /// Allocated router IDs
    pub allocated: RouterMask,
    /// Sender's cost to every router ID (`MAX_ROUTE_COST` = unreachable)
    pub costs: [u8; ROUTER_ID_SET_SIZE],
}

impl RouteData {
    /// Cost the sender advertises for `router_id`
    #[must_use]
    pub fn cost_to(&self, router_id: u8) -> u8 {
        self.costs
            .get(usize::from(router_id))
            .copied()
            .unwrap_or(MAX_ROUTE_COST)
    }
}

/// Cost and next hop toward one router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    /// Neighbor router ID to forward through
    pub next_hop: u8,
    /// Path cost
    pub cost: u8,
}

impl RouteEntry {
    const UNREACHABLE: Self = Self {
        next_hop: INVALID_ROUTER_ID,
        cost: MAX_ROUTE_COST,
    };

    /// Route is usable
    #[must_use]
    pub const fn is_reachable(&self) -> bool {
        self.cost < MAX_ROUTE_COST
    }
}

/// Allocated router IDs plus per-ID routes
pub struct RouterTable {
    allocated: RouterMask,
    id_sequence: u8,
    entries: [RouteEntry; ROUTER_ID_SET_SIZE],
    /// Leader only: earliest reuse time of released IDs
    reusable_at: [Instant; ROUTER_ID_SET_SIZE],
    /// Leader only: last time each allocated router was heard
    last_heard: [Instant; ROUTER_ID_SET_SIZE],
}

impl RouterTable {
    /// Create an empty table
    #[must_use]
    pub const fn new() -> Self {
        Self {
            allocated: RouterMask::empty(),
            id_sequence: 0,
            entries: [RouteEntry::UNREACHABLE; ROUTER_ID_SET_SIZE],
            reusable_at: [Instant::ZERO; ROUTER_ID_SET_SIZE],
            last_heard: [Instant::ZERO; ROUTER_ID_SET_SIZE],
        }
    }

    /// Drop all routes and allocations
    pub fn clear(&mut self) {
        self.allocated = RouterMask::empty();
        self.entries = [RouteEntry::UNREACHABLE; ROUTER_ID_SET_SIZE];
    }

    /// Allocated router IDs
    #[must_use]
    pub const fn allocated(&self) -> RouterMask {
        self.allocated
    }

    /// Current ID sequence
    #[must_use]
    pub const fn id_sequence(&self) -> u8 {
        self.id_sequence
    }

    /// Number of allocated router IDs
    #[must_use]
    pub const fn active_count(&self) -> u8 {
        self.allocated.count()
    }

    /// Route toward `router_id`, if reachable
    #[must_use]
    pub fn route(&self, router_id: u8) -> Option<RouteEntry> {
        self.entries
            .get(usize::from(router_id))
            .copied()
            .filter(RouteEntry::is_reachable)
    }

    /// Path cost toward `router_id`
    #[must_use]
    pub fn cost_to(&self, router_id: u8) -> u8 {
        self.route(router_id).map_or(MAX_ROUTE_COST, |r| r.cost)
    }

    /// Build the route payload for an advertisement
    #[must_use]
    pub fn route_data(&self, own_id: u8) -> RouteData {
        let mut costs = [MAX_ROUTE_COST; ROUTER_ID_SET_SIZE];
        for id in self.allocated.iter() {
            let idx = usize::from(id);
            costs[idx] = if id == own_id { 0 } else { self.entries[idx].cost };
        }
        RouteData {
            id_sequence: self.id_sequence,
            allocated: self.allocated,
            costs,
        }
    }

    /// Adopt the allocated set of a newer ID sequence
    ///
    /// Returns `true` when the set was replaced.
    pub fn adopt_allocation(&mut self, route: &RouteData) -> bool {
        if !serial_newer_u8(route.id_sequence, self.id_sequence) {
            return false;
        }
        self.id_sequence = route.id_sequence;
        self.allocated = route.allocated;
        for id in 0..=MAX_ROUTER_ID {
            if !self.allocated.contains(id) {
                self.entries[usize::from(id)] = RouteEntry::UNREACHABLE;
            }
        }
        true
    }

    /// Force the ID sequence and allocated set (used when joining as router)
    pub fn set_allocation(&mut self, id_sequence: u8, allocated: RouterMask) {
        self.id_sequence = id_sequence;
        self.allocated = allocated;
    }

    /// Apply an advertisement heard from neighbor `neighbor_id` over a link
    /// of cost `link_cost`
    ///
    /// Returns `true` if any route changed.
    pub fn apply_advertisement(&mut self, own_id: u8, neighbor_id: u8, link_cost: u8, route: &RouteData) -> bool {
        let mut changed = false;
        for id in self.allocated.iter() {
            if id == own_id {
                continue;
            }
            let candidate = if id == neighbor_id {
                link_cost.min(MAX_ROUTE_COST)
            } else {
                let advertised = route.cost_to(id);
                if advertised >= MAX_ROUTE_COST {
                    MAX_ROUTE_COST
                } else {
                    link_cost.saturating_add(advertised).min(MAX_ROUTE_COST)
                }
            };

            let entry = &mut self.entries[usize::from(id)];
            let updated = if entry.next_hop == neighbor_id {
                if candidate >= MAX_ROUTE_COST {
                    RouteEntry::UNREACHABLE
                } else {
                    RouteEntry { next_hop: neighbor_id, cost: candidate }
                }
            } else if candidate < entry.cost {
                RouteEntry { next_hop: neighbor_id, cost: candidate }
            } else {
                *entry
            };
            if updated != *entry {
                *entry = updated;
                changed = true;
            }
        }
        changed
    }

    /// Invalidate every route through a lost neighbor
    pub fn neighbor_lost(&mut self, neighbor_id: u8) {
        for entry in &mut self.entries {
            if entry.next_hop == neighbor_id {
                *entry = RouteEntry::UNREACHABLE;
            }
        }
    }

    // -- leader side ---------------------------------------------------------

    /// Start a fresh allocation with only the leader's own ID
    pub fn reset_as_leader(&mut self, own_id: u8, id_sequence: u8, now: Instant) {
        self.clear();
        self.id_sequence = id_sequence;
        self.allocated.insert(own_id);
        self.last_heard[usize::from(own_id)] = now;
    }

    /// Allocate a router ID
    ///
    /// `preferred` is honored when free and past its reuse delay. Otherwise
    /// the `pick`-th free ID (modulo the number free) is chosen.
    pub fn allocate(&mut self, preferred: Option<u8>, pick: u8, now: Instant) -> Option<u8> {
        let free = |table: &Self, id: u8| {
            !table.allocated.contains(id) && now >= table.reusable_at[usize::from(id)]
        };

        let chosen = match preferred {
            Some(id) if id <= MAX_ROUTER_ID && free(self, id) => Some(id),
            _ => {
                let available = (0..=MAX_ROUTER_ID).filter(|id| free(self, *id)).count();
                if available == 0 {
                    None
                } else {
                    let nth = usize::from(pick) % available;
                    (0..=MAX_ROUTER_ID).filter(|id| free(self, *id)).nth(nth)
                }
            }
        }?;

        self.allocated.insert(chosen);
        self.id_sequence = self.id_sequence.wrapping_add(1);
        self.last_heard[usize::from(chosen)] = now;
        Some(chosen)
    }

    /// Release a router ID; it becomes reusable after `reuse_delay`
    pub fn release(&mut self, router_id: u8, reuse_delay: Millis, now: Instant) -> bool {
        if !self.allocated.contains(router_id) {
            return false;
        }
        let idx = usize::from(router_id);
        self.allocated.remove(router_id);
        self.entries[idx] = RouteEntry::UNREACHABLE;
        self.reusable_at[idx] = now + reuse_delay;
        self.id_sequence = self.id_sequence.wrapping_add(1);
        true
    }

    /// Record that a router was heard (directly or through a route)
    pub fn mark_heard(&mut self, router_id: u8, now: Instant) {
        if let Some(slot) = self.last_heard.get_mut(usize::from(router_id)) {
            *slot = now;
        }
    }

    /// Release every router other than `own_id` not heard within `timeout`
    pub fn expire(&mut self, own_id: u8, timeout: Millis, reuse_delay: Millis, now: Instant) -> RouterMask {
        let mut released = RouterMask::empty();
        for id in self.allocated.iter() {
            if id != own_id && self.last_heard[usize::from(id)].has_elapsed(now, timeout) {
                released.insert(id);
            }
        }
        for id in released.iter() {
            self.release(id, reuse_delay, now);
        }
        released
    }
}

impl Default for RouterTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_membership() {
        let mut m = RouterMask::empty();
        m.insert(0);
        m.insert(62);
        m.insert(63); // out of range, ignored
        assert!(m.contains(0) && m.contains(62));
        assert!(!m.contains(63));
        assert_eq!(m.count(), 2);
        m.remove(0);
        assert_eq!(m.iter().collect::<heapless::Vec<u8, 4>>().as_slice(), &[62]);
    }

    #[test]
    fn test_allocate_prefers_requested_id() {
        let mut t = RouterTable::new();
        t.reset_as_leader(5, 10, Instant::ZERO);
        assert_eq!(t.allocate(Some(9), 0, Instant::ZERO), Some(9));
        assert_eq!(t.id_sequence(), 11);
        // taken: falls back to the first free
        assert_eq!(t.allocate(Some(9), 0, Instant::ZERO), Some(0));
        assert_eq!(t.active_count(), 3);
    }

    #[test]
    fn test_released_id_waits_for_reuse_delay() {
        let mut t = RouterTable::new();
        t.reset_as_leader(0, 0, Instant::ZERO);
        assert_eq!(t.allocate(Some(1), 0, Instant::ZERO), Some(1));
        assert!(t.release(1, Millis::new(100_000), Instant::from_secs(10)));

        assert_ne!(t.allocate(Some(1), 0, Instant::from_secs(50)), Some(1));
        let mut t2 = RouterTable::new();
        t2.reset_as_leader(0, 0, Instant::ZERO);
        t2.allocate(Some(1), 0, Instant::ZERO);
        t2.release(1, Millis::new(100_000), Instant::from_secs(10));
        assert_eq!(t2.allocate(Some(1), 0, Instant::from_secs(110)), Some(1));
    }

    #[test]
    fn test_allocate_exhausted() {
        let mut t = RouterTable::new();
        t.reset_as_leader(0, 0, Instant::ZERO);
        for _ in 0..MAX_ROUTER_ID {
            assert!(t.allocate(None, 0, Instant::ZERO).is_some());
        }
        assert_eq!(t.allocate(None, 0, Instant::ZERO), None);
    }

    #[test]
    fn test_distance_vector_prefers_cheaper_path() {
        let mut t = RouterTable::new();
        let mut allocated = RouterMask::empty();
        for id in [1, 2, 3] {
            allocated.insert(id);
        }
        t.set_allocation(1, allocated);

        // neighbor 2 at cost 4 advertises 3 at cost 1
        let mut costs = [MAX_ROUTE_COST; ROUTER_ID_SET_SIZE];
        costs[2] = 0;
        costs[3] = 1;
        let adv = RouteData { id_sequence: 1, allocated, costs };
        assert!(t.apply_advertisement(1, 2, 4, &adv));
        assert_eq!(t.route(3), Some(RouteEntry { next_hop: 2, cost: 5 }));

        // neighbor 3 directly at cost 1
        let mut costs = [MAX_ROUTE_COST; ROUTER_ID_SET_SIZE];
        costs[3] = 0;
        let adv = RouteData { id_sequence: 1, allocated, costs };
        t.apply_advertisement(1, 3, 1, &adv);
        assert_eq!(t.route(3), Some(RouteEntry { next_hop: 3, cost: 1 }));

        t.neighbor_lost(3);
        assert_eq!(t.route(3), None);
        assert_eq!(t.cost_to(2), 4);
    }

    #[test]
    fn test_expire_keeps_own_id() {
        let mut t = RouterTable::new();
        t.reset_as_leader(4, 0, Instant::ZERO);
        t.allocate(Some(7), 0, Instant::ZERO);
        let released = t.expire(4, Millis::from_secs(120), Millis::from_secs(100), Instant::from_secs(121));
        assert!(released.contains(7));
        assert!(!released.contains(4));
        assert!(t.allocated().contains(4));
    }
}
