// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Neighbor table
//!
//! Holds the parent, one parent candidate during attach, router neighbors
//! and children in fixed slots. Enumeration uses a caller-held
//! [`NeighborIterator`] that snapshots the table generation on first use, so
//! entries added mid-walk are skipped and no entry is reported twice.
//!
//! Each record also remembers the highest key sequence and MLE frame counter
//! accepted from that neighbor; replayed frames fail
//! [`NeighborTable::is_fresh_frame`].

use thread_common::constants::{
    INVALID_RSSI, LQ1_MARGIN_DB, LQ2_MARGIN_DB, LQ3_MARGIN_DB, MAX_CHILDREN, MAX_ROUTERS,
    MAX_ROUTE_COST, NOISE_FLOOR_DBM,
};
use thread_common::config::DeviceModeConfig;
use thread_common::{router_id_from_rloc16, Error, ExtAddress, Instant, Millis, Result};

use crate::leader::serial_newer_u32;

/// Link quality (0..=3) from a link margin in dB
#[must_use]
pub const fn link_quality_from_margin(margin: u8) -> u8 {
    if margin > LQ3_MARGIN_DB {
        3
    } else if margin > LQ2_MARGIN_DB {
        2
    } else if margin > LQ1_MARGIN_DB {
        1
    } else {
        0
    }
}

/// Link margin above the noise floor
#[must_use]
pub fn link_margin_from_rssi(rssi: i8) -> u8 {
    if rssi == INVALID_RSSI {
        return 0;
    }
    let margin = i16::from(rssi) - i16::from(NOISE_FLOOR_DBM);
    u8::try_from(margin.max(0)).unwrap_or(u8::MAX)
}

/// One-hop cost for a link quality
#[must_use]
pub const fn link_cost(link_quality: u8) -> u8 {
    match link_quality {
        3 => 1,
        2 => 2,
        1 => 4,
        _ => MAX_ROUTE_COST,
    }
}

/// Received signal tracking for one link
///
/// The average is an exponentially weighted mean (weight 1/8) kept in
/// eighths of a dB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInfo {
    average_x8: i16,
    last_rssi: i8,
    samples: u16,
}

impl LinkInfo {
    /// No samples yet
    pub const EMPTY: Self = Self {
        average_x8: 0,
        last_rssi: INVALID_RSSI,
        samples: 0,
    };

    /// Link seeded with a first sample
    #[must_use]
    pub fn with_sample(rssi: i8) -> Self {
        let mut link = Self::EMPTY;
        link.add_sample(rssi);
        link
    }

    /// Fold in a received frame's RSSI
    pub fn add_sample(&mut self, rssi: i8) {
        if rssi == INVALID_RSSI {
            return;
        }
        let scaled = i16::from(rssi) * 8;
        if self.samples == 0 {
            self.average_x8 = scaled;
        } else {
            self.average_x8 += (scaled - self.average_x8) / 8;
        }
        self.last_rssi = rssi;
        self.samples = self.samples.saturating_add(1);
    }

    /// Average RSSI in dBm, or `INVALID_RSSI` before any sample
    #[must_use]
    pub fn average_rssi(&self) -> i8 {
        if self.samples == 0 {
            return INVALID_RSSI;
        }
        i8::try_from(self.average_x8 / 8).unwrap_or(INVALID_RSSI)
    }

    /// RSSI of the most recent frame
    #[must_use]
    pub const fn last_rssi(&self) -> i8 {
        self.last_rssi
    }

    /// Inbound link quality derived from the average RSSI
    #[must_use]
    pub fn link_quality_in(&self) -> u8 {
        link_quality_from_margin(link_margin_from_rssi(self.average_rssi()))
    }
}

impl Default for LinkInfo {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Neighbor record state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborState {
    /// Handshake under way (parent candidate, child being admitted)
    Pending,
    /// Link established
    Valid,
}

/// Highest security counters accepted from a neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RxCounter {
    key_sequence: u32,
    frame_counter: u32,
}

impl RxCounter {
    /// Newer key sequence, or same sequence with a larger counter
    fn accepts(self, key_sequence: u32, frame_counter: u32) -> bool {
        if key_sequence == self.key_sequence {
            frame_counter > self.frame_counter
        } else {
            serial_newer_u32(key_sequence, self.key_sequence)
        }
    }
}

/// A neighbor record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    /// Link-layer address
    pub ext_address: ExtAddress,
    /// Short address
    pub rloc16: u16,
    /// Received signal
    pub link: LinkInfo,
    /// Link quality the neighbor reports for frames it receives from us
    pub link_quality_out: u8,
    /// Last time a frame from this neighbor was accepted
    pub last_heard: Instant,
    /// Supervision timeout (children) or neighbor timeout (routers)
    pub timeout: Millis,
    /// Device mode advertised by the neighbor
    pub mode: DeviceModeConfig,
    /// Record state
    pub state: NeighborState,
    rx_counter: Option<RxCounter>,
    generation: u64,
}

impl Neighbor {
    /// Create a record heard `now` with one RSSI sample
    #[must_use]
    pub fn new(ext_address: ExtAddress, rloc16: u16, rssi: i8, now: Instant) -> Self {
        let link = LinkInfo::with_sample(rssi);
        Self {
            ext_address,
            rloc16,
            link,
            link_quality_out: link.link_quality_in(),
            last_heard: now,
            timeout: Millis::ZERO,
            mode: DeviceModeConfig::DEFAULT,
            state: NeighborState::Pending,
            rx_counter: None,
            generation: 0,
        }
    }

    /// Record a frame heard from this neighbor
    pub fn heard(&mut self, rssi: i8, now: Instant) {
        self.link.add_sample(rssi);
        self.last_heard = now;
    }

    /// Check if the supervision timeout passed
    #[must_use]
    pub const fn is_expired(&self, now: Instant) -> bool {
        self.last_heard.has_elapsed(now, self.timeout)
    }

    /// Two-way link quality (worse of both directions)
    #[must_use]
    pub fn two_way_link_quality(&self) -> u8 {
        self.link.link_quality_in().min(self.link_quality_out)
    }

    /// Router ID implied by the short address
    #[must_use]
    pub const fn router_id(&self) -> u8 {
        router_id_from_rloc16(self.rloc16)
    }

    /// Check a received frame's counters against the last accepted ones
    ///
    /// Nothing has been accepted yet from a fresh record.
    #[must_use]
    pub fn is_fresh_frame(&self, key_sequence: u32, frame_counter: u32) -> bool {
        self.rx_counter
            .map_or(true, |last| last.accepts(key_sequence, frame_counter))
    }

    /// Remember the counters of an accepted frame
    pub fn record_frame(&mut self, key_sequence: u32, frame_counter: u32) {
        self.rx_counter = Some(RxCounter {
            key_sequence,
            frame_counter,
        });
    }

    /// Whole seconds since last heard, saturating
    #[must_use]
    pub fn age_secs(&self, now: Instant) -> u32 {
        u32::try_from(self.last_heard.elapsed(now).as_secs()).unwrap_or(u32::MAX)
    }
}

/// Neighbor enumeration cursor
///
/// Start from [`NeighborIterator::new`] and pass the same value back to each
/// call; enumeration ends with `Error::NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NeighborIterator {
    next_index: usize,
    snapshot: Option<u64>,
}

impl NeighborIterator {
    /// Fresh cursor
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_index: 0,
            snapshot: None,
        }
    }
}

/// Public view of a neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborInfo {
    /// Link-layer address
    pub ext_address: ExtAddress,
    /// Short address
    pub rloc16: u16,
    /// Seconds since last heard
    pub age_secs: u32,
    /// Average RSSI
    pub average_rssi: i8,
    /// Last RSSI
    pub last_rssi: i8,
    /// Inbound link quality
    pub link_quality_in: u8,
    /// Outbound link quality
    pub link_quality_out: u8,
    /// Neighbor is our child
    pub is_child: bool,
    /// Receiver on when idle
    pub rx_on_when_idle: bool,
    /// Full Thread device
    pub full_thread_device: bool,
    /// Requests full network data
    pub full_network_data: bool,
}

/// Slot index space used by the iterator: parent, routers, children
const PARENT_INDEX: usize = 0;
const ROUTER_BASE: usize = 1;
const CHILD_BASE: usize = ROUTER_BASE + MAX_ROUTERS;
const INDEX_END: usize = CHILD_BASE + MAX_CHILDREN;

/// Fixed-capacity neighbor table
pub struct NeighborTable {
    parent: Option<Neighbor>,
    parent_candidate: Option<Neighbor>,
    routers: [Option<Neighbor>; MAX_ROUTERS],
    children: [Option<Neighbor>; MAX_CHILDREN],
    generation: u64,
}

impl NeighborTable {
    /// Create an empty table
    #[must_use]
    pub const fn new() -> Self {
        const NONE: Option<Neighbor> = None;
        Self {
            parent: None,
            parent_candidate: None,
            routers: [NONE; MAX_ROUTERS],
            children: [NONE; MAX_CHILDREN],
            generation: 0,
        }
    }

    fn stamp(&mut self, mut neighbor: Neighbor) -> Neighbor {
        self.generation += 1;
        neighbor.generation = self.generation;
        neighbor
    }

    /// Remove every record
    pub fn clear(&mut self) {
        self.parent = None;
        self.parent_candidate = None;
        self.clear_routers();
        self.clear_children();
    }

    // -- parent ------------------------------------------------------------

    /// Current parent
    #[must_use]
    pub const fn parent(&self) -> Option<&Neighbor> {
        self.parent.as_ref()
    }

    /// Current parent, mutable
    pub fn parent_mut(&mut self) -> Option<&mut Neighbor> {
        self.parent.as_mut()
    }

    /// Remove the parent, returning the old record
    pub fn take_parent(&mut self) -> Option<Neighbor> {
        self.parent.take()
    }

    /// Parent candidate under evaluation
    #[must_use]
    pub const fn parent_candidate(&self) -> Option<&Neighbor> {
        self.parent_candidate.as_ref()
    }

    /// Parent candidate, mutable
    pub fn parent_candidate_mut(&mut self) -> Option<&mut Neighbor> {
        self.parent_candidate.as_mut()
    }

    /// Replace the parent candidate
    pub fn set_parent_candidate(&mut self, candidate: Neighbor) {
        self.parent_candidate = Some(candidate);
    }

    /// Drop the parent candidate
    pub fn clear_parent_candidate(&mut self) {
        self.parent_candidate = None;
    }

    /// Promote the candidate to parent
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if there is no candidate.
    pub fn promote_candidate(&mut self, now: Instant) -> Result<&Neighbor> {
        let mut candidate = self.parent_candidate.take().ok_or(Error::NotFound)?;
        candidate.state = NeighborState::Valid;
        candidate.last_heard = now;
        let stamped = self.stamp(candidate);
        Ok(&*self.parent.insert(stamped))
    }

    // -- routers -----------------------------------------------------------

    /// Router neighbor with the given router ID
    #[must_use]
    pub fn router(&self, router_id: u8) -> Option<&Neighbor> {
        self.routers
            .iter()
            .flatten()
            .find(|n| n.router_id() == router_id)
    }

    /// Router neighbor by router ID, mutable
    pub fn router_mut(&mut self, router_id: u8) -> Option<&mut Neighbor> {
        self.routers
            .iter_mut()
            .flatten()
            .find(|n| n.router_id() == router_id)
    }

    /// Add or refresh a router neighbor
    ///
    /// # Errors
    ///
    /// Returns `Error::NoBufs` when every router slot is taken.
    pub fn upsert_router(&mut self, neighbor: Neighbor) -> Result<bool> {
        let router_id = neighbor.router_id();
        if let Some(existing) = self.router_mut(router_id) {
            if existing.ext_address == neighbor.ext_address {
                existing.link.add_sample(neighbor.link.last_rssi());
                existing.last_heard = neighbor.last_heard;
                existing.state = NeighborState::Valid;
                return Ok(false);
            }
        }
        // a different device now holds this router ID
        self.remove_router(router_id);

        let free = self.routers.iter().position(Option::is_none).ok_or(Error::NoBufs)?;
        let mut record = neighbor;
        record.state = NeighborState::Valid;
        self.routers[free] = Some(self.stamp(record));
        Ok(true)
    }

    /// Remove a router neighbor
    pub fn remove_router(&mut self, router_id: u8) -> Option<Neighbor> {
        self.routers
            .iter_mut()
            .find(|slot| matches!(slot, Some(n) if n.router_id() == router_id))
            .and_then(Option::take)
    }

    /// Remove every router neighbor
    pub fn clear_routers(&mut self) {
        for slot in &mut self.routers {
            *slot = None;
        }
    }

    /// Iterate router neighbors
    pub fn routers(&self) -> impl Iterator<Item = &Neighbor> {
        self.routers.iter().flatten()
    }

    /// Number of router neighbors
    #[must_use]
    pub fn router_count(&self) -> usize {
        self.routers().count()
    }

    /// Router neighbors not heard within `timeout`
    pub fn expired_routers(&self, timeout: Millis, now: Instant) -> impl Iterator<Item = u8> + '_ {
        self.routers()
            .filter(move |n| n.last_heard.has_elapsed(now, timeout))
            .map(Neighbor::router_id)
    }

    // -- children ----------------------------------------------------------

    /// Child by link-layer address
    #[must_use]
    pub fn child(&self, ext_address: &ExtAddress) -> Option<&Neighbor> {
        self.children
            .iter()
            .flatten()
            .find(|n| n.ext_address == *ext_address)
    }

    /// Child by link-layer address, mutable
    pub fn child_mut(&mut self, ext_address: &ExtAddress) -> Option<&mut Neighbor> {
        self.children
            .iter_mut()
            .flatten()
            .find(|n| n.ext_address == *ext_address)
    }

    /// Child by short address
    #[must_use]
    pub fn child_by_rloc16(&self, rloc16: u16) -> Option<&Neighbor> {
        self.children.iter().flatten().find(|n| n.rloc16 == rloc16)
    }

    /// Admit a child
    ///
    /// A child already known by its link-layer address keeps its slot, its
    /// enumeration position and its replay counters. The closure maps the
    /// slot index to the child's short address.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoBufs` when the child table is full.
    pub fn add_child(&mut self, mut child: Neighbor, rloc16_for_slot: impl Fn(usize) -> u16) -> Result<u16> {
        let slot = self
            .children
            .iter()
            .position(|s| s.as_ref().is_some_and(|n| n.ext_address == child.ext_address))
            .or_else(|| self.children.iter().position(Option::is_none))
            .ok_or(Error::NoBufs)?;
        child.rloc16 = rloc16_for_slot(slot);
        child.state = NeighborState::Valid;
        let rloc16 = child.rloc16;
        let record = match self.children[slot].take() {
            Some(existing) => Neighbor {
                rx_counter: existing.rx_counter,
                generation: existing.generation,
                ..child
            },
            None => self.stamp(child),
        };
        self.children[slot] = Some(record);
        Ok(rloc16)
    }

    /// Remove a child
    pub fn remove_child(&mut self, ext_address: &ExtAddress) -> Option<Neighbor> {
        self.children
            .iter_mut()
            .find(|slot| matches!(slot, Some(n) if n.ext_address == *ext_address))
            .and_then(Option::take)
    }

    /// Remove every child whose timeout passed, returning how many
    pub fn evict_expired_children(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        for slot in &mut self.children {
            if slot.as_ref().is_some_and(|n| n.is_expired(now)) {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }

    /// Remove every child
    pub fn clear_children(&mut self) {
        for slot in &mut self.children {
            *slot = None;
        }
    }

    /// Iterate children
    pub fn children(&self) -> impl Iterator<Item = &Neighbor> {
        self.children.iter().flatten()
    }

    /// Number of children
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children().count()
    }

    /// Check whether another child fits
    #[must_use]
    pub fn has_child_capacity(&self) -> bool {
        self.children.iter().any(Option::is_none)
    }

    // -- replay protection ---------------------------------------------------

    fn records_mut(&mut self) -> impl Iterator<Item = &mut Neighbor> {
        self.parent
            .iter_mut()
            .chain(self.parent_candidate.iter_mut())
            .chain(self.routers.iter_mut().flatten())
            .chain(self.children.iter_mut().flatten())
    }

    /// Check a frame from `ext_address` against every record of that device
    ///
    /// Devices with no record have no replay state and always pass.
    #[must_use]
    pub fn is_fresh_frame(&self, ext_address: &ExtAddress, key_sequence: u32, frame_counter: u32) -> bool {
        self.parent
            .iter()
            .chain(self.parent_candidate.iter())
            .chain(self.routers.iter().flatten())
            .chain(self.children.iter().flatten())
            .filter(|n| n.ext_address == *ext_address)
            .all(|n| n.is_fresh_frame(key_sequence, frame_counter))
    }

    /// Record an accepted frame on every record of `ext_address`
    pub fn record_frame(&mut self, ext_address: &ExtAddress, key_sequence: u32, frame_counter: u32) {
        for n in self.records_mut().filter(|n| n.ext_address == *ext_address) {
            n.record_frame(key_sequence, frame_counter);
        }
    }

    // -- enumeration ---------------------------------------------------------

    fn slot(&self, index: usize) -> Option<(&Neighbor, bool)> {
        match index {
            PARENT_INDEX => self.parent.as_ref().map(|n| (n, false)),
            i if i < CHILD_BASE => self.routers[i - ROUTER_BASE].as_ref().map(|n| (n, false)),
            i if i < INDEX_END => self.children[i - CHILD_BASE].as_ref().map(|n| (n, true)),
            _ => None,
        }
    }

    /// Advance an enumeration
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` once every neighbor present at the first
    /// call has been reported.
    pub fn next_neighbor(&self, iter: &mut NeighborIterator, now: Instant) -> Result<NeighborInfo> {
        let snapshot = *iter.snapshot.get_or_insert(self.generation);
        while iter.next_index < INDEX_END {
            let index = iter.next_index;
            iter.next_index += 1;
            let Some((n, is_child)) = self.slot(index) else {
                continue;
            };
            if n.state != NeighborState::Valid || n.generation > snapshot {
                continue;
            }
            return Ok(NeighborInfo {
                ext_address: n.ext_address,
                rloc16: n.rloc16,
                age_secs: n.age_secs(now),
                average_rssi: n.link.average_rssi(),
                last_rssi: n.link.last_rssi(),
                link_quality_in: n.link.link_quality_in(),
                link_quality_out: n.link_quality_out,
                is_child,
                rx_on_when_idle: n.mode.rx_on_when_idle,
                full_thread_device: n.mode.full_thread_device,
                full_network_data: n.mode.full_network_data,
            });
        }
        Err(Error::NotFound)
    }
}

impl Default for NeighborTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thread_common::rloc16_from_router_id;

    fn ext(b: u8) -> ExtAddress {
        ExtAddress::new([b; 8])
    }

    fn collect(table: &NeighborTable, iter: &mut NeighborIterator) -> heapless::Vec<ExtAddress, 64> {
        let mut out = heapless::Vec::new();
        while let Ok(info) = table.next_neighbor(iter, Instant::ZERO) {
            out.push(info.ext_address).unwrap();
        }
        out
    }

    #[test]
    fn test_link_quality_thresholds() {
        assert_eq!(link_quality_from_margin(25), 3);
        assert_eq!(link_quality_from_margin(20), 2);
        assert_eq!(link_quality_from_margin(11), 2);
        assert_eq!(link_quality_from_margin(3), 1);
        assert_eq!(link_quality_from_margin(2), 0);
        assert_eq!(link_margin_from_rssi(-70), 30);
        assert_eq!(link_margin_from_rssi(-110), 0);
        assert_eq!(link_margin_from_rssi(INVALID_RSSI), 0);
    }

    #[test]
    fn test_rssi_average() {
        let mut link = LinkInfo::EMPTY;
        assert_eq!(link.average_rssi(), INVALID_RSSI);
        link.add_sample(-60);
        assert_eq!(link.average_rssi(), -60);
        link.add_sample(-80);
        // -480 + (-640 - -480) / 8 = -500 -> -62
        assert_eq!(link.average_rssi(), -62);
        assert_eq!(link.last_rssi(), -80);
        link.add_sample(INVALID_RSSI);
        assert_eq!(link.last_rssi(), -80);
    }

    #[test]
    fn test_iteration_covers_all_then_not_found() {
        let mut t = NeighborTable::new();
        t.set_parent_candidate(Neighbor::new(ext(1), 0x0400, -50, Instant::ZERO));
        t.promote_candidate(Instant::ZERO).unwrap();
        t.upsert_router(Neighbor::new(ext(2), rloc16_from_router_id(2), -50, Instant::ZERO)).unwrap();
        t.add_child(Neighbor::new(ext(3), 0, -50, Instant::ZERO), |i| 0x0801 + i as u16).unwrap();

        let mut iter = NeighborIterator::new();
        let seen = collect(&t, &mut iter);
        assert_eq!(seen.as_slice(), &[ext(1), ext(2), ext(3)]);
        assert_eq!(t.next_neighbor(&mut iter, Instant::ZERO), Err(Error::NotFound));
    }

    #[test]
    fn test_entries_added_mid_walk_are_skipped() {
        let mut t = NeighborTable::new();
        t.add_child(Neighbor::new(ext(3), 0, -50, Instant::ZERO), |i| 0x0801 + i as u16).unwrap();
        t.add_child(Neighbor::new(ext(4), 0, -50, Instant::ZERO), |i| 0x0801 + i as u16).unwrap();

        let mut iter = NeighborIterator::new();
        let first = t.next_neighbor(&mut iter, Instant::ZERO).unwrap();
        assert_eq!(first.ext_address, ext(3));

        // removed and re-added into an earlier slot; then a new child
        t.remove_child(&ext(3));
        t.add_child(Neighbor::new(ext(5), 0, -50, Instant::ZERO), |i| 0x0801 + i as u16).unwrap();

        let rest = collect(&t, &mut iter);
        assert_eq!(rest.as_slice(), &[ext(4)]);
    }

    #[test]
    fn test_child_keeps_slot_on_readmission() {
        let mut t = NeighborTable::new();
        let a = t.add_child(Neighbor::new(ext(3), 0, -50, Instant::ZERO), |i| 0x0801 + i as u16).unwrap();
        let b = t.add_child(Neighbor::new(ext(3), 0, -40, Instant::ZERO), |i| 0x0801 + i as u16).unwrap();
        assert_eq!(a, b);
        assert_eq!(t.child_count(), 1);
    }

    #[test]
    fn test_readmitted_child_still_reported_mid_walk() {
        let mut t = NeighborTable::new();
        t.add_child(Neighbor::new(ext(3), 0, -50, Instant::ZERO), |i| 0x0801 + i as u16).unwrap();
        t.add_child(Neighbor::new(ext(4), 0, -50, Instant::ZERO), |i| 0x0801 + i as u16).unwrap();

        let mut iter = NeighborIterator::new();
        assert_eq!(t.next_neighbor(&mut iter, Instant::ZERO).unwrap().ext_address, ext(3));

        // ext(4) re-attaches before the walk reaches it
        let mut again = Neighbor::new(ext(4), 0, -40, Instant::ZERO);
        again.mode.rx_on_when_idle = false;
        t.add_child(again, |i| 0x0801 + i as u16).unwrap();

        let next = t.next_neighbor(&mut iter, Instant::ZERO).unwrap();
        assert_eq!(next.ext_address, ext(4));
        assert!(!next.rx_on_when_idle);
        assert_eq!(t.next_neighbor(&mut iter, Instant::ZERO), Err(Error::NotFound));
    }

    #[test]
    fn test_generation_does_not_wrap() {
        let mut t = NeighborTable::new();
        t.generation = u64::from(u32::MAX);
        t.add_child(Neighbor::new(ext(3), 0, -50, Instant::ZERO), |i| 0x0801 + i as u16).unwrap();
        let mut iter = NeighborIterator::new();
        assert_eq!(t.next_neighbor(&mut iter, Instant::ZERO).unwrap().ext_address, ext(3));
        assert!(t.child(&ext(3)).unwrap().generation > u64::from(u32::MAX));
    }

    #[test]
    fn test_replayed_frame_counter_rejected() {
        let mut t = NeighborTable::new();
        t.add_child(Neighbor::new(ext(3), 0, -50, Instant::ZERO), |i| 0x0801 + i as u16).unwrap();
        assert!(t.is_fresh_frame(&ext(3), 0, 5));
        t.record_frame(&ext(3), 0, 5);

        assert!(!t.is_fresh_frame(&ext(3), 0, 5));
        assert!(!t.is_fresh_frame(&ext(3), 0, 4));
        assert!(t.is_fresh_frame(&ext(3), 0, 6));
        // a newer key sequence restarts the counter space
        assert!(t.is_fresh_frame(&ext(3), 1, 0));
        assert!(!t.is_fresh_frame(&ext(3), u32::MAX, 100));
        // strangers carry no state
        assert!(t.is_fresh_frame(&ext(9), 0, 0));

        // readmission keeps the counters
        t.add_child(Neighbor::new(ext(3), 0, -50, Instant::ZERO), |i| 0x0801 + i as u16).unwrap();
        assert!(!t.is_fresh_frame(&ext(3), 0, 5));
    }

    #[test]
    fn test_child_table_full() {
        let mut t = NeighborTable::new();
        for i in 0..MAX_CHILDREN {
            let e = ExtAddress::new([i as u8 + 10; 8]);
            t.add_child(Neighbor::new(e, 0, -50, Instant::ZERO), |s| s as u16 + 1).unwrap();
        }
        assert!(!t.has_child_capacity());
        let r = t.add_child(Neighbor::new(ext(99), 0, -50, Instant::ZERO), |s| s as u16 + 1);
        assert_eq!(r, Err(Error::NoBufs));
    }

    #[test]
    fn test_expired_children_evicted() {
        let mut t = NeighborTable::new();
        let mut c = Neighbor::new(ext(3), 0, -50, Instant::ZERO);
        c.timeout = Millis::from_secs(10);
        t.add_child(c, |i| i as u16 + 1).unwrap();
        assert_eq!(t.evict_expired_children(Instant::from_secs(9)), 0);
        assert_eq!(t.evict_expired_children(Instant::from_secs(10)), 1);
        assert_eq!(t.child_count(), 0);
    }

    #[test]
    fn test_router_replaced_when_id_changes_hands() {
        let mut t = NeighborTable::new();
        let rloc = rloc16_from_router_id(7);
        assert!(t.upsert_router(Neighbor::new(ext(1), rloc, -50, Instant::ZERO)).unwrap());
        assert!(!t.upsert_router(Neighbor::new(ext(1), rloc, -55, Instant::ZERO)).unwrap());
        assert!(t.upsert_router(Neighbor::new(ext(2), rloc, -55, Instant::ZERO)).unwrap());
        assert_eq!(t.router(7).unwrap().ext_address, ext(2));
        assert_eq!(t.router_count(), 1);
    }
}
