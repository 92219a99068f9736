// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Router and leader duties
//!
//! Covers the router ID request (Address Solicit) on the child side, router
//! ID assignment on the leader, periodic advertisements, partition merging
//! and the fall-back to leadership when the leader goes silent.

use heapless::Vec;
use thread_common::constants::{MAX_ROUTERS, MAX_ROUTER_ID, MAX_ROUTE_COST};
use thread_common::{
    is_router_rloc16, log_debug, log_info, log_warn, rloc16_from_router_id, router_id_from_rloc16,
    Deadline, Error, ExtAddress, Instant, Millis, Result,
};

use super::{AttachMode, Mle, Role};
use crate::key_manager::Challenge;
use crate::leader::LeaderData;
use crate::message::{Destination, MleFrame, MleMessage, SolicitStatus};
use crate::neighbor::{link_cost, Neighbor};
use crate::notifier::ChangedFlags;
use crate::platform::Platform;
use crate::route::{RouteData, RouterMask};

const LOG_MODULE: &str = "router";

/// Parent Response challenges remembered per requester
const ISSUED_CHALLENGES: usize = 4;

#[derive(Debug, Clone, Copy)]
struct IssuedChallenge {
    requester: ExtAddress,
    challenge: Challenge,
}

/// Router-side timers and handshake state
pub(super) struct RouterState {
    pub(super) advertise: Option<Deadline>,
    pub(super) solicit: Option<Deadline>,
    pub(super) upgrade: Option<Deadline>,
    pub(super) leader_heard: Instant,
    /// Child waiting for this REED to obtain a router ID
    pub(super) pending_child: Option<Neighbor>,
    issued: Vec<IssuedChallenge, ISSUED_CHALLENGES>,
}

impl RouterState {
    pub(super) const fn new() -> Self {
        Self {
            advertise: None,
            solicit: None,
            upgrade: None,
            leader_heard: Instant::ZERO,
            pending_child: None,
            issued: Vec::new(),
        }
    }

    pub(super) fn reset(&mut self) {
        *self = Self::new();
    }

    /// Remember the challenge sent to `requester`, displacing the oldest
    pub(super) fn remember_challenge(&mut self, requester: ExtAddress, challenge: Challenge) {
        self.issued.retain(|c| c.requester != requester);
        if self.issued.is_full() {
            self.issued.remove(0);
        }
        let _ = self.issued.push(IssuedChallenge { requester, challenge });
    }

    /// Challenge sent to `requester`; each one verifies at most once
    pub(super) fn take_challenge(&mut self, requester: &ExtAddress) -> Option<Challenge> {
        let index = self.issued.iter().position(|c| c.requester == *requester)?;
        Some(self.issued.remove(index).challenge)
    }
}

impl Mle {
    // ========================================================================
    // Becoming a router
    // ========================================================================

    /// Child -> Router through an Address Solicit to the leader
    ///
    /// # Errors
    ///
    /// - `Error::Already` when already Router
    /// - `Error::InvalidState` unless Child, or when not router-eligible
    /// - `Error::Busy` while a request is outstanding
    pub fn become_router(&mut self, platform: &mut dyn Platform, now: Instant) -> Result<()> {
        self.now = now;
        match self.role {
            Role::Router => return Err(Error::Already),
            Role::Child => {}
            Role::Disabled | Role::Detached | Role::Leader => return Err(Error::InvalidState),
        }
        if !self.config.is_router_eligible() {
            return Err(Error::InvalidState);
        }
        self.request_router_id(platform)
    }

    pub(super) fn request_router_id(&mut self, platform: &mut dyn Platform) -> Result<()> {
        if self.router.solicit.is_some() {
            return Err(Error::Busy);
        }
        let next_hop = self.neighbors.parent().map(|p| p.rloc16).ok_or(Error::InvalidState)?;
        let leader_rloc16 = rloc16_from_router_id(self.leader.leader_router_id());
        self.router.upgrade = None;
        self.router.solicit = Some(Deadline::new(self.now, self.config.router.address_solicit_timeout));
        log_info!(
            self.logs,
            self.now.as_millis(),
            LOG_MODULE,
            "requesting router id (preferred {:?})",
            self.previous_router_id
        );
        self.send(
            platform,
            Destination::Routed {
                next_hop,
                target_rloc16: leader_rloc16,
            },
            MleMessage::AddressSolicit {
                ext_address: self.ext_address,
                rloc16: self.rloc16,
                preferred_router_id: self.previous_router_id,
            },
        )
    }

    /// Arm the router upgrade timer with a random delay when the partition
    /// is short of routers
    pub(super) fn schedule_router_upgrade(&mut self, platform: &mut dyn Platform) -> Result<()> {
        if self.role != Role::Child
            || !self.config.is_router_eligible()
            || self.router.upgrade.is_some()
            || self.router.solicit.is_some()
            || self.routes.active_count() >= self.config.router.router_upgrade_threshold
        {
            return Ok(());
        }
        let jitter = self.config.router.router_selection_jitter.as_millis();
        let delay = if jitter == 0 {
            0
        } else {
            u64::from(platform.rng().next_u32()?) % (jitter + 1)
        };
        self.router.upgrade = Some(Deadline::new(self.now, Millis::new(delay)));
        log_debug!(self.logs, self.now.as_millis(), LOG_MODULE, "router upgrade in {} ms", delay);
        Ok(())
    }

    /// Child-side timers: outstanding solicit and pending upgrade
    pub(super) fn process_router_upgrade(&mut self, platform: &mut dyn Platform) -> Result<()> {
        if self.router.solicit.is_some_and(|d| d.is_expired(self.now)) {
            self.router.solicit = None;
            self.router.pending_child = None;
            log_warn!(self.logs, self.now.as_millis(), LOG_MODULE, "address solicit timed out");
            return self.schedule_router_upgrade(platform);
        }
        if self.router.upgrade.is_some_and(|d| d.is_expired(self.now)) {
            self.router.upgrade = None;
            if self.routes.active_count() < self.config.router.router_upgrade_threshold {
                return self.request_router_id(platform);
            }
        }
        Ok(())
    }

    pub(super) fn handle_address_solicit(
        &mut self,
        platform: &mut dyn Platform,
        ext_address: ExtAddress,
        rloc16: u16,
        preferred: Option<u8>,
    ) -> Result<()> {
        if self.role != Role::Leader {
            return Ok(());
        }
        let next_hop = self.next_hop_toward(rloc16).ok_or(Error::NotFound)?;
        let pick = platform.rng().next_u8()?;
        let router_id = self.routes.allocate(preferred, pick, self.now);
        let status = match router_id {
            Some(id) => {
                log_info!(self.logs, self.now.as_millis(), LOG_MODULE, "router id {} assigned to {}", id, ext_address);
                SolicitStatus::Success
            }
            None => {
                log_warn!(self.logs, self.now.as_millis(), LOG_MODULE, "no router id left for {}", ext_address);
                SolicitStatus::NoAddressAvailable
            }
        };
        self.send(
            platform,
            Destination::Routed {
                next_hop,
                target_rloc16: rloc16,
            },
            MleMessage::AddressSolicitResponse {
                status,
                ext_address,
                router_id,
                id_sequence: self.routes.id_sequence(),
                allocated: self.routes.allocated(),
            },
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn handle_address_solicit_response(
        &mut self,
        platform: &mut dyn Platform,
        status: SolicitStatus,
        ext_address: ExtAddress,
        router_id: Option<u8>,
        id_sequence: u8,
        allocated: RouterMask,
    ) -> Result<()> {
        if ext_address != self.ext_address || self.role != Role::Child || self.router.solicit.is_none() {
            return Ok(());
        }
        self.router.solicit = None;
        let (SolicitStatus::Success, Some(router_id)) = (status, router_id) else {
            log_warn!(self.logs, self.now.as_millis(), LOG_MODULE, "router id request rejected");
            self.router.pending_child = None;
            return Ok(());
        };

        let parent = self.neighbors.take_parent();
        if let Some(p) = parent {
            self.last_parent = Some(p);
        }
        self.routes.set_allocation(id_sequence, allocated);
        self.previous_router_id = Some(router_id);
        self.set_rloc16(rloc16_from_router_id(router_id));
        self.attach.keepalive = None;
        self.router.upgrade = None;

        if let Some(mut p) = parent.filter(|p| is_router_rloc16(p.rloc16)) {
            p.timeout = self.config.router.router_neighbor_timeout;
            self.neighbors.upsert_router(p)?;
            self.changed.insert(ChangedFlags::ROUTER_NEIGHBORS);
        }
        self.set_role(Role::Router);
        self.router.leader_heard = self.now;
        log_info!(
            self.logs,
            self.now.as_millis(),
            LOG_MODULE,
            "router id {} (rloc16 0x{:04x})",
            router_id,
            self.rloc16
        );
        self.send_advertisement(platform)?;

        if let Some(child) = self.router.pending_child.take() {
            self.admit_child(platform, child)?;
        }
        self.persist(platform);
        Ok(())
    }

    pub(super) fn handle_address_release(&mut self, router_id: u8, ext_address: ExtAddress) {
        if self.role != Role::Leader || router_id == self.router_id() {
            return;
        }
        if self
            .routes
            .release(router_id, self.config.router.router_id_reuse_delay, self.now)
        {
            log_info!(
                self.logs,
                self.now.as_millis(),
                LOG_MODULE,
                "router id {} released by {}",
                router_id,
                ext_address
            );
        }
    }

    /// Give the router ID back to the leader (best effort)
    pub(super) fn send_address_release(&mut self, platform: &mut dyn Platform) {
        let target_rloc16 = rloc16_from_router_id(self.leader.leader_router_id());
        let Some(next_hop) = self.next_hop_toward(target_rloc16) else {
            return;
        };
        let message = MleMessage::AddressRelease {
            router_id: self.router_id(),
            ext_address: self.ext_address,
        };
        if let Err(e) = self.send(platform, Destination::Routed { next_hop, target_rloc16 }, message) {
            log_warn!(self.logs, self.now.as_millis(), LOG_MODULE, "address release not sent: {}", e);
        }
    }

    // ========================================================================
    // Leader
    // ========================================================================

    /// Start a new partition with this device as leader
    ///
    /// # Errors
    ///
    /// - `Error::Already` when already Leader
    /// - `Error::InvalidState` when Disabled or not router-eligible
    pub fn become_leader(&mut self, platform: &mut dyn Platform, now: Instant) -> Result<()> {
        self.now = now;
        match self.role {
            Role::Disabled => return Err(Error::InvalidState),
            Role::Leader => return Err(Error::Already),
            Role::Detached | Role::Child | Role::Router => {}
        }
        if !self.config.is_router_eligible() {
            return Err(Error::InvalidState);
        }

        let rng = platform.rng();
        let partition_id = rng.next_u32()?;
        let data_version = rng.next_u8()?;
        let stable_data_version = rng.next_u8()?;
        let id_sequence = rng.next_u8()?;
        let router_id = match self.previous_router_id {
            Some(id) if id <= MAX_ROUTER_ID => id,
            _ => rng.next_u8()? % (MAX_ROUTER_ID + 1),
        };

        if let Some(parent) = self.neighbors.take_parent() {
            self.last_parent = Some(parent);
        }
        self.neighbors.clear_parent_candidate();
        if self.neighbors.router_count() > 0 {
            self.neighbors.clear_routers();
            self.changed.insert(ChangedFlags::ROUTER_NEIGHBORS);
        }
        self.routes.reset_as_leader(router_id, id_sequence, now);
        self.apply_leader_data(LeaderData {
            partition_id,
            weighting: self.config.router.leader_weight,
            data_version,
            stable_data_version,
            leader_router_id: router_id,
        });

        let rloc16 = rloc16_from_router_id(router_id);
        if rloc16 != self.rloc16 && self.neighbors.child_count() > 0 {
            // children were numbered under the old short address
            self.neighbors.clear_children();
            self.changed.insert(ChangedFlags::CHILD_REMOVED);
        }
        self.set_rloc16(rloc16);
        self.previous_router_id = Some(router_id);
        self.attach.reset(&self.config.attach);
        self.attach.keepalive = None;
        self.router.solicit = None;
        self.router.upgrade = None;
        self.router.pending_child = None;
        self.set_role(Role::Leader);
        self.router.leader_heard = now;
        log_info!(
            self.logs,
            now.as_millis(),
            LOG_MODULE,
            "leading partition 0x{:08x} as router {}",
            partition_id,
            router_id
        );
        self.send_advertisement(platform)?;
        self.persist(platform);
        Ok(())
    }

    // ========================================================================
    // Advertisements
    // ========================================================================

    fn send_advertisement(&mut self, platform: &mut dyn Platform) -> Result<()> {
        let leader_data = *self.leader.last_known();
        let route = self.routes.route_data(self.router_id());
        self.router.advertise = Some(Deadline::new(self.now, self.config.router.advertisement_interval));
        self.send(
            platform,
            Destination::Broadcast,
            MleMessage::Advertisement { leader_data, route },
        )
    }

    pub(super) fn handle_advertisement(
        &mut self,
        platform: &mut dyn Platform,
        frame: &MleFrame,
        rssi: i8,
        leader_data: &LeaderData,
        route: &RouteData,
    ) -> Result<()> {
        if !is_router_rloc16(frame.source_rloc16) {
            return Ok(());
        }
        match self.role {
            Role::Child => self.child_heard_advertisement(platform, frame, rssi, leader_data, route),
            Role::Router | Role::Leader => {
                self.router_heard_advertisement(platform, frame, rssi, leader_data, route)
            }
            Role::Disabled | Role::Detached => Ok(()),
        }
    }

    fn child_heard_advertisement(
        &mut self,
        platform: &mut dyn Platform,
        frame: &MleFrame,
        rssi: i8,
        leader_data: &LeaderData,
        route: &RouteData,
    ) -> Result<()> {
        let Some(parent_rloc16) = self
            .neighbors
            .parent()
            .filter(|p| p.ext_address == frame.source)
            .map(|p| p.rloc16)
        else {
            return Ok(());
        };
        if parent_rloc16 != frame.source_rloc16 || leader_data.partition_id != self.leader.partition_id() {
            log_info!(self.logs, self.now.as_millis(), LOG_MODULE, "parent moved, re-attaching");
            return self.detach(platform, AttachMode::Any, None);
        }
        let now = self.now;
        if let Some(parent) = self.neighbors.parent_mut() {
            parent.heard(rssi, now);
        }
        if self.leader.merge_versions(leader_data) {
            self.changed.insert(ChangedFlags::LEADER_DATA);
        }
        self.routes.adopt_allocation(route);
        self.schedule_router_upgrade(platform)
    }

    fn router_heard_advertisement(
        &mut self,
        platform: &mut dyn Platform,
        frame: &MleFrame,
        rssi: i8,
        leader_data: &LeaderData,
        route: &RouteData,
    ) -> Result<()> {
        let current = *self.leader.last_known();
        if leader_data.partition_id != current.partition_id {
            if leader_data.is_better_partition_than(&current) && !self.attach.is_running() {
                self.counters.better_partition_attach_attempts =
                    self.counters.better_partition_attach_attempts.saturating_add(1);
                log_info!(
                    self.logs,
                    self.now.as_millis(),
                    LOG_MODULE,
                    "better partition 0x{:08x} heard, leaving 0x{:08x}",
                    leader_data.partition_id,
                    current.partition_id
                );
                return self.detach(platform, AttachMode::BetterPartition, Some(current));
            }
            return Ok(());
        }

        let sender_id = router_id_from_rloc16(frame.source_rloc16);
        let own_id = self.router_id();
        if sender_id == own_id {
            return Ok(());
        }
        let mut record = Neighbor::new(frame.source, frame.source_rloc16, rssi, self.now);
        record.timeout = self.config.router.router_neighbor_timeout;
        if self.neighbors.upsert_router(record)? {
            self.changed.insert(ChangedFlags::ROUTER_NEIGHBORS);
            log_debug!(self.logs, self.now.as_millis(), LOG_MODULE, "router neighbor {} added", sender_id);
        }

        if self.role == Role::Router
            && self.routes.adopt_allocation(route)
            && !self.routes.allocated().contains(own_id)
        {
            log_warn!(self.logs, self.now.as_millis(), LOG_MODULE, "router id {} no longer allocated", own_id);
            return self.detach(platform, AttachMode::Any, None);
        }

        let link_quality = self.neighbors.router(sender_id).map_or(0, Neighbor::two_way_link_quality);
        self.routes
            .apply_advertisement(own_id, sender_id, link_cost(link_quality), route);
        if self.leader.merge_versions(leader_data) {
            self.changed.insert(ChangedFlags::LEADER_DATA);
        }

        let leader_id = current.leader_router_id;
        match self.role {
            Role::Leader => self.routes.mark_heard(sender_id, self.now),
            Role::Router if sender_id == leader_id || route.cost_to(leader_id) < MAX_ROUTE_COST => {
                self.router.leader_heard = self.now;
            }
            _ => {}
        }
        Ok(())
    }

    // ========================================================================
    // Timers
    // ========================================================================

    pub(super) fn process_router(&mut self, platform: &mut dyn Platform) -> Result<()> {
        if self.router.advertise.is_some_and(|d| d.is_expired(self.now)) {
            self.send_advertisement(platform)?;
        }

        let timeout = self.config.router.router_neighbor_timeout;
        let expired: Vec<u8, MAX_ROUTERS> = self.neighbors.expired_routers(timeout, self.now).collect();
        for router_id in expired {
            self.neighbors.remove_router(router_id);
            self.routes.neighbor_lost(router_id);
            self.changed.insert(ChangedFlags::ROUTER_NEIGHBORS);
            log_info!(self.logs, self.now.as_millis(), LOG_MODULE, "router neighbor {} lost", router_id);
        }
        self.evict_children();

        let own_id = self.router_id();
        match self.role {
            Role::Leader => {
                for id in self.routes.allocated().iter() {
                    if id == own_id || self.routes.route(id).is_some() {
                        self.routes.mark_heard(id, self.now);
                    }
                }
                let released = self.routes.expire(
                    own_id,
                    timeout,
                    self.config.router.router_id_reuse_delay,
                    self.now,
                );
                if released.count() > 0 {
                    log_info!(
                        self.logs,
                        self.now.as_millis(),
                        LOG_MODULE,
                        "released {} silent router ids",
                        released.count()
                    );
                }
                if self.keys.is_rotation_due(self.now) && self.keys.try_rotate(self.now, platform.key_store())? {
                    log_info!(
                        self.logs,
                        self.now.as_millis(),
                        "keys",
                        "key sequence rotated to {}",
                        self.keys.key_sequence()
                    );
                    self.changed.insert(ChangedFlags::KEY_SEQUENCE);
                    self.persist(platform);
                }
                Ok(())
            }
            Role::Router if self.router.leader_heard.has_elapsed(self.now, timeout) => {
                log_warn!(self.logs, self.now.as_millis(), LOG_MODULE, "leader lost, taking over");
                self.become_leader(platform, self.now)
            }
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Forwarding
    // ========================================================================

    /// Short address of the node one hop closer to `target_rloc16`
    fn next_hop_toward(&self, target_rloc16: u16) -> Option<u16> {
        match self.role {
            Role::Child => return self.neighbors.parent().map(|p| p.rloc16),
            Role::Router | Role::Leader => {}
            Role::Disabled | Role::Detached => return None,
        }
        let target_router = router_id_from_rloc16(target_rloc16);
        if target_router == self.router_id() {
            return self.neighbors.child_by_rloc16(target_rloc16).map(|c| c.rloc16);
        }
        if self.neighbors.router(target_router).is_some() {
            return Some(rloc16_from_router_id(target_router));
        }
        self.routes
            .route(target_router)
            .filter(|r| self.neighbors.router(r.next_hop).is_some())
            .map(|r| rloc16_from_router_id(r.next_hop))
    }

    /// Relay a routed frame one hop further
    pub(super) fn forward(&mut self, frame: &MleFrame, target_rloc16: u16) {
        let Some(next_hop) = self.next_hop_toward(target_rloc16) else {
            self.ip6_counters.tx_failure = self.ip6_counters.tx_failure.saturating_add(1);
            log_debug!(
                self.logs,
                self.now.as_millis(),
                LOG_MODULE,
                "no route to 0x{:04x}, {} dropped",
                target_rloc16,
                frame.message.name()
            );
            return;
        };
        let mut relayed = frame.clone();
        relayed.destination = Destination::Routed {
            next_hop,
            target_rloc16,
        };
        if self.enqueue(relayed).is_ok() {
            log_debug!(
                self.logs,
                self.now.as_millis(),
                LOG_MODULE,
                "forwarded {} toward 0x{:04x} via 0x{:04x}",
                frame.message.name(),
                target_rloc16,
                next_hop
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SoftwarePlatform;
    use thread_common::{Eui64, ThreadConfig};

    fn platform() -> SoftwarePlatform {
        SoftwarePlatform::new(Eui64::new([0x10, 0, 0, 0, 0, 0, 0, 1]), &[0x5a; 32]).unwrap()
    }

    #[test]
    fn test_challenges_displace_oldest() {
        let mut state = RouterState::new();
        for n in 0..=ISSUED_CHALLENGES as u8 {
            state.remember_challenge(ExtAddress::new([n; 8]), [n; 8]);
        }
        assert_eq!(state.take_challenge(&ExtAddress::new([0; 8])), None);
        assert_eq!(state.take_challenge(&ExtAddress::new([1; 8])), Some([1; 8]));
        // consumed on first use
        assert_eq!(state.take_challenge(&ExtAddress::new([1; 8])), None);
    }

    #[test]
    fn test_challenge_reissue_replaces() {
        let mut state = RouterState::new();
        let requester = ExtAddress::new([7; 8]);
        state.remember_challenge(requester, [1; 8]);
        state.remember_challenge(requester, [2; 8]);
        assert_eq!(state.take_challenge(&requester), Some([2; 8]));
        assert_eq!(state.take_challenge(&requester), None);
    }

    #[test]
    fn test_become_leader_from_detached() {
        let mut p = platform();
        let mut mle = Mle::new(ThreadConfig::DEFAULT, &mut p).unwrap();
        assert_eq!(mle.become_leader(&mut p, Instant::ZERO), Err(Error::InvalidState));

        mle.start(&mut p, 0xface, 11, Instant::ZERO).unwrap();
        while mle.next_outbound().is_some() {}
        mle.become_leader(&mut p, Instant::from_millis(10)).unwrap();

        assert_eq!(mle.role(), Role::Leader);
        assert!(is_router_rloc16(mle.rloc16()));
        assert_eq!(mle.leader().leader_router_id(), mle.router_id());
        assert!(mle.is_singleton());
        let adv = mle.next_outbound().unwrap();
        assert!(matches!(adv.message, MleMessage::Advertisement { .. }));
        assert!(adv.security.is_some());
        assert_eq!(mle.become_leader(&mut p, Instant::from_millis(20)), Err(Error::Already));
    }

    #[test]
    fn test_become_router_requires_child() {
        let mut p = platform();
        let mut mle = Mle::new(ThreadConfig::DEFAULT, &mut p).unwrap();
        mle.start(&mut p, 0xface, 11, Instant::ZERO).unwrap();
        assert_eq!(mle.become_router(&mut p, Instant::ZERO), Err(Error::InvalidState));
        mle.become_leader(&mut p, Instant::ZERO).unwrap();
        assert_eq!(mle.become_router(&mut p, Instant::ZERO), Err(Error::InvalidState));
    }

    #[test]
    fn test_end_device_cannot_lead() {
        let mut p = platform();
        let mut mle = Mle::new(ThreadConfig::END_DEVICE, &mut p).unwrap();
        mle.start(&mut p, 0xface, 11, Instant::ZERO).unwrap();
        assert_eq!(mle.become_leader(&mut p, Instant::ZERO), Err(Error::InvalidState));
    }
}
