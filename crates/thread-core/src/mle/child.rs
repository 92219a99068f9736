// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Parent/child link maintenance
//!
//! Both ends of the link live here: the parent answering Parent Requests,
//! admitting children and refreshing them on Child Update Requests, and the
//! child keeping its parent alive and detaching when it goes silent.

use thread_common::config::DeviceModeConfig;
use thread_common::constants::{CHILD_ID_MASK, INVALID_RLOC16, MAX_ROUTE_COST};
use thread_common::{log_debug, log_info, log_warn, Deadline, Error, Millis, Result};

use super::{random_challenge, AttachMode, Mle, Role};
use crate::key_manager::{Challenge, ResponseTag};
use crate::leader::LeaderData;
use crate::message::{Connectivity, Destination, MleFrame, MleMessage, ScanMask};
use crate::neighbor::Neighbor;
use crate::notifier::ChangedFlags;
use crate::platform::Platform;

const LOG_MODULE: &str = "child";

impl Mle {
    // ------------------------------------------------------------------------
    // Child side
    // ------------------------------------------------------------------------

    pub(super) fn process_child(&mut self, platform: &mut dyn Platform) -> Result<()> {
        let timeout = Millis::from_secs(self.child_timeout_secs);
        let Some(parent) = self.neighbors.parent().map(|p| (p.ext_address, p.last_heard)) else {
            return self.detach(platform, AttachMode::Any, None);
        };
        let (parent_ext, last_heard) = parent;
        if last_heard.has_elapsed(self.now, timeout) {
            log_warn!(self.logs, self.now.as_millis(), LOG_MODULE, "parent {} timed out", parent_ext);
            return self.detach(platform, AttachMode::Any, None);
        }

        if self.attach.keepalive.is_some_and(|d| d.is_expired(self.now)) {
            self.attach.keepalive = Some(Deadline::new(self.now, timeout.half()));
            self.send(
                platform,
                Destination::Unicast(parent_ext),
                MleMessage::ChildUpdateRequest {
                    mode: self.config.mode,
                    timeout_secs: self.child_timeout_secs,
                },
            )?;
        }
        self.process_router_upgrade(platform)
    }

    pub(super) fn handle_child_update_response(
        &mut self,
        platform: &mut dyn Platform,
        frame: &MleFrame,
        rssi: i8,
        accepted: bool,
        leader_data: &LeaderData,
    ) -> Result<()> {
        if self.role != Role::Child || self.neighbors.parent().map(|p| p.ext_address) != Some(frame.source) {
            return Ok(());
        }
        if !accepted {
            log_warn!(self.logs, self.now.as_millis(), LOG_MODULE, "parent no longer knows us");
            return self.detach(platform, AttachMode::Any, None);
        }
        let now = self.now;
        if let Some(parent) = self.neighbors.parent_mut() {
            parent.heard(rssi, now);
        }
        if self.leader.merge_versions(leader_data) {
            self.changed.insert(ChangedFlags::LEADER_DATA);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Parent side
    // ------------------------------------------------------------------------

    /// Link summary sent in Parent Responses
    fn connectivity(&self) -> Connectivity {
        let mut c = Connectivity {
            id_sequence: self.routes.id_sequence(),
            active_routers: self.routes.active_count(),
            ..Connectivity::default()
        };
        for router in self.neighbors.routers() {
            match router.two_way_link_quality() {
                3 => c.link_quality_3 = c.link_quality_3.saturating_add(1),
                2 => c.link_quality_2 = c.link_quality_2.saturating_add(1),
                1 => c.link_quality_1 = c.link_quality_1.saturating_add(1),
                _ => {}
            }
        }
        c.leader_cost = match self.role {
            Role::Leader => 0,
            Role::Router => self.routes.cost_to(self.leader.leader_router_id()),
            _ => MAX_ROUTE_COST,
        };
        c
    }

    pub(super) fn handle_parent_request(
        &mut self,
        platform: &mut dyn Platform,
        frame: &MleFrame,
        rssi: i8,
        scan_mask: ScanMask,
        challenge: &Challenge,
        mode: DeviceModeConfig,
    ) -> Result<()> {
        let answering = match self.role {
            Role::Router | Role::Leader => scan_mask.routers && self.neighbors.has_child_capacity(),
            Role::Child => {
                scan_mask.reeds
                    && self.config.is_router_eligible()
                    && self.router.solicit.is_none()
                    && self.router.pending_child.is_none()
            }
            Role::Disabled | Role::Detached => false,
        };
        if !answering {
            return Ok(());
        }
        log_debug!(
            self.logs,
            self.now.as_millis(),
            LOG_MODULE,
            "parent request from {} (rssi {}, ftd {})",
            frame.source,
            rssi,
            mode.full_thread_device
        );

        let response = self.keys.response_tag(
            self.keys.key_sequence(),
            challenge,
            &self.ext_address,
            platform.key_store(),
        )?;
        let issued = random_challenge(platform)?;
        self.router.remember_challenge(frame.source, issued);
        let connectivity = self.connectivity();
        let leader_data = *self.leader.last_known();
        self.send(
            platform,
            Destination::Unicast(frame.source),
            MleMessage::ParentResponse {
                response,
                challenge: issued,
                leader_data,
                connectivity,
            },
        )
    }

    pub(super) fn handle_child_id_request(
        &mut self,
        platform: &mut dyn Platform,
        frame: &MleFrame,
        rssi: i8,
        response: &ResponseTag,
        mode: DeviceModeConfig,
        timeout_secs: u32,
    ) -> Result<()> {
        if matches!(self.role, Role::Disabled | Role::Detached) {
            return Ok(());
        }
        let Some(issued) = self.router.take_challenge(&frame.source) else {
            return Ok(());
        };
        let verified = self.keys.verify_response_tag(
            frame.key_sequence,
            &issued,
            &frame.source,
            response,
            platform.key_store(),
        );
        match verified {
            Ok(()) => {}
            Err(Error::Security) => {
                self.counters.security_rejections = self.counters.security_rejections.saturating_add(1);
                log_warn!(
                    self.logs,
                    self.now.as_millis(),
                    LOG_MODULE,
                    "child id request from {} failed tag check",
                    frame.source
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let mut child = Neighbor::new(frame.source, INVALID_RLOC16, rssi, self.now);
        child.mode = mode;
        child.timeout = Millis::from_secs(timeout_secs);

        if self.role.is_router_or_leader() {
            return self.admit_child(platform, child);
        }
        // router-eligible end device: take the router role first
        self.router.pending_child = Some(child);
        match self.request_router_id(platform) {
            Err(Error::Busy) => Ok(()),
            other => other,
        }
    }

    pub(super) fn admit_child(&mut self, platform: &mut dyn Platform, child: Neighbor) -> Result<()> {
        let own = self.rloc16;
        let ext_address = child.ext_address;
        let rloc16 = self
            .neighbors
            .add_child(child, |slot| own | u16::try_from(slot + 1).unwrap_or(CHILD_ID_MASK))?;
        self.changed.insert(ChangedFlags::CHILD_ADDED);
        log_info!(
            self.logs,
            self.now.as_millis(),
            LOG_MODULE,
            "child {} admitted as 0x{:04x}",
            ext_address,
            rloc16
        );
        let leader_data = *self.leader.last_known();
        self.send(
            platform,
            Destination::Unicast(ext_address),
            MleMessage::ChildIdResponse {
                rloc16,
                leader_data,
                id_sequence: self.routes.id_sequence(),
                allocated: self.routes.allocated(),
            },
        )
    }

    pub(super) fn handle_child_update_request(
        &mut self,
        platform: &mut dyn Platform,
        frame: &MleFrame,
        rssi: i8,
        mode: DeviceModeConfig,
        timeout_secs: u32,
    ) -> Result<()> {
        if !self.role.is_router_or_leader() {
            return Ok(());
        }
        let now = self.now;
        let accepted = match self.neighbors.child_mut(&frame.source) {
            Some(child) => {
                child.heard(rssi, now);
                child.mode = mode;
                child.timeout = Millis::from_secs(timeout_secs);
                true
            }
            None => false,
        };
        let leader_data = *self.leader.last_known();
        self.send(
            platform,
            Destination::Unicast(frame.source),
            MleMessage::ChildUpdateResponse {
                accepted,
                leader_data,
                timeout_secs,
            },
        )
    }

    /// Drop children whose supervision timeout passed
    pub(super) fn evict_children(&mut self) {
        let removed = self.neighbors.evict_expired_children(self.now);
        if removed > 0 {
            self.changed.insert(ChangedFlags::CHILD_REMOVED);
            log_info!(self.logs, self.now.as_millis(), LOG_MODULE, "{} children timed out", removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SoftwarePlatform;
    use thread_common::{Eui64, ExtAddress, Instant, ThreadConfig};

    fn leader() -> (SoftwarePlatform, Mle) {
        let mut p = SoftwarePlatform::new(Eui64::new([0x20, 0, 0, 0, 0, 0, 0, 1]), &[0x33; 32]).unwrap();
        let mut mle = Mle::new(ThreadConfig::DEFAULT, &mut p).unwrap();
        mle.start(&mut p, 0xface, 11, Instant::ZERO).unwrap();
        mle.become_leader(&mut p, Instant::ZERO).unwrap();
        while mle.next_outbound().is_some() {}
        (p, mle)
    }

    fn request(source: ExtAddress, message: MleMessage) -> MleFrame {
        MleFrame {
            channel: 11,
            pan_id: 0xface,
            source,
            source_rloc16: INVALID_RLOC16,
            destination: Destination::Broadcast,
            key_sequence: 0,
            security: None,
            message,
        }
    }

    #[test]
    fn test_leader_answers_parent_request() {
        let (mut p, mut mle) = leader();
        let child = ExtAddress::new([9; 8]);
        let frame = request(
            child,
            MleMessage::ParentRequest {
                scan_mask: ScanMask::ROUTERS,
                challenge: [4; 8],
                mode: DeviceModeConfig::DEFAULT,
            },
        );
        mle.handle_frame(&mut p, &frame, -50, Instant::from_millis(5));

        let reply = mle.next_outbound().unwrap();
        assert_eq!(reply.destination, Destination::Unicast(child));
        let sequence = reply.key_sequence;
        let MleMessage::ParentResponse {
            response,
            connectivity,
            ..
        } = reply.message
        else {
            panic!("expected a parent response");
        };
        assert_eq!(connectivity.leader_cost, 0);
        assert_eq!(connectivity.active_routers, 1);
        let own = mle.ext_address();
        assert!(mle
            .keys()
            .verify_response_tag(sequence, &[4; 8], &own, &response, p.key_store())
            .is_ok());
    }

    #[test]
    fn test_child_id_request_needs_issued_challenge() {
        let (mut p, mut mle) = leader();
        let frame = request(
            ExtAddress::new([9; 8]),
            MleMessage::ChildIdRequest {
                response: [0; 8],
                mode: DeviceModeConfig::DEFAULT,
                timeout_secs: 240,
            },
        );
        mle.handle_frame(&mut p, &frame, -50, Instant::from_millis(5));
        assert!(mle.next_outbound().is_none());
        assert_eq!(mle.neighbors().child_count(), 0);
    }

    #[test]
    fn test_forged_child_id_request_rejected() {
        let (mut p, mut mle) = leader();
        let child = ExtAddress::new([9; 8]);
        let parent_request = request(
            child,
            MleMessage::ParentRequest {
                scan_mask: ScanMask::ROUTERS,
                challenge: [4; 8],
                mode: DeviceModeConfig::DEFAULT,
            },
        );
        mle.handle_frame(&mut p, &parent_request, -50, Instant::from_millis(5));
        while mle.next_outbound().is_some() {}

        let forged = request(
            child,
            MleMessage::ChildIdRequest {
                response: [0xee; 8],
                mode: DeviceModeConfig::DEFAULT,
                timeout_secs: 240,
            },
        );
        let before = mle.counters().security_rejections;
        mle.handle_frame(&mut p, &forged, -50, Instant::from_millis(6));
        assert_eq!(mle.counters().security_rejections, before + 1);
        assert_eq!(mle.neighbors().child_count(), 0);
        assert!(mle.next_outbound().is_none());
    }

    #[test]
    fn test_unknown_child_update_is_refused() {
        let (mut p, mut mle) = leader();
        let stranger = ExtAddress::new([3; 8]);
        let mut frame = request(
            stranger,
            MleMessage::ChildUpdateRequest {
                mode: DeviceModeConfig::DEFAULT,
                timeout_secs: 240,
            },
        );
        frame.destination = Destination::Unicast(mle.ext_address());
        let authenticated = frame.authenticated_data(1).unwrap();
        frame.security = Some(crate::message::FrameSecurity {
            frame_counter: 1,
            mic: mle.keys().frame_mic(0, &authenticated, p.key_store()).unwrap(),
        });
        mle.handle_frame(&mut p, &frame, -50, Instant::from_millis(5));

        let reply = mle.next_outbound().unwrap();
        assert!(matches!(
            reply.message,
            MleMessage::ChildUpdateResponse { accepted: false, .. }
        ));
    }
}
