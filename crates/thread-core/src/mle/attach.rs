// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Child-side attach procedure
//!
//! ```text
//! Detached                                   Parent
//!    |  --- Parent Request (routers) ----->    |   phase 1
//!    |  --- Parent Request (+REEDs) ------>    |   phase 2, if phase 1 found nothing
//!    |  <-- Parent Response (tag, challenge)   |
//!    |  --- Child ID Request (tag) ------->    |   best candidate only
//!    |  <-- Child ID Response (RLOC16) ----    |
//!  Child
//! ```
//!
//! Candidates are ranked by path cost to the leader, then link quality, then
//! RSSI. A response whose tag does not prove possession of the MLE key is
//! dropped; the attempt ends as a security failure only when both windows
//! close without a candidate and such a response was seen.

use core::cmp::Ordering;
use core::fmt;

use thread_common::config::AttachConfig;
use thread_common::constants::MAX_ROUTE_COST;
use thread_common::{is_router_rloc16, log_info, log_warn, Deadline, Error, Instant, Millis, Result};

use super::{random_challenge, Mle, ParentResponseInfo, Role};
use crate::key_manager::{Challenge, ResponseTag};
use crate::leader::LeaderData;
use crate::message::{Connectivity, Destination, MleFrame, MleMessage, ScanMask};
use crate::neighbor::{link_cost, link_margin_from_rssi, link_quality_from_margin, Neighbor};
use crate::notifier::ChangedFlags;
use crate::platform::Platform;
use crate::route::RouterMask;

const LOG_MODULE: &str = "attach";

/// Parent Request phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachPhase {
    /// Only active routers are asked
    Routers,
    /// Routers and router-eligible end devices are asked
    RoutersAndReeds,
}

/// Which partitions an attach attempt accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachMode {
    /// Any partition
    Any,
    /// Only a partition better than the one just left
    BetterPartition,
}

/// Why an attach attempt ended without a parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachFailure {
    /// No usable Parent Response in either phase
    NoParent,
    /// No parent found, and at least one Parent Response failed its tag
    /// check (network key mismatch)
    SecurityFailure,
    /// The chosen parent did not answer the Child ID Request
    NoChildIdResponse,
}

impl fmt::Display for AttachFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoParent => write!(f, "no parent"),
            Self::SecurityFailure => write!(f, "security failure"),
            Self::NoChildIdResponse => write!(f, "no child id response"),
        }
    }
}

/// Attach procedure state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    /// Not attaching
    Idle,
    /// Backing off before the next attempt
    Waiting,
    /// Collecting Parent Responses
    ParentRequest(AttachPhase),
    /// Waiting for the Child ID Response
    ChildIdRequest,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    challenge: Challenge,
    key_sequence: u32,
    leader_data: LeaderData,
    path_cost: u8,
    link_quality: u8,
    rssi: i8,
}

impl Candidate {
    fn rank(&self, other: &Self) -> Ordering {
        other
            .path_cost
            .cmp(&self.path_cost)
            .then(self.link_quality.cmp(&other.link_quality))
            .then(self.rssi.cmp(&other.rssi))
    }
}

pub(super) struct Attach {
    pub(super) state: AttachState,
    deadline: Deadline,
    mode: AttachMode,
    challenge: Challenge,
    candidate: Option<Candidate>,
    rejected_responses: u16,
    failed_attempts: u8,
    backoff: Millis,
    pub(super) target: Option<LeaderData>,
    pub(super) last_failure: Option<AttachFailure>,
    pub(super) keepalive: Option<Deadline>,
}

impl Attach {
    pub(super) const fn new(config: &AttachConfig) -> Self {
        Self {
            state: AttachState::Idle,
            deadline: Deadline::new(Instant::ZERO, Millis::ZERO),
            mode: AttachMode::Any,
            challenge: [0; 8],
            candidate: None,
            rejected_responses: 0,
            failed_attempts: 0,
            backoff: config.attach_backoff_min,
            target: None,
            last_failure: None,
            keepalive: None,
        }
    }

    /// Forget any attempt in flight and restart the backoff sequence
    pub(super) fn reset(&mut self, config: &AttachConfig) {
        self.state = AttachState::Idle;
        self.mode = AttachMode::Any;
        self.candidate = None;
        self.rejected_responses = 0;
        self.failed_attempts = 0;
        self.backoff = config.attach_backoff_min;
        self.target = None;
    }

    pub(super) const fn is_running(&self) -> bool {
        matches!(
            self.state,
            AttachState::ParentRequest(_) | AttachState::ChildIdRequest
        )
    }
}

impl Mle {
    /// Start (or restart) the attach procedure
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` when Disabled; `Error::Busy` while an attempt
    /// is collecting responses.
    pub fn become_child(&mut self, platform: &mut dyn Platform, now: Instant) -> Result<()> {
        self.now = now;
        if self.role == Role::Disabled {
            return Err(Error::InvalidState);
        }
        if self.attach.is_running() {
            return Err(Error::Busy);
        }
        self.attach.reset(&self.config.attach);
        self.begin_attach(platform, AttachMode::Any)
    }

    pub(super) fn begin_attach(&mut self, platform: &mut dyn Platform, mode: AttachMode) -> Result<()> {
        self.attach.mode = mode;
        self.attach.candidate = None;
        self.attach.rejected_responses = 0;
        self.neighbors.clear_parent_candidate();
        self.counters.attach_attempts = self.counters.attach_attempts.saturating_add(1);
        log_info!(
            self.logs,
            self.now.as_millis(),
            LOG_MODULE,
            "attach attempt {} ({:?})",
            self.attach.failed_attempts + 1,
            mode
        );
        self.send_parent_request(platform, AttachPhase::Routers)
    }

    fn send_parent_request(&mut self, platform: &mut dyn Platform, phase: AttachPhase) -> Result<()> {
        let (scan_mask, window) = match phase {
            AttachPhase::Routers => (ScanMask::ROUTERS, self.config.attach.parent_request_router_timeout),
            AttachPhase::RoutersAndReeds => (
                ScanMask::ROUTERS_AND_REEDS,
                self.config.attach.parent_request_reed_timeout,
            ),
        };
        let challenge = random_challenge(platform)?;
        self.attach.challenge = challenge;
        self.attach.state = AttachState::ParentRequest(phase);
        self.attach.deadline = Deadline::new(self.now, window);
        self.send(
            platform,
            Destination::Broadcast,
            MleMessage::ParentRequest {
                scan_mask,
                challenge,
                mode: self.config.mode,
            },
        )
    }

    pub(super) fn process_attach(&mut self, platform: &mut dyn Platform) -> Result<()> {
        if !self.attach.deadline.is_expired(self.now) {
            return Ok(());
        }
        match self.attach.state {
            AttachState::Idle => Ok(()),
            AttachState::Waiting => {
                self.attach.state = AttachState::Idle;
                let mode = self.attach.mode;
                self.begin_attach(platform, mode)
            }
            AttachState::ParentRequest(phase) => {
                if self.attach.candidate.is_some() {
                    self.send_child_id_request(platform)
                } else if phase == AttachPhase::Routers {
                    self.send_parent_request(platform, AttachPhase::RoutersAndReeds)
                } else if self.attach.rejected_responses > 0 {
                    self.attach_failed(platform, AttachFailure::SecurityFailure)
                } else {
                    self.attach_failed(platform, AttachFailure::NoParent)
                }
            }
            AttachState::ChildIdRequest => self.attach_failed(platform, AttachFailure::NoChildIdResponse),
        }
    }

    fn attach_failed(&mut self, platform: &mut dyn Platform, reason: AttachFailure) -> Result<()> {
        self.attach.last_failure = Some(reason);
        self.attach.failed_attempts = self.attach.failed_attempts.saturating_add(1);
        self.attach.candidate = None;
        self.neighbors.clear_parent_candidate();
        log_warn!(
            self.logs,
            self.now.as_millis(),
            LOG_MODULE,
            "attach attempt {} failed: {}",
            self.attach.failed_attempts,
            reason
        );

        if self.role.is_attached() {
            // a re-attach from an attached role simply keeps the current one
            self.attach.state = AttachState::Idle;
            return Ok(());
        }
        if self.attach.mode == AttachMode::BetterPartition {
            self.attach.mode = AttachMode::Any;
            self.attach.target = None;
        }
        if self.config.is_router_eligible()
            && self.attach.failed_attempts >= self.config.attach.max_attach_attempts
        {
            log_info!(self.logs, self.now.as_millis(), LOG_MODULE, "no partition found, starting one");
            return self.become_leader(platform, self.now);
        }

        self.attach.state = AttachState::Waiting;
        self.attach.deadline = Deadline::new(self.now, self.attach.backoff);
        self.attach.backoff = self
            .attach
            .backoff
            .doubled_up_to(self.config.attach.attach_backoff_max);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn handle_parent_response(
        &mut self,
        platform: &mut dyn Platform,
        frame: &MleFrame,
        rssi: i8,
        response: &ResponseTag,
        challenge: &Challenge,
        leader_data: &LeaderData,
        connectivity: &Connectivity,
    ) -> Result<()> {
        let AttachState::ParentRequest(phase) = self.attach.state else {
            return Ok(());
        };
        let verified = self.keys.verify_response_tag(
            frame.key_sequence,
            &self.attach.challenge,
            &frame.source,
            response,
            platform.key_store(),
        );
        match verified {
            Ok(()) => {}
            Err(Error::Security) => {
                // dropped; other responses may still arrive in this window
                self.counters.security_rejections = self.counters.security_rejections.saturating_add(1);
                self.attach.rejected_responses = self.attach.rejected_responses.saturating_add(1);
                log_warn!(
                    self.logs,
                    self.now.as_millis(),
                    LOG_MODULE,
                    "parent response from {} failed tag check",
                    frame.source
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        if phase == AttachPhase::Routers && !is_router_rloc16(frame.source_rloc16) {
            return Ok(());
        }
        if self.attach.mode == AttachMode::BetterPartition {
            let better = self
                .attach
                .target
                .as_ref()
                .map_or(true, |target| leader_data.is_better_partition_than(target));
            if !better {
                return Ok(());
            }
        }

        if let Some((callback, context)) = self.parent_response_callback {
            let info = ParentResponseInfo {
                ext_address: frame.source,
                rloc16: frame.source_rloc16,
                rssi,
                priority: connectivity.parent_priority,
                link_quality_3: connectivity.link_quality_3,
                link_quality_2: connectivity.link_quality_2,
                link_quality_1: connectivity.link_quality_1,
                is_attached: self.role.is_attached(),
            };
            callback(&info, context);
        }

        let link_quality = link_quality_from_margin(link_margin_from_rssi(rssi));
        let candidate = Candidate {
            challenge: *challenge,
            key_sequence: frame.key_sequence,
            leader_data: *leader_data,
            path_cost: connectivity
                .leader_cost
                .saturating_add(link_cost(link_quality))
                .min(MAX_ROUTE_COST),
            link_quality,
            rssi,
        };
        let replace = self
            .attach
            .candidate
            .as_ref()
            .map_or(true, |current| candidate.rank(current) == Ordering::Greater);
        if replace {
            let mut record = Neighbor::new(frame.source, frame.source_rloc16, rssi, self.now);
            record.link_quality_out = link_quality;
            self.neighbors.set_parent_candidate(record);
            self.attach.candidate = Some(candidate);
        }
        Ok(())
    }

    fn send_child_id_request(&mut self, platform: &mut dyn Platform) -> Result<()> {
        let (Some(candidate), Some(parent)) = (self.attach.candidate, self.neighbors.parent_candidate()) else {
            return self.attach_failed(platform, AttachFailure::NoParent);
        };
        let parent_ext = parent.ext_address;
        let response = self.keys.response_tag(
            candidate.key_sequence,
            &candidate.challenge,
            &self.ext_address,
            platform.key_store(),
        )?;
        self.attach.state = AttachState::ChildIdRequest;
        self.attach.deadline = Deadline::new(self.now, self.config.attach.child_id_request_timeout);
        log_info!(self.logs, self.now.as_millis(), LOG_MODULE, "requesting child id from {}", parent_ext);
        self.send_with_sequence(
            platform,
            Destination::Unicast(parent_ext),
            MleMessage::ChildIdRequest {
                response,
                mode: self.config.mode,
                timeout_secs: self.child_timeout_secs,
            },
            candidate.key_sequence,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn handle_child_id_response(
        &mut self,
        platform: &mut dyn Platform,
        frame: &MleFrame,
        rssi: i8,
        rloc16: u16,
        leader_data: LeaderData,
        id_sequence: u8,
        allocated: RouterMask,
    ) -> Result<()> {
        if self.attach.state != AttachState::ChildIdRequest {
            return Ok(());
        }
        if self.neighbors.parent_candidate().map(|c| c.ext_address) != Some(frame.source) {
            return Ok(());
        }

        if frame.key_sequence != self.keys.key_sequence() {
            self.keys
                .set_key_sequence(frame.key_sequence, self.now, platform.key_store())?;
            self.changed.insert(ChangedFlags::KEY_SEQUENCE);
        }

        let previous_parent = self.last_parent.map(|p| p.ext_address);
        if self.role.is_router_or_leader() {
            // re-attaching from a routing role drops everything it routed for
            if self.neighbors.child_count() > 0 {
                self.changed.insert(ChangedFlags::CHILD_REMOVED);
            }
            self.neighbors.clear_routers();
            self.neighbors.clear_children();
            self.router.reset();
            self.changed.insert(ChangedFlags::ROUTER_NEIGHBORS);
        }
        if let Some(old) = self.neighbors.take_parent() {
            self.last_parent = Some(old);
        }
        if let Some(candidate) = self.neighbors.parent_candidate_mut() {
            candidate.heard(rssi, self.now);
            candidate.timeout = Millis::from_secs(self.child_timeout_secs);
        }
        let parent = *self.neighbors.promote_candidate(self.now)?;
        self.last_parent = Some(parent);

        self.set_rloc16(rloc16);
        self.apply_leader_data(leader_data);
        self.routes.clear();
        self.routes.set_allocation(id_sequence, allocated);
        self.attach.reset(&self.config.attach);
        self.attach.last_failure = None;
        self.attach.keepalive = Some(Deadline::new(
            self.now,
            Millis::from_secs(self.child_timeout_secs).half(),
        ));
        self.set_role(Role::Child);

        if previous_parent != Some(parent.ext_address) {
            self.counters.parent_changes = self.counters.parent_changes.saturating_add(1);
            self.changed.insert(ChangedFlags::PARENT);
        }
        log_info!(
            self.logs,
            self.now.as_millis(),
            LOG_MODULE,
            "attached to {} as 0x{:04x}, partition 0x{:08x}",
            parent.ext_address,
            rloc16,
            leader_data.partition_id
        );
        self.persist(platform);
        self.schedule_router_upgrade(platform)
    }
}
