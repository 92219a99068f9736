// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Mesh Link Establishment: the role state machine
//!
//! [`Mle`] owns the device role and every piece of state that changes with
//! it: key manager, neighbor table, router table, leader data, attach
//! procedure and router-side bookkeeping. It is driven by three kinds of
//! events:
//!
//! - API calls (`start`, `stop`, `become_*`)
//! - received frames (`handle_frame`)
//! - timer evaluation (`process`)
//!
//! Outbound frames land in a bounded outbox drained by the radio glue.
//!
//! # Role transitions
//!
//! ```text
//!   Disabled --start--> Detached --attach--> Child --solicit--> Router
//!                          |                                      |
//!                          +--attach attempts exhausted--> Leader <+
//! ```
//!
//! Detached is reachable from every enabled role; Disabled from every role.
//!
//! The submodules split the work: `attach` runs the child-side attach
//! procedure, `child` handles child supervision on both ends of the link and
//! `router` covers router and leader duties.

mod attach;
mod child;
mod router;

use core::fmt;

use thread_common::config::{DeviceModeConfig, ThreadConfig};
use thread_common::constants::{DEFAULT_CHANNEL, DEFAULT_PAN_ID, INVALID_RLOC16, INVALID_RSSI};
use thread_common::log::{LogBuffer, LogLevel};
use thread_common::{
    log_debug, log_info, log_warn, router_id_from_rloc16, Error, ExtAddress, Instant,
    InterfaceIdentifier, Millis, Result,
};

use crate::counters::{Ip6Counters, MleCounters};
use crate::key_manager::{KeyManager, KeySequenceCheck};
use crate::leader::{LeaderData, LeaderDataTracker};
use crate::message::{Destination, FrameSecurity, MleFrame, MleMessage, Outbox};
use crate::neighbor::{Neighbor, NeighborInfo, NeighborIterator, NeighborTable};
use crate::notifier::ChangedFlags;
use crate::platform::Platform;
use crate::route::RouterTable;
use crate::settings::NetworkInfo;

pub use attach::{AttachFailure, AttachMode, AttachPhase, AttachState};

use attach::Attach;
use router::RouterState;

const LOG_MODULE: &str = "mle";

// ============================================================================
// Public Types
// ============================================================================

/// Device role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Protocol stopped
    Disabled,
    /// Enabled but not attached to a partition
    Detached,
    /// Attached through a parent
    Child,
    /// Active router
    Router,
    /// Partition leader
    Leader,
}

impl Role {
    /// Child, Router or Leader
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        matches!(self, Self::Child | Self::Router | Self::Leader)
    }

    /// Router or Leader
    #[must_use]
    pub const fn is_router_or_leader(&self) -> bool {
        matches!(self, Self::Router | Self::Leader)
    }

    /// Lower-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Detached => "detached",
            Self::Child => "child",
            Self::Router => "router",
            Self::Leader => "leader",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic record of one Parent Response seen while attaching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentResponseInfo {
    /// Responder's extended address
    pub ext_address: ExtAddress,
    /// Responder's short address
    pub rloc16: u16,
    /// Received signal strength
    pub rssi: i8,
    /// Parent priority the responder advertises
    pub priority: i8,
    /// Responder's neighbors with link quality 3
    pub link_quality_3: u8,
    /// Responder's neighbors with link quality 2
    pub link_quality_2: u8,
    /// Responder's neighbors with link quality 1
    pub link_quality_1: u8,
    /// This device was attached when the response arrived
    pub is_attached: bool,
}

/// Parent Response observer; the `usize` is the registered context
pub type ParentResponseCallback = fn(&ParentResponseInfo, usize);

/// Public view of the parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentInfo {
    /// Parent's extended address
    pub ext_address: ExtAddress,
    /// Parent's short address
    pub rloc16: u16,
    /// Parent's router ID
    pub router_id: u8,
    /// Inbound link quality
    pub link_quality_in: u8,
    /// Outbound link quality
    pub link_quality_out: u8,
    /// Average RSSI
    pub average_rssi: i8,
    /// Last RSSI
    pub last_rssi: i8,
    /// Seconds since last heard
    pub age_secs: u32,
    /// Record describes a live link (false for a remembered former parent)
    pub link_established: bool,
}

impl ParentInfo {
    fn from_neighbor(n: &Neighbor, now: Instant, link_established: bool) -> Self {
        Self {
            ext_address: n.ext_address,
            rloc16: n.rloc16,
            router_id: n.router_id(),
            link_quality_in: n.link.link_quality_in(),
            link_quality_out: n.link_quality_out,
            average_rssi: n.link.average_rssi(),
            last_rssi: n.link.last_rssi(),
            age_secs: n.age_secs(now),
            link_established,
        }
    }
}

// ============================================================================
// Role State Machine
// ============================================================================

/// Role state machine and the state it owns
pub struct Mle {
    config: ThreadConfig,
    role: Role,
    now: Instant,
    ext_address: ExtAddress,
    rloc16: u16,
    pan_id: u16,
    channel: u8,
    ml_eid_iid: InterfaceIdentifier,
    previous_partition_id: u32,
    previous_router_id: Option<u8>,
    child_timeout_secs: u32,

    keys: KeyManager,
    neighbors: NeighborTable,
    routes: RouterTable,
    leader: LeaderDataTracker,
    attach: Attach,
    router: RouterState,
    last_parent: Option<Neighbor>,
    parent_response_callback: Option<(ParentResponseCallback, usize)>,

    outbox: Outbox,
    logs: LogBuffer,
    counters: MleCounters,
    ip6_counters: Ip6Counters,
    changed: ChangedFlags,
}

impl Mle {
    /// Create a disabled state machine
    ///
    /// # Errors
    ///
    /// Propagates key store and key derivation failures.
    pub fn new(config: ThreadConfig, platform: &mut dyn Platform) -> Result<Self> {
        let keys = KeyManager::new(&config.keys, platform.key_store())?;
        Ok(Self {
            config,
            role: Role::Disabled,
            now: Instant::ZERO,
            ext_address: platform.ext_address(),
            rloc16: INVALID_RLOC16,
            pan_id: DEFAULT_PAN_ID,
            channel: DEFAULT_CHANNEL,
            ml_eid_iid: InterfaceIdentifier::default(),
            previous_partition_id: 0,
            previous_router_id: None,
            child_timeout_secs: config.child.timeout_secs,
            keys,
            neighbors: NeighborTable::new(),
            routes: RouterTable::new(),
            leader: LeaderDataTracker::new(),
            attach: Attach::new(&config.attach),
            router: RouterState::new(),
            last_parent: None,
            parent_response_callback: None,
            outbox: Outbox::new(),
            logs: LogBuffer::new(),
            counters: MleCounters::default(),
            ip6_counters: Ip6Counters::default(),
            changed: ChangedFlags::empty(),
        })
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Disabled -> Detached, restoring persisted state and starting attach
    ///
    /// `pan_id` and `channel` are the operating link parameters for this run.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless Disabled; storage and key failures
    /// propagate.
    pub fn start(&mut self, platform: &mut dyn Platform, pan_id: u16, channel: u8, now: Instant) -> Result<()> {
        self.now = now;
        if self.role != Role::Disabled {
            return Err(Error::InvalidState);
        }
        self.pan_id = pan_id;
        self.channel = channel;

        if let Some(info) = platform.settings().read_network_info()? {
            self.keys.restore(
                info.key_sequence,
                info.mle_frame_counter,
                info.mac_frame_counter,
                platform.key_store(),
            )?;
            self.ml_eid_iid = info.ml_eid_iid;
            self.previous_partition_id = info.previous_partition_id;
            self.previous_router_id = info.previous_router_id;
            log_debug!(self.logs, now.as_millis(), LOG_MODULE, "restored key sequence {}", info.key_sequence);
        } else {
            self.ml_eid_iid = random_iid(platform)?;
        }

        self.set_role(Role::Detached);
        self.attach.reset(&self.config.attach);
        self.begin_attach(platform, AttachMode::Any)?;
        self.persist(platform);
        Ok(())
    }

    /// Any role -> Disabled; idempotent
    pub fn stop(&mut self, platform: &mut dyn Platform, now: Instant) {
        self.now = now;
        if self.role == Role::Disabled {
            return;
        }
        if self.role == Role::Router {
            self.send_address_release(platform);
        }
        self.persist(platform);
        self.clear_topology();
        self.attach.reset(&self.config.attach);
        self.set_rloc16(INVALID_RLOC16);
        self.set_role(Role::Disabled);
    }

    /// Force Detached and restart attach
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` when Disabled.
    pub fn become_detached(&mut self, platform: &mut dyn Platform, now: Instant) -> Result<()> {
        self.now = now;
        if self.role == Role::Disabled {
            return Err(Error::InvalidState);
        }
        self.detach(platform, AttachMode::Any, None)
    }

    pub(crate) fn detach(
        &mut self,
        platform: &mut dyn Platform,
        mode: AttachMode,
        target: Option<LeaderData>,
    ) -> Result<()> {
        self.clear_topology();
        self.set_rloc16(INVALID_RLOC16);
        self.set_role(Role::Detached);
        self.attach.reset(&self.config.attach);
        self.attach.target = target;
        self.begin_attach(platform, mode)
    }

    fn clear_topology(&mut self) {
        if let Some(parent) = self.neighbors.take_parent() {
            self.last_parent = Some(parent);
        }
        if self.neighbors.router_count() > 0 {
            self.changed.insert(ChangedFlags::ROUTER_NEIGHBORS);
        }
        if self.neighbors.child_count() > 0 {
            self.changed.insert(ChangedFlags::CHILD_REMOVED);
        }
        self.neighbors.clear();
        self.routes.clear();
        self.router.reset();
        self.attach.keepalive = None;
    }

    pub(crate) fn set_role(&mut self, role: Role) {
        if self.role == role {
            return;
        }
        log_info!(self.logs, self.now.as_millis(), LOG_MODULE, "role {} -> {}", self.role, role);
        self.role = role;
        self.counters.record_role(role);
        self.changed.insert(ChangedFlags::ROLE);
    }

    pub(crate) fn set_rloc16(&mut self, rloc16: u16) {
        if self.rloc16 != rloc16 {
            self.rloc16 = rloc16;
            self.changed.insert(ChangedFlags::MESH_LOCAL_ADDRESSES);
        }
    }

    pub(crate) fn apply_leader_data(&mut self, data: LeaderData) {
        let update = self.leader.set(data);
        if update.partition_changed {
            self.counters.partition_id_changes = self.counters.partition_id_changes.saturating_add(1);
            self.changed.insert(ChangedFlags::PARTITION_ID);
            self.previous_partition_id = data.partition_id;
        }
        if update.data_changed {
            self.changed.insert(ChangedFlags::LEADER_DATA);
        }
    }

    /// Save network info; failures are logged, not fatal
    pub(crate) fn persist(&mut self, platform: &mut dyn Platform) {
        let (mle_frame_counter, mac_frame_counter) = self.keys.frame_counters_to_store();
        let info = NetworkInfo {
            key_sequence: self.keys.key_sequence(),
            mle_frame_counter,
            mac_frame_counter,
            rloc16: self.rloc16,
            ext_address: self.ext_address,
            ml_eid_iid: self.ml_eid_iid,
            previous_partition_id: self.previous_partition_id,
            previous_router_id: self.previous_router_id,
        };
        if let Err(e) = platform.settings().save_network_info(&info) {
            log_warn!(self.logs, self.now.as_millis(), LOG_MODULE, "saving network info failed: {}", e);
        }
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    /// Evaluate every timer against `now`
    pub fn process(&mut self, platform: &mut dyn Platform, now: Instant) {
        self.now = now;
        if self.role == Role::Disabled {
            return;
        }
        if let Err(e) = self.process_attach(platform) {
            log_warn!(self.logs, now.as_millis(), "attach", "timer handling failed: {}", e);
        }
        let result = match self.role {
            Role::Child => self.process_child(platform),
            Role::Router | Role::Leader => self.process_router(platform),
            Role::Disabled | Role::Detached => Ok(()),
        };
        if let Err(e) = result {
            log_warn!(self.logs, now.as_millis(), LOG_MODULE, "timer handling failed: {}", e);
        }
    }

    // ------------------------------------------------------------------------
    // Frame Reception
    // ------------------------------------------------------------------------

    fn is_addressed_to_me(&self, destination: &Destination) -> bool {
        match destination {
            Destination::Broadcast => true,
            Destination::Unicast(ext) => *ext == self.ext_address,
            Destination::Routed { next_hop, .. } => {
                self.rloc16 != INVALID_RLOC16 && *next_hop == self.rloc16
            }
        }
    }

    /// Verify integrity, freshness and key sequence of a received frame
    ///
    /// Mesh-forwarded frames skip the per-neighbor counter check: a relayed
    /// frame may arrive after later frames its sender delivered directly.
    fn check_security(&mut self, platform: &mut dyn Platform, frame: &MleFrame) -> Result<()> {
        let frame_counter = match (&frame.security, frame.message.is_secured()) {
            (Some(sec), true) => {
                let authenticated = frame.authenticated_data(sec.frame_counter)?;
                self.keys.verify_frame_mic(
                    frame.key_sequence,
                    &authenticated,
                    &sec.mic,
                    platform.key_store(),
                )?;
                sec.frame_counter
            }
            (None, true) => return Err(Error::Security),
            _ => return Ok(()),
        };
        let direct = !matches!(frame.destination, Destination::Routed { .. });
        if direct
            && !self
                .neighbors
                .is_fresh_frame(&frame.source, frame.key_sequence, frame_counter)
        {
            log_debug!(
                self.logs,
                self.now.as_millis(),
                "keys",
                "stale frame counter {} from {}",
                frame_counter,
                frame.source
            );
            return Err(Error::Security);
        }
        if !frame.message.is_attach_handshake() {
            self.check_key_sequence(platform, frame.key_sequence)?;
        }
        if direct {
            self.neighbors
                .record_frame(&frame.source, frame.key_sequence, frame_counter);
        }
        Ok(())
    }

    fn check_key_sequence(&mut self, platform: &mut dyn Platform, key_sequence: u32) -> Result<()> {
        match self
            .keys
            .accept_key_sequence(key_sequence, self.now, platform.key_store())?
        {
            KeySequenceCheck::Rejected => Err(Error::Security),
            KeySequenceCheck::Rotated => {
                log_info!(
                    self.logs,
                    self.now.as_millis(),
                    "keys",
                    "key sequence advanced to {}",
                    self.keys.key_sequence()
                );
                self.changed.insert(ChangedFlags::KEY_SEQUENCE);
                self.persist(platform);
                Ok(())
            }
            KeySequenceCheck::Current | KeySequenceCheck::Previous => Ok(()),
        }
    }

    /// Handle a received MLE frame
    ///
    /// Discovery messages are not handled here.
    pub fn handle_frame(&mut self, platform: &mut dyn Platform, frame: &MleFrame, rssi: i8, now: Instant) {
        self.now = now;
        if self.role == Role::Disabled || frame.source == self.ext_address {
            return;
        }
        if frame.message.is_discovery() || !self.is_addressed_to_me(&frame.destination) {
            return;
        }
        if let Err(e) = self.check_security(platform, frame) {
            self.ip6_counters.rx_failure = self.ip6_counters.rx_failure.saturating_add(1);
            self.counters.security_rejections = self.counters.security_rejections.saturating_add(1);
            log_debug!(
                self.logs,
                now.as_millis(),
                LOG_MODULE,
                "dropped {} from {}: {}",
                frame.message.name(),
                frame.source,
                e
            );
            return;
        }
        self.ip6_counters.rx_success = self.ip6_counters.rx_success.saturating_add(1);

        if let Destination::Routed { target_rloc16, .. } = frame.destination {
            if target_rloc16 != self.rloc16 {
                self.forward(frame, target_rloc16);
                return;
            }
        }

        let result = match &frame.message {
            MleMessage::ParentRequest {
                scan_mask,
                challenge,
                mode,
            } => self.handle_parent_request(platform, frame, rssi, *scan_mask, challenge, *mode),
            MleMessage::ParentResponse {
                response,
                challenge,
                leader_data,
                connectivity,
            } => self.handle_parent_response(
                platform,
                frame,
                rssi,
                response,
                challenge,
                leader_data,
                connectivity,
            ),
            MleMessage::ChildIdRequest {
                response,
                mode,
                timeout_secs,
            } => self.handle_child_id_request(platform, frame, rssi, response, *mode, *timeout_secs),
            MleMessage::ChildIdResponse {
                rloc16,
                leader_data,
                id_sequence,
                allocated,
            } => self.handle_child_id_response(
                platform,
                frame,
                rssi,
                *rloc16,
                *leader_data,
                *id_sequence,
                *allocated,
            ),
            MleMessage::ChildUpdateRequest { mode, timeout_secs } => {
                self.handle_child_update_request(platform, frame, rssi, *mode, *timeout_secs)
            }
            MleMessage::ChildUpdateResponse {
                accepted,
                leader_data,
                ..
            } => self.handle_child_update_response(platform, frame, rssi, *accepted, leader_data),
            MleMessage::Advertisement { leader_data, route } => {
                self.handle_advertisement(platform, frame, rssi, leader_data, route)
            }
            MleMessage::AddressSolicit {
                ext_address,
                rloc16,
                preferred_router_id,
            } => self.handle_address_solicit(platform, *ext_address, *rloc16, *preferred_router_id),
            MleMessage::AddressSolicitResponse {
                status,
                ext_address,
                router_id,
                id_sequence,
                allocated,
            } => self.handle_address_solicit_response(
                platform,
                *status,
                *ext_address,
                *router_id,
                *id_sequence,
                *allocated,
            ),
            MleMessage::AddressRelease {
                router_id,
                ext_address,
            } => {
                self.handle_address_release(*router_id, *ext_address);
                Ok(())
            }
            MleMessage::DiscoveryRequest { .. } | MleMessage::DiscoveryResponse { .. } => Ok(()),
        };
        if let Err(e) = result {
            log_warn!(
                self.logs,
                now.as_millis(),
                LOG_MODULE,
                "{} from {} failed: {}",
                frame.message.name(),
                frame.source,
                e
            );
        }
    }

    // ------------------------------------------------------------------------
    // Transmission
    // ------------------------------------------------------------------------

    pub(crate) fn send(
        &mut self,
        platform: &mut dyn Platform,
        destination: Destination,
        message: MleMessage,
    ) -> Result<()> {
        self.send_with_sequence(platform, destination, message, self.keys.key_sequence())
    }

    pub(crate) fn send_with_sequence(
        &mut self,
        platform: &mut dyn Platform,
        destination: Destination,
        message: MleMessage,
        key_sequence: u32,
    ) -> Result<()> {
        let mut frame = MleFrame {
            channel: self.channel,
            pan_id: self.pan_id,
            source: self.ext_address,
            source_rloc16: self.rloc16,
            destination,
            key_sequence,
            security: None,
            message,
        };
        if frame.message.is_secured() {
            if self.keys.next_frame_counters() {
                self.persist(platform);
            }
            let frame_counter = self.keys.mle_frame_counter();
            let authenticated = frame.authenticated_data(frame_counter)?;
            let mic = self
                .keys
                .frame_mic(key_sequence, &authenticated, platform.key_store())?;
            frame.security = Some(FrameSecurity { frame_counter, mic });
        }
        log_debug!(self.logs, self.now.as_millis(), LOG_MODULE, "send {}", frame.message.name());
        self.enqueue(frame)
    }

    /// Queue a fully built frame
    ///
    /// # Errors
    ///
    /// `Error::NoBufs` when the outbox is full.
    pub(crate) fn enqueue(&mut self, frame: MleFrame) -> Result<()> {
        match self.outbox.push(frame) {
            Ok(()) => {
                self.ip6_counters.tx_success = self.ip6_counters.tx_success.saturating_add(1);
                Ok(())
            }
            Err(e) => {
                self.ip6_counters.tx_failure = self.ip6_counters.tx_failure.saturating_add(1);
                log_warn!(self.logs, self.now.as_millis(), LOG_MODULE, "outbox full, frame dropped");
                Err(e)
            }
        }
    }

    /// Next frame for the radio
    pub fn next_outbound(&mut self) -> Option<MleFrame> {
        self.outbox.pop()
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &ThreadConfig {
        &self.config
    }

    /// Current role
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Attached as Child, Router or Leader
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.role.is_attached()
    }

    /// Router or Leader with no other active router in the partition
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.role.is_router_or_leader() && self.routes.active_count() <= 1
    }

    /// Extended address
    #[must_use]
    pub const fn ext_address(&self) -> ExtAddress {
        self.ext_address
    }

    /// Short address
    #[must_use]
    pub const fn rloc16(&self) -> u16 {
        self.rloc16
    }

    /// Router ID implied by the short address
    #[must_use]
    pub const fn router_id(&self) -> u8 {
        router_id_from_rloc16(self.rloc16)
    }

    /// Mesh-local EID interface identifier
    #[must_use]
    pub const fn ml_eid_iid(&self) -> InterfaceIdentifier {
        self.ml_eid_iid
    }

    /// Operating channel
    #[must_use]
    pub const fn channel(&self) -> u8 {
        self.channel
    }

    /// Operating PAN ID
    #[must_use]
    pub const fn pan_id(&self) -> u16 {
        self.pan_id
    }

    /// Key manager
    #[must_use]
    pub const fn keys(&self) -> &KeyManager {
        &self.keys
    }

    /// Key manager, mutable
    pub fn keys_mut(&mut self) -> &mut KeyManager {
        &mut self.keys
    }

    /// Neighbor table
    #[must_use]
    pub const fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    /// Router ID set and routes
    #[must_use]
    pub const fn routes(&self) -> &RouterTable {
        &self.routes
    }

    /// Leader data tracker
    #[must_use]
    pub const fn leader(&self) -> &LeaderDataTracker {
        &self.leader
    }

    /// Leader data of the current partition
    ///
    /// # Errors
    ///
    /// `Error::Detached` unless attached.
    pub fn leader_data(&self) -> Result<LeaderData> {
        self.leader.get(self.is_attached())
    }

    /// Leader bumps the network data versions
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless Leader.
    pub fn increment_network_data_version(&mut self, stable: bool) -> Result<()> {
        if self.role != Role::Leader {
            return Err(Error::InvalidState);
        }
        self.leader.increment_data_version(stable);
        self.changed.insert(ChangedFlags::LEADER_DATA);
        Ok(())
    }

    /// Parent information
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless Child. Reference device builds report the
    /// last parent in any role, `Error::NotFound` if there never was one.
    pub fn parent_info(&self) -> Result<ParentInfo> {
        if self.role == Role::Child {
            if let Some(parent) = self.neighbors.parent() {
                return Ok(ParentInfo::from_neighbor(parent, self.now, true));
            }
        }
        if !self.config.reference_device {
            return Err(Error::InvalidState);
        }
        self.last_parent
            .as_ref()
            .map(|p| ParentInfo::from_neighbor(p, self.now, false))
            .ok_or(Error::NotFound)
    }

    fn parent_rssi(&self, pick: impl Fn(&Neighbor) -> i8) -> Result<i8> {
        let rssi = self.neighbors.parent().map(pick).ok_or(Error::Failed)?;
        if rssi == INVALID_RSSI {
            return Err(Error::Failed);
        }
        Ok(rssi)
    }

    /// Average RSSI from the parent
    ///
    /// # Errors
    ///
    /// `Error::Failed` when there is no parent or no measurement.
    pub fn parent_average_rssi(&self) -> Result<i8> {
        self.parent_rssi(|p| p.link.average_rssi())
    }

    /// Last RSSI from the parent
    ///
    /// # Errors
    ///
    /// `Error::Failed` when there is no parent or no measurement.
    pub fn parent_last_rssi(&self) -> Result<i8> {
        self.parent_rssi(|p| p.link.last_rssi())
    }

    /// Advance a neighbor enumeration
    ///
    /// # Errors
    ///
    /// `Error::NotFound` at the end of the enumeration.
    pub fn next_neighbor_info(&self, iter: &mut NeighborIterator) -> Result<NeighborInfo> {
        self.neighbors.next_neighbor(iter, self.now)
    }

    /// Child supervision timeout in seconds
    #[must_use]
    pub const fn child_timeout(&self) -> u32 {
        self.child_timeout_secs
    }

    /// Change the child supervision timeout; applies on the next evaluation
    pub fn set_child_timeout(&mut self, timeout_secs: u32) {
        self.child_timeout_secs = timeout_secs;
        if let Some(parent) = self.neighbors.parent_mut() {
            parent.timeout = Millis::from_secs(timeout_secs);
        }
    }

    /// Device mode advertised to parents and children
    #[must_use]
    pub const fn link_mode(&self) -> DeviceModeConfig {
        self.config.mode
    }

    /// Change the device mode
    ///
    /// A child reports the new mode to its parent right away. A router or
    /// leader that stops being a full Thread device re-attaches as a child.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgs` for a full Thread device with its receiver off.
    pub fn set_link_mode(&mut self, platform: &mut dyn Platform, mode: DeviceModeConfig, now: Instant) -> Result<()> {
        self.now = now;
        if mode.full_thread_device && !mode.rx_on_when_idle {
            return Err(Error::InvalidArgs);
        }
        if mode == self.config.mode {
            return Ok(());
        }
        self.config.mode = mode;
        self.changed.insert(ChangedFlags::LINK_MODE);
        log_info!(self.logs, now.as_millis(), LOG_MODULE, "link mode now {:?}", mode);
        match self.role {
            Role::Child => {
                let Some(parent_ext) = self.neighbors.parent().map(|p| p.ext_address) else {
                    return Ok(());
                };
                self.send(
                    platform,
                    Destination::Unicast(parent_ext),
                    MleMessage::ChildUpdateRequest {
                        mode,
                        timeout_secs: self.child_timeout_secs,
                    },
                )
            }
            Role::Router | Role::Leader if !mode.full_thread_device => {
                self.detach(platform, AttachMode::Any, None)
            }
            _ => Ok(()),
        }
    }

    /// Reason the last attach attempt failed
    #[must_use]
    pub const fn last_attach_failure(&self) -> Option<AttachFailure> {
        self.attach.last_failure
    }

    /// Where the attach procedure stands
    #[must_use]
    pub const fn attach_state(&self) -> AttachState {
        self.attach.state
    }

    /// Register or clear the Parent Response observer
    pub fn register_parent_response_callback(&mut self, callback: Option<ParentResponseCallback>, context: usize) {
        self.parent_response_callback = callback.map(|cb| (cb, context));
    }

    /// MLE counters
    #[must_use]
    pub const fn counters(&self) -> &MleCounters {
        &self.counters
    }

    /// Zero the MLE counters
    pub fn reset_counters(&mut self) {
        self.counters = MleCounters::default();
    }

    /// IPv6-layer counters
    #[must_use]
    pub const fn ip6_counters(&self) -> &Ip6Counters {
        &self.ip6_counters
    }

    /// IPv6-layer counters, mutable
    pub fn ip6_counters_mut(&mut self) -> &mut Ip6Counters {
        &mut self.ip6_counters
    }

    /// Log buffer
    #[must_use]
    pub const fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    /// Log buffer, mutable
    pub fn logs_mut(&mut self) -> &mut LogBuffer {
        &mut self.logs
    }

    /// Change the minimum log level
    pub fn set_log_level(&mut self, level: LogLevel) {
        self.logs.set_min_level(level);
    }

    /// Record changes made outside the state machine
    pub fn notify(&mut self, flags: ChangedFlags) {
        self.changed.insert(flags);
    }

    /// Take and clear the accumulated change flags
    pub fn take_changed_flags(&mut self) -> ChangedFlags {
        core::mem::replace(&mut self.changed, ChangedFlags::empty())
    }
}

fn random_iid(platform: &mut dyn Platform) -> Result<InterfaceIdentifier> {
    let mut bytes = [0u8; 8];
    loop {
        platform.rng().fill_bytes(&mut bytes)?;
        let iid = InterfaceIdentifier::new(bytes);
        if !iid.is_reserved() {
            return Ok(iid);
        }
    }
}

fn random_challenge(platform: &mut dyn Platform) -> Result<crate::key_manager::Challenge> {
    let mut challenge = [0u8; thread_common::constants::CHALLENGE_SIZE];
    platform.rng().fill_bytes(&mut challenge)?;
    Ok(challenge)
}
