// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! The control plane instance
//!
//! [`Instance`] is the single owner of the platform, the role state machine,
//! the network identity, the operational datasets and the discovery scanner.
//! Every public operation of the control plane is a method here.
//!
//! # Event model
//!
//! The instance never blocks and has no clock. The caller stamps every event:
//!
//! ```text
//!   API call ------------> Instance::<op>(.., now)
//!   received frame ------> Instance::handle_frame(frame, rssi, now)
//!   timer tick ----------> Instance::process(now)
//!   radio drains --------> Instance::next_outbound()
//! ```
//!
//! # Identity changes
//!
//! The network key (or key reference), extended PAN ID, mesh-local prefix and
//! network name may only change while the protocol is disabled. A successful
//! change invalidates both operational datasets.

use thread_common::config::{DeviceModeConfig, ThreadConfig};
use thread_common::log::{LogBuffer, LogLevel};
use thread_common::{
    log_debug, log_info, log_warn, DomainName, Error, ExtendedPanId, Instant, InterfaceIdentifier,
    Ip6Address, MeshLocalPrefix, NetworkKey, NetworkKeyRef, NetworkName, Result,
};

use crate::address;
use crate::counters::{Ip6Counters, MleCounters};
use crate::dataset::{DatasetKind, DatasetManager, OperationalDataset};
use crate::discover::{
    should_answer_request, ActiveScanResult, DiscoverEvent, DiscoveryScanner, JoinerAdvertisement,
    JoinerId, ScanParams, ScanStep, SteeringData, BROADCAST_PAN_ID,
};
use crate::identity::NetworkIdentity;
use crate::leader::LeaderData;
use crate::message::{Destination, MleFrame, MleMessage};
use crate::mle::{AttachFailure, Mle, ParentInfo, ParentResponseCallback, Role};
use crate::neighbor::{NeighborInfo, NeighborIterator};
use crate::notifier::ChangedFlags;
use crate::platform::Platform;

const LOG_MODULE: &str = "instance";

/// Control plane instance
pub struct Instance<P: Platform> {
    platform: P,
    mle: Mle,
    identity: NetworkIdentity,
    datasets: DatasetManager,
    scanner: DiscoveryScanner,
    interface_enabled: bool,
    fixed_dua_iid: Option<InterfaceIdentifier>,
    steering_data: Option<SteeringData>,
    joiner_udp_port: u16,
    now: Instant,
}

impl<P: Platform> Instance<P> {
    /// Create a disabled instance, restoring stored datasets
    ///
    /// # Errors
    ///
    /// Propagates storage and key derivation failures.
    pub fn new(config: ThreadConfig, mut platform: P) -> Result<Self> {
        let mut mle = Mle::new(config, &mut platform)?;
        let mut identity = NetworkIdentity::new()?;
        let mut datasets = DatasetManager::new();
        datasets.restore(platform.settings())?;

        if let Some(active) = datasets.get(DatasetKind::Active) {
            identity.apply_dataset(active);
            if let Some(key) = &active.network_key {
                mle.keys_mut().set_network_key(key.clone(), platform.key_store())?;
            }
        }
        log_debug!(
            mle.logs_mut(),
            0,
            LOG_MODULE,
            "created, active dataset {}",
            if datasets.is_present(DatasetKind::Active) { "restored" } else { "absent" }
        );

        Ok(Self {
            platform,
            mle,
            identity,
            datasets,
            scanner: DiscoveryScanner::new(config.discovery.scan_duration),
            interface_enabled: false,
            fixed_dua_iid: None,
            steering_data: None,
            joiner_udp_port: thread_common::constants::DEFAULT_JOINER_UDP_PORT,
            now: Instant::ZERO,
        })
    }

    /// Platform services
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    /// Platform services, mutable
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Role state machine
    pub const fn mle(&self) -> &Mle {
        &self.mle
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start or stop the protocol
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` when starting an already started instance;
    /// storage and key failures propagate.
    pub fn set_enabled(&mut self, enabled: bool, now: Instant) -> Result<()> {
        self.now = now;
        if enabled {
            let pan_id = self.identity.pan_id();
            let channel = self.identity.channel();
            self.mle.start(&mut self.platform, pan_id, channel, now)
        } else {
            if self.scanner.stop() {
                log_info!(self.mle.logs_mut(), now.as_millis(), "discover", "scan aborted");
            }
            self.mle.stop(&mut self.platform, now);
            Ok(())
        }
    }

    /// Bring the network interface up or down; a running scan stops when it
    /// goes down
    pub fn set_interface_enabled(&mut self, enabled: bool) {
        self.interface_enabled = enabled;
        if !enabled {
            self.scanner.stop();
        }
    }

    /// Network interface is up
    #[must_use]
    pub const fn is_interface_enabled(&self) -> bool {
        self.interface_enabled
    }

    /// Current role
    #[must_use]
    pub const fn role(&self) -> Role {
        self.mle.role()
    }

    /// Attached as Child, Router or Leader
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.mle.is_attached()
    }

    /// Router or Leader alone in its partition
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.mle.is_singleton()
    }

    /// Force Detached and restart attach
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` when Disabled.
    pub fn become_detached(&mut self, now: Instant) -> Result<()> {
        self.now = now;
        self.mle.become_detached(&mut self.platform, now)
    }

    /// Attach to any eligible parent
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` when Disabled, `Error::Busy` while attaching.
    pub fn become_child(&mut self, now: Instant) -> Result<()> {
        self.now = now;
        self.mle.become_child(&mut self.platform, now)
    }

    /// Ask the leader for a router ID
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless a router-eligible Child,
    /// `Error::Already` when Router.
    pub fn become_router(&mut self, now: Instant) -> Result<()> {
        self.now = now;
        self.mle.become_router(&mut self.platform, now)
    }

    /// Start a new partition with this device as leader
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` when Disabled or not router eligible.
    pub fn become_leader(&mut self, now: Instant) -> Result<()> {
        self.now = now;
        self.mle.become_leader(&mut self.platform, now)?;
        self.ensure_active_dataset();
        Ok(())
    }

    /// Child supervision timeout in seconds
    #[must_use]
    pub const fn child_timeout(&self) -> u32 {
        self.mle.child_timeout()
    }

    /// Change the child supervision timeout
    pub fn set_child_timeout(&mut self, timeout_secs: u32) {
        self.mle.set_child_timeout(timeout_secs);
    }

    /// Device mode
    #[must_use]
    pub const fn link_mode(&self) -> DeviceModeConfig {
        self.mle.link_mode()
    }

    /// Change the device mode; an attached child tells its parent at once
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgs` for a full Thread device with its receiver off.
    pub fn set_link_mode(&mut self, mode: DeviceModeConfig) -> Result<()> {
        self.mle.set_link_mode(&mut self.platform, mode, self.now)
    }

    /// Reason the last attach attempt failed
    #[must_use]
    pub const fn last_attach_failure(&self) -> Option<AttachFailure> {
        self.mle.last_attach_failure()
    }

    // ========================================================================
    // Network Identity
    // ========================================================================

    fn require_disabled(&self) -> Result<()> {
        if self.mle.role() == Role::Disabled {
            Ok(())
        } else {
            Err(Error::InvalidState)
        }
    }

    fn invalidate_datasets(&mut self) -> Result<()> {
        let (active, pending) = self.datasets.clear_all(self.platform.settings())?;
        if active {
            self.mle.notify(ChangedFlags::ACTIVE_DATASET);
        }
        if pending {
            self.mle.notify(ChangedFlags::PENDING_DATASET);
        }
        Ok(())
    }

    /// Extended PAN ID
    #[must_use]
    pub const fn extended_pan_id(&self) -> ExtendedPanId {
        self.identity.extended_pan_id()
    }

    /// Set the extended PAN ID; the mesh-local prefix is re-derived from it
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless Disabled.
    pub fn set_extended_pan_id(&mut self, xpanid: ExtendedPanId) -> Result<()> {
        self.require_disabled()?;
        if self.identity.set_extended_pan_id(xpanid) {
            self.mle.notify(ChangedFlags::EXTENDED_PAN_ID);
        }
        if self.identity.derive_mesh_local_prefix() {
            self.mle.notify(ChangedFlags::MESH_LOCAL_ADDRESSES);
        }
        self.invalidate_datasets()
    }

    /// Network key
    ///
    /// # Errors
    ///
    /// Key store failures in reference mode.
    pub fn network_key(&mut self) -> Result<NetworkKey> {
        self.mle.keys().network_key(self.platform.key_store())
    }

    /// Replace the network key
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless Disabled; key store and derivation
    /// failures propagate.
    pub fn set_network_key(&mut self, key: NetworkKey) -> Result<()> {
        self.require_disabled()?;
        if self.mle.keys_mut().set_network_key(key, self.platform.key_store())? {
            self.mle.notify(ChangedFlags::NETWORK_KEY);
        }
        self.invalidate_datasets()
    }

    /// Reference to the network key in the external key store
    #[must_use]
    pub const fn network_key_ref(&self) -> Option<NetworkKeyRef> {
        self.mle.keys().network_key_ref()
    }

    /// Point the key manager at a key held by the external key store
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgs` for a zero reference, `Error::InvalidState`
    /// unless Disabled, `Error::NotImplemented` in literal key mode.
    pub fn set_network_key_ref(&mut self, raw: u32) -> Result<()> {
        let key_ref = NetworkKeyRef::new(raw)?;
        self.require_disabled()?;
        if self.mle.keys_mut().set_network_key_ref(key_ref, self.platform.key_store())? {
            self.mle.notify(ChangedFlags::NETWORK_KEY);
        }
        self.invalidate_datasets()
    }

    /// Network name
    #[must_use]
    pub const fn network_name(&self) -> &NetworkName {
        self.identity.network_name()
    }

    /// Set the network name
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgs` when too long, `Error::InvalidState` unless
    /// Disabled.
    pub fn set_network_name(&mut self, name: &str) -> Result<()> {
        let name = NetworkName::new(name)?;
        self.require_disabled()?;
        if self.identity.set_network_name(name) {
            self.mle.notify(ChangedFlags::NETWORK_NAME);
        }
        self.invalidate_datasets()
    }

    /// Domain name
    #[must_use]
    pub const fn domain_name(&self) -> &DomainName {
        self.identity.domain_name()
    }

    /// Set the domain name; datasets are kept
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgs` when too long, `Error::InvalidState` unless
    /// Disabled.
    pub fn set_domain_name(&mut self, name: &str) -> Result<()> {
        let name = DomainName::new(name)?;
        self.require_disabled()?;
        if self.identity.set_domain_name(name) {
            self.mle.notify(ChangedFlags::DOMAIN_NAME);
        }
        Ok(())
    }

    /// Mesh-local prefix
    #[must_use]
    pub const fn mesh_local_prefix(&self) -> MeshLocalPrefix {
        self.identity.mesh_local_prefix()
    }

    /// Set the mesh-local prefix explicitly
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless Disabled.
    pub fn set_mesh_local_prefix(&mut self, prefix: MeshLocalPrefix) -> Result<()> {
        self.require_disabled()?;
        if self.identity.set_mesh_local_prefix(prefix) {
            self.mle.notify(ChangedFlags::MESH_LOCAL_ADDRESSES);
        }
        self.invalidate_datasets()
    }

    /// Fixed DUA interface identifier
    #[must_use]
    pub const fn fixed_dua_interface_identifier(&self) -> Option<InterfaceIdentifier> {
        self.fixed_dua_iid
    }

    /// Set or clear the fixed DUA interface identifier
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgs` for a reserved identifier.
    pub fn set_fixed_dua_interface_identifier(&mut self, iid: Option<InterfaceIdentifier>) -> Result<()> {
        if let Some(iid) = &iid {
            address::validate_dua_iid(iid)?;
        }
        self.fixed_dua_iid = iid;
        Ok(())
    }

    // ========================================================================
    // Key Rotation
    // ========================================================================

    /// Current key sequence
    #[must_use]
    pub const fn key_sequence_counter(&self) -> u32 {
        self.mle.keys().key_sequence()
    }

    /// Jump to a key sequence, bypassing the guard time
    ///
    /// # Errors
    ///
    /// Propagates key derivation failures.
    pub fn set_key_sequence_counter(&mut self, sequence: u32, now: Instant) -> Result<()> {
        self.now = now;
        if self
            .mle
            .keys_mut()
            .set_key_sequence(sequence, now, self.platform.key_store())?
        {
            log_info!(self.mle.logs_mut(), now.as_millis(), "keys", "key sequence set to {}", sequence);
            self.mle.notify(ChangedFlags::KEY_SEQUENCE);
            if self.mle.role() != Role::Disabled {
                self.mle.persist(&mut self.platform);
            }
        }
        Ok(())
    }

    /// Key switch guard time in hours
    #[must_use]
    pub fn key_switch_guard_time(&self) -> u32 {
        self.mle.keys().key_switch_guard_time()
    }

    /// Change the key switch guard time; 0 disables the guard
    pub fn set_key_switch_guard_time(&mut self, hours: u32) {
        self.mle.keys_mut().set_key_switch_guard_time(hours);
    }

    // ========================================================================
    // Addresses
    // ========================================================================

    /// Routing locator
    #[must_use]
    pub fn rloc(&self) -> Ip6Address {
        address::rloc(&self.identity.mesh_local_prefix(), self.mle.rloc16())
    }

    /// Mesh-local EID
    #[must_use]
    pub fn mesh_local_eid(&self) -> Ip6Address {
        address::mesh_local_eid(&self.identity.mesh_local_prefix(), &self.mle.ml_eid_iid())
    }

    /// Link-local address from the extended address
    #[must_use]
    pub fn link_local_address(&self) -> Ip6Address {
        address::link_local(&self.mle.ext_address())
    }

    /// Link-local all-Thread-nodes multicast address
    #[must_use]
    pub fn link_local_all_thread_nodes_multicast_address(&self) -> Ip6Address {
        address::link_local_all_thread_nodes(&self.identity.mesh_local_prefix())
    }

    /// Realm-local all-Thread-nodes multicast address
    #[must_use]
    pub fn realm_local_all_thread_nodes_multicast_address(&self) -> Ip6Address {
        address::realm_local_all_thread_nodes(&self.identity.mesh_local_prefix())
    }

    /// Service anycast locator
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgs` for a service ID above 15.
    pub fn service_aloc(&self, service_id: u8) -> Result<Ip6Address> {
        address::service_aloc(&self.identity.mesh_local_prefix(), service_id)
    }

    /// Leader routing locator
    ///
    /// # Errors
    ///
    /// `Error::Detached` unless attached.
    pub fn leader_rloc(&self) -> Result<Ip6Address> {
        let data = self.mle.leader_data()?;
        Ok(address::leader_rloc(&self.identity.mesh_local_prefix(), data.leader_router_id))
    }

    /// Leader anycast locator
    #[must_use]
    pub fn leader_aloc(&self) -> Ip6Address {
        address::leader_aloc(&self.identity.mesh_local_prefix())
    }

    // ========================================================================
    // Topology
    // ========================================================================

    /// Leader data of the current partition
    ///
    /// # Errors
    ///
    /// `Error::Detached` unless attached.
    pub fn leader_data(&self) -> Result<LeaderData> {
        self.mle.leader_data()
    }

    /// Last known leader router ID
    #[must_use]
    pub const fn leader_router_id(&self) -> u8 {
        self.mle.leader().leader_router_id()
    }

    /// Last known leader weighting
    #[must_use]
    pub const fn leader_weight(&self) -> u8 {
        self.mle.leader().weighting()
    }

    /// Last known partition ID
    #[must_use]
    pub const fn partition_id(&self) -> u32 {
        self.mle.leader().partition_id()
    }

    /// Short address
    #[must_use]
    pub const fn rloc16(&self) -> u16 {
        self.mle.rloc16()
    }

    /// Parent information
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless Child.
    pub fn parent_info(&self) -> Result<ParentInfo> {
        self.mle.parent_info()
    }

    /// Average RSSI from the parent
    ///
    /// # Errors
    ///
    /// `Error::Failed` without a parent measurement.
    pub fn parent_average_rssi(&self) -> Result<i8> {
        self.mle.parent_average_rssi()
    }

    /// Last RSSI from the parent
    ///
    /// # Errors
    ///
    /// `Error::Failed` without a parent measurement.
    pub fn parent_last_rssi(&self) -> Result<i8> {
        self.mle.parent_last_rssi()
    }

    /// Advance a neighbor enumeration
    ///
    /// # Errors
    ///
    /// `Error::NotFound` at the end.
    pub fn next_neighbor_info(&self, iter: &mut NeighborIterator) -> Result<NeighborInfo> {
        self.mle.next_neighbor_info(iter)
    }

    /// Leader bumps the network data version
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless Leader.
    pub fn increment_network_data_version(&mut self, stable: bool) -> Result<()> {
        self.mle.increment_network_data_version(stable)
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Start an active scan for networks
    ///
    /// A zero `channel_mask` scans every supported channel. With
    /// `eui64_filter` only networks whose steering data admits this device's
    /// joiner ID are reported.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` while the interface is down, `Error::Busy`
    /// while a scan runs, `Error::InvalidArgs` when no requested channel is
    /// supported.
    pub fn discover(
        &mut self,
        channel_mask: u32,
        pan_id: u16,
        joiner: bool,
        eui64_filter: bool,
        now: Instant,
    ) -> Result<()> {
        self.now = now;
        if !self.interface_enabled {
            return Err(Error::InvalidState);
        }
        let filter = eui64_filter.then(|| JoinerId::from_eui64(&self.platform.factory_eui64()));
        let params = ScanParams {
            channel_mask,
            pan_id,
            joiner,
            filter,
        };
        let supported = self.mle.config().discovery.supported_channel_mask;
        let channel = self.scanner.start(params, supported, now)?;
        log_info!(
            self.mle.logs_mut(),
            now.as_millis(),
            "discover",
            "scan started, mask {:#010x}",
            params.channel_mask
        );
        self.send_discovery_request(channel);
        Ok(())
    }

    fn send_discovery_request(&mut self, channel: u8) {
        let Some(params) = self.scanner.params() else {
            return;
        };
        let frame = MleFrame {
            channel,
            pan_id: params.pan_id,
            source: self.mle.ext_address(),
            source_rloc16: self.mle.rloc16(),
            destination: Destination::Broadcast,
            key_sequence: 0,
            security: None,
            message: MleMessage::DiscoveryRequest {
                joiner: params.joiner,
                advertisement: self.scanner.joiner_advertisement().cloned(),
            },
        };
        log_debug!(self.mle.logs_mut(), self.now.as_millis(), "discover", "request on channel {}", channel);
        // a full outbox costs this channel its request; the scan moves on
        let _ = self.mle.enqueue(frame);
    }

    /// Set or clear the vendor data attached to joiner Discovery Requests
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgs` for an OUI above 24 bits or data outside 1..=64
    /// bytes.
    pub fn set_joiner_advertisement(&mut self, advertisement: Option<(u32, &[u8])>) -> Result<()> {
        let advertisement = advertisement
            .map(|(oui, data)| JoinerAdvertisement::new(oui, data))
            .transpose()?;
        self.scanner.set_joiner_advertisement(advertisement);
        Ok(())
    }

    /// A scan is running
    #[must_use]
    pub const fn is_discover_in_progress(&self) -> bool {
        self.scanner.is_in_progress()
    }

    /// Next scan result or the terminal event
    pub fn poll_discover_event(&mut self) -> Option<DiscoverEvent> {
        self.scanner.poll_event()
    }

    /// Commissioning steering data this device advertises as a router
    pub fn set_steering_data(&mut self, steering: Option<SteeringData>) {
        self.steering_data = steering;
    }

    fn answer_discovery_request(&mut self, frame: &MleFrame, joiner: bool) {
        if !self.mle.role().is_router_or_leader() {
            return;
        }
        if !should_answer_request(joiner, self.steering_data.as_ref()) {
            log_debug!(self.mle.logs_mut(), self.now.as_millis(), "discover", "joiner request ignored, not joinable");
            return;
        }
        let response = MleFrame {
            channel: frame.channel,
            pan_id: self.mle.pan_id(),
            source: self.mle.ext_address(),
            source_rloc16: self.mle.rloc16(),
            destination: Destination::Unicast(frame.source),
            key_sequence: 0,
            security: None,
            message: MleMessage::DiscoveryResponse {
                network_name: self.identity.network_name().clone(),
                extended_pan_id: self.identity.extended_pan_id(),
                steering_data: self.steering_data.clone(),
                joiner_udp_port: self.joiner_udp_port,
                native_commissioner: false,
            },
        };
        let _ = self.mle.enqueue(response);
    }

    // ========================================================================
    // Counters, Callbacks and Notifications
    // ========================================================================

    /// IPv6-layer counters
    #[must_use]
    pub const fn ip6_counters(&self) -> &Ip6Counters {
        self.mle.ip6_counters()
    }

    /// Zero the IPv6-layer counters
    pub fn reset_ip6_counters(&mut self) {
        *self.mle.ip6_counters_mut() = Ip6Counters::default();
    }

    /// Datapath reports a transmission
    pub fn record_ip6_tx(&mut self, success: bool) {
        let c = self.mle.ip6_counters_mut();
        if success {
            c.tx_success = c.tx_success.saturating_add(1);
        } else {
            c.tx_failure = c.tx_failure.saturating_add(1);
        }
    }

    /// Datapath reports a reception
    pub fn record_ip6_rx(&mut self, success: bool) {
        let c = self.mle.ip6_counters_mut();
        if success {
            c.rx_success = c.rx_success.saturating_add(1);
        } else {
            c.rx_failure = c.rx_failure.saturating_add(1);
        }
    }

    /// MLE counters
    #[must_use]
    pub const fn mle_counters(&self) -> &MleCounters {
        self.mle.counters()
    }

    /// Zero the MLE counters
    pub fn reset_mle_counters(&mut self) {
        self.mle.reset_counters();
    }

    /// Register or clear the Parent Response observer
    pub fn register_parent_response_callback(&mut self, callback: Option<ParentResponseCallback>, context: usize) {
        self.mle.register_parent_response_callback(callback, context);
    }

    /// Take and clear the accumulated change flags
    pub fn take_changed_flags(&mut self) -> ChangedFlags {
        self.mle.take_changed_flags()
    }

    /// Log buffer
    #[must_use]
    pub const fn logs(&self) -> &LogBuffer {
        self.mle.logs()
    }

    /// Change the minimum log level
    pub fn set_log_level(&mut self, level: LogLevel) {
        self.mle.set_log_level(level);
    }

    // ========================================================================
    // Datasets
    // ========================================================================

    /// Active operational dataset
    #[must_use]
    pub fn active_dataset(&self) -> Option<&OperationalDataset> {
        self.datasets.get(DatasetKind::Active)
    }

    /// Pending operational dataset
    #[must_use]
    pub fn pending_dataset(&self) -> Option<&OperationalDataset> {
        self.datasets.get(DatasetKind::Pending)
    }

    /// Install an active dataset and adopt its identity fields
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless Disabled; storage and key failures
    /// propagate.
    pub fn set_active_dataset(&mut self, dataset: OperationalDataset) -> Result<()> {
        self.require_disabled()?;
        if let Some(key) = &dataset.network_key {
            if self.mle.keys_mut().set_network_key(key.clone(), self.platform.key_store())? {
                self.mle.notify(ChangedFlags::NETWORK_KEY);
            }
        }
        let before = self.identity.clone();
        self.identity.apply_dataset(&dataset);
        if before.network_name() != self.identity.network_name() {
            self.mle.notify(ChangedFlags::NETWORK_NAME);
        }
        if before.extended_pan_id() != self.identity.extended_pan_id() {
            self.mle.notify(ChangedFlags::EXTENDED_PAN_ID);
        }
        if before.mesh_local_prefix() != self.identity.mesh_local_prefix() {
            self.mle.notify(ChangedFlags::MESH_LOCAL_ADDRESSES);
        }
        self.datasets
            .save(self.platform.settings(), DatasetKind::Active, dataset)?;
        self.mle.notify(ChangedFlags::ACTIVE_DATASET);
        Ok(())
    }

    /// A leader without an active dataset publishes its own identity
    fn ensure_active_dataset(&mut self) {
        if self.mle.role() != Role::Leader || self.datasets.is_present(DatasetKind::Active) {
            return;
        }
        let mut dataset = OperationalDataset {
            active_timestamp: Some(1),
            channel_mask: Some(self.mle.config().discovery.supported_channel_mask),
            ..OperationalDataset::default()
        };
        self.identity.fill_dataset(&mut dataset);
        dataset.network_key = self.mle.keys().network_key(self.platform.key_store()).ok();
        match self
            .datasets
            .save(self.platform.settings(), DatasetKind::Active, dataset)
        {
            Ok(()) => self.mle.notify(ChangedFlags::ACTIVE_DATASET),
            Err(e) => log_warn!(
                self.mle.logs_mut(),
                self.now.as_millis(),
                LOG_MODULE,
                "saving active dataset failed: {}",
                e
            ),
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Channel the radio listens on: the scan channel while scanning
    #[must_use]
    pub fn radio_channel(&self) -> u8 {
        self.scanner.current_channel().unwrap_or_else(|| {
            if self.mle.role() == Role::Disabled {
                self.identity.channel()
            } else {
                self.mle.channel()
            }
        })
    }

    /// Evaluate every timer against `now`
    pub fn process(&mut self, now: Instant) {
        self.now = now;
        match self.scanner.process(now) {
            ScanStep::SendRequest(channel) => self.send_discovery_request(channel),
            ScanStep::Finished => {
                log_info!(self.mle.logs_mut(), now.as_millis(), "discover", "scan complete");
            }
            ScanStep::Idle => {}
        }
        self.mle.process(&mut self.platform, now);
        self.ensure_active_dataset();
    }

    /// Handle a received frame
    pub fn handle_frame(&mut self, frame: &MleFrame, rssi: i8, now: Instant) {
        self.now = now;
        if frame.channel != self.radio_channel() {
            return;
        }
        match &frame.message {
            MleMessage::DiscoveryRequest { joiner, .. } => {
                if frame.pan_id == BROADCAST_PAN_ID || frame.pan_id == self.mle.pan_id() {
                    self.answer_discovery_request(frame, *joiner);
                }
            }
            MleMessage::DiscoveryResponse {
                network_name,
                extended_pan_id,
                steering_data,
                joiner_udp_port,
                native_commissioner,
            } => {
                if frame.destination != Destination::Unicast(self.mle.ext_address()) {
                    return;
                }
                let result = ActiveScanResult {
                    ext_address: frame.source,
                    network_name: network_name.clone(),
                    extended_pan_id: *extended_pan_id,
                    pan_id: frame.pan_id,
                    channel: frame.channel,
                    rssi,
                    steering_data: steering_data.clone(),
                    joiner_udp_port: *joiner_udp_port,
                    is_joinable: steering_data.as_ref().is_some_and(|s| !s.is_empty()),
                    is_native: *native_commissioner,
                };
                if self.scanner.handle_response(result) {
                    log_debug!(self.mle.logs_mut(), now.as_millis(), "discover", "result from {}", frame.source);
                }
            }
            _ => {
                if frame.pan_id != self.mle.pan_id() {
                    return;
                }
                self.mle.handle_frame(&mut self.platform, frame, rssi, now);
                self.ensure_active_dataset();
            }
        }
    }

    /// Next frame for the radio
    pub fn next_outbound(&mut self) -> Option<MleFrame> {
        self.mle.next_outbound()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SoftwarePlatform;
    use crate::settings::SettingsStore;
    use thread_common::Eui64;

    fn instance() -> Instance<SoftwarePlatform> {
        let platform = SoftwarePlatform::new(Eui64::new([0x10, 0, 0, 0, 0, 0, 0, 1]), &[3u8; 32]).unwrap();
        Instance::new(ThreadConfig::DEFAULT, platform).unwrap()
    }

    fn stored_dataset(inst: &mut Instance<SoftwarePlatform>) {
        let ds = OperationalDataset {
            active_timestamp: Some(7),
            ..OperationalDataset::default()
        };
        inst.set_active_dataset(ds).unwrap();
        assert!(inst.active_dataset().is_some());
    }

    #[test]
    fn test_identity_setters_clear_datasets() {
        let mut inst = instance();
        stored_dataset(&mut inst);
        inst.set_network_name("other").unwrap();
        assert!(inst.active_dataset().is_none());
        assert!(inst
            .platform_mut()
            .settings()
            .read_dataset(DatasetKind::Active)
            .unwrap()
            .is_none());
        assert!(inst.take_changed_flags().contains(ChangedFlags::NETWORK_NAME));
    }

    #[test]
    fn test_identity_setters_need_disabled() {
        let mut inst = instance();
        inst.set_enabled(true, Instant::ZERO).unwrap();
        let xp = inst.extended_pan_id();
        assert_eq!(inst.set_extended_pan_id(ExtendedPanId::new([5; 8])), Err(Error::InvalidState));
        assert_eq!(inst.extended_pan_id(), xp);
        assert_eq!(inst.set_network_name("x"), Err(Error::InvalidState));
        assert_eq!(inst.set_network_key(NetworkKey::new([9; 16])), Err(Error::InvalidState));
        assert_eq!(inst.set_domain_name("d"), Err(Error::InvalidState));
    }

    #[test]
    fn test_zero_key_ref_rejected_in_any_state() {
        let mut inst = instance();
        assert_eq!(inst.set_network_key_ref(0), Err(Error::InvalidArgs));
        inst.set_enabled(true, Instant::ZERO).unwrap();
        assert_eq!(inst.set_network_key_ref(0), Err(Error::InvalidArgs));
        assert_eq!(inst.set_network_key_ref(1), Err(Error::InvalidState));
    }

    #[test]
    fn test_domain_name_keeps_datasets() {
        let mut inst = instance();
        stored_dataset(&mut inst);
        inst.set_domain_name("Home").unwrap();
        assert_eq!(inst.domain_name().as_str(), "Home");
        assert!(inst.active_dataset().is_some());
    }

    #[test]
    fn test_xpanid_rederives_explicit_prefix() {
        let mut inst = instance();
        inst.set_mesh_local_prefix(MeshLocalPrefix::new([0xfd, 1, 2, 3, 4, 5, 6, 7])).unwrap();
        let xp = ExtendedPanId::new([0xde, 0xad, 0, 0xbe, 0xef, 0, 0xca, 0xfe]);
        inst.set_extended_pan_id(xp).unwrap();
        assert_eq!(inst.mesh_local_prefix(), MeshLocalPrefix::from_extended_pan_id(&xp));
    }

    #[test]
    fn test_fixed_dua_iid() {
        let mut inst = instance();
        let reserved = InterfaceIdentifier::new([0; 8]);
        assert_eq!(inst.set_fixed_dua_interface_identifier(Some(reserved)), Err(Error::InvalidArgs));
        let iid = InterfaceIdentifier::new([0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0]);
        inst.set_fixed_dua_interface_identifier(Some(iid)).unwrap();
        assert_eq!(inst.fixed_dua_interface_identifier(), Some(iid));
        inst.set_fixed_dua_interface_identifier(None).unwrap();
        assert_eq!(inst.fixed_dua_interface_identifier(), None);
    }

    #[test]
    fn test_discover_needs_interface() {
        let mut inst = instance();
        assert_eq!(inst.discover(0, BROADCAST_PAN_ID, false, false, Instant::ZERO), Err(Error::InvalidState));
        inst.set_interface_enabled(true);
        inst.discover(1 << 12, BROADCAST_PAN_ID, false, false, Instant::ZERO).unwrap();
        assert_eq!(inst.radio_channel(), 12);
        let frame = inst.next_outbound().unwrap();
        assert_eq!(frame.channel, 12);
        assert!(matches!(frame.message, MleMessage::DiscoveryRequest { joiner: false, .. }));
    }

    #[test]
    fn test_leader_publishes_active_dataset() {
        let mut inst = instance();
        inst.set_enabled(true, Instant::ZERO).unwrap();
        inst.become_leader(Instant::from_millis(10)).unwrap();
        let ds = inst.active_dataset().unwrap();
        assert_eq!(ds.network_name.as_ref(), Some(inst.network_name()));
        assert_eq!(ds.channel, Some(inst.radio_channel()));
    }

    #[test]
    fn test_key_sequence_admin() {
        let mut inst = instance();
        inst.set_key_sequence_counter(12, Instant::ZERO).unwrap();
        assert_eq!(inst.key_sequence_counter(), 12);
        assert!(inst.take_changed_flags().contains(ChangedFlags::KEY_SEQUENCE));
        inst.set_key_switch_guard_time(24);
        assert_eq!(inst.key_switch_guard_time(), 24);
    }

    #[test]
    fn test_link_mode_rules() {
        let mut inst = instance();
        let sleepy_ftd = DeviceModeConfig {
            rx_on_when_idle: false,
            full_thread_device: true,
            full_network_data: true,
        };
        assert_eq!(inst.set_link_mode(sleepy_ftd), Err(Error::InvalidArgs));
        assert_eq!(inst.link_mode(), DeviceModeConfig::DEFAULT);

        inst.set_enabled(true, Instant::ZERO).unwrap();
        inst.become_leader(Instant::from_millis(1)).unwrap();
        let _ = inst.take_changed_flags();
        let mted = DeviceModeConfig {
            rx_on_when_idle: true,
            full_thread_device: false,
            full_network_data: false,
        };
        inst.set_link_mode(mted).unwrap();
        assert_eq!(inst.link_mode(), mted);
        assert_eq!(inst.role(), Role::Detached);
        assert!(inst.take_changed_flags().contains(ChangedFlags::LINK_MODE));
    }

    #[test]
    fn test_leader_rloc_needs_attachment() {
        let mut inst = instance();
        assert_eq!(inst.leader_rloc(), Err(Error::Detached));
        inst.set_enabled(true, Instant::ZERO).unwrap();
        inst.become_leader(Instant::from_millis(1)).unwrap();
        let rloc = inst.leader_rloc().unwrap();
        assert_eq!(rloc, inst.rloc());
    }
}
