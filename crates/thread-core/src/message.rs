// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! MLE messages and the outbound frame queue
//!
//! Messages are exchanged as typed values; encoding onto the air is left to
//! the radio glue that drains the [`Outbox`]. Every frame names the channel
//! and PAN it is sent on, the link-layer sender and how it is addressed.
//!
//! Frames other than discovery and the attach handshake carry a frame
//! counter and an integrity code keyed with the MLE key of their key
//! sequence. The code covers the canonical encoding of the whole frame
//! ([`MleFrame::authenticated_data`]). The handshake is protected by
//! challenge/response tags instead.

use heapless::{Deque, Vec};
use thread_common::config::DeviceModeConfig;
use thread_common::constants::OUTBOX_DEPTH;
use thread_common::{Error, ExtAddress, ExtendedPanId, NetworkName, Result};

use crate::discover::{JoinerAdvertisement, SteeringData};
use crate::key_manager::{Challenge, ResponseTag};
use crate::leader::LeaderData;
use crate::route::{RouteData, RouterMask};

/// How a frame is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Every node in range
    Broadcast,
    /// One node by link-layer address
    Unicast(ExtAddress),
    /// Mesh-forwarded toward `target_rloc16`; `next_hop` is the short address
    /// of the node that must take the frame from here
    Routed {
        /// Short address of the next forwarding node
        next_hop: u16,
        /// Short address of the final receiver
        target_rloc16: u16,
    },
}

/// Which device classes a Parent Request is aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanMask {
    /// Active routers answer
    pub routers: bool,
    /// Router-eligible end devices answer
    pub reeds: bool,
}

impl ScanMask {
    /// Routers only
    pub const ROUTERS: Self = Self {
        routers: true,
        reeds: false,
    };

    /// Routers and REEDs
    pub const ROUTERS_AND_REEDS: Self = Self {
        routers: true,
        reeds: true,
    };
}

/// Connectivity a prospective parent reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Connectivity {
    /// Parent priority (-1, 0 or 1)
    pub parent_priority: i8,
    /// Neighbors with link quality 3
    pub link_quality_3: u8,
    /// Neighbors with link quality 2
    pub link_quality_2: u8,
    /// Neighbors with link quality 1
    pub link_quality_1: u8,
    /// Path cost from the parent to the leader
    pub leader_cost: u8,
    /// Router ID sequence
    pub id_sequence: u8,
    /// Active routers in the partition
    pub active_routers: u8,
}

/// Address Solicit result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolicitStatus {
    /// A router ID was assigned
    Success,
    /// The router ID set is exhausted
    NoAddressAvailable,
}

/// MLE message bodies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MleMessage {
    /// Attaching device looks for parents
    ParentRequest {
        /// Device classes asked to answer
        scan_mask: ScanMask,
        /// Fresh challenge the responder must sign
        challenge: Challenge,
        /// Mode of the requester
        mode: DeviceModeConfig,
    },
    /// Prospective parent answers
    ParentResponse {
        /// Tag over the requester's challenge
        response: ResponseTag,
        /// Challenge the requester must sign in its Child ID Request
        challenge: Challenge,
        /// Leader data of the parent's partition
        leader_data: LeaderData,
        /// Parent's view of its links
        connectivity: Connectivity,
    },
    /// Child picks a parent
    ChildIdRequest {
        /// Tag over the parent's challenge
        response: ResponseTag,
        /// Child's mode
        mode: DeviceModeConfig,
        /// Supervision timeout in seconds
        timeout_secs: u32,
    },
    /// Parent admits a child
    ChildIdResponse {
        /// Short address assigned to the child
        rloc16: u16,
        /// Leader data of the partition
        leader_data: LeaderData,
        /// Router ID sequence
        id_sequence: u8,
        /// Allocated router IDs
        allocated: RouterMask,
    },
    /// Child keep-alive
    ChildUpdateRequest {
        /// Child's mode
        mode: DeviceModeConfig,
        /// Supervision timeout in seconds
        timeout_secs: u32,
    },
    /// Parent answers a keep-alive
    ChildUpdateResponse {
        /// `false` when the parent does not know the child
        accepted: bool,
        /// Leader data of the partition
        leader_data: LeaderData,
        /// Supervision timeout the parent applies
        timeout_secs: u32,
    },
    /// Periodic router announcement
    Advertisement {
        /// Leader data of the sender's partition
        leader_data: LeaderData,
        /// Sender's route table
        route: RouteData,
    },
    /// Request for a router ID, relayed to the leader
    AddressSolicit {
        /// Requesting device
        ext_address: ExtAddress,
        /// Requester's current short address (reply is routed to it)
        rloc16: u16,
        /// Router ID the requester held before, if any
        preferred_router_id: Option<u8>,
    },
    /// Leader answers an Address Solicit
    AddressSolicitResponse {
        /// Outcome
        status: SolicitStatus,
        /// Requesting device
        ext_address: ExtAddress,
        /// Assigned router ID
        router_id: Option<u8>,
        /// Router ID sequence after the assignment
        id_sequence: u8,
        /// Allocated router IDs after the assignment
        allocated: RouterMask,
    },
    /// Router gives up its router ID
    AddressRelease {
        /// Released router ID
        router_id: u8,
        /// Releasing device
        ext_address: ExtAddress,
    },
    /// Scanner looks for networks
    DiscoveryRequest {
        /// Scan is on behalf of a joiner
        joiner: bool,
        /// Vendor data appended by the joiner
        advertisement: Option<JoinerAdvertisement>,
    },
    /// Router describes its network
    DiscoveryResponse {
        /// Network name
        network_name: NetworkName,
        /// Extended PAN ID
        extended_pan_id: ExtendedPanId,
        /// Commissioning steering data
        steering_data: Option<SteeringData>,
        /// Joiner UDP port
        joiner_udp_port: u16,
        /// A native commissioner is active
        native_commissioner: bool,
    },
}

impl MleMessage {
    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ParentRequest { .. } => "Parent Request",
            Self::ParentResponse { .. } => "Parent Response",
            Self::ChildIdRequest { .. } => "Child ID Request",
            Self::ChildIdResponse { .. } => "Child ID Response",
            Self::ChildUpdateRequest { .. } => "Child Update Request",
            Self::ChildUpdateResponse { .. } => "Child Update Response",
            Self::Advertisement { .. } => "Advertisement",
            Self::AddressSolicit { .. } => "Address Solicit",
            Self::AddressSolicitResponse { .. } => "Address Solicit Response",
            Self::AddressRelease { .. } => "Address Release",
            Self::DiscoveryRequest { .. } => "Discovery Request",
            Self::DiscoveryResponse { .. } => "Discovery Response",
        }
    }

    /// Discovery messages travel outside any PAN and carry no security
    #[must_use]
    pub const fn is_discovery(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryRequest { .. } | Self::DiscoveryResponse { .. }
        )
    }

    /// Frame carries a frame counter and integrity code
    #[must_use]
    pub const fn is_secured(&self) -> bool {
        !matches!(
            self,
            Self::ParentRequest { .. }
                | Self::ParentResponse { .. }
                | Self::ChildIdRequest { .. }
                | Self::DiscoveryRequest { .. }
                | Self::DiscoveryResponse { .. }
        )
    }

    /// Part of the attach handshake: the receiver must not rotate its key
    /// sequence on these
    #[must_use]
    pub const fn is_attach_handshake(&self) -> bool {
        matches!(
            self,
            Self::ParentRequest { .. }
                | Self::ParentResponse { .. }
                | Self::ChildIdRequest { .. }
                | Self::ChildIdResponse { .. }
        )
    }
}

/// Frame security fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameSecurity {
    /// Sender's MLE frame counter
    pub frame_counter: u32,
    /// Integrity code over the authenticated encoding of the frame
    pub mic: ResponseTag,
}

/// One outbound or received frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MleFrame {
    /// Radio channel
    pub channel: u8,
    /// Destination PAN ID
    pub pan_id: u16,
    /// Link-layer sender
    pub source: ExtAddress,
    /// Sender's short address
    pub source_rloc16: u16,
    /// Addressing
    pub destination: Destination,
    /// Key sequence the frame was secured with
    pub key_sequence: u32,
    /// Present on secured messages
    pub security: Option<FrameSecurity>,
    /// Body
    pub message: MleMessage,
}

/// Upper bound of one frame's authenticated encoding
pub const AUTH_DATA_CAPACITY: usize = 192;

/// Canonical bytes an integrity code is computed over
pub type AuthData = Vec<u8, AUTH_DATA_CAPACITY>;

struct AuthWriter(AuthData);

impl AuthWriter {
    fn bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.0.extend_from_slice(bytes).map_err(|()| Error::NoBufs)
    }

    fn u8(&mut self, v: u8) -> Result<()> {
        self.0.push(v).map_err(|_| Error::NoBufs)
    }

    fn bool(&mut self, v: bool) -> Result<()> {
        self.u8(u8::from(v))
    }

    fn u16(&mut self, v: u16) -> Result<()> {
        self.bytes(&v.to_be_bytes())
    }

    fn u32(&mut self, v: u32) -> Result<()> {
        self.bytes(&v.to_be_bytes())
    }

    fn ext(&mut self, ext: &ExtAddress) -> Result<()> {
        self.bytes(ext.as_bytes())
    }

    /// Length-prefixed byte string
    fn var(&mut self, bytes: &[u8]) -> Result<()> {
        let len = u8::try_from(bytes.len()).map_err(|_| Error::NoBufs)?;
        self.u8(len)?;
        self.bytes(bytes)
    }

    fn mode(&mut self, mode: &DeviceModeConfig) -> Result<()> {
        self.bool(mode.rx_on_when_idle)?;
        self.bool(mode.full_thread_device)?;
        self.bool(mode.full_network_data)
    }

    fn leader_data(&mut self, data: &LeaderData) -> Result<()> {
        self.u32(data.partition_id)?;
        self.u8(data.weighting)?;
        self.u8(data.data_version)?;
        self.u8(data.stable_data_version)?;
        self.u8(data.leader_router_id)
    }

    fn mask(&mut self, mask: RouterMask) -> Result<()> {
        self.bytes(&mask.bits().to_be_bytes())
    }

    fn router_id(&mut self, id: Option<u8>) -> Result<()> {
        match id {
            Some(id) => {
                self.u8(1)?;
                self.u8(id)
            }
            None => self.u8(0),
        }
    }

    fn destination(&mut self, destination: &Destination) -> Result<()> {
        match destination {
            Destination::Broadcast => self.u8(0),
            Destination::Unicast(ext) => {
                self.u8(1)?;
                self.ext(ext)
            }
            // relays rewrite the next hop, so only the final target is bound
            Destination::Routed { target_rloc16, .. } => {
                self.u8(2)?;
                self.u16(*target_rloc16)
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn message(&mut self, message: &MleMessage) -> Result<()> {
        match message {
            MleMessage::ParentRequest {
                scan_mask,
                challenge,
                mode,
            } => {
                self.u8(0)?;
                self.bool(scan_mask.routers)?;
                self.bool(scan_mask.reeds)?;
                self.bytes(challenge)?;
                self.mode(mode)
            }
            MleMessage::ParentResponse {
                response,
                challenge,
                leader_data,
                connectivity,
            } => {
                self.u8(1)?;
                self.bytes(response)?;
                self.bytes(challenge)?;
                self.leader_data(leader_data)?;
                self.bytes(&connectivity.parent_priority.to_be_bytes())?;
                self.u8(connectivity.link_quality_3)?;
                self.u8(connectivity.link_quality_2)?;
                self.u8(connectivity.link_quality_1)?;
                self.u8(connectivity.leader_cost)?;
                self.u8(connectivity.id_sequence)?;
                self.u8(connectivity.active_routers)
            }
            MleMessage::ChildIdRequest {
                response,
                mode,
                timeout_secs,
            } => {
                self.u8(2)?;
                self.bytes(response)?;
                self.mode(mode)?;
                self.u32(*timeout_secs)
            }
            MleMessage::ChildIdResponse {
                rloc16,
                leader_data,
                id_sequence,
                allocated,
            } => {
                self.u8(3)?;
                self.u16(*rloc16)?;
                self.leader_data(leader_data)?;
                self.u8(*id_sequence)?;
                self.mask(*allocated)
            }
            MleMessage::ChildUpdateRequest { mode, timeout_secs } => {
                self.u8(4)?;
                self.mode(mode)?;
                self.u32(*timeout_secs)
            }
            MleMessage::ChildUpdateResponse {
                accepted,
                leader_data,
                timeout_secs,
            } => {
                self.u8(5)?;
                self.bool(*accepted)?;
                self.leader_data(leader_data)?;
                self.u32(*timeout_secs)
            }
            MleMessage::Advertisement { leader_data, route } => {
                self.u8(6)?;
                self.leader_data(leader_data)?;
                self.u8(route.id_sequence)?;
                self.mask(route.allocated)?;
                self.bytes(&route.costs)
            }
            MleMessage::AddressSolicit {
                ext_address,
                rloc16,
                preferred_router_id,
            } => {
                self.u8(7)?;
                self.ext(ext_address)?;
                self.u16(*rloc16)?;
                self.router_id(*preferred_router_id)
            }
            MleMessage::AddressSolicitResponse {
                status,
                ext_address,
                router_id,
                id_sequence,
                allocated,
            } => {
                self.u8(8)?;
                self.u8(match status {
                    SolicitStatus::Success => 0,
                    SolicitStatus::NoAddressAvailable => 1,
                })?;
                self.ext(ext_address)?;
                self.router_id(*router_id)?;
                self.u8(*id_sequence)?;
                self.mask(*allocated)
            }
            MleMessage::AddressRelease {
                router_id,
                ext_address,
            } => {
                self.u8(9)?;
                self.u8(*router_id)?;
                self.ext(ext_address)
            }
            MleMessage::DiscoveryRequest {
                joiner,
                advertisement,
            } => {
                self.u8(10)?;
                self.bool(*joiner)?;
                match advertisement {
                    Some(adv) => {
                        self.u8(1)?;
                        self.bytes(&adv.oui().to_be_bytes()[1..])?;
                        self.var(adv.data())
                    }
                    None => self.u8(0),
                }
            }
            MleMessage::DiscoveryResponse {
                network_name,
                extended_pan_id,
                steering_data,
                joiner_udp_port,
                native_commissioner,
            } => {
                self.u8(11)?;
                self.var(network_name.as_str().as_bytes())?;
                self.bytes(extended_pan_id.as_bytes())?;
                self.var(steering_data.as_ref().map_or(&[][..], SteeringData::as_bytes))?;
                self.u16(*joiner_udp_port)?;
                self.bool(*native_commissioner)
            }
        }
    }
}

impl MleFrame {
    /// Canonical encoding covered by the frame's integrity code
    ///
    /// Binds the channel, PAN, sender, final destination, key sequence,
    /// `frame_counter` and the whole message body. The next hop of a routed
    /// frame is left out.
    ///
    /// # Errors
    ///
    /// `Error::NoBufs` if the encoding exceeds [`AUTH_DATA_CAPACITY`].
    pub fn authenticated_data(&self, frame_counter: u32) -> Result<AuthData> {
        let mut w = AuthWriter(Vec::new());
        w.u8(self.channel)?;
        w.u16(self.pan_id)?;
        w.ext(&self.source)?;
        w.u16(self.source_rloc16)?;
        w.destination(&self.destination)?;
        w.u32(self.key_sequence)?;
        w.u32(frame_counter)?;
        w.message(&self.message)?;
        Ok(w.0)
    }
}

/// Bounded queue of frames waiting for the radio
pub struct Outbox {
    frames: Deque<MleFrame, OUTBOX_DEPTH>,
    dropped: u32,
}

impl Outbox {
    /// Empty queue
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames: Deque::new(),
            dropped: 0,
        }
    }

    /// Queue a frame
    ///
    /// # Errors
    ///
    /// Returns `Error::NoBufs` when the queue is full; the frame is dropped.
    pub fn push(&mut self, frame: MleFrame) -> Result<()> {
        self.frames.push_back(frame).map_err(|_| {
            self.dropped = self.dropped.saturating_add(1);
            Error::NoBufs
        })
    }

    /// Take the oldest frame
    pub fn pop(&mut self) -> Option<MleFrame> {
        self.frames.pop_front()
    }

    /// Frames waiting
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames dropped because the queue was full
    #[must_use]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Drop everything queued
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}
