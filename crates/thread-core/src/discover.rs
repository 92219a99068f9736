// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Discovery scanning
//!
//! A scan walks the requested channels in ascending order, sends one
//! Discovery Request per channel and collects Discovery Responses for the
//! dwell time. Results and the single terminal event are queued for the
//! caller to poll. One queue slot is always held back for the terminal
//! event, so a scan that ends is always reported, and a new scan is refused
//! until the caller has drained every event of the previous one.
//!
//! Joiners filter responses on steering data: a 1..=16 byte Bloom filter
//! indexed by CRC16-CCITT and CRC16-ANSI of the joiner ID.

use heapless::{Deque, Vec};
use thread_common::constants::{
    DISCOVER_QUEUE_DEPTH, JOINER_ID_SIZE, MAX_CHANNEL, MAX_DISCOVER_RESULTS, MAX_JOINER_ADV_DATA_LEN,
    MAX_JOINER_ADV_OUI, MAX_STEERING_DATA_LEN, MIN_CHANNEL,
};
use thread_common::{Deadline, Error, Eui64, ExtAddress, ExtendedPanId, Instant, Millis, NetworkName, Result};
use thread_crypto::{Hash, Sha256};

/// PAN ID meaning "any PAN"
pub const BROADCAST_PAN_ID: u16 = 0xffff;

/// Local/universal bit set in byte 0 of a joiner ID
const JOINER_ID_LOCAL_BIT: u8 = 0x02;

const CRC16_CCITT_POLY: u16 = 0x1021;
const CRC16_ANSI_POLY: u16 = 0x8005;

fn crc16(poly: u16, data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ poly
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Joiner identifier: first 8 bytes of SHA-256(EUI-64) with the local bit set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinerId([u8; JOINER_ID_SIZE]);

impl JoinerId {
    /// Derive the joiner ID of a device
    #[must_use]
    pub fn from_eui64(eui64: &Eui64) -> Self {
        let digest = Sha256::hash(eui64.as_bytes());
        let mut id = [0u8; JOINER_ID_SIZE];
        id.copy_from_slice(&digest.as_bytes()[..JOINER_ID_SIZE]);
        id[0] |= JOINER_ID_LOCAL_BIT;
        Self(id)
    }

    /// Raw bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; JOINER_ID_SIZE] {
        &self.0
    }

    /// Bloom filter bit indexes for a filter of `num_bits` bits
    #[must_use]
    pub fn bloom_indexes(&self, num_bits: u16) -> (u16, u16) {
        (
            crc16(CRC16_CCITT_POLY, &self.0) % num_bits,
            crc16(CRC16_ANSI_POLY, &self.0) % num_bits,
        )
    }
}

/// Commissioning steering data (Bloom filter over joiner IDs)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteeringData(Vec<u8, MAX_STEERING_DATA_LEN>);

impl SteeringData {
    /// All-zero filter of `len` bytes
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgs` unless `1 <= len <= 16`.
    pub fn new(len: usize) -> Result<Self> {
        if len == 0 || len > MAX_STEERING_DATA_LEN {
            return Err(Error::InvalidArgs);
        }
        let mut bits = Vec::new();
        bits.resize(len, 0).map_err(|()| Error::InvalidArgs)?;
        Ok(Self(bits))
    }

    /// Filter that admits every joiner
    #[must_use]
    pub fn permit_all() -> Self {
        let mut bits = Vec::new();
        // capacity is at least one byte
        let _ = bits.push(0xff);
        Self(bits)
    }

    /// Build from raw bytes
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgs` unless `1 <= bytes.len() <= 16`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidArgs);
        }
        Vec::from_slice(bytes).map(Self).map_err(|()| Error::InvalidArgs)
    }

    /// Raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn num_bits(&self) -> u16 {
        u16::try_from(self.0.len() * 8).unwrap_or(u16::MAX)
    }

    fn bit_position(&self, bit: u16) -> (usize, u8) {
        let byte = self.0.len() - 1 - usize::from(bit / 8);
        (byte, 1 << (bit % 8))
    }

    fn has_bit(&self, bit: u16) -> bool {
        let (byte, mask) = self.bit_position(bit);
        self.0[byte] & mask != 0
    }

    /// Add a joiner to the filter
    pub fn add_joiner(&mut self, joiner: &JoinerId) {
        let (a, b) = joiner.bloom_indexes(self.num_bits());
        for bit in [a, b] {
            let (byte, mask) = self.bit_position(bit);
            self.0[byte] |= mask;
        }
    }

    /// Check whether the filter admits a joiner
    #[must_use]
    pub fn contains(&self, joiner: &JoinerId) -> bool {
        let (a, b) = joiner.bloom_indexes(self.num_bits());
        self.has_bit(a) && self.has_bit(b)
    }

    /// No bit set: nobody is admitted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

/// Vendor data a joiner appends to its Discovery Requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinerAdvertisement {
    oui: u32,
    data: Vec<u8, MAX_JOINER_ADV_DATA_LEN>,
}

impl JoinerAdvertisement {
    /// Create an advertisement
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgs` when the OUI exceeds 24 bits or the data is empty
    /// or longer than 64 bytes.
    pub fn new(oui: u32, data: &[u8]) -> Result<Self> {
        if oui > MAX_JOINER_ADV_OUI || data.is_empty() {
            return Err(Error::InvalidArgs);
        }
        let data = Vec::from_slice(data).map_err(|()| Error::InvalidArgs)?;
        Ok(Self { oui, data })
    }

    /// Vendor OUI
    #[must_use]
    pub const fn oui(&self) -> u32 {
        self.oui
    }

    /// Advertisement payload
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// One Discovery Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveScanResult {
    /// Responder's extended address
    pub ext_address: ExtAddress,
    /// Network name
    pub network_name: NetworkName,
    /// Extended PAN ID
    pub extended_pan_id: ExtendedPanId,
    /// PAN ID
    pub pan_id: u16,
    /// Channel the response was heard on
    pub channel: u8,
    /// Received signal strength
    pub rssi: i8,
    /// Steering data, when the network is commissioning
    pub steering_data: Option<SteeringData>,
    /// Joiner UDP port
    pub joiner_udp_port: u16,
    /// Network accepts joiners
    pub is_joinable: bool,
    /// Responder hosts a native commissioner
    pub is_native: bool,
}

/// Event delivered to the scan caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoverEvent {
    /// One network heard
    Result(ActiveScanResult),
    /// Scan ended (normally or by `stop`)
    Complete,
}

/// What the owner must do after a timer check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    /// Nothing to do
    Idle,
    /// Tune to this channel and send a Discovery Request
    SendRequest(u8),
    /// Scan finished; return to the operating channel
    Finished,
}

/// Parameters of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    /// Channels to scan (bit N = channel N); 0 selects every supported channel
    pub channel_mask: u32,
    /// Only report this PAN ID (`BROADCAST_PAN_ID` for any)
    pub pan_id: u16,
    /// Scan on behalf of a joiner
    pub joiner: bool,
    /// Only report networks whose steering data admits this joiner
    pub filter: Option<JoinerId>,
}

#[derive(Debug, Clone, Copy)]
struct Scan {
    remaining: u32,
    channel: u8,
    dwell: Deadline,
    params: ScanParams,
}

fn first_channel(mask: u32) -> Option<u8> {
    (MIN_CHANNEL..=MAX_CHANNEL).find(|ch| mask & (1 << ch) != 0)
}

/// Discovery scan state machine and event queue
pub struct DiscoveryScanner {
    scan: Option<Scan>,
    events: Deque<DiscoverEvent, DISCOVER_QUEUE_DEPTH>,
    advertisement: Option<JoinerAdvertisement>,
    dwell: Millis,
    dropped_results: u32,
}

impl DiscoveryScanner {
    /// Idle scanner with the given per-channel dwell time
    #[must_use]
    pub const fn new(dwell: Millis) -> Self {
        Self {
            scan: None,
            events: Deque::new(),
            advertisement: None,
            dwell,
            dropped_results: 0,
        }
    }

    /// A scan is running
    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        self.scan.is_some()
    }

    /// Channel being scanned
    #[must_use]
    pub fn current_channel(&self) -> Option<u8> {
        self.scan.map(|s| s.channel)
    }

    /// Parameters of the running scan
    #[must_use]
    pub fn params(&self) -> Option<ScanParams> {
        self.scan.map(|s| s.params)
    }

    /// Results dropped because the scan heard more than
    /// [`MAX_DISCOVER_RESULTS`] networks
    #[must_use]
    pub const fn dropped_results(&self) -> u32 {
        self.dropped_results
    }

    /// Joiner advertisement attached to requests
    #[must_use]
    pub const fn joiner_advertisement(&self) -> Option<&JoinerAdvertisement> {
        self.advertisement.as_ref()
    }

    /// Set or clear the joiner advertisement
    pub fn set_joiner_advertisement(&mut self, advertisement: Option<JoinerAdvertisement>) {
        self.advertisement = advertisement;
    }

    /// Begin a scan
    ///
    /// Returns the first channel to send a request on.
    ///
    /// # Errors
    ///
    /// `Error::Busy` while a scan runs or events of the last scan are still
    /// queued; `Error::InvalidArgs` when no requested channel is supported.
    pub fn start(&mut self, mut params: ScanParams, supported_mask: u32, now: Instant) -> Result<u8> {
        if self.scan.is_some() || !self.events.is_empty() {
            return Err(Error::Busy);
        }
        if params.channel_mask == 0 {
            params.channel_mask = supported_mask;
        }
        params.channel_mask &= supported_mask;
        let channel = first_channel(params.channel_mask).ok_or(Error::InvalidArgs)?;
        self.scan = Some(Scan {
            remaining: params.channel_mask & !(1 << channel),
            channel,
            dwell: Deadline::new(now, self.dwell),
            params,
        });
        Ok(channel)
    }

    /// Advance on dwell expiry
    pub fn process(&mut self, now: Instant) -> ScanStep {
        let Some(scan) = self.scan.as_mut() else {
            return ScanStep::Idle;
        };
        if !scan.dwell.is_expired(now) {
            return ScanStep::Idle;
        }
        if let Some(channel) = first_channel(scan.remaining) {
            scan.remaining &= !(1 << channel);
            scan.channel = channel;
            scan.dwell = Deadline::new(now, self.dwell);
            return ScanStep::SendRequest(channel);
        }
        self.finish();
        ScanStep::Finished
    }

    /// Stop a running scan; the terminal event is still queued
    ///
    /// Returns `true` if a scan was running.
    pub fn stop(&mut self) -> bool {
        if self.scan.is_none() {
            return false;
        }
        self.finish();
        true
    }

    fn finish(&mut self) {
        self.scan = None;
        // a free slot is always reserved for the terminal event
        if self.events.push_back(DiscoverEvent::Complete).is_err() {
            self.dropped_results = self.dropped_results.saturating_add(1);
        }
    }

    /// Offer a received response
    ///
    /// Returns `true` when it was queued.
    pub fn handle_response(&mut self, result: ActiveScanResult) -> bool {
        let Some(scan) = self.scan else {
            return false;
        };
        if result.channel != scan.channel {
            return false;
        }
        if scan.params.pan_id != BROADCAST_PAN_ID && result.pan_id != scan.params.pan_id {
            return false;
        }
        if scan.params.joiner && !result.is_joinable {
            return false;
        }
        if let Some(joiner) = &scan.params.filter {
            let admitted = result
                .steering_data
                .as_ref()
                .is_some_and(|s| s.contains(joiner));
            if !admitted {
                return false;
            }
        }
        if self.events.len() >= MAX_DISCOVER_RESULTS {
            self.dropped_results = self.dropped_results.saturating_add(1);
            return false;
        }
        self.events.push_back(DiscoverEvent::Result(result)).is_ok()
    }

    /// Next queued event
    pub fn poll_event(&mut self) -> Option<DiscoverEvent> {
        self.events.pop_front()
    }
}

/// Whether a router answers a Discovery Request
#[must_use]
pub fn should_answer_request(request_is_joiner: bool, steering: Option<&SteeringData>) -> bool {
    !request_is_joiner || steering.is_some_and(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use thread_common::constants::SUPPORTED_CHANNEL_MASK;

    fn params(mask: u32) -> ScanParams {
        ScanParams {
            channel_mask: mask,
            pan_id: BROADCAST_PAN_ID,
            joiner: false,
            filter: None,
        }
    }

    fn result(channel: u8, pan_id: u16) -> ActiveScanResult {
        ActiveScanResult {
            ext_address: ExtAddress::new([1; 8]),
            network_name: NetworkName::new("net").unwrap(),
            extended_pan_id: ExtendedPanId::new([2; 8]),
            pan_id,
            channel,
            rssi: -50,
            steering_data: None,
            joiner_udp_port: 1000,
            is_joinable: false,
            is_native: false,
        }
    }

    #[test]
    fn test_crc16_check_values() {
        // "123456789": CRC-16/XMODEM and CRC-16/UMTS (unreflected, init 0)
        assert_eq!(crc16(CRC16_CCITT_POLY, b"123456789"), 0x31c3);
        assert_eq!(crc16(CRC16_ANSI_POLY, b"123456789"), 0xfee8);
    }

    #[test]
    fn test_joiner_id_sets_local_bit() {
        let id = JoinerId::from_eui64(&Eui64::new([0x18, 0xb4, 0x30, 0, 0, 0, 0, 1]));
        assert_eq!(id.as_bytes()[0] & JOINER_ID_LOCAL_BIT, JOINER_ID_LOCAL_BIT);
    }

    #[test]
    fn test_steering_bloom_filter() {
        let a = JoinerId::from_eui64(&Eui64::new([1; 8]));
        let mut s = SteeringData::new(16).unwrap();
        assert!(s.is_empty());
        assert!(!s.contains(&a));
        s.add_joiner(&a);
        assert!(s.contains(&a));
        assert!(!s.is_empty());
        assert!(SteeringData::permit_all().contains(&a));
        assert_eq!(SteeringData::new(0), Err(Error::InvalidArgs));
        assert_eq!(SteeringData::new(17), Err(Error::InvalidArgs));
    }

    #[test]
    fn test_joiner_advertisement_bounds() {
        assert!(JoinerAdvertisement::new(0x00ff_ffff, &[1]).is_ok());
        assert_eq!(JoinerAdvertisement::new(0x0100_0000, &[1]), Err(Error::InvalidArgs));
        assert_eq!(JoinerAdvertisement::new(1, &[]), Err(Error::InvalidArgs));
        assert_eq!(JoinerAdvertisement::new(1, &[0u8; 65]), Err(Error::InvalidArgs));
        assert!(JoinerAdvertisement::new(1, &[0u8; 64]).is_ok());
    }

    #[test]
    fn test_scan_walks_channels_then_completes() {
        let mut s = DiscoveryScanner::new(Millis::new(100));
        let mask = (1 << 11) | (1 << 15);
        assert_eq!(s.start(params(mask), SUPPORTED_CHANNEL_MASK, Instant::ZERO), Ok(11));
        assert_eq!(s.start(params(mask), SUPPORTED_CHANNEL_MASK, Instant::ZERO), Err(Error::Busy));
        assert_eq!(s.process(Instant::from_millis(50)), ScanStep::Idle);
        assert_eq!(s.process(Instant::from_millis(100)), ScanStep::SendRequest(15));
        assert_eq!(s.current_channel(), Some(15));
        assert_eq!(s.process(Instant::from_millis(200)), ScanStep::Finished);
        assert!(!s.is_in_progress());
        assert_eq!(s.poll_event(), Some(DiscoverEvent::Complete));
        assert_eq!(s.poll_event(), None);
    }

    #[test]
    fn test_unsupported_mask_rejected() {
        let mut s = DiscoveryScanner::new(Millis::new(100));
        assert_eq!(s.start(params(1 << 5), SUPPORTED_CHANNEL_MASK, Instant::ZERO), Err(Error::InvalidArgs));
        assert!(!s.is_in_progress());
    }

    #[test]
    fn test_zero_mask_means_all_supported() {
        let mut s = DiscoveryScanner::new(Millis::new(100));
        assert_eq!(s.start(params(0), SUPPORTED_CHANNEL_MASK, Instant::ZERO), Ok(MIN_CHANNEL));
    }

    #[test]
    fn test_pan_filter() {
        let mut s = DiscoveryScanner::new(Millis::new(100));
        let mut p = params(1 << 11);
        p.pan_id = 0x1234;
        s.start(p, SUPPORTED_CHANNEL_MASK, Instant::ZERO).unwrap();
        assert!(!s.handle_response(result(11, 0x9999)));
        assert!(s.handle_response(result(11, 0x1234)));
        assert!(!s.handle_response(result(12, 0x1234)));
    }

    #[test]
    fn test_eui_filter_requires_steering_match() {
        let me = JoinerId::from_eui64(&Eui64::new([7; 8]));
        let mut s = DiscoveryScanner::new(Millis::new(100));
        let mut p = params(1 << 11);
        p.filter = Some(me);
        s.start(p, SUPPORTED_CHANNEL_MASK, Instant::ZERO).unwrap();

        assert!(!s.handle_response(result(11, 1)));
        let mut r = result(11, 1);
        r.steering_data = Some(SteeringData::new(8).unwrap());
        assert!(!s.handle_response(r.clone()));
        r.steering_data.as_mut().unwrap().add_joiner(&me);
        assert!(s.handle_response(r));
    }

    #[test]
    fn test_joiner_scan_skips_closed_networks() {
        let mut s = DiscoveryScanner::new(Millis::new(100));
        let mut p = params(1 << 11);
        p.joiner = true;
        s.start(p, SUPPORTED_CHANNEL_MASK, Instant::ZERO).unwrap();
        assert!(!s.handle_response(result(11, 1)));
        let mut r = result(11, 1);
        r.is_joinable = true;
        assert!(s.handle_response(r));
    }

    #[test]
    fn test_terminal_slot_always_reserved() {
        let mut s = DiscoveryScanner::new(Millis::new(100));
        s.start(params(1 << 11), SUPPORTED_CHANNEL_MASK, Instant::ZERO).unwrap();
        let mut accepted = 0;
        for _ in 0..DISCOVER_QUEUE_DEPTH * 2 {
            if s.handle_response(result(11, 1)) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, MAX_DISCOVER_RESULTS);
        assert!(s.dropped_results() > 0);
        assert!(s.stop());

        let mut complete = 0;
        while let Some(ev) = s.poll_event() {
            if ev == DiscoverEvent::Complete {
                complete += 1;
            }
        }
        assert_eq!(complete, 1);
    }

    #[test]
    fn test_busy_until_previous_scan_drained() {
        let mut s = DiscoveryScanner::new(Millis::new(100));
        s.start(params(1 << 11), SUPPORTED_CHANNEL_MASK, Instant::ZERO).unwrap();
        for i in 0..10 {
            assert!(s.handle_response(result(11, i)));
        }
        assert_eq!(s.process(Instant::from_millis(100)), ScanStep::Finished);
        assert!(!s.is_in_progress());
        assert_eq!(
            s.start(params(1 << 12), SUPPORTED_CHANNEL_MASK, Instant::from_millis(100)),
            Err(Error::Busy)
        );

        let mut results = 0;
        let mut complete = 0;
        while let Some(ev) = s.poll_event() {
            match ev {
                DiscoverEvent::Result(_) => results += 1,
                DiscoverEvent::Complete => complete += 1,
            }
        }
        assert_eq!((results, complete), (10, 1));
        assert_eq!(s.dropped_results(), 0);

        s.start(params(1 << 12), SUPPORTED_CHANNEL_MASK, Instant::from_millis(100)).unwrap();
        assert!(s.stop());
        assert_eq!(s.poll_event(), Some(DiscoverEvent::Complete));
        assert_eq!(s.poll_event(), None);
    }

    #[test]
    fn test_stop_when_idle() {
        let mut s = DiscoveryScanner::new(Millis::new(100));
        assert!(!s.stop());
        assert_eq!(s.poll_event(), None);
    }

    #[test]
    fn test_joiner_requests_need_steering() {
        assert!(should_answer_request(false, None));
        assert!(!should_answer_request(true, None));
        assert!(!should_answer_request(true, Some(&SteeringData::new(4).unwrap())));
        assert!(should_answer_request(true, Some(&SteeringData::permit_all())));
    }
}
