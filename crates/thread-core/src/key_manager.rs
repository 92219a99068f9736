// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Network key, key sequence and derived keys
//!
//! The network key is held either literally or as a reference into the
//! platform key store, never both. Per-sequence MLE and MAC keys are derived
//! on every change of key or sequence.
//!
//! # Key sequence rules
//!
//! - The administrative setter applies any value at once and restarts the
//!   rotation clock.
//! - The rotation path (leader timer, newer sequence heard on the air) only
//!   advances once the key switch guard time has elapsed since the last
//!   switch.
//! - Both frame counters reset whenever the sequence changes.

use thread_common::config::{KeyConfig, KeyStorageMode};
use thread_common::constants::{
    CHALLENGE_SIZE, DEFAULT_NETWORK_KEY, FRAME_COUNTER_STORE_AHEAD, RESPONSE_TAG_SIZE,
};
use thread_common::{Error, ExtAddress, Instant, Millis, NetworkKey, NetworkKeyRef, Result};
use thread_crypto::hash::hmac_sha256;
use thread_crypto::kdf::{kdf_input, DerivedKeys};
use thread_crypto::zeroize_utils::constant_time_compare;
use zeroize::Zeroize;

use crate::leader::serial_newer_u32;
use crate::platform::KeyStore;

/// Where the network key lives
#[derive(Debug)]
pub enum KeyMaterial {
    /// Key bytes held here
    Literal(NetworkKey),
    /// Key bytes held by the key store
    Reference(NetworkKeyRef),
}

/// Outcome of checking a received key sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySequenceCheck {
    /// Matches the current sequence
    Current,
    /// One behind the current sequence (frames in flight across a switch)
    Previous,
    /// Newer and the guard elapsed: the sequence advanced to it
    Rotated,
    /// Older, or newer while the guard is active
    Rejected,
}

/// MLE handshake response tag
pub type ResponseTag = [u8; RESPONSE_TAG_SIZE];

/// MLE handshake challenge
pub type Challenge = [u8; CHALLENGE_SIZE];

/// Key manager state
pub struct KeyManager {
    material: KeyMaterial,
    key_sequence: u32,
    keys: DerivedKeys,
    guard_time: Millis,
    rotation_time: Millis,
    last_switch: Instant,
    mle_frame_counter: u32,
    mac_frame_counter: u32,
    stored_mle_frame_counter: u32,
    stored_mac_frame_counter: u32,
}

impl KeyManager {
    /// Create a key manager holding the default network key
    ///
    /// In reference mode the default key is imported into `store`.
    ///
    /// # Errors
    ///
    /// Propagates key store and derivation failures.
    pub fn new(config: &KeyConfig, store: &mut dyn KeyStore) -> Result<Self> {
        let key = NetworkKey::new(DEFAULT_NETWORK_KEY);
        let material = match config.storage {
            KeyStorageMode::Literal => KeyMaterial::Literal(key),
            KeyStorageMode::Reference => KeyMaterial::Reference(store.import_network_key(&key)?),
        };
        let keys = derive(&material, store, 0)?;
        Ok(Self {
            material,
            key_sequence: 0,
            keys,
            guard_time: Millis::from_hours(config.key_switch_guard_time_hours),
            rotation_time: Millis::from_hours(config.key_rotation_time_hours),
            last_switch: Instant::ZERO,
            mle_frame_counter: 0,
            mac_frame_counter: 0,
            stored_mle_frame_counter: 0,
            stored_mac_frame_counter: 0,
        })
    }

    /// Storage mode in use
    #[must_use]
    pub const fn storage_mode(&self) -> KeyStorageMode {
        match self.material {
            KeyMaterial::Literal(_) => KeyStorageMode::Literal,
            KeyMaterial::Reference(_) => KeyStorageMode::Reference,
        }
    }

    /// Current network key
    ///
    /// In reference mode the key is exported from the store.
    ///
    /// # Errors
    ///
    /// Propagates key store failures.
    pub fn network_key(&self, store: &mut dyn KeyStore) -> Result<NetworkKey> {
        match &self.material {
            KeyMaterial::Literal(key) => Ok(key.clone()),
            KeyMaterial::Reference(key_ref) => store.export_network_key(*key_ref),
        }
    }

    /// Current key reference (reference mode only)
    #[must_use]
    pub const fn network_key_ref(&self) -> Option<NetworkKeyRef> {
        match self.material {
            KeyMaterial::Reference(r) => Some(r),
            KeyMaterial::Literal(_) => None,
        }
    }

    /// Replace the network key
    ///
    /// In reference mode the key is imported and the previous reference
    /// destroyed. Returns `true` if the key changed.
    ///
    /// # Errors
    ///
    /// Propagates key store and derivation failures.
    pub fn set_network_key(&mut self, key: NetworkKey, store: &mut dyn KeyStore) -> Result<bool> {
        let material = match &self.material {
            KeyMaterial::Literal(current) => {
                if *current == key {
                    return Ok(false);
                }
                KeyMaterial::Literal(key)
            }
            KeyMaterial::Reference(current) => {
                if store.export_network_key(*current).is_ok_and(|k| k == key) {
                    return Ok(false);
                }
                KeyMaterial::Reference(store.import_network_key(&key)?)
            }
        };
        self.replace_material(material, store)?;
        Ok(true)
    }

    /// Point at a different key in the store
    ///
    /// # Errors
    ///
    /// `Error::NotImplemented` in literal mode, `Error::InvalidKeyRef` when
    /// the store does not know the reference.
    pub fn set_network_key_ref(&mut self, key_ref: NetworkKeyRef, store: &mut dyn KeyStore) -> Result<bool> {
        let KeyMaterial::Reference(current) = self.material else {
            return Err(Error::NotImplemented);
        };
        if current == key_ref {
            return Ok(false);
        }
        if !store.contains(key_ref) {
            return Err(Error::InvalidKeyRef);
        }
        self.keys = derive(&KeyMaterial::Reference(key_ref), store, self.key_sequence)?;
        self.material = KeyMaterial::Reference(key_ref);
        Ok(true)
    }

    fn replace_material(&mut self, material: KeyMaterial, store: &mut dyn KeyStore) -> Result<()> {
        self.keys = derive(&material, store, self.key_sequence)?;
        let old = core::mem::replace(&mut self.material, material);
        if let KeyMaterial::Reference(old_ref) = old {
            // the old key may be shared with nobody; failure to destroy is not fatal
            let _ = store.destroy_key(old_ref);
        }
        Ok(())
    }

    /// Current key sequence
    #[must_use]
    pub const fn key_sequence(&self) -> u32 {
        self.key_sequence
    }

    /// Derived keys of the current sequence
    #[must_use]
    pub const fn current_keys(&self) -> &DerivedKeys {
        &self.keys
    }

    /// Administrative sequence change: applies immediately and restarts the
    /// rotation clock
    ///
    /// # Errors
    ///
    /// Propagates derivation failures.
    pub fn set_key_sequence(&mut self, sequence: u32, now: Instant, store: &mut dyn KeyStore) -> Result<bool> {
        self.last_switch = now;
        if sequence == self.key_sequence {
            return Ok(false);
        }
        self.switch_to(sequence, store)?;
        Ok(true)
    }

    fn switch_to(&mut self, sequence: u32, store: &mut dyn KeyStore) -> Result<()> {
        self.keys = derive(&self.material, store, sequence)?;
        self.key_sequence = sequence;
        self.mle_frame_counter = 0;
        self.mac_frame_counter = 0;
        self.stored_mle_frame_counter = 0;
        self.stored_mac_frame_counter = 0;
        Ok(())
    }

    /// Key switch guard time in hours
    #[must_use]
    pub fn key_switch_guard_time(&self) -> u32 {
        u32::try_from(self.guard_time.as_hours()).unwrap_or(u32::MAX)
    }

    /// Change the key switch guard time; 0 disables the guard
    pub fn set_key_switch_guard_time(&mut self, hours: u32) {
        self.guard_time = Millis::from_hours(hours);
    }

    /// Guard time since the last switch has passed
    #[must_use]
    pub const fn is_guard_elapsed(&self, now: Instant) -> bool {
        self.last_switch.has_elapsed(now, self.guard_time)
    }

    /// Rotation time since the last switch has passed (leader timer)
    #[must_use]
    pub const fn is_rotation_due(&self, now: Instant) -> bool {
        self.last_switch.has_elapsed(now, self.rotation_time)
    }

    /// Time of the last sequence switch
    #[must_use]
    pub const fn last_switch(&self) -> Instant {
        self.last_switch
    }

    /// Advance the sequence by one through the rotation path
    ///
    /// Returns `false` without changing anything while the guard is active.
    ///
    /// # Errors
    ///
    /// Propagates derivation failures.
    pub fn try_rotate(&mut self, now: Instant, store: &mut dyn KeyStore) -> Result<bool> {
        if !self.is_guard_elapsed(now) {
            return Ok(false);
        }
        self.switch_to(self.key_sequence.wrapping_add(1), store)?;
        self.last_switch = now;
        Ok(true)
    }

    /// Check the key sequence of a received frame, advancing to it when it
    /// is newer and the guard allows
    ///
    /// # Errors
    ///
    /// Propagates derivation failures.
    pub fn accept_key_sequence(&mut self, received: u32, now: Instant, store: &mut dyn KeyStore) -> Result<KeySequenceCheck> {
        if received == self.key_sequence {
            return Ok(KeySequenceCheck::Current);
        }
        if received == self.key_sequence.wrapping_sub(1) {
            return Ok(KeySequenceCheck::Previous);
        }
        if serial_newer_u32(received, self.key_sequence) && self.is_guard_elapsed(now) {
            self.switch_to(received, store)?;
            self.last_switch = now;
            return Ok(KeySequenceCheck::Rotated);
        }
        Ok(KeySequenceCheck::Rejected)
    }

    /// Derived keys for an arbitrary sequence
    ///
    /// # Errors
    ///
    /// Propagates derivation failures.
    pub fn keys_for(&self, sequence: u32, store: &mut dyn KeyStore) -> Result<DerivedKeys> {
        if sequence == self.key_sequence {
            return Ok(self.keys.clone());
        }
        derive(&self.material, store, sequence)
    }

    fn tag_over(&self, sequence: u32, parts: &[&[u8]], store: &mut dyn KeyStore) -> Result<ResponseTag> {
        let keys = self.keys_for(sequence, store)?;
        let mac = hmac_sha256(keys.mle_key(), parts)?;
        let mut tag = [0u8; RESPONSE_TAG_SIZE];
        tag.copy_from_slice(&mac.as_bytes()[..RESPONSE_TAG_SIZE]);
        Ok(tag)
    }

    /// MLE handshake response tag: `HMAC-SHA256(mle_key, challenge || ext)[..8]`
    ///
    /// # Errors
    ///
    /// Propagates derivation failures.
    pub fn response_tag(
        &self,
        sequence: u32,
        challenge: &Challenge,
        responder: &ExtAddress,
        store: &mut dyn KeyStore,
    ) -> Result<ResponseTag> {
        self.tag_over(sequence, &[challenge.as_slice(), responder.as_bytes().as_slice()], store)
    }

    /// Verify a response tag in constant time
    ///
    /// # Errors
    ///
    /// `Error::Security` on mismatch; derivation failures propagate.
    pub fn verify_response_tag(
        &self,
        sequence: u32,
        challenge: &Challenge,
        responder: &ExtAddress,
        tag: &ResponseTag,
        store: &mut dyn KeyStore,
    ) -> Result<()> {
        let expected = self.response_tag(sequence, challenge, responder, store)?;
        check_tag(&expected, tag)
    }

    /// Per-frame integrity code: `HMAC-SHA256(mle_key, authenticated)[..8]`
    ///
    /// `authenticated` is the frame's canonical encoding (header, key
    /// sequence, frame counter and body), see
    /// [`MleFrame::authenticated_data`](crate::message::MleFrame::authenticated_data).
    ///
    /// # Errors
    ///
    /// Propagates derivation failures.
    pub fn frame_mic(&self, sequence: u32, authenticated: &[u8], store: &mut dyn KeyStore) -> Result<ResponseTag> {
        self.tag_over(sequence, &[authenticated], store)
    }

    /// Verify a frame integrity code in constant time
    ///
    /// # Errors
    ///
    /// `Error::Security` on mismatch; derivation failures propagate.
    pub fn verify_frame_mic(
        &self,
        sequence: u32,
        authenticated: &[u8],
        mic: &ResponseTag,
        store: &mut dyn KeyStore,
    ) -> Result<()> {
        let expected = self.frame_mic(sequence, authenticated, store)?;
        check_tag(&expected, mic)
    }

    // -- frame counters ------------------------------------------------------

    /// Current MLE frame counter
    #[must_use]
    pub const fn mle_frame_counter(&self) -> u32 {
        self.mle_frame_counter
    }

    /// Current MAC frame counter
    #[must_use]
    pub const fn mac_frame_counter(&self) -> u32 {
        self.mac_frame_counter
    }

    /// Consume one MLE and one MAC frame counter value for an outbound frame
    ///
    /// Returns `true` when the persisted high-water mark must be raised.
    pub fn next_frame_counters(&mut self) -> bool {
        self.mle_frame_counter = self.mle_frame_counter.wrapping_add(1);
        self.mac_frame_counter = self.mac_frame_counter.wrapping_add(1);
        self.mle_frame_counter >= self.stored_mle_frame_counter
            || self.mac_frame_counter >= self.stored_mac_frame_counter
    }

    /// Values to persist: live counters plus the store-ahead margin
    ///
    /// Records them as the new high-water marks.
    pub fn frame_counters_to_store(&mut self) -> (u32, u32) {
        self.stored_mle_frame_counter = self.mle_frame_counter.saturating_add(FRAME_COUNTER_STORE_AHEAD);
        self.stored_mac_frame_counter = self.mac_frame_counter.saturating_add(FRAME_COUNTER_STORE_AHEAD);
        (self.stored_mle_frame_counter, self.stored_mac_frame_counter)
    }

    /// Restore persisted state after a restart
    ///
    /// Counters resume at the stored high-water marks, which are ahead of
    /// anything sent before the restart.
    ///
    /// # Errors
    ///
    /// Propagates derivation failures.
    pub fn restore(
        &mut self,
        sequence: u32,
        mle_frame_counter: u32,
        mac_frame_counter: u32,
        store: &mut dyn KeyStore,
    ) -> Result<()> {
        if sequence != self.key_sequence {
            self.keys = derive(&self.material, store, sequence)?;
            self.key_sequence = sequence;
        }
        self.mle_frame_counter = mle_frame_counter;
        self.mac_frame_counter = mac_frame_counter;
        self.stored_mle_frame_counter = mle_frame_counter;
        self.stored_mac_frame_counter = mac_frame_counter;
        Ok(())
    }
}

fn check_tag(expected: &ResponseTag, received: &ResponseTag) -> Result<()> {
    if constant_time_compare(expected, received) {
        Ok(())
    } else {
        Err(Error::Security)
    }
}

fn derive(material: &KeyMaterial, store: &mut dyn KeyStore, sequence: u32) -> Result<DerivedKeys> {
    match material {
        KeyMaterial::Literal(key) => Ok(DerivedKeys::derive(key.as_bytes(), sequence)?),
        KeyMaterial::Reference(key_ref) => {
            let mut okm = store
                .hmac_sha256(*key_ref, &kdf_input(sequence))
                .map_err(|_| Error::KeyDerivationFailed)?;
            let keys = DerivedKeys::from_okm(sequence, &okm);
            okm.zeroize();
            Ok(keys)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SoftwareKeyStore;

    const HOUR_MS: u64 = 3_600_000;

    fn manager(store: &mut SoftwareKeyStore) -> KeyManager {
        KeyManager::new(&KeyConfig::DEFAULT, store).unwrap()
    }

    fn at_hours(h: u64) -> Instant {
        Instant::from_millis(h * HOUR_MS)
    }

    #[test]
    fn test_guard_blocks_rotation() {
        let mut store = SoftwareKeyStore::new();
        let mut km = manager(&mut store);
        km.set_key_sequence(5, at_hours(1), &mut store).unwrap();

        // guard is 624 h from the admin switch at 1 h
        assert!(!km.try_rotate(at_hours(624), &mut store).unwrap());
        assert_eq!(km.key_sequence(), 5);
        assert!(km.try_rotate(at_hours(625), &mut store).unwrap());
        assert_eq!(km.key_sequence(), 6);
    }

    #[test]
    fn test_zero_guard_time_allows_immediate_rotation() {
        let mut store = SoftwareKeyStore::new();
        let mut km = manager(&mut store);
        assert_eq!(km.key_switch_guard_time(), 624);
        km.set_key_switch_guard_time(0);
        assert_eq!(km.key_switch_guard_time(), 0);
        assert!(km.try_rotate(at_hours(0), &mut store).unwrap());
        assert!(km.try_rotate(at_hours(0), &mut store).unwrap());
        assert_eq!(km.key_sequence(), 2);
    }

    #[test]
    fn test_admin_set_bypasses_guard() {
        let mut store = SoftwareKeyStore::new();
        let mut km = manager(&mut store);
        km.set_key_sequence(1, at_hours(0), &mut store).unwrap();
        km.set_key_sequence(2, at_hours(0), &mut store).unwrap();
        assert_eq!(km.key_sequence(), 2);
    }

    #[test]
    fn test_received_sequence_classification() {
        let mut store = SoftwareKeyStore::new();
        let mut km = manager(&mut store);
        km.set_key_sequence(10, at_hours(0), &mut store).unwrap();

        assert_eq!(km.accept_key_sequence(10, at_hours(1), &mut store).unwrap(), KeySequenceCheck::Current);
        assert_eq!(km.accept_key_sequence(9, at_hours(1), &mut store).unwrap(), KeySequenceCheck::Previous);
        assert_eq!(km.accept_key_sequence(8, at_hours(1), &mut store).unwrap(), KeySequenceCheck::Rejected);
        assert_eq!(km.accept_key_sequence(11, at_hours(1), &mut store).unwrap(), KeySequenceCheck::Rejected);
        assert_eq!(km.key_sequence(), 10);

        assert_eq!(km.accept_key_sequence(11, at_hours(700), &mut store).unwrap(), KeySequenceCheck::Rotated);
        assert_eq!(km.key_sequence(), 11);
        assert_eq!(km.last_switch(), at_hours(700));
    }

    #[test]
    fn test_sequence_change_resets_counters() {
        let mut store = SoftwareKeyStore::new();
        let mut km = manager(&mut store);
        km.next_frame_counters();
        km.next_frame_counters();
        assert_eq!(km.mle_frame_counter(), 2);
        km.set_key_sequence(3, Instant::ZERO, &mut store).unwrap();
        assert_eq!(km.mle_frame_counter(), 0);
        assert_eq!(km.mac_frame_counter(), 0);
    }

    #[test]
    fn test_store_ahead() {
        let mut store = SoftwareKeyStore::new();
        let mut km = manager(&mut store);
        assert!(km.next_frame_counters());
        assert_eq!(km.frame_counters_to_store(), (1001, 1001));
        for _ in 0..999 {
            assert!(!km.next_frame_counters());
        }
        assert!(km.next_frame_counters());
    }

    #[test]
    fn test_reference_mode_matches_literal() {
        let mut store = SoftwareKeyStore::new();
        let literal = manager(&mut store);
        let config = KeyConfig {
            storage: KeyStorageMode::Reference,
            ..KeyConfig::DEFAULT
        };
        let reference = KeyManager::new(&config, &mut store).unwrap();
        assert_eq!(reference.storage_mode(), KeyStorageMode::Reference);
        assert!(reference.network_key_ref().is_some());
        assert_eq!(
            literal.current_keys().mle_key(),
            reference.current_keys().mle_key()
        );
        assert_eq!(reference.network_key(&mut store).unwrap(), NetworkKey::new(DEFAULT_NETWORK_KEY));
    }

    #[test]
    fn test_key_ref_in_literal_mode() {
        let mut store = SoftwareKeyStore::new();
        let mut km = manager(&mut store);
        let r = NetworkKeyRef::new(1).unwrap();
        assert_eq!(km.set_network_key_ref(r, &mut store), Err(Error::NotImplemented));
    }

    #[test]
    fn test_set_network_key_rederives() {
        let mut store = SoftwareKeyStore::new();
        let mut km = manager(&mut store);
        let before = km.current_keys().clone();
        assert!(km.set_network_key(NetworkKey::new([9; 16]), &mut store).unwrap());
        assert_ne!(before.mle_key(), km.current_keys().mle_key());
        assert!(!km.set_network_key(NetworkKey::new([9; 16]), &mut store).unwrap());
    }

    #[test]
    fn test_response_tag_depends_on_key() {
        let mut store = SoftwareKeyStore::new();
        let a = manager(&mut store);
        let mut b = manager(&mut store);
        b.set_network_key(NetworkKey::new([1; 16]), &mut store).unwrap();

        let challenge = [3u8; 8];
        let ext = ExtAddress::new([4; 8]);
        let tag = a.response_tag(0, &challenge, &ext, &mut store).unwrap();
        assert!(a.verify_response_tag(0, &challenge, &ext, &tag, &mut store).is_ok());
        assert_eq!(
            b.verify_response_tag(0, &challenge, &ext, &tag, &mut store),
            Err(Error::Security)
        );
    }

    #[test]
    fn test_frame_mic_binds_content_and_sequence() {
        let mut store = SoftwareKeyStore::new();
        let km = manager(&mut store);
        let data = [4u8, 1, 2, 3, 41];
        let mic = km.frame_mic(0, &data, &mut store).unwrap();
        assert!(km.verify_frame_mic(0, &data, &mic, &mut store).is_ok());
        assert_eq!(km.verify_frame_mic(0, &[4, 1, 2, 3, 42], &mic, &mut store), Err(Error::Security));
        assert_eq!(km.verify_frame_mic(1, &data, &mic, &mut store), Err(Error::Security));
    }
}
