// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Platform abstraction
//!
//! The control plane reaches storage, key material and randomness only
//! through [`Platform`]. A software implementation backed by RAM and an
//! HMAC-DRBG is provided for hosts and tests.

use heapless::Vec;
use thread_common::{Error, Eui64, ExtAddress, NetworkKey, NetworkKeyRef, Result};
use thread_crypto::{hmac_sha256, CryptoRng, HmacDrbg};

use crate::settings::{MemorySettings, SettingsStore};

/// Maximum keys held by the software key store
pub const SOFTWARE_KEY_SLOTS: usize = 4;

/// Opaque key storage
///
/// Keys referenced by [`NetworkKeyRef`] never leave the store except through
/// an explicit export.
pub trait KeyStore {
    /// Import a key and return its reference
    ///
    /// # Errors
    ///
    /// `Error::NoBufs` when the store is full.
    fn import_network_key(&mut self, key: &NetworkKey) -> Result<NetworkKeyRef>;

    /// Export the key bytes behind a reference
    ///
    /// # Errors
    ///
    /// `Error::InvalidKeyRef` for unknown references.
    fn export_network_key(&mut self, key_ref: NetworkKeyRef) -> Result<NetworkKey>;

    /// HMAC-SHA256 keyed with the referenced key
    ///
    /// # Errors
    ///
    /// `Error::InvalidKeyRef` for unknown references.
    fn hmac_sha256(&mut self, key_ref: NetworkKeyRef, message: &[u8]) -> Result<[u8; 32]>;

    /// Check whether a reference is known
    fn contains(&self, key_ref: NetworkKeyRef) -> bool;

    /// Destroy a key
    ///
    /// # Errors
    ///
    /// `Error::InvalidKeyRef` for unknown references.
    fn destroy_key(&mut self, key_ref: NetworkKeyRef) -> Result<()>;
}

/// Services the control plane needs from its host
pub trait Platform {
    /// Non-volatile settings
    fn settings(&mut self) -> &mut dyn SettingsStore;

    /// Key store used in reference key mode
    fn key_store(&mut self) -> &mut dyn KeyStore;

    /// Random source
    fn rng(&mut self) -> &mut dyn CryptoRng;

    /// Factory-assigned IEEE EUI-64
    fn factory_eui64(&self) -> Eui64;

    /// Extended address used on the link
    fn ext_address(&self) -> ExtAddress {
        ExtAddress::new(*self.factory_eui64().as_bytes())
    }
}

/// Key store holding keys in RAM
///
/// Keys are wiped when destroyed or when the store is dropped.
#[derive(Default)]
pub struct SoftwareKeyStore {
    keys: Vec<(NetworkKeyRef, NetworkKey), SOFTWARE_KEY_SLOTS>,
    next_ref: u32,
}

impl SoftwareKeyStore {
    /// Empty store
    #[must_use]
    pub const fn new() -> Self {
        Self {
            keys: Vec::new(),
            next_ref: 1,
        }
    }

    fn find(&self, key_ref: NetworkKeyRef) -> Result<&NetworkKey> {
        self.keys
            .iter()
            .find(|(r, _)| *r == key_ref)
            .map(|(_, k)| k)
            .ok_or(Error::InvalidKeyRef)
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyStore for SoftwareKeyStore {
    fn import_network_key(&mut self, key: &NetworkKey) -> Result<NetworkKeyRef> {
        let key_ref = NetworkKeyRef::new(self.next_ref.max(1))?;
        self.keys
            .push((key_ref, key.clone()))
            .map_err(|_| Error::NoBufs)?;
        self.next_ref = key_ref.get().wrapping_add(1);
        Ok(key_ref)
    }

    fn export_network_key(&mut self, key_ref: NetworkKeyRef) -> Result<NetworkKey> {
        self.find(key_ref).cloned()
    }

    fn hmac_sha256(&mut self, key_ref: NetworkKeyRef, message: &[u8]) -> Result<[u8; 32]> {
        let key = self.find(key_ref)?;
        let tag = hmac_sha256(key.as_bytes(), &[message])?;
        Ok(*tag.as_bytes())
    }

    fn contains(&self, key_ref: NetworkKeyRef) -> bool {
        self.find(key_ref).is_ok()
    }

    fn destroy_key(&mut self, key_ref: NetworkKeyRef) -> Result<()> {
        let idx = self
            .keys
            .iter()
            .position(|(r, _)| *r == key_ref)
            .ok_or(Error::InvalidKeyRef)?;
        // dropping the entry zeroizes the key
        self.keys.swap_remove(idx);
        Ok(())
    }
}

/// Host platform: RAM settings, software key store, HMAC-DRBG
pub struct SoftwarePlatform {
    settings: MemorySettings,
    key_store: SoftwareKeyStore,
    rng: HmacDrbg,
    eui64: Eui64,
}

impl SoftwarePlatform {
    /// Create a platform seeded with `seed`
    ///
    /// # Errors
    ///
    /// Fails if the seed does not pass the DRBG entropy health test.
    pub fn new(eui64: Eui64, seed: &[u8; 32]) -> Result<Self> {
        Ok(Self {
            settings: MemorySettings::new(),
            key_store: SoftwareKeyStore::new(),
            rng: HmacDrbg::from_seed(seed)?,
            eui64,
        })
    }

    /// Direct access to the RAM settings
    #[must_use]
    pub const fn memory_settings(&self) -> &MemorySettings {
        &self.settings
    }

    /// Direct mutable access to the RAM settings
    pub fn memory_settings_mut(&mut self) -> &mut MemorySettings {
        &mut self.settings
    }

    /// Direct access to the software key store
    #[must_use]
    pub const fn software_key_store(&self) -> &SoftwareKeyStore {
        &self.key_store
    }
}

impl Platform for SoftwarePlatform {
    fn settings(&mut self) -> &mut dyn SettingsStore {
        &mut self.settings
    }

    fn key_store(&mut self) -> &mut dyn KeyStore {
        &mut self.key_store
    }

    fn rng(&mut self) -> &mut dyn CryptoRng {
        &mut self.rng
    }

    fn factory_eui64(&self) -> Eui64 {
        self.eui64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thread_crypto::kdf::{kdf_input, DerivedKeys};

    #[test]
    fn test_import_export_destroy() {
        let mut ks = SoftwareKeyStore::new();
        let key = NetworkKey::new([7; 16]);
        let r = ks.import_network_key(&key).unwrap();
        assert!(ks.contains(r));
        assert_eq!(ks.export_network_key(r).unwrap(), key);
        ks.destroy_key(r).unwrap();
        assert!(!ks.contains(r));
        assert_eq!(ks.export_network_key(r), Err(Error::InvalidKeyRef));
    }

    #[test]
    fn test_store_full() {
        let mut ks = SoftwareKeyStore::new();
        for i in 0..SOFTWARE_KEY_SLOTS {
            ks.import_network_key(&NetworkKey::new([i as u8; 16])).unwrap();
        }
        assert_eq!(
            ks.import_network_key(&NetworkKey::new([0xff; 16])),
            Err(Error::NoBufs)
        );
    }

    #[test]
    fn test_store_hmac_matches_literal_derivation() {
        let mut ks = SoftwareKeyStore::new();
        let key = NetworkKey::new([0x5a; 16]);
        let r = ks.import_network_key(&key).unwrap();
        let okm = ks.hmac_sha256(r, &kdf_input(9)).unwrap();
        let from_store = DerivedKeys::from_okm(9, &okm);
        let literal = DerivedKeys::derive(key.as_bytes(), 9).unwrap();
        assert_eq!(from_store.mle_key(), literal.mle_key());
    }

    #[test]
    fn test_ext_address_defaults_to_eui64() {
        let p = SoftwarePlatform::new(Eui64::new([1, 2, 3, 4, 5, 6, 7, 8]), &[0x11; 32]);
        // a constant seed fails the repetition health test
        assert!(p.is_err());

        let seed: [u8; 32] = core::array::from_fn(|i| i as u8);
        let p = SoftwarePlatform::new(Eui64::new([1, 2, 3, 4, 5, 6, 7, 8]), &seed).unwrap();
        assert_eq!(p.ext_address().as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
