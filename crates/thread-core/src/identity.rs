// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Network identity parameters
//!
//! Network name, domain name, extended PAN ID, mesh-local prefix, PAN ID and
//! channel. The mesh-local prefix follows the extended PAN ID until it is set
//! explicitly.

use thread_common::constants::{
    DEFAULT_CHANNEL, DEFAULT_DOMAIN_NAME, DEFAULT_EXT_PAN_ID, DEFAULT_MESH_LOCAL_PREFIX,
    DEFAULT_NETWORK_NAME, DEFAULT_PAN_ID,
};
use thread_common::{DomainName, ExtendedPanId, MeshLocalPrefix, NetworkName, Result};

use crate::dataset::OperationalDataset;

/// Identity of the network this device belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    network_name: NetworkName,
    domain_name: DomainName,
    extended_pan_id: ExtendedPanId,
    mesh_local_prefix: MeshLocalPrefix,
    prefix_explicit: bool,
    pan_id: u16,
    channel: u8,
}

impl NetworkIdentity {
    /// Factory defaults
    ///
    /// # Errors
    ///
    /// Fails only if the default names exceed their bounds.
    pub fn new() -> Result<Self> {
        Ok(Self {
            network_name: NetworkName::new(DEFAULT_NETWORK_NAME)?,
            domain_name: DomainName::new(DEFAULT_DOMAIN_NAME)?,
            extended_pan_id: ExtendedPanId::new(DEFAULT_EXT_PAN_ID),
            mesh_local_prefix: MeshLocalPrefix::new(DEFAULT_MESH_LOCAL_PREFIX),
            prefix_explicit: false,
            pan_id: DEFAULT_PAN_ID,
            channel: DEFAULT_CHANNEL,
        })
    }

    /// Network name
    #[must_use]
    pub const fn network_name(&self) -> &NetworkName {
        &self.network_name
    }

    /// Set the network name
    pub fn set_network_name(&mut self, name: NetworkName) -> bool {
        let changed = self.network_name != name;
        self.network_name = name;
        changed
    }

    /// Domain name
    #[must_use]
    pub const fn domain_name(&self) -> &DomainName {
        &self.domain_name
    }

    /// Set the domain name
    pub fn set_domain_name(&mut self, name: DomainName) -> bool {
        let changed = self.domain_name != name;
        self.domain_name = name;
        changed
    }

    /// Extended PAN ID
    #[must_use]
    pub const fn extended_pan_id(&self) -> ExtendedPanId {
        self.extended_pan_id
    }

    /// Set the extended PAN ID; re-derives the prefix unless it was set
    /// explicitly
    pub fn set_extended_pan_id(&mut self, xpanid: ExtendedPanId) -> bool {
        let changed = self.extended_pan_id != xpanid;
        self.extended_pan_id = xpanid;
        if !self.prefix_explicit {
            self.mesh_local_prefix = MeshLocalPrefix::from_extended_pan_id(&xpanid);
        }
        changed
    }

    /// Mesh-local prefix
    #[must_use]
    pub const fn mesh_local_prefix(&self) -> MeshLocalPrefix {
        self.mesh_local_prefix
    }

    /// Prefix was set explicitly rather than derived
    #[must_use]
    pub const fn is_prefix_explicit(&self) -> bool {
        self.prefix_explicit
    }

    /// Set the mesh-local prefix explicitly
    pub fn set_mesh_local_prefix(&mut self, prefix: MeshLocalPrefix) -> bool {
        let changed = self.mesh_local_prefix != prefix;
        self.mesh_local_prefix = prefix;
        self.prefix_explicit = true;
        changed
    }

    /// Switch the prefix back to following the extended PAN ID
    pub fn derive_mesh_local_prefix(&mut self) -> bool {
        let derived = MeshLocalPrefix::from_extended_pan_id(&self.extended_pan_id);
        let changed = self.mesh_local_prefix != derived;
        self.mesh_local_prefix = derived;
        self.prefix_explicit = false;
        changed
    }

    /// PAN ID
    #[must_use]
    pub const fn pan_id(&self) -> u16 {
        self.pan_id
    }

    /// Operating channel
    #[must_use]
    pub const fn channel(&self) -> u8 {
        self.channel
    }

    /// Apply the fields present in a dataset
    pub fn apply_dataset(&mut self, dataset: &OperationalDataset) {
        if let Some(name) = &dataset.network_name {
            self.network_name = name.clone();
        }
        if let Some(xpanid) = dataset.extended_pan_id {
            self.extended_pan_id = xpanid;
        }
        if let Some(prefix) = dataset.mesh_local_prefix {
            self.mesh_local_prefix = prefix;
            self.prefix_explicit = true;
        } else if !self.prefix_explicit {
            self.mesh_local_prefix = MeshLocalPrefix::from_extended_pan_id(&self.extended_pan_id);
        }
        if let Some(pan_id) = dataset.pan_id {
            self.pan_id = pan_id;
        }
        if let Some(channel) = dataset.channel {
            self.channel = channel;
        }
    }

    /// Fill a dataset with the identity fields
    pub fn fill_dataset(&self, dataset: &mut OperationalDataset) {
        dataset.network_name = Some(self.network_name.clone());
        dataset.extended_pan_id = Some(self.extended_pan_id);
        dataset.mesh_local_prefix = Some(self.mesh_local_prefix);
        dataset.pan_id = Some(self.pan_id);
        dataset.channel = Some(self.channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let id = NetworkIdentity::new().unwrap();
        assert_eq!(id.network_name().as_str(), DEFAULT_NETWORK_NAME);
        // the default prefix is the one derived from the default XPANID
        assert_eq!(id.mesh_local_prefix().as_bytes(), &DEFAULT_MESH_LOCAL_PREFIX);
        assert_eq!(id.mesh_local_prefix(), MeshLocalPrefix::from_extended_pan_id(&id.extended_pan_id()));
        assert!(!id.is_prefix_explicit());
    }

    #[test]
    fn test_derived_prefix_follows_xpanid() {
        let mut id = NetworkIdentity::new().unwrap();
        let xp = ExtendedPanId::new([1, 2, 3, 4, 5, 6, 7, 8]);
        id.set_extended_pan_id(xp);
        assert_eq!(id.mesh_local_prefix(), MeshLocalPrefix::from_extended_pan_id(&xp));
    }

    #[test]
    fn test_explicit_prefix_survives_xpanid_change() {
        let mut id = NetworkIdentity::new().unwrap();
        let p = MeshLocalPrefix::new([0xfd, 0, 0, 0, 0, 0, 0, 1]);
        id.set_mesh_local_prefix(p);
        id.set_extended_pan_id(ExtendedPanId::new([9; 8]));
        assert_eq!(id.mesh_local_prefix(), p);
    }

    #[test]
    fn test_apply_partial_dataset() {
        let mut id = NetworkIdentity::new().unwrap();
        let ds = OperationalDataset {
            channel: Some(15),
            ..OperationalDataset::default()
        };
        id.apply_dataset(&ds);
        assert_eq!(id.channel(), 15);
        assert_eq!(id.pan_id(), DEFAULT_PAN_ID);
    }
}
