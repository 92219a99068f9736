// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Persistent settings
//!
//! The control plane persists a small network info record and the two
//! operational datasets through [`SettingsStore`]. Frame counters are
//! written ahead of their live value so a reboot never reuses a counter.

use thread_common::{Error, ExtAddress, InterfaceIdentifier, Result};

use crate::dataset::{DatasetKind, OperationalDataset};

/// Network state that survives a restart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Key sequence in use
    pub key_sequence: u32,
    /// MLE frame counter high-water mark
    pub mle_frame_counter: u32,
    /// MAC frame counter high-water mark
    pub mac_frame_counter: u32,
    /// Short address at the time of saving
    pub rloc16: u16,
    /// Extended address at the time of saving
    pub ext_address: ExtAddress,
    /// Mesh-local EID interface identifier
    pub ml_eid_iid: InterfaceIdentifier,
    /// Partition last joined or created
    pub previous_partition_id: u32,
    /// Router ID last held, if any
    pub previous_router_id: Option<u8>,
}

/// Storage backend for settings
///
/// Implementations map each call onto whatever non-volatile medium the
/// platform has.
pub trait SettingsStore {
    /// Read the network info record
    ///
    /// # Errors
    ///
    /// `Error::StorageReadFailed` when the medium cannot be read.
    fn read_network_info(&mut self) -> Result<Option<NetworkInfo>>;

    /// Write the network info record
    ///
    /// # Errors
    ///
    /// `Error::StorageWriteFailed` when the medium cannot be written.
    fn save_network_info(&mut self, info: &NetworkInfo) -> Result<()>;

    /// Delete the network info record
    ///
    /// # Errors
    ///
    /// `Error::StorageWriteFailed` when the medium cannot be written.
    fn delete_network_info(&mut self) -> Result<()>;

    /// Read a dataset
    ///
    /// # Errors
    ///
    /// `Error::StorageReadFailed` when the medium cannot be read.
    fn read_dataset(&mut self, kind: DatasetKind) -> Result<Option<OperationalDataset>>;

    /// Write a dataset
    ///
    /// # Errors
    ///
    /// `Error::StorageWriteFailed` when the medium cannot be written.
    fn save_dataset(&mut self, kind: DatasetKind, dataset: &OperationalDataset) -> Result<()>;

    /// Delete a dataset
    ///
    /// # Errors
    ///
    /// `Error::StorageWriteFailed` when the medium cannot be written.
    fn delete_dataset(&mut self, kind: DatasetKind) -> Result<()>;
}

/// Volatile settings store
///
/// Keeps everything in RAM. Writes can be made to fail for testing
/// persistence error paths.
#[derive(Debug, Default)]
pub struct MemorySettings {
    network_info: Option<NetworkInfo>,
    active: Option<OperationalDataset>,
    pending: Option<OperationalDataset>,
    writes: u32,
    fail_writes: bool,
}

impl MemorySettings {
    /// Empty store
    #[must_use]
    pub const fn new() -> Self {
        Self {
            network_info: None,
            active: None,
            pending: None,
            writes: 0,
            fail_writes: false,
        }
    }

    /// Number of successful writes (saves and deletes)
    #[must_use]
    pub const fn writes(&self) -> u32 {
        self.writes
    }

    /// Make every subsequent write fail with `StorageWriteFailed`
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Peek at the stored network info without going through the trait
    #[must_use]
    pub const fn network_info(&self) -> Option<&NetworkInfo> {
        self.network_info.as_ref()
    }

    fn check_write(&mut self) -> Result<()> {
        if self.fail_writes {
            return Err(Error::StorageWriteFailed);
        }
        self.writes = self.writes.saturating_add(1);
        Ok(())
    }

    fn slot(&mut self, kind: DatasetKind) -> &mut Option<OperationalDataset> {
        match kind {
            DatasetKind::Active => &mut self.active,
            DatasetKind::Pending => &mut self.pending,
        }
    }
}

impl SettingsStore for MemorySettings {
    fn read_network_info(&mut self) -> Result<Option<NetworkInfo>> {
        Ok(self.network_info)
    }

    fn save_network_info(&mut self, info: &NetworkInfo) -> Result<()> {
        self.check_write()?;
        self.network_info = Some(*info);
        Ok(())
    }

    fn delete_network_info(&mut self) -> Result<()> {
        self.check_write()?;
        self.network_info = None;
        Ok(())
    }

    fn read_dataset(&mut self, kind: DatasetKind) -> Result<Option<OperationalDataset>> {
        Ok(self.slot(kind).clone())
    }

    fn save_dataset(&mut self, kind: DatasetKind, dataset: &OperationalDataset) -> Result<()> {
        self.check_write()?;
        *self.slot(kind) = Some(dataset.clone());
        Ok(())
    }

    fn delete_dataset(&mut self, kind: DatasetKind) -> Result<()> {
        self.check_write()?;
        *self.slot(kind) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> NetworkInfo {
        NetworkInfo {
            key_sequence: 3,
            mle_frame_counter: 1000,
            mac_frame_counter: 1000,
            rloc16: 0x0400,
            ext_address: ExtAddress::new([1; 8]),
            ml_eid_iid: InterfaceIdentifier::new([2; 8]),
            previous_partition_id: 0xdead,
            previous_router_id: Some(1),
        }
    }

    #[test]
    fn test_network_info_roundtrip() {
        let mut s = MemorySettings::new();
        assert_eq!(s.read_network_info().unwrap(), None);
        s.save_network_info(&info()).unwrap();
        assert_eq!(s.read_network_info().unwrap(), Some(info()));
        s.delete_network_info().unwrap();
        assert_eq!(s.read_network_info().unwrap(), None);
        assert_eq!(s.writes(), 2);
    }

    #[test]
    fn test_write_failure_leaves_state() {
        let mut s = MemorySettings::new();
        s.save_network_info(&info()).unwrap();
        s.set_fail_writes(true);
        assert_eq!(s.delete_network_info(), Err(Error::StorageWriteFailed));
        assert!(s.network_info().is_some());
    }
}
