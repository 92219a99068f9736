// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Active and pending operational datasets
//!
//! Datasets are kept in memory and mirrored into the settings store. Any
//! change to a network identity parameter invalidates both.

use thread_common::{ExtendedPanId, MeshLocalPrefix, NetworkKey, NetworkName, Result};

use crate::settings::SettingsStore;

/// Which dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// Active operational dataset
    Active,
    /// Pending operational dataset
    Pending,
}

/// Operational dataset; every field is optional
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationalDataset {
    /// Active timestamp
    pub active_timestamp: Option<u64>,
    /// Pending timestamp (pending dataset only)
    pub pending_timestamp: Option<u64>,
    /// Delay before a pending dataset becomes active, in milliseconds
    pub delay_timer: Option<u32>,
    /// Network key
    pub network_key: Option<NetworkKey>,
    /// Network name
    pub network_name: Option<NetworkName>,
    /// Extended PAN ID
    pub extended_pan_id: Option<ExtendedPanId>,
    /// Mesh-local prefix
    pub mesh_local_prefix: Option<MeshLocalPrefix>,
    /// PAN ID
    pub pan_id: Option<u16>,
    /// Channel
    pub channel: Option<u8>,
    /// Channel mask
    pub channel_mask: Option<u32>,
}

impl OperationalDataset {
    /// No field present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Holds both datasets
#[derive(Debug, Default)]
pub struct DatasetManager {
    active: Option<OperationalDataset>,
    pending: Option<OperationalDataset>,
}

impl DatasetManager {
    /// Empty manager
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: None,
            pending: None,
        }
    }

    /// Load both datasets from storage
    ///
    /// # Errors
    ///
    /// Propagates storage read failures.
    pub fn restore(&mut self, store: &mut dyn SettingsStore) -> Result<()> {
        self.active = store.read_dataset(DatasetKind::Active)?;
        self.pending = store.read_dataset(DatasetKind::Pending)?;
        Ok(())
    }

    /// Dataset of the given kind
    #[must_use]
    pub fn get(&self, kind: DatasetKind) -> Option<&OperationalDataset> {
        match kind {
            DatasetKind::Active => self.active.as_ref(),
            DatasetKind::Pending => self.pending.as_ref(),
        }
    }

    /// Check whether a dataset of the given kind exists
    #[must_use]
    pub fn is_present(&self, kind: DatasetKind) -> bool {
        self.get(kind).is_some()
    }

    /// Store a dataset
    ///
    /// # Errors
    ///
    /// Propagates storage write failures; memory is left unchanged then.
    pub fn save(
        &mut self,
        store: &mut dyn SettingsStore,
        kind: DatasetKind,
        dataset: OperationalDataset,
    ) -> Result<()> {
        store.save_dataset(kind, &dataset)?;
        match kind {
            DatasetKind::Active => self.active = Some(dataset),
            DatasetKind::Pending => self.pending = Some(dataset),
        }
        Ok(())
    }

    /// Drop both datasets from memory and storage
    ///
    /// Returns which kinds were present.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn clear_all(&mut self, store: &mut dyn SettingsStore) -> Result<(bool, bool)> {
        let had = (self.active.is_some(), self.pending.is_some());
        store.delete_dataset(DatasetKind::Active)?;
        store.delete_dataset(DatasetKind::Pending)?;
        self.active = None;
        self.pending = None;
        Ok(had)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;

    #[test]
    fn test_save_and_restore() {
        let mut store = MemorySettings::new();
        let mut m = DatasetManager::new();
        let ds = OperationalDataset {
            active_timestamp: Some(1),
            channel: Some(20),
            ..OperationalDataset::default()
        };
        m.save(&mut store, DatasetKind::Active, ds.clone()).unwrap();

        let mut fresh = DatasetManager::new();
        fresh.restore(&mut store).unwrap();
        assert_eq!(fresh.get(DatasetKind::Active), Some(&ds));
        assert!(!fresh.is_present(DatasetKind::Pending));
    }

    #[test]
    fn test_clear_all_removes_both() {
        let mut store = MemorySettings::new();
        let mut m = DatasetManager::new();
        m.save(&mut store, DatasetKind::Active, OperationalDataset::default()).unwrap();
        m.save(&mut store, DatasetKind::Pending, OperationalDataset::default()).unwrap();
        assert_eq!(m.clear_all(&mut store).unwrap(), (true, true));
        assert!(!m.is_present(DatasetKind::Active));
        assert!(store.read_dataset(DatasetKind::Pending).unwrap().is_none());
    }
}
