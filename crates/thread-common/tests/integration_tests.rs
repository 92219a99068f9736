// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Integration tests for thread-common
//!
//! Identity types, configuration defaults, time arithmetic and the log ring
//! buffer as seen from a dependent crate.

#![cfg(test)]

mod types_tests {
    use thread_common::constants::{DEFAULT_EXT_PAN_ID, DEFAULT_MESH_LOCAL_PREFIX};
    use thread_common::{
        rloc16_from_router_id, router_id_from_rloc16, ExtAddress, ExtendedPanId, InterfaceIdentifier,
        Ip6Address, MeshLocalPrefix, NetworkKey, NetworkName,
    };

    #[test]
    fn test_default_prefix_follows_default_xpanid() {
        let derived = MeshLocalPrefix::from_extended_pan_id(&ExtendedPanId::new(DEFAULT_EXT_PAN_ID));
        assert_eq!(derived.as_bytes(), &DEFAULT_MESH_LOCAL_PREFIX);
    }

    #[test]
    fn test_rloc_address_layout() {
        let prefix = MeshLocalPrefix::new(DEFAULT_MESH_LOCAL_PREFIX);
        let addr = Ip6Address::from_parts(&prefix, &InterfaceIdentifier::from_locator(0x0c01));
        assert_eq!(&addr.as_bytes()[..8], &DEFAULT_MESH_LOCAL_PREFIX);
        assert_eq!(&addr.as_bytes()[8..], &[0, 0, 0, 0xff, 0xfe, 0, 0x0c, 0x01]);
        assert_eq!(addr.to_string(), "fdde:ad00:beef::ff:fe00:c01");
    }

    #[test]
    fn test_link_local_iid() {
        let ext = ExtAddress::new([0x02, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(ext.to_iid().as_bytes(), &[0x00, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_router_id_round_trip_all_ids() {
        for id in 0..=62u8 {
            assert_eq!(router_id_from_rloc16(rloc16_from_router_id(id)), id);
        }
    }

    #[test]
    fn test_network_key_debug_redacted() {
        let key = NetworkKey::new([0xAB; 16]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("ab"));
    }

    #[test]
    fn test_network_name_display() {
        let name = NetworkName::new("OpenMesh").unwrap();
        assert_eq!(name.to_string(), "OpenMesh");
        assert_eq!(name.len(), 8);
    }
}

mod error_tests {
    use std::collections::HashSet;
    use thread_common::Error;

    const ALL: [Error; 15] = [
        Error::InvalidState,
        Error::Detached,
        Error::Busy,
        Error::Already,
        Error::InvalidArgs,
        Error::NotFound,
        Error::StorageReadFailed,
        Error::StorageWriteFailed,
        Error::NoBufs,
        Error::KeyDerivationFailed,
        Error::Security,
        Error::InvalidKeyRef,
        Error::Failed,
        Error::NotImplemented,
        Error::InternalError,
    ];

    #[test]
    fn test_error_codes_unique() {
        let codes: HashSet<u16> = ALL.iter().map(Error::code).collect();
        assert_eq!(codes.len(), ALL.len());
    }

    #[test]
    fn test_error_display_has_code() {
        assert_eq!(Error::Detached.to_string(), "[0x0102] detached");
        assert_eq!(Error::NoBufs.to_string(), "[0x0303] no buffers");
    }
}

mod config_tests {
    use thread_common::config::{KeyStorageMode, ThreadConfig};
    use thread_common::Millis;

    #[test]
    fn test_const_default_matches_default() {
        assert_eq!(ThreadConfig::DEFAULT, ThreadConfig::default());
    }

    #[test]
    fn test_override_single_field() {
        let mut cfg = ThreadConfig::DEFAULT;
        cfg.keys.storage = KeyStorageMode::Reference;
        cfg.child.timeout_secs = 10;
        assert_eq!(cfg.keys.storage, KeyStorageMode::Reference);
        assert_eq!(cfg.attach, ThreadConfig::DEFAULT.attach);
        assert_eq!(Millis::from_secs(cfg.child.timeout_secs).half(), Millis::new(5_000));
    }
}

mod log_tests {
    use thread_common::log::{LogBuffer, LogLevel, LOG_BUFFER_SIZE};
    use thread_common::{log_error, log_info, log_trace};

    #[test]
    fn test_entries_ordered_oldest_first() {
        let mut buf = LogBuffer::new();
        log_info!(buf, 1, "mle", "first");
        log_error!(buf, 2, "keys", "second");
        let stamps: Vec<u64> = buf.iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(stamps, vec![1, 2]);
    }

    #[test]
    fn test_trace_enabled_by_level() {
        let mut buf = LogBuffer::new();
        buf.set_min_level(LogLevel::Trace);
        for i in 0..LOG_BUFFER_SIZE as u64 {
            log_trace!(buf, i, "discover", "tick {}", i);
        }
        assert_eq!(buf.len(), LOG_BUFFER_SIZE);
        assert_eq!(buf.overwritten(), 0);
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_entry_display_format() {
        let mut buf = LogBuffer::new();
        log_info!(buf, 12_345, "mle", "role {}", "child");
        let line = buf.latest().map(ToString::to_string).unwrap();
        assert_eq!(line, "[    12.345] I [mle] role child");
    }
}
