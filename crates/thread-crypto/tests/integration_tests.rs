// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Integration tests for thread-crypto
//!
//! Hashing, MAC, key derivation and DRBG exercised through the public API.

mod hash_tests {
    use thread_crypto::hash::Sha256;
    use thread_crypto::traits::Hash;

    #[test]
    fn test_sha256_empty_input() {
        // FIPS 180-4: SHA-256("")
        let expected = [
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14,
            0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f, 0xb9, 0x24,
            0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c,
            0xa4, 0x95, 0x99, 0x1b, 0x78, 0x52, 0xb8, 0x55,
        ];

        let result = Sha256::hash(&[]);
        assert_eq!(result.as_ref(), &expected);
    }

    #[test]
    fn test_sha256_incremental_with_reset() {
        let data = b"The quick brown fox jumps over the lazy dog";
        let oneshot = Sha256::hash(data);

        let mut hasher = <Sha256 as Hash>::new();
        hasher.update(b"garbage");
        hasher.reset();
        hasher.update(&data[..10]);
        hasher.update(&data[10..]);
        assert_eq!(hasher.finalize(), oneshot);
    }
}

mod mac_tests {
    use thread_crypto::hash::{hmac_sha256, HmacSha256};
    use thread_crypto::traits::Mac;
    use thread_crypto::CryptoError;

    #[test]
    fn test_split_input_equals_joined_input() {
        let key = [0x42u8; 16];
        let a = hmac_sha256(&key, &[b"chal".as_slice(), b"lenge".as_slice()]).unwrap();
        let b = hmac_sha256(&key, &[b"challenge".as_slice()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let tag = hmac_sha256(&[1u8; 16], &[b"data".as_slice()]).unwrap();
        let mut mac = HmacSha256::new_with_key(&[2u8; 16]).unwrap();
        mac.update(b"data");
        assert_eq!(mac.verify(tag.as_ref()), Err(CryptoError::InvalidMac));
    }
}

mod kdf_tests {
    use thread_crypto::hash::hmac_sha256;
    use thread_crypto::kdf::{kdf_input, DerivedKeys};

    #[test]
    fn test_keys_are_halves_of_hmac() {
        let key = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77,
                   0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
        let okm = hmac_sha256(&key, &[kdf_input(0).as_slice()]).unwrap();
        let keys = DerivedKeys::derive(&key, 0).unwrap();
        assert_eq!(&okm.as_bytes()[..16], keys.mle_key());
        assert_eq!(&okm.as_bytes()[16..], keys.mac_key());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let keys = DerivedKeys::derive(&[7u8; 16], 5).unwrap();
        let s = format!("{keys:?}");
        assert_eq!(s, "DerivedKeys(seq=5, [REDACTED])");
    }
}

mod rng_tests {
    use thread_crypto::{CryptoRng, HmacDrbg};

    #[test]
    fn test_drbg_as_trait_object() {
        let seed: [u8; 32] = core::array::from_fn(|i| (i as u8) * 3 + 1);
        let mut drbg = HmacDrbg::from_seed(&seed).unwrap();
        let rng: &mut dyn CryptoRng = &mut drbg;
        let a = rng.next_u32().unwrap();
        let b = rng.next_u32().unwrap();
        assert_ne!(a, b);
        let _ = rng.next_u8().unwrap();
    }
}
