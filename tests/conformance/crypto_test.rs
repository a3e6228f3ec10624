//! Cryptographic conformance tests.
//!
//! Uses the 128-bit group and key values observed from deployed e-Link devices.

/// Group modulus sent by devices.
const DH_P: &str = "3eeA2hvi1QBo7JF+Ful1Iw==";
/// Generator sent by devices.
const DH_G: &str = "Ag==";
/// A device public value.
const DH_KEY: &str = "Nucd1a2mwzsQIJfcEI/TtQ==";

#[cfg(test)]
mod encoding_tests {
    use super::*;
    use elink_crypto::encoding::{base64_to_biguint, biguint_to_base64};
    use num_bigint::BigUint;

    #[test]
    fn test_device_values_decode() {
        assert_eq!(
            base64_to_biguint(DH_P).unwrap().to_bytes_be(),
            hex::decode("dde780da1be2d50068ec917e16e97523").unwrap()
        );
        assert_eq!(base64_to_biguint(DH_G).unwrap(), BigUint::from(2u8));
        assert_eq!(
            base64_to_biguint(DH_KEY).unwrap().to_bytes_be(),
            hex::decode("36e71dd5ada6c33b102097dc108fd3b5").unwrap()
        );
    }

    #[test]
    fn test_high_bit_gets_zero_prefix() {
        // The modulus starts with 0xDD, so it is re-encoded with a leading zero byte
        let p = base64_to_biguint(DH_P).unwrap();
        assert_eq!(biguint_to_base64(&p), "AN3ngNob4tUAaOyRfhbpdSM=");

        // Without the high bit the encoding is unchanged
        let key = base64_to_biguint(DH_KEY).unwrap();
        assert_eq!(biguint_to_base64(&key), DH_KEY);
    }
}

#[cfg(test)]
mod dh_tests {
    use super::*;
    use elink_crypto::{dh::KeyExchange, encoding::base64_to_biguint, Error};
    use num_bigint::BigUint;
    use rand::rngs::OsRng;

    fn group() -> (BigUint, BigUint) {
        (
            base64_to_biguint(DH_G).unwrap(),
            base64_to_biguint(DH_P).unwrap(),
        )
    }

    #[test]
    fn test_agreement_over_device_group() {
        for _ in 0..8 {
            let (g, p) = group();
            let mut gateway = KeyExchange::generate(&mut OsRng, 16, g.clone(), p.clone()).unwrap();
            let mut device = KeyExchange::generate(&mut OsRng, 16, g, p).unwrap();

            let gateway_public = gateway.public_key().clone();
            let device_public = device.public_key().clone();

            let a = gateway.compute_shared(&device_public).unwrap().to_vec();
            let b = device.compute_shared(&gateway_public).unwrap().to_vec();
            assert_eq!(a, b);
            assert_eq!(a.len(), 16);
        }
    }

    #[test]
    fn test_peer_value_bounds() {
        let (g, p) = group();
        let one = BigUint::from(1u8);

        for bad in [
            BigUint::from(0u8),
            BigUint::from(1u8),
            BigUint::from(2u8),
            p.clone(),
            &p + &one,
        ] {
            let mut kex = KeyExchange::generate(&mut OsRng, 16, g.clone(), p.clone()).unwrap();
            assert!(
                matches!(kex.compute_shared(&bad), Err(Error::InvalidKeyRange)),
                "peer value {bad} accepted"
            );
        }

        for good in [BigUint::from(3u8), &p - &one] {
            let mut kex = KeyExchange::generate(&mut OsRng, 16, g.clone(), p.clone()).unwrap();
            assert!(kex.compute_shared(&good).is_ok(), "peer value {good} rejected");
        }
    }

    #[test]
    fn test_known_exponent() {
        // 2^1 mod p = 2 and 2^2 mod p = 4
        let (g, p) = group();
        let kex = KeyExchange::from_secret(g.clone(), p.clone(), &[0x01]).unwrap();
        assert_eq!(kex.public_key(), &BigUint::from(2u8));
        let kex = KeyExchange::from_secret(g, p, &[0x02]).unwrap();
        assert_eq!(kex.public_key(), &BigUint::from(4u8));
    }
}

#[cfg(test)]
mod aes_tests {
    use elink_crypto::aes_cbc::{decrypt, encrypt, BLOCK_SIZE};

    const KEY: [u8; 16] = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
        0x3c,
    ];

    /// With a zero IV the first CBC block equals the ECB block (NIST SP 800-38A F.1.1).
    #[test]
    fn test_first_block_vector() {
        let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
        let ciphertext = encrypt(&plaintext, &KEY).unwrap();
        assert_eq!(
            hex::encode(&ciphertext[..BLOCK_SIZE]),
            "3ad77bb40d7a3660a89ecaf32466ef97"
        );
    }

    #[test]
    fn test_roundtrip_lengths() {
        for len in 0..=100usize {
            let plaintext: Vec<u8> = (0..len).map(|i| i as u8 ^ 0xA5).collect();
            let ciphertext = encrypt(&plaintext, &KEY).unwrap();
            assert_eq!(ciphertext.len(), (len / BLOCK_SIZE + 1) * BLOCK_SIZE);
            assert_eq!(decrypt(&ciphertext, &KEY).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_zero_iv_is_deterministic() {
        let a = encrypt(br#"{"type":"ack"}"#, &KEY).unwrap();
        let b = encrypt(br#"{"type":"ack"}"#, &KEY).unwrap();
        assert_eq!(a, b);
    }
}
