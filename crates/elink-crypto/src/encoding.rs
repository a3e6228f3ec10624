//! Big-integer <-> base64 wire encoding.
//!
//! DH values travel as base64 (standard alphabet, padded) of a big-endian byte string.
//! Encoding uses the two's-complement-safe form: the minimal magnitude, with one extra
//! leading byte when the top bit of the magnitude is set (`0x00` for non-negative values,
//! `0x80` for negative ones). Decoding always treats the bytes as an unsigned magnitude.

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use num_bigint::{BigInt, BigUint, Sign};

/// Byte form of a signed integer with the high-bit tag applied.
///
/// Zero encodes as an empty byte string.
pub fn tagged_bytes(value: &BigInt) -> Vec<u8> {
    let (sign, magnitude) = value.to_bytes_be();
    if sign == Sign::NoSign {
        return Vec::new();
    }

    if magnitude[0] & 0x80 == 0 {
        return magnitude;
    }

    let tag = if sign == Sign::Minus { 0x80 } else { 0x00 };
    let mut out = Vec::with_capacity(magnitude.len() + 1);
    out.push(tag);
    out.extend_from_slice(&magnitude);
    out
}

/// Encode a signed integer as base64.
pub fn bigint_to_base64(value: &BigInt) -> String {
    STANDARD.encode(tagged_bytes(value))
}

/// Encode a non-negative integer as base64.
pub fn biguint_to_base64(value: &BigUint) -> String {
    bigint_to_base64(&BigInt::from_biguint(Sign::Plus, value.clone()))
}

/// Decode a base64 string as an unsigned big-endian magnitude.
///
/// A leading sign-tag byte is not interpreted; `0x80`-tagged input decodes to a
/// large positive value, which is how e-Link peers treat all key material.
///
/// # Errors
///
/// Returns `Error::Encoding` if the input is not valid padded base64.
pub fn base64_to_biguint(input: &str) -> Result<BigUint> {
    let bytes = STANDARD
        .decode(input)
        .map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(BigUint::from_bytes_be(&bytes))
}
