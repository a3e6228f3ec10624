//! Cryptographic primitives for the e-Link gateway protocol.
//!
//! This crate implements the pieces of the e-Link key agreement and record protection:
//! - Finite-field Diffie-Hellman over peer-supplied generator and modulus
//! - AES-CBC with an all-zero IV and PKCS7 padding
//! - The big-integer <-> base64 convention used for DH values on the wire
//!
//! Everything here is a pure function of its inputs; no state is shared between calls.
//! Secret exponents and derived keys are held in `Zeroizing` wrappers and are never logged.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aes_cbc;
pub mod dh;
pub mod encoding;
pub mod error;

pub use dh::KeyExchange;
pub use error::{Error, Result};
