//! Finite-field Diffie-Hellman key agreement.
//!
//! e-Link devices announce the group themselves: the key-exchange message carries the
//! device's public value together with the generator `g` and modulus `p`. The gateway side
//! draws a random secret exponent sized for the negotiated key strength, answers with
//! `g^secret mod p`, and derives the shared secret `peer^secret mod p`.
//!
//! # Security
//!
//! - The secret exponent and the shared secret are held in `Zeroizing` buffers.
//! - `compute_shared` rejects peer values outside `(2, p)` before any exponentiation.
//!
//! # Example
//!
//! ```
//! use elink_crypto::KeyExchange;
//! use num_bigint::BigUint;
//! use rand::rngs::OsRng;
//!
//! # fn example() -> Result<(), elink_crypto::Error> {
//! let p = (BigUint::from(1u8) << 127usize) - 1u8;
//! let g = BigUint::from(2u8);
//!
//! let mut gateway = KeyExchange::generate(&mut OsRng, 16, g.clone(), p.clone())?;
//! let mut device = KeyExchange::generate(&mut OsRng, 16, g, p)?;
//!
//! let gateway_public = gateway.public_key().clone();
//! let device_public = device.public_key().clone();
//!
//! let a = gateway.compute_shared(&device_public)?.to_vec();
//! let b = device.compute_shared(&gateway_public)?.to_vec();
//! assert_eq!(a, b);
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use std::cell::OnceCell;
use zeroize::Zeroizing;

/// Secret length in bytes for a given key strength in bits.
///
/// e-Link negotiates 128-bit keys, which gives a 16-byte secret exponent.
pub const fn secret_len_for_bits(bits: usize) -> usize {
    (bits + 7) / 8
}

/// One side of a Diffie-Hellman exchange.
///
/// A context is created per handshake and discarded afterwards; only the shared
/// secret outlives it.
pub struct KeyExchange {
    modulus: BigUint,
    generator: BigUint,
    /// Secret exponent, big-endian magnitude.
    secret: Zeroizing<Vec<u8>>,
    /// Local public value, computed on first use.
    public: OnceCell<BigUint>,
    /// Shared secret, big-endian and left-padded to the modulus width.
    shared: Option<Zeroizing<Vec<u8>>>,
}

impl KeyExchange {
    /// Create a context with a fresh secret drawn from `rng`.
    ///
    /// `secret_len` is in bytes. The random bytes are read as an unsigned big-endian
    /// magnitude, so the exponent is non-negative by construction.
    ///
    /// # Errors
    ///
    /// - `Error::InsufficientRandomness` if the random source fails.
    /// - `Error::InvalidParameters` if the modulus is too small or `secret_len` is zero.
    pub fn generate<R>(
        rng: &mut R,
        secret_len: usize,
        generator: BigUint,
        modulus: BigUint,
    ) -> Result<Self>
    where
        R: RngCore + CryptoRng,
    {
        if secret_len == 0 {
            return Err(Error::InvalidParameters("secret length is zero".into()));
        }

        let mut secret = Zeroizing::new(vec![0u8; secret_len]);
        rng.try_fill_bytes(&mut secret)
            .map_err(|e| Error::InsufficientRandomness(e.to_string()))?;

        Self::with_secret(generator, modulus, secret)
    }

    /// Create a context from a known secret exponent.
    ///
    /// This is primarily used for testing with known vectors.
    /// In production, use `generate()` instead.
    #[doc(hidden)]
    pub fn from_secret(generator: BigUint, modulus: BigUint, secret: &[u8]) -> Result<Self> {
        Self::with_secret(generator, modulus, Zeroizing::new(secret.to_vec()))
    }

    fn with_secret(
        generator: BigUint,
        modulus: BigUint,
        secret: Zeroizing<Vec<u8>>,
    ) -> Result<Self> {
        // modpow panics on a zero modulus, and nothing at or below 2 admits a valid peer key
        if modulus <= BigUint::from(2u8) {
            return Err(Error::InvalidParameters(format!(
                "modulus must be greater than 2 (got {} bits)",
                modulus.bits()
            )));
        }

        Ok(Self {
            modulus,
            generator,
            secret,
            public: OnceCell::new(),
            shared: None,
        })
    }

    /// Group modulus `p`.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Group generator `g`.
    pub fn generator(&self) -> &BigUint {
        &self.generator
    }

    /// Local public value `g^secret mod p`.
    pub fn public_key(&self) -> &BigUint {
        self.public.get_or_init(|| {
            let secret = BigUint::from_bytes_be(&self.secret);
            self.generator.modpow(&secret, &self.modulus)
        })
    }

    /// Derive the shared secret from the peer's public value.
    ///
    /// The result is the big-endian magnitude of `peer^secret mod p`, left-padded with
    /// zeros to the byte width of the modulus so that it can be used directly as a
    /// symmetric key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKeyRange` unless `2 < peer_public < p`.
    pub fn compute_shared(&mut self, peer_public: &BigUint) -> Result<&[u8]> {
        if *peer_public <= BigUint::from(2u8) || *peer_public >= self.modulus {
            return Err(Error::InvalidKeyRange);
        }

        let secret = BigUint::from_bytes_be(&self.secret);
        let shared = peer_public.modpow(&secret, &self.modulus);

        let width = modulus_width(&self.modulus);
        let magnitude = Zeroizing::new(shared.to_bytes_be());
        let mut padded = Zeroizing::new(vec![0u8; width.max(magnitude.len())]);
        let offset = padded.len() - magnitude.len();
        padded[offset..].copy_from_slice(&magnitude);

        Ok(self.shared.insert(padded).as_slice())
    }

    /// Shared secret, if `compute_shared` has succeeded.
    pub fn shared_secret(&self) -> Option<&[u8]> {
        self.shared.as_ref().map(|s| s.as_slice())
    }
}

/// Number of bytes needed to hold any residue modulo `modulus`.
fn modulus_width(modulus: &BigUint) -> usize {
    let bits = (modulus - 1u8).bits() as usize;
    bits.div_ceil(8).max(1)
}
