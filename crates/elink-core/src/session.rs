//! Session management and handshake state machine.
//!
//! The gateway side of an e-Link connection moves through three phases:
//!
//! ```text
//! Disconnected --accept--> TransportConnected --dev_reg--> Registered
//!       ^                        ^                             |
//!       |                        +-------- accept (reset) -----+
//!       +------------------ write failure ---------------------+
//! ```
//!
//! Before registration the device negotiates a key mode (`keyngreq`), runs a
//! Diffie-Hellman exchange (`dh`), and then announces itself (`dev_reg`). Every frame
//! after the gateway's `dh` reply is AES-CBC encrypted with the shared secret.
//!
//! [`Session`] holds no socket. It turns inbound payloads into decoded messages plus
//! ready-to-write reply frames; the transport layer owns the I/O.

use crate::{
    frame,
    message::{Envelope, KeyExchangeParams, Message, Registration, Reply},
    Error, Result,
};
use elink_crypto::{
    aes_cbc,
    dh::{secret_len_for_bits, KeyExchange},
    encoding::{base64_to_biguint, biguint_to_base64},
};
use rand::rngs::OsRng;
use std::fmt;
use tracing::debug;
use zeroize::Zeroizing;

/// Bytes trimmed from both ends of decoded message text.
const TRIM_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\0'];

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Key strength used to size the DH secret exponent.
    pub key_strength_bits: usize,
    /// Key mode offered in `keyngack`.
    pub key_mode: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key_strength_bits: 128,
            key_mode: "dh".to_string(),
        }
    }
}

/// Connection phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No usable socket.
    #[default]
    Disconnected,
    /// Socket accepted, handshake not complete.
    TransportConnected,
    /// Device registered; outbound requests may flow.
    Registered,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Disconnected => "disconnected",
            Phase::TransportConnected => "transport-connected",
            Phase::Registered => "registered",
        })
    }
}

/// Identity announced by the device in `dev_reg`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// MAC address from the registration envelope.
    pub mac: String,
    /// Manufacturer.
    pub vendor: String,
    /// Product model.
    pub model: String,
    /// Software version.
    pub sw_version: String,
    /// Hardware version.
    pub hw_version: String,
    /// Serial number.
    pub serial: String,
    /// IP address.
    pub ip_addr: String,
    /// Management URL.
    pub url: String,
    /// Wireless uplink.
    pub wireless: bool,
}

impl DeviceIdentity {
    fn from_registration(mac: &str, reg: Registration) -> Self {
        Self {
            mac: mac.to_string(),
            vendor: reg.vendor,
            model: reg.model,
            sw_version: reg.swversion,
            hw_version: reg.hdversion,
            serial: reg.sn,
            ip_addr: reg.ipaddr,
            url: reg.url,
            wireless: reg.wireless.eq_ignore_ascii_case("yes"),
        }
    }
}

/// A message ready for the wire.
#[derive(Debug, Clone)]
pub struct Outbound {
    /// JSON text, for logging.
    pub text: String,
    /// Complete frame, encrypted if a secret was in force.
    pub frame: Vec<u8>,
}

/// Result of handling one inbound frame.
#[derive(Debug)]
pub struct Inbound {
    /// Decoded, trimmed message text.
    pub text: String,
    /// Decoded envelope.
    pub envelope: Envelope,
    /// Replies to write back, in order.
    pub replies: Vec<Outbound>,
}

/// Gateway-side protocol state for one device.
///
/// A `Session` lives for the lifetime of the process; each accepted connection starts a
/// new generation with [`reset`](Self::reset).
pub struct Session {
    config: SessionConfig,
    phase: Phase,
    shared_secret: Option<Zeroizing<Vec<u8>>>,
    identity: DeviceIdentity,
    connection_count: u64,
    /// Whether this connection generation has already been counted.
    counted: bool,
}

impl Session {
    /// Create a disconnected session.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            phase: Phase::Disconnected,
            shared_secret: None,
            identity: DeviceIdentity::default(),
            connection_count: 0,
            counted: false,
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Device identity from the last registration.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Number of connections that reached registration.
    pub fn connection_count(&self) -> u64 {
        self.connection_count
    }

    /// Shared AES key, once the DH exchange has completed.
    pub fn shared_secret(&self) -> Option<&[u8]> {
        self.shared_secret.as_ref().map(|s| s.as_slice())
    }

    /// Start a new connection generation.
    ///
    /// Clears the secret and identity and forces the phase to `TransportConnected`,
    /// whatever it was before. The connection counter is kept.
    pub fn reset(&mut self) {
        self.phase = Phase::TransportConnected;
        self.shared_secret = None;
        self.identity = DeviceIdentity::default();
        self.counted = false;
    }

    /// Record a transport failure.
    pub fn mark_disconnected(&mut self) {
        self.phase = Phase::Disconnected;
    }

    /// Frame an outbound message, encrypting it if a secret is in force.
    pub fn encode(&self, message: &[u8]) -> Result<Vec<u8>> {
        frame::encode(message, self.shared_secret())
    }

    /// Process one frame payload.
    ///
    /// The payload is decrypted if a secret is set, trimmed, decoded and dispatched.
    /// State changes are applied before returning; the caller writes the replies.
    ///
    /// # Errors
    ///
    /// - `Error::Crypto` if the payload cannot be decrypted.
    /// - `Error::Protocol` or `Error::Json` if the text is not a valid envelope.
    /// - `Error::Handshake` if DH parameters are rejected.
    ///
    /// On error no state changes and no reply is due.
    pub fn handle_frame(&mut self, payload: &[u8]) -> Result<Inbound> {
        let plain = match self.shared_secret() {
            Some(key) => aes_cbc::decrypt(payload, key)?,
            None => payload.to_vec(),
        };

        let text = String::from_utf8(plain)
            .map_err(|_| Error::Protocol("message is not valid UTF-8".into()))?;
        let text = text.trim_matches(TRIM_CHARS).to_string();
        if text.is_empty() {
            return Err(Error::Protocol("empty message".into()));
        }

        let envelope = Envelope::decode(&text)?;
        let replies = self.dispatch(&envelope)?;

        Ok(Inbound {
            text,
            envelope,
            replies,
        })
    }

    fn dispatch(&mut self, env: &Envelope) -> Result<Vec<Outbound>> {
        let reply = match &env.message {
            Message::KeyNegotiationRequest(_) => {
                let reply = Reply::KeyNegotiationAck {
                    mac: env.mac.clone(),
                    sequence: env.sequence,
                    keymode: self.config.key_mode.clone(),
                };
                Some(self.outbound(&reply)?)
            }
            Message::KeyExchange(params) => Some(self.key_exchange(env, params)?),
            Message::DeviceRegistration(reg) => {
                let reply = self.outbound(&Reply::ack(env.sequence, &env.mac))?;
                self.identity = DeviceIdentity::from_registration(&env.mac, reg.clone());
                self.phase = Phase::Registered;
                if !self.counted {
                    self.counted = true;
                    self.connection_count += 1;
                }
                Some(reply)
            }
            Message::DeviceReport | Message::Keepalive => {
                Some(self.outbound(&Reply::ack(env.sequence, &env.mac))?)
            }
            Message::Ack | Message::Status | Message::Raw(_) => None,
        };

        Ok(reply.into_iter().collect())
    }

    /// Run the gateway half of the DH exchange and install the shared secret.
    ///
    /// The reply goes out in the clear; the secret only applies to later frames.
    fn key_exchange(&mut self, env: &Envelope, params: &KeyExchangeParams) -> Result<Outbound> {
        let peer = base64_to_biguint(&params.public_key)?;
        let modulus = base64_to_biguint(&params.modulus)?;
        let generator = base64_to_biguint(&params.generator)?;

        let mut kex = KeyExchange::generate(
            &mut OsRng,
            secret_len_for_bits(self.config.key_strength_bits),
            generator,
            modulus,
        )
        .map_err(handshake_error)?;

        let public_key = biguint_to_base64(kex.public_key());
        let secret = Zeroizing::new(kex.compute_shared(&peer).map_err(handshake_error)?.to_vec());

        let reply = Reply::KeyExchange {
            sequence: env.sequence,
            mac: env.mac.clone(),
            data: KeyExchangeParams {
                public_key,
                modulus: params.modulus.clone(),
                generator: params.generator.clone(),
            },
        };
        let text = reply.to_json()?;
        let frame = frame::encode(text.as_bytes(), None)?;

        debug!(
            modulus_bits = kex.modulus().bits(),
            key_len = secret.len(),
            "key exchange complete"
        );
        self.shared_secret = Some(secret);
        Ok(Outbound { text, frame })
    }

    fn outbound(&self, reply: &Reply) -> Result<Outbound> {
        let text = reply.to_json()?;
        let frame = self.encode(text.as_bytes())?;
        Ok(Outbound { text, frame })
    }
}

fn handshake_error(err: elink_crypto::Error) -> Error {
    match err {
        elink_crypto::Error::InvalidKeyRange | elink_crypto::Error::InvalidParameters(_) => {
            Error::Handshake(err.to_string())
        }
        other => Error::Crypto(other),
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.phase)
            .field("has_secret", &self.shared_secret.is_some())
            .field("identity", &self.identity)
            .field("connection_count", &self.connection_count)
            .finish()
    }
}
