//! Message envelopes.
//!
//! Each frame payload is a JSON object with a `type` tag, a device-assigned `sequence`
//! number and the device `mac`, plus a type-specific body. Inbound messages decode into
//! [`Message`]; types the gateway does not act on are kept as [`Message::Raw`] so they
//! can still be forwarded for correlation.
//!
//! ```text
//! {"type":"dh","sequence":15,"mac":"940E6B445754",
//!  "data":{"dh_key":"Nucd1a2mwzsQIJfcEI/TtQ==","dh_p":"3eeA2hvi1QBo7JF+Ful1Iw==","dh_g":"Ag=="}}
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use tracing::debug;

/// `type` tag of a key negotiation request.
pub const TYPE_KEY_NEGOTIATION_REQUEST: &str = "keyngreq";
/// `type` tag of a key negotiation answer.
pub const TYPE_KEY_NEGOTIATION_ACK: &str = "keyngack";
/// `type` tag of a DH key exchange (both directions).
pub const TYPE_KEY_EXCHANGE: &str = "dh";
/// `type` tag of a device registration.
pub const TYPE_DEVICE_REGISTRATION: &str = "dev_reg";
/// `type` tag of an acknowledgement.
pub const TYPE_ACK: &str = "ack";
/// `type` tag of a status report.
pub const TYPE_STATUS: &str = "status";
/// `type` tag of an attached-device report.
pub const TYPE_DEVICE_REPORT: &str = "dev_report";
/// `type` tag of a keepalive.
pub const TYPE_KEEPALIVE: &str = "keepalive";

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Raw `type` tag (empty if absent).
    pub kind: String,
    /// Device-assigned sequence number, truncated to 32 bits.
    pub sequence: i32,
    /// Originating MAC address (empty if absent).
    pub mac: String,
    /// Type-specific content.
    pub message: Message,
}

/// Inbound message variants keyed by `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `keyngreq`: the device asks which key modes the gateway supports.
    KeyNegotiationRequest(KeyNegotiationRequest),
    /// `dh`: the device's public value and group parameters.
    KeyExchange(KeyExchangeParams),
    /// `dev_reg`: device identity announcement, completes the handshake.
    DeviceRegistration(Registration),
    /// `ack`.
    Ack,
    /// `status`.
    Status,
    /// `dev_report`.
    DeviceReport,
    /// `keepalive`.
    Keepalive,
    /// Any other type, with the full field map.
    Raw(Map<String, Value>),
}

/// Body of a `keyngreq` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeyNegotiationRequest {
    /// Protocol version announced by the device.
    #[serde(default)]
    pub version: Option<String>,
    /// Key modes offered by the device.
    #[serde(default, rename = "keymodelist", deserialize_with = "null_as_empty")]
    pub key_modes: Vec<KeyModeEntry>,
}

/// One entry of `keymodelist`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeyModeEntry {
    /// Key mode name, e.g. `dh`.
    #[serde(default)]
    pub keymode: String,
}

/// `data` object of a `dh` message, all values base64 big integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExchangeParams {
    /// Sender's public value.
    #[serde(rename = "dh_key")]
    pub public_key: String,
    /// Group modulus.
    #[serde(rename = "dh_p")]
    pub modulus: String,
    /// Group generator.
    #[serde(rename = "dh_g")]
    pub generator: String,
}

/// `data` object of a `dev_reg` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Registration {
    /// Manufacturer.
    pub vendor: String,
    /// Product model.
    pub model: String,
    /// Software version.
    pub swversion: String,
    /// Hardware version.
    pub hdversion: String,
    /// Serial number.
    pub sn: String,
    /// IP address on the gateway LAN.
    pub ipaddr: String,
    /// Management URL.
    pub url: String,
    /// `yes` for a wireless uplink.
    pub wireless: String,
}

#[derive(Deserialize)]
struct KeyExchangeBody {
    data: KeyExchangeParams,
}

#[derive(Deserialize)]
struct RegistrationBody {
    #[serde(default)]
    data: Registration,
}

impl Envelope {
    /// Decode a message from its JSON text.
    ///
    /// # Errors
    ///
    /// - `Error::Json` if the text is not JSON or a known body is missing fields.
    /// - `Error::Protocol` if the text is not an object or an envelope field has the
    ///   wrong type.
    pub fn decode(text: &str) -> Result<Self> {
        let Value::Object(map) = serde_json::from_str::<Value>(text)? else {
            return Err(Error::Protocol("message is not a JSON object".into()));
        };

        let kind = string_field(&map, "type")?;
        let mac = string_field(&map, "mac")?;
        let sequence = match map.get("sequence") {
            None | Some(Value::Null) => 0,
            Some(Value::Number(n)) => truncate_sequence(n),
            Some(other) => {
                return Err(Error::Protocol(format!(
                    "sequence is not a number: {other}"
                )))
            }
        };

        let message = match kind.as_str() {
            TYPE_KEY_NEGOTIATION_REQUEST => {
                // Only DH is offered back, so a malformed offer list is not fatal
                let request = serde_json::from_value(Value::Object(map)).unwrap_or_else(|e| {
                    debug!(error = %e, "ignoring malformed key negotiation body");
                    KeyNegotiationRequest::default()
                });
                Message::KeyNegotiationRequest(request)
            }
            TYPE_KEY_EXCHANGE => {
                let body: KeyExchangeBody = serde_json::from_value(Value::Object(map))?;
                Message::KeyExchange(body.data)
            }
            TYPE_DEVICE_REGISTRATION => {
                let body: RegistrationBody = serde_json::from_value(Value::Object(map))?;
                Message::DeviceRegistration(body.data)
            }
            TYPE_ACK => Message::Ack,
            TYPE_STATUS => Message::Status,
            TYPE_DEVICE_REPORT => Message::DeviceReport,
            TYPE_KEEPALIVE => Message::Keepalive,
            _ => Message::Raw(map),
        };

        Ok(Self {
            kind,
            sequence,
            mac,
            message,
        })
    }
}

/// Messages the gateway sends on its own initiative in reply to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Reply {
    /// Answer to `keyngreq` naming the chosen key mode.
    #[serde(rename = "keyngack")]
    KeyNegotiationAck {
        /// Echoed MAC.
        mac: String,
        /// Echoed sequence.
        sequence: i32,
        /// Chosen key mode.
        keymode: String,
    },
    /// Gateway half of the DH exchange.
    #[serde(rename = "dh")]
    KeyExchange {
        /// Echoed sequence.
        sequence: i32,
        /// Echoed MAC.
        mac: String,
        /// Gateway public value with the device's own group parameters.
        data: KeyExchangeParams,
    },
    /// Bare acknowledgement.
    #[serde(rename = "ack")]
    Ack {
        /// Echoed sequence.
        sequence: i32,
        /// Echoed MAC.
        mac: String,
    },
}

impl Reply {
    /// Acknowledge a message.
    pub fn ack(sequence: i32, mac: &str) -> Self {
        Reply::Ack {
            sequence,
            mac: mac.to_string(),
        }
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Result<String> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(Error::Protocol(format!("{key} is not a string: {other}"))),
    }
}

/// Sequence numbers arrive as JSON numbers and are truncated to 32 bits.
fn truncate_sequence(n: &Number) -> i32 {
    if let Some(i) = n.as_i64() {
        i as i32
    } else if let Some(u) = n.as_u64() {
        u as i32
    } else {
        n.as_f64().map_or(0, |f| f as i64 as i32)
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> core::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
