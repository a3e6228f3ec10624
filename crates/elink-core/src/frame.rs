//! Frame encoding and incremental decoding.
//!
//! Every e-Link message travels in one frame:
//!
//! ```text
//! +---------------------+---------------------+------------------+
//! | Magic 3F 72 1F B5   | Length (u32, BE)    | Payload          |
//! | 4 bytes             | 4 bytes             | Length bytes     |
//! +---------------------+---------------------+------------------+
//! ```
//!
//! The payload is UTF-8 JSON before the DH exchange completes and the AES-CBC ciphertext
//! of that JSON afterwards. The codec itself is oblivious to the content.

use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use elink_crypto::aes_cbc;

/// Frame magic.
pub const MAGIC: [u8; 4] = [0x3F, 0x72, 0x1F, 0xB5];

/// Header size: magic plus length.
pub const HEADER_LEN: usize = 8;

/// Build a frame around `message`, encrypting it first when a shared secret is set.
///
/// # Errors
///
/// Returns an error if encryption fails or the payload does not fit a u32 length.
///
/// # Example
///
/// ```
/// use elink_core::frame::{encode, MAGIC};
///
/// let frame = encode(b"{}", None).unwrap();
/// assert_eq!(&frame[..4], &MAGIC);
/// assert_eq!(&frame[4..8], &[0, 0, 0, 2]);
/// assert_eq!(&frame[8..], b"{}");
/// ```
pub fn encode(message: &[u8], secret: Option<&[u8]>) -> Result<Vec<u8>> {
    match secret {
        Some(key) => encode_payload(&aes_cbc::encrypt(message, key)?),
        None => encode_payload(message),
    }
}

/// Build a frame around an already-prepared payload.
pub fn encode_payload(payload: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        Error::Protocol(format!("payload of {} bytes exceeds frame limit", payload.len()))
    })?;

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Reassembles frames from a byte stream.
///
/// Bytes are appended with [`push`](Self::push) as they arrive; [`decode`](Self::decode)
/// yields one payload per call until no complete frame is buffered. The header is consumed
/// as soon as eight bytes are available, and the declared length is remembered until the
/// payload has fully arrived.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Declared length of the frame whose header has been consumed.
    pending: Option<usize>,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Declared length of a frame whose payload is still incomplete.
    pub fn pending_len(&self) -> Option<usize> {
        self.pending
    }

    /// Take the next complete payload, if one is buffered.
    ///
    /// # Errors
    ///
    /// Returns `Error::Framing` when a header does not start with [`MAGIC`]. The bad
    /// header is consumed; the caller should stop draining and wait for more data.
    /// No attempt is made to scan forward for the next valid magic.
    pub fn decode(&mut self) -> Result<Option<Bytes>> {
        let len = match self.pending {
            Some(len) => len,
            None => {
                if self.buffer.len() < HEADER_LEN {
                    return Ok(None);
                }

                let header = self.buffer.split_to(HEADER_LEN);
                let mut magic = [0u8; 4];
                magic.copy_from_slice(&header[..4]);
                if magic != MAGIC {
                    return Err(Error::Framing {
                        expected: MAGIC,
                        actual: magic,
                    });
                }

                let len = read_u32_be(&header[4..8]) as usize;
                self.pending = Some(len);
                len
            }
        };

        if self.buffer.len() < len {
            return Ok(None);
        }

        self.pending = None;
        Ok(Some(self.buffer.split_to(len).freeze()))
    }
}

#[inline]
fn read_u32_be(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}
