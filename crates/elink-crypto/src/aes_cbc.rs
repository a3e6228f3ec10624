//! AES-CBC record encryption.
//!
//! e-Link protects every post-handshake frame payload with AES in CBC mode, a fixed
//! all-zero IV and PKCS7 padding. The AES variant follows the key length: the 16-byte
//! secret of the 128-bit e-Link group selects AES-128.
//!
//! Unpadding is tolerant: a buffer whose tail is not valid PKCS7 is returned unchanged
//! rather than rejected, because some devices send unpadded block-aligned plaintext.

use crate::{Error, Result};
use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Fixed initialization vector used by the protocol.
const ZERO_IV: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// Append PKCS7 padding: `n` copies of the byte `n`, with `1 <= n <= block_size`.
pub fn pkcs7_pad(data: &[u8], block_size: usize) -> Vec<u8> {
    let pad = block_size - data.len() % block_size;
    let mut out = Vec::with_capacity(data.len() + pad);
    out.extend_from_slice(data);
    out.resize(data.len() + pad, pad as u8);
    out
}

/// Strip PKCS7 padding, or return the input unchanged if the padding is invalid.
///
/// The last byte `n` must lie in `[1, block_size]` and the trailing `n` bytes must all
/// equal `n`.
pub fn pkcs7_unpad(data: &[u8], block_size: usize) -> &[u8] {
    let Some(&last) = data.last() else {
        return data;
    };

    let pad = last as usize;
    if pad == 0 || pad > block_size || pad > data.len() {
        return data;
    }

    let (body, tail) = data.split_at(data.len() - pad);
    if tail.iter().any(|&b| b != last) {
        return data;
    }
    body
}

/// Encrypt `plaintext` with AES-CBC, zero IV and PKCS7 padding.
///
/// # Errors
///
/// Returns `Error::InvalidKeyLength` unless `key` is 16, 24 or 32 bytes.
///
/// # Example
///
/// ```
/// use elink_crypto::aes_cbc::{decrypt, encrypt};
///
/// let key = [0x42u8; 16];
/// let ciphertext = encrypt(b"{\"type\":\"ack\"}", &key).unwrap();
/// assert_eq!(ciphertext.len() % 16, 0);
/// assert_eq!(decrypt(&ciphertext, &key).unwrap(), b"{\"type\":\"ack\"}");
/// ```
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let mut buf = pkcs7_pad(plaintext, BLOCK_SIZE);

    match key.len() {
        16 => encrypt_blocks::<cbc::Encryptor<Aes128>>(key, &mut buf)?,
        24 => encrypt_blocks::<cbc::Encryptor<Aes192>>(key, &mut buf)?,
        32 => encrypt_blocks::<cbc::Encryptor<Aes256>>(key, &mut buf)?,
        n => return Err(Error::InvalidKeyLength(n)),
    }

    Ok(buf)
}

/// Decrypt AES-CBC `ciphertext` with a zero IV and strip PKCS7 padding.
///
/// Invalid padding is not an error; see [`pkcs7_unpad`].
///
/// # Errors
///
/// - `Error::InvalidKeyLength` unless `key` is 16, 24 or 32 bytes.
/// - `Error::Decryption` if the ciphertext is not a whole number of blocks.
pub fn decrypt(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::Decryption(format!(
            "ciphertext length {} is not a multiple of {}",
            ciphertext.len(),
            BLOCK_SIZE
        )));
    }

    let mut buf = ciphertext.to_vec();
    match key.len() {
        16 => decrypt_blocks::<cbc::Decryptor<Aes128>>(key, &mut buf)?,
        24 => decrypt_blocks::<cbc::Decryptor<Aes192>>(key, &mut buf)?,
        32 => decrypt_blocks::<cbc::Decryptor<Aes256>>(key, &mut buf)?,
        n => return Err(Error::InvalidKeyLength(n)),
    }

    let len = pkcs7_unpad(&buf, BLOCK_SIZE).len();
    buf.truncate(len);
    Ok(buf)
}

fn encrypt_blocks<C>(key: &[u8], buf: &mut [u8]) -> Result<()>
where
    C: BlockEncryptMut + KeyIvInit,
{
    let len = buf.len();
    C::new_from_slices(key, &ZERO_IV)
        .map_err(|_| Error::InvalidKeyLength(key.len()))?
        .encrypt_padded_mut::<NoPadding>(buf, len)
        .map_err(|_| Error::Encryption("buffer is not block aligned".into()))?;
    Ok(())
}

fn decrypt_blocks<C>(key: &[u8], buf: &mut [u8]) -> Result<()>
where
    C: BlockDecryptMut + KeyIvInit,
{
    C::new_from_slices(key, &ZERO_IV)
        .map_err(|_| Error::InvalidKeyLength(key.len()))?
        .decrypt_padded_mut::<NoPadding>(buf)
        .map_err(|_| Error::Decryption("buffer is not block aligned".into()))?;
    Ok(())
}
