//! Frame format conformance tests.
//!
//! Verifies the exact wire layout `[3F 72 1F B5][u32 BE length][payload]` and that the
//! incremental decoder reassembles frames however the stream is split.

use elink_core::frame::{encode, encode_payload, FrameDecoder, HEADER_LEN, MAGIC};
use elink_crypto::aes_cbc;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8).collect()
}

#[test]
fn test_plain_frame_bytes() {
    let frame = encode(b"{}", None).unwrap();
    assert_eq!(frame, hex::decode("3f721fb5000000027b7d").unwrap());
}

#[test]
fn test_length_is_big_endian() {
    let frame = encode_payload(&payload(0x0102)).unwrap();
    assert_eq!(&frame[..4], &MAGIC);
    assert_eq!(&frame[4..8], &[0x00, 0x00, 0x01, 0x02]);
    assert_eq!(frame.len(), HEADER_LEN + 0x0102);
}

#[test]
fn test_plain_roundtrip_all_splits() {
    for len in [0usize, 1, 15, 16, 17, 255, 1024, 3000] {
        let body = payload(len);
        let frame = encode(&body, None).unwrap();

        for split in [1usize, 3, 7, 8, 9, 64, 1024] {
            let mut decoder = FrameDecoder::new();
            let mut out = Vec::new();
            for chunk in frame.chunks(split) {
                decoder.push(chunk);
                while let Some(p) = decoder.decode().unwrap() {
                    out.push(p);
                }
            }
            assert_eq!(out.len(), 1, "len {len} split {split}");
            assert_eq!(out[0].as_ref(), body.as_slice(), "len {len} split {split}");
            assert_eq!(decoder.buffered(), 0);
        }
    }
}

#[test]
fn test_encrypted_payload_decrypts() {
    let key = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
    for len in [0usize, 1, 16, 100] {
        let body = payload(len);
        let frame = encode(&body, Some(&key)).unwrap();

        let declared = u32::from_be_bytes(frame[4..8].try_into().unwrap()) as usize;
        assert_eq!(declared, frame.len() - HEADER_LEN);
        assert_eq!(declared % aes_cbc::BLOCK_SIZE, 0);
        assert_eq!(aes_cbc::decrypt(&frame[HEADER_LEN..], &key).unwrap(), body);
    }
}

#[test]
fn test_back_to_back_frames() {
    let bodies: Vec<Vec<u8>> = (0..10).map(|i| payload(i * 13)).collect();
    let stream: Vec<u8> = bodies
        .iter()
        .flat_map(|b| encode(b, None).unwrap())
        .collect();

    let mut decoder = FrameDecoder::new();
    decoder.push(&stream);
    for body in &bodies {
        assert_eq!(decoder.decode().unwrap().unwrap().as_ref(), body.as_slice());
    }
    assert!(decoder.decode().unwrap().is_none());
}

#[test]
fn test_wrong_magic_rejected() {
    let mut frame = encode(b"{}", None).unwrap();
    frame[0] = 0x3E;

    let mut decoder = FrameDecoder::new();
    decoder.push(&frame);
    assert!(decoder.decode().is_err());
}
