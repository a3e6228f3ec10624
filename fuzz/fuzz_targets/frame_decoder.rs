#![no_main]

use elink_core::{frame, FrameDecoder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Feed the input in two pieces so split headers are exercised
    let split = data.first().map_or(0, |b| *b as usize % (data.len() + 1));
    let mut decoder = FrameDecoder::new();
    decoder.push(&data[..split]);
    decoder.push(&data[split..]);

    // Framing errors consume the bad header, so this terminates
    loop {
        match decoder.decode() {
            Ok(Some(payload)) => {
                let framed = frame::encode_payload(&payload).unwrap();
                let mut again = FrameDecoder::new();
                again.push(&framed);
                assert_eq!(again.decode().unwrap().as_deref(), Some(&payload[..]));
            }
            Ok(None) => break,
            Err(_) => {}
        }
    }
});
