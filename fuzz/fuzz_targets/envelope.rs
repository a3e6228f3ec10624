#![no_main]

use elink_core::{Envelope, Session, SessionConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let _ = Envelope::decode(&text);

    let mut session = Session::new(SessionConfig::default());
    session.reset();
    let _ = session.handle_frame(data);
});
