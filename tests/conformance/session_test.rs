//! Handshake sequencing conformance tests.
//!
//! Drives the gateway session with the exact message sequence a device sends:
//! `keyngreq`, `dh`, then `dev_reg` encrypted under the negotiated key.

use elink_core::{frame::HEADER_LEN, Error, Phase, Session, SessionConfig};
use elink_crypto::{
    aes_cbc,
    dh::KeyExchange,
    encoding::{base64_to_biguint, biguint_to_base64},
};
use rand::rngs::OsRng;
use serde_json::Value;

const MAC: &str = "940E6B445754";
const DH_P: &str = "3eeA2hvi1QBo7JF+Ful1Iw==";
const DH_G: &str = "Ag==";

fn reply_json(frame: &[u8], key: Option<&[u8]>) -> Value {
    let payload = &frame[HEADER_LEN..];
    let plain = match key {
        Some(key) => aes_cbc::decrypt(payload, key).unwrap(),
        None => payload.to_vec(),
    };
    serde_json::from_slice(&plain).unwrap()
}

/// Negotiate and exchange keys; returns the device's copy of the shared key.
fn negotiate(session: &mut Session) -> Vec<u8> {
    let keyngreq = format!(
        r#"{{"type":"keyngreq","sequence":180,"mac":"{MAC}","version":"V2017.1.0","keymodelist":[{{"keymode":"dh"}}]}}"#
    );
    let inbound = session.handle_frame(keyngreq.as_bytes()).unwrap();
    let ack = reply_json(&inbound.replies[0].frame, None);
    assert_eq!(ack["type"], "keyngack");
    assert_eq!(ack["keymode"], "dh");

    let p = base64_to_biguint(DH_P).unwrap();
    let g = base64_to_biguint(DH_G).unwrap();
    let mut device = KeyExchange::generate(&mut OsRng, 16, g, p).unwrap();
    let dh = format!(
        r#"{{"type":"dh","sequence":181,"mac":"{MAC}","data":{{"dh_key":"{}","dh_p":"{DH_P}","dh_g":"{DH_G}"}}}}"#,
        biguint_to_base64(device.public_key())
    );
    let inbound = session.handle_frame(dh.as_bytes()).unwrap();

    // The dh reply must be readable without the key
    let reply = reply_json(&inbound.replies[0].frame, None);
    assert_eq!(reply["type"], "dh");
    assert_eq!(reply["sequence"], 181);
    assert_eq!(reply["mac"], MAC);

    let gateway_public = base64_to_biguint(reply["data"]["dh_key"].as_str().unwrap()).unwrap();
    device.compute_shared(&gateway_public).unwrap().to_vec()
}

fn register(session: &mut Session, key: &[u8], sequence: i32) -> Value {
    let dev_reg = format!(
        r#"{{"type":"dev_reg","sequence":{sequence},"mac":"{MAC}","data":{{"vendor":"HONOR","model":"CD28","swversion":"6.0.1","hdversion":"VER.A","sn":"9923","ipaddr":"192.168.1.33","url":"","wireless":"no"}}}}"#
    );
    let sealed = aes_cbc::encrypt(dev_reg.as_bytes(), key).unwrap();
    let inbound = session.handle_frame(&sealed).unwrap();
    reply_json(&inbound.replies[0].frame, Some(key))
}

#[test]
fn test_handshake_sequencing() {
    let mut session = Session::new(SessionConfig::default());
    assert_eq!(session.phase(), Phase::Disconnected);

    session.reset();
    assert_eq!(session.phase(), Phase::TransportConnected);

    let key = negotiate(&mut session);
    assert_eq!(session.phase(), Phase::TransportConnected);
    assert_eq!(session.shared_secret(), Some(key.as_slice()));

    let ack = register(&mut session, &key, 182);
    assert_eq!(ack, serde_json::json!({"type": "ack", "sequence": 182, "mac": MAC}));
    assert_eq!(session.phase(), Phase::Registered);
    assert_eq!(session.connection_count(), 1);
}

#[test]
fn test_counter_once_per_connection() {
    let mut session = Session::new(SessionConfig::default());
    session.reset();
    let key = negotiate(&mut session);

    register(&mut session, &key, 1);
    register(&mut session, &key, 2);
    assert_eq!(session.connection_count(), 1);

    // Reconnect without registering does not count
    session.reset();
    assert_eq!(session.connection_count(), 1);

    session.reset();
    let key = negotiate(&mut session);
    register(&mut session, &key, 3);
    assert_eq!(session.connection_count(), 2);
}

#[test]
fn test_reset_restarts_handshake() {
    let mut session = Session::new(SessionConfig::default());
    session.reset();
    let key = negotiate(&mut session);
    register(&mut session, &key, 1);

    session.reset();
    assert_eq!(session.phase(), Phase::TransportConnected);
    assert!(session.shared_secret().is_none());

    // Frames under the old key no longer decode
    let sealed = aes_cbc::encrypt(br#"{"type":"keepalive","sequence":9}"#, &key).unwrap();
    assert!(session.handle_frame(&sealed).is_err());

    // A plaintext handshake works again
    let key = negotiate(&mut session);
    assert_eq!(key.len(), 16);
}

#[test]
fn test_registration_before_key_exchange() {
    // Registration is accepted in any phase
    let mut session = Session::new(SessionConfig::default());
    session.reset();

    let dev_reg = format!(r#"{{"type":"dev_reg","sequence":5,"mac":"{MAC}"}}"#);
    let inbound = session.handle_frame(dev_reg.as_bytes()).unwrap();
    assert_eq!(reply_json(&inbound.replies[0].frame, None)["type"], "ack");
    assert_eq!(session.phase(), Phase::Registered);
    assert_eq!(session.identity().mac, MAC);
}

#[test]
fn test_malformed_key_exchange() {
    let mut session = Session::new(SessionConfig::default());
    session.reset();

    let missing_fields = format!(r#"{{"type":"dh","sequence":1,"mac":"{MAC}","data":{{}}}}"#);
    assert!(matches!(
        session.handle_frame(missing_fields.as_bytes()),
        Err(Error::Json(_))
    ));

    let bad_base64 = format!(
        r#"{{"type":"dh","sequence":1,"mac":"{MAC}","data":{{"dh_key":"***","dh_p":"{DH_P}","dh_g":"{DH_G}"}}}}"#
    );
    assert!(matches!(
        session.handle_frame(bad_base64.as_bytes()),
        Err(Error::Crypto(_))
    ));
    assert!(session.shared_secret().is_none());
}
