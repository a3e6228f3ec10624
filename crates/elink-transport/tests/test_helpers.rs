//! Integration test helpers.
//!
//! Provides:
//! - A simulated e-Link device that speaks the wire protocol over loopback TCP
//! - Engine + listener setup on an ephemeral port
//! - Timeout protection and polling for engine state

#![allow(dead_code)]

use elink_core::frame::{self, FrameDecoder};
use elink_crypto::{
    aes_cbc,
    dh::KeyExchange,
    encoding::{base64_to_biguint, biguint_to_base64},
};
use elink_transport::{Engine, EngineConfig, Listener, SessionSnapshot};
use rand::rngs::OsRng;
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

/// Default timeout for test operations.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// 128-bit group used by deployed devices.
pub const DH_P: &str = "3eeA2hvi1QBo7JF+Ful1Iw==";
/// Generator 2.
pub const DH_G: &str = "Ag==";

/// Engine serving a listener on an ephemeral loopback port.
pub struct Gateway {
    /// Engine under test.
    pub engine: Engine,
    /// Listener address.
    pub addr: SocketAddr,
    /// Accept loop.
    pub server_task: JoinHandle<elink_transport::Result<()>>,
}

/// Start an engine and listener on `127.0.0.1:0`.
pub async fn start_gateway() -> Gateway {
    start_gateway_with(EngineConfig::default()).await
}

/// Start an engine with a specific configuration.
pub async fn start_gateway_with(config: EngineConfig) -> Gateway {
    let engine = Engine::new(config);
    let listener = Listener::bind("127.0.0.1:0")
        .await
        .expect("Listener bind failed");
    let addr = listener.local_addr().expect("Failed to get listener address");
    let server_task = tokio::spawn(listener.serve(engine.clone()));

    Gateway {
        engine,
        addr,
        server_task,
    }
}

/// Run `fut` under [`TEST_TIMEOUT`].
pub async fn with_timeout<F: Future>(what: &str, fut: F) -> F::Output {
    tokio::time::timeout(TEST_TIMEOUT, fut)
        .await
        .unwrap_or_else(|_| panic!("timed out: {what}"))
}

/// Poll the engine snapshot until `pred` holds.
pub async fn wait_until<P>(engine: &Engine, what: &str, pred: P) -> SessionSnapshot
where
    P: Fn(&SessionSnapshot) -> bool,
{
    with_timeout(what, async {
        let mut state = engine.subscribe();
        loop {
            let snapshot = state.borrow_and_update().clone();
            if pred(&snapshot) {
                return snapshot;
            }
            state.changed().await.expect("engine dropped");
        }
    })
    .await
}

/// A device speaking e-Link over TCP.
pub struct SimulatedDevice {
    stream: TcpStream,
    decoder: FrameDecoder,
    key: Option<Vec<u8>>,
    /// Device MAC.
    pub mac: String,
}

impl SimulatedDevice {
    /// Connect to a gateway.
    pub async fn connect(addr: SocketAddr, mac: &str) -> Self {
        let stream = TcpStream::connect(addr)
            .await
            .expect("Device connection failed");
        Self {
            stream,
            decoder: FrameDecoder::new(),
            key: None,
            mac: mac.to_string(),
        }
    }

    /// Shared key, once the DH exchange has completed.
    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    /// Send a JSON message, encrypted if a key is set.
    pub async fn send(&mut self, message: &Value) {
        let text = serde_json::to_string(message).unwrap();
        self.send_text(&text).await;
    }

    /// Send raw message text, encrypted if a key is set.
    pub async fn send_text(&mut self, text: &str) {
        let frame = frame::encode(text.as_bytes(), self.key.as_deref()).unwrap();
        self.stream.write_all(&frame).await.expect("Device write failed");
    }

    /// Send arbitrary bytes.
    pub async fn send_bytes(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("Device write failed");
    }

    /// Receive the next message, decrypting if a key is set.
    pub async fn recv(&mut self) -> Value {
        let payload = with_timeout("device receive", self.next_payload())
            .await
            .expect("Gateway closed connection");
        let plain = match &self.key {
            Some(key) => aes_cbc::decrypt(&payload, key).unwrap(),
            None => payload,
        };
        serde_json::from_slice(&plain).expect("Gateway sent invalid JSON")
    }

    /// Wait for the gateway to close the connection.
    pub async fn expect_closed(&mut self) {
        let next = with_timeout("connection close", self.next_payload()).await;
        assert!(next.is_none(), "expected close, got a frame");
    }

    async fn next_payload(&mut self) -> Option<Vec<u8>> {
        let mut buf = [0u8; 1024];
        loop {
            if let Some(payload) = self.decoder.decode().unwrap() {
                return Some(payload.to_vec());
            }
            match self.stream.read(&mut buf).await {
                Ok(0) | Err(_) => return None,
                Ok(n) => self.decoder.push(&buf[..n]),
            }
        }
    }

    /// Send `keyngreq` and check the `keyngack`.
    pub async fn negotiate(&mut self) {
        let request = serde_json::json!({
            "type": "keyngreq",
            "sequence": 1,
            "mac": self.mac,
            "version": "V2017.1.0",
            "keymodelist": [{"keymode": "dh"}]
        });
        self.send(&request).await;

        let reply = self.recv().await;
        assert_eq!(reply["type"], "keyngack");
        assert_eq!(reply["keymode"], "dh");
        assert_eq!(reply["sequence"], 1);
    }

    /// Run the DH exchange and install the shared key.
    pub async fn exchange_keys(&mut self) {
        let p = base64_to_biguint(DH_P).unwrap();
        let g = base64_to_biguint(DH_G).unwrap();
        let mut kex = KeyExchange::generate(&mut OsRng, 16, g, p).unwrap();

        let request = serde_json::json!({
            "type": "dh",
            "sequence": 2,
            "mac": self.mac,
            "data": {
                "dh_key": biguint_to_base64(kex.public_key()),
                "dh_p": DH_P,
                "dh_g": DH_G
            }
        });
        self.send(&request).await;

        // The gateway answers in the clear
        let reply = self.recv().await;
        assert_eq!(reply["type"], "dh");
        assert_eq!(reply["data"]["dh_p"], DH_P);

        let peer = base64_to_biguint(reply["data"]["dh_key"].as_str().unwrap()).unwrap();
        self.key = Some(kex.compute_shared(&peer).unwrap().to_vec());
    }

    /// Send `dev_reg` and check the acknowledgement.
    pub async fn register(&mut self) {
        let request = serde_json::json!({
            "type": "dev_reg",
            "sequence": 3,
            "mac": self.mac,
            "data": {
                "vendor": "HONOR",
                "model": "CD28",
                "swversion": "6.0.1",
                "hdversion": "VER.A",
                "sn": "99230040013AA068",
                "ipaddr": "192.168.1.33",
                "url": "",
                "wireless": "no"
            }
        });
        self.send(&request).await;

        let ack = self.recv().await;
        assert_eq!(ack["type"], "ack");
        assert_eq!(ack["sequence"], 3);
        assert_eq!(ack["mac"], self.mac.as_str());
    }

    /// Full handshake: negotiation, key exchange, registration.
    pub async fn handshake(&mut self) {
        self.negotiate().await;
        self.exchange_keys().await;
        self.register().await;
    }
}
