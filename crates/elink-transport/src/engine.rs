//! Connection runtime: session lock, read loops, write loop and message routing.
//!
//! All protocol state sits behind one async mutex together with the socket write half.
//! Three critical sections take it: installing a new connection, routing an inbound
//! frame, and writing a queued request. Phase changes are mirrored into a `watch`
//! channel so that readiness waits and MAC lookups never touch the lock.
//!
//! The router publishes every accepted message to a bounded response queue while it
//! still holds the lock. If nothing drains that queue the router stalls, and with it
//! every other critical section. Callers are expected to keep correlating.

use crate::{config::EngineConfig, Error, Result};
use elink_core::{DeviceIdentity, FrameDecoder, Phase, Session};
use std::{
    io,
    net::SocketAddr,
    sync::{Arc, Weak},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn, Instrument};

/// Read-only view of session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Current phase.
    pub phase: Phase,
    /// Identity from the last registration.
    pub identity: DeviceIdentity,
    /// Connections that reached registration.
    pub connection_count: u64,
    /// Address of the installed connection, if any.
    pub peer: Option<SocketAddr>,
}

/// Gateway protocol engine for a single device.
///
/// Cloning is cheap; all clones drive the same session.
#[derive(Clone)]
pub struct Engine {
    pub(crate) shared: Arc<Shared>,
}

pub(crate) struct Shared {
    link: Mutex<Link>,
    pub(crate) state: watch::Sender<SessionSnapshot>,
    pub(crate) requests: mpsc::Sender<Vec<u8>>,
    responses_tx: mpsc::Sender<String>,
    pub(crate) responses_rx: Mutex<mpsc::Receiver<String>>,
    config: EngineConfig,
}

/// State guarded by the session lock.
struct Link {
    session: Session,
    writer: Option<OwnedWriteHalf>,
    reader: Option<JoinHandle<()>>,
    generation: u64,
    peer: Option<SocketAddr>,
}

impl Engine {
    /// Create an engine and start its write loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: EngineConfig) -> Self {
        let (requests, requests_rx) = mpsc::channel(config.request_queue_capacity.max(1));
        let (responses_tx, responses_rx) = mpsc::channel(config.response_queue_capacity.max(1));
        let (state, state_rx) = watch::channel(SessionSnapshot::default());
        let span = config.span.clone();

        let shared = Arc::new(Shared {
            link: Mutex::new(Link {
                session: Session::new(config.session.clone()),
                writer: None,
                reader: None,
                generation: 0,
                peer: None,
            }),
            state,
            requests,
            responses_tx,
            responses_rx: Mutex::new(responses_rx),
            config,
        });

        tokio::spawn(
            write_loop(Arc::downgrade(&shared), requests_rx, state_rx).instrument(span),
        );

        Self { shared }
    }

    /// Install a freshly accepted connection.
    ///
    /// Any previous connection is torn down and its read loop stopped. The session is
    /// reset to `TransportConnected` with no secret, and a read loop is started for the
    /// new socket.
    pub async fn attach(&self, stream: TcpStream) {
        let peer = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();

        let mut link = self.shared.link.lock().await;
        if let Some(reader) = link.reader.take() {
            reader.abort();
        }
        if let Some(mut old) = link.writer.take() {
            if let Err(e) = old.shutdown().await {
                debug!(error = %e, "previous connection already closed");
            }
            info!(peer = ?link.peer, "replacing previous connection");
        }

        link.generation += 1;
        let generation = link.generation;
        link.writer = Some(write_half);
        link.peer = peer;
        link.session.reset();
        self.shared.publish(&link);

        let reader = read_loop(
            Arc::downgrade(&self.shared),
            read_half,
            generation,
            self.shared.config.read_buffer_size,
        )
        .instrument(self.shared.config.span.clone());
        link.reader = Some(tokio::spawn(reader));

        info!(peer = ?peer, generation, "device connected");
    }

    /// Current session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Subscribe to session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.state.subscribe()
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

/// Outcome of one attempt to write a queued request.
enum Attempt {
    Sent,
    NotReady,
}

impl Shared {
    fn publish(&self, link: &Link) {
        self.state.send_replace(SessionSnapshot {
            phase: link.session.phase(),
            identity: link.session.identity().clone(),
            connection_count: link.session.connection_count(),
            peer: link.peer,
        });
    }

    /// Decode and dispatch one frame, write replies, and publish the message.
    async fn route(&self, generation: u64, payload: &[u8]) {
        let mut link = self.link.lock().await;
        if link.generation != generation {
            return;
        }

        let inbound = match link.session.handle_frame(payload) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, len = payload.len(), "dropping inbound message");
                return;
            }
        };
        info!(
            direction = "in",
            kind = %inbound.envelope.kind,
            sequence = inbound.envelope.sequence,
            message = %inbound.text
        );

        for reply in &inbound.replies {
            let written = match link.writer.as_mut() {
                Some(writer) => writer.write_all(&reply.frame).await,
                None => Err(io::ErrorKind::NotConnected.into()),
            };
            match written {
                Ok(()) => info!(direction = "out", message = %reply.text),
                Err(e) => {
                    warn!(error = %e, "failed to send reply");
                    link.session.mark_disconnected();
                    break;
                }
            }
        }

        // Blocks while the response queue is full, lock held. The message must be queued
        // before readiness is published.
        if self.responses_tx.send(inbound.text).await.is_err() {
            debug!("response queue closed");
        }
        self.publish(&link);
    }

    /// Write one queued request if the device is registered.
    async fn send(&self, message: &[u8]) -> Result<Attempt> {
        let mut link = self.link.lock().await;
        if link.session.phase() != Phase::Registered {
            return Ok(Attempt::NotReady);
        }

        let frame = link.session.encode(message)?;
        let written = match link.writer.as_mut() {
            Some(writer) => writer.write_all(&frame).await.map_err(Error::from),
            None => Err(Error::NotConnected),
        };

        match written {
            Ok(()) => {
                info!(direction = "out", message = %String::from_utf8_lossy(message));
                Ok(Attempt::Sent)
            }
            Err(e) => {
                link.session.mark_disconnected();
                self.publish(&link);
                Err(e)
            }
        }
    }

    /// Drop the connection handle if `generation` is still current.
    async fn detach(&self, generation: u64) {
        let mut link = self.link.lock().await;
        if link.generation != generation {
            return;
        }
        link.writer = None;
        link.reader = None;
        link.peer = None;
        self.publish(&link);
    }
}

async fn read_loop(
    shared: Weak<Shared>,
    mut reader: OwnedReadHalf,
    generation: u64,
    buffer_size: usize,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; buffer_size.max(1)];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                info!(generation, "device closed connection");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(generation, error = %e, "read failed");
                break;
            }
        };
        decoder.push(&buf[..n]);

        let Some(shared) = shared.upgrade() else {
            return;
        };
        loop {
            match decoder.decode() {
                Ok(Some(payload)) => shared.route(generation, &payload).await,
                Ok(None) => break,
                Err(e) => {
                    warn!(generation, error = %e, "framing error, waiting for more data");
                    break;
                }
            }
        }
    }

    if let Some(shared) = shared.upgrade() {
        shared.detach(generation).await;
    }
}

async fn write_loop(
    shared: Weak<Shared>,
    mut requests: mpsc::Receiver<Vec<u8>>,
    mut state: watch::Receiver<SessionSnapshot>,
) {
    loop {
        if !registered(&mut state).await {
            return;
        }
        let Some(message) = requests.recv().await else {
            return;
        };

        // The request is held here until it is written.
        loop {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            match shared.send(&message).await {
                Ok(Attempt::Sent) => break,
                Ok(Attempt::NotReady) => {}
                Err(Error::Protocol(e)) => {
                    error!(error = %e, "dropping request that cannot be framed");
                    break;
                }
                Err(e) => warn!(error = %e, "write failed, holding request"),
            }
            drop(shared);

            if !registered(&mut state).await {
                return;
            }
        }
    }
}

/// Wait for the `Registered` phase; `false` once the engine is gone.
async fn registered(state: &mut watch::Receiver<SessionSnapshot>) -> bool {
    state.wait_for(|s| s.phase == Phase::Registered).await.is_ok()
}
