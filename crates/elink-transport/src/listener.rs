//! TCP listener for device connections.

use crate::{engine::Engine, Error, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info, Instrument};

/// Default e-Link gateway port.
pub const DEFAULT_PORT: u16 = 32768;

/// Accepts device connections and hands them to an [`Engine`].
///
/// # Example
///
/// ```no_run
/// use elink_transport::{Engine, EngineConfig, Listener};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = Engine::new(EngineConfig::default());
/// let listener = Listener::bind("0.0.0.0:32768").await?;
/// tokio::spawn(listener.serve(engine.clone()));
///
/// engine.wait_ready().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to `addr`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Bind` if the address cannot be bound.
    pub async fn bind(addr: &str) -> Result<Self> {
        let inner = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        info!(addr = %addr, "listening for devices");
        Ok(Self { inner })
    }

    /// Bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Accept connections one at a time, forever.
    ///
    /// Each accepted connection replaces the engine's current one.
    ///
    /// # Errors
    ///
    /// Returns the first accept failure; the listener cannot continue after it.
    pub async fn serve(self, engine: Engine) -> Result<()> {
        let span = engine.config().span.clone();
        async move {
            loop {
                match self.inner.accept().await {
                    Ok((stream, peer)) => {
                        info!(peer = %peer, "accepted connection");
                        engine.attach(stream).await;
                    }
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        return Err(Error::Io(e));
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}
