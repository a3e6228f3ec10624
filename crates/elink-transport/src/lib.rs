//! Tokio runtime for the e-Link gateway protocol.
//!
//! Drives [`elink_core::Session`] over TCP:
//! - [`Listener`] accepts device connections and hands each one to the [`Engine`]
//! - one read loop per connection decodes frames and routes them through the session
//! - a single write loop, started with the engine, sends queued requests once the
//!   device has registered
//! - correlation methods on [`Engine`] match requests to later device messages
//!
//! Only one device is served at a time; a new connection replaces the old one and
//! restarts the handshake.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
mod correlator;
pub mod engine;
pub mod error;
pub mod listener;

pub use config::EngineConfig;
pub use engine::{Engine, SessionSnapshot};
pub use error::{Error, Result};
pub use listener::Listener;
