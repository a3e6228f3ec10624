//! Core protocol engine for the e-Link gateway protocol.
//!
//! This crate implements the I/O-free half of the protocol:
//! - Frame encoding and incremental decoding (magic + big-endian length + payload)
//! - Message envelope decoding into known message variants
//! - The session state machine: key negotiation, DH exchange and device registration
//!
//! Sockets, tasks and queues live in `elink-transport`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod frame;
pub mod message;
pub mod session;

pub use error::{Error, Result};
pub use frame::FrameDecoder;
pub use message::{Envelope, Message};
pub use session::{DeviceIdentity, Phase, Session, SessionConfig};
