//! Interface conformance harness for e-Link devices.
//!
//! Plays the gateway side of the e-Link protocol against a device under test, sends a
//! queue of scripted requests once the device has registered, checks each response by
//! keyword, and prints a conformance report.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod queue;
pub mod report;
pub mod runner;

pub use error::{Error, Result};
pub use logging::{LogGate, LogLevel, LogOptions};
pub use queue::TestItem;
pub use report::Report;
pub use runner::{Runner, TestResult};
