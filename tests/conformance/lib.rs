//! Conformance tests for the e-Link protocol crates live in this package's test targets.
