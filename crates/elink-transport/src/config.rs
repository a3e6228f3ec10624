//! Engine configuration.

use elink_core::SessionConfig;
use tracing::Span;

/// Default capacity of the outbound request queue.
pub const DEFAULT_REQUEST_QUEUE_CAPACITY: usize = 100;
/// Default capacity of the inbound response queue.
pub const DEFAULT_RESPONSE_QUEUE_CAPACITY: usize = 100;
/// Default socket read size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Engine configuration.
///
/// `span` is the logging handle: every task the engine spawns runs inside it, so the
/// caller decides where engine logs go by choosing the span and installing a subscriber.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Handshake parameters.
    pub session: SessionConfig,
    /// Requests buffered before `send_request` waits.
    pub request_queue_capacity: usize,
    /// Responses buffered before the router waits.
    pub response_queue_capacity: usize,
    /// Bytes requested per socket read.
    pub read_buffer_size: usize,
    /// Parent span for engine tasks.
    pub span: Span,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            request_queue_capacity: DEFAULT_REQUEST_QUEUE_CAPACITY,
            response_queue_capacity: DEFAULT_RESPONSE_QUEUE_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            span: tracing::info_span!("elink"),
        }
    }
}

impl EngineConfig {
    /// Set the session configuration.
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the request queue capacity (minimum 1).
    pub fn with_request_queue_capacity(mut self, capacity: usize) -> Self {
        self.request_queue_capacity = capacity.max(1);
        self
    }

    /// Set the response queue capacity (minimum 1).
    pub fn with_response_queue_capacity(mut self, capacity: usize) -> Self {
        self.response_queue_capacity = capacity.max(1);
        self
    }

    /// Set the socket read size (minimum 1).
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set the parent span for engine tasks.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}
