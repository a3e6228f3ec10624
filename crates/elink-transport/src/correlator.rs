//! Request/response correlation.
//!
//! Requests are fire-and-forget on the wire; the device answers with messages of its own
//! whose text is matched against keyword substrings.

use crate::{engine::Engine, Error, Result};
use elink_core::Phase;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

/// Deadline used when a timeout does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

impl Engine {
    /// Wait until the device has registered.
    ///
    /// Returns immediately if it already has. After a reconnect this waits for the next
    /// registration.
    pub async fn wait_ready(&self) {
        let mut state = self.shared.state.subscribe();
        if state.wait_for(|s| s.phase == Phase::Registered).await.is_err() {
            debug!("engine state channel closed");
        }
    }

    /// Queue a request for the device.
    ///
    /// If `body` is an object with a `mac` field, it is replaced by the registered
    /// device's MAC. Responses buffered before this call are discarded, so a following
    /// [`wait_and_check_response`](Self::wait_and_check_response) only sees messages
    /// that arrive afterwards.
    ///
    /// Waits if the request queue is full.
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the write loop has stopped.
    pub async fn send_request(&self, mut body: Value) -> Result<()> {
        if let Value::Object(fields) = &mut body {
            if fields.contains_key("mac") {
                let mac = self.shared.state.borrow().identity.mac.clone();
                fields.insert("mac".to_string(), Value::String(mac));
            }
        }
        let message = serde_json::to_vec(&body)?;

        let discarded = {
            let mut responses = self.shared.responses_rx.lock().await;
            let mut n = 0usize;
            while responses.try_recv().is_ok() {
                n += 1;
            }
            n
        };
        if discarded > 0 {
            debug!(discarded, "discarded stale responses");
        }

        self.shared
            .requests
            .send(message)
            .await
            .map_err(|_| Error::Closed)
    }

    /// Wait for a device message containing every keyword.
    ///
    /// Messages are consumed in arrival order; the first one whose text contains all
    /// `keywords` as substrings ends the wait with `true`. An empty keyword list
    /// matches the first message. Returns `false` once `timeout` has elapsed; a timeout
    /// too large to represent waits about a century.
    pub async fn wait_and_check_response<S>(&self, timeout: Duration, keywords: &[S]) -> bool
    where
        S: AsRef<str>,
    {
        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE);
        let mut responses = self.shared.responses_rx.lock().await;

        loop {
            match timeout_at(deadline, responses.recv()).await {
                Ok(Some(text)) => {
                    if keywords.iter().all(|k| text.contains(k.as_ref())) {
                        return true;
                    }
                    debug!(message = %text, "response does not match");
                }
                Ok(None) | Err(_) => return false,
            }
        }
    }
}
