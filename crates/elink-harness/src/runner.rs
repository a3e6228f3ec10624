//! Runs a test queue against a connected device.

use crate::{logging::LogGate, queue::TestItem, Result};
use elink_transport::Engine;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// Outcome of one test item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    /// Item name.
    pub name: String,
    /// Interface title.
    pub interface: String,
    /// Whether a matching response arrived in time.
    pub passed: bool,
    /// Time from sending the request to the verdict.
    pub elapsed: Duration,
}

/// Drives test items through an [`Engine`].
///
/// Operator prompts are answered on `input`, one line per prompt.
pub struct Runner<R> {
    engine: Engine,
    gate: LogGate,
    input: R,
}

impl<R> Runner<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Create a runner.
    pub fn new(engine: Engine, gate: LogGate, input: R) -> Self {
        Self {
            engine,
            gate,
            input,
        }
    }

    /// Wait for the device to register, then run every item in order.
    pub async fn run(&mut self, items: &[TestItem]) -> Result<Vec<TestResult>> {
        info!("waiting for device registration");
        self.engine.wait_ready().await;

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(self.run_item(item).await?);
        }
        Ok(results)
    }

    /// Run a single item.
    pub async fn run_item(&mut self, item: &TestItem) -> Result<TestResult> {
        info!(
            name = %item.name,
            interface = %item.interface,
            timeout_secs = item.timeout.as_secs(),
            keywords = ?item.keywords,
            "starting test"
        );

        if !item.prompt.is_empty() {
            self.prompt(&item.prompt).await?;
        }

        let started = Instant::now();
        let passed = match &item.request {
            Some(body) => {
                self.engine.send_request(body.clone()).await?;
                self.engine
                    .wait_and_check_response(item.timeout, item.keywords.as_slice())
                    .await
            }
            None => {
                warn!(name = %item.name, "no valid request, not sent");
                false
            }
        };
        let elapsed = started.elapsed();

        info!(
            name = %item.name,
            passed,
            elapsed_secs = elapsed.as_secs_f64(),
            "test finished"
        );

        Ok(TestResult {
            name: item.name.clone(),
            interface: item.interface.clone(),
            passed,
            elapsed,
        })
    }

    /// Show `message` and wait for the operator to press Enter, holding log output
    /// meanwhile.
    async fn prompt(&mut self, message: &str) -> Result<()> {
        debug!(prompt = message, "waiting for operator");
        self.gate
            .write_direct(&format!("--- {message} ---\n--- press Enter to continue >>>\n"))?;

        self.gate.pause();
        let mut line = String::new();
        let read = self.input.read_line(&mut line).await;
        self.gate.resume()?;
        read?;
        Ok(())
    }
}
