//! Test queue loading.
//!
//! A queue file is CSV whose cells each name a test item file. An item file holds the
//! request JSON, possibly split over several lines, plus directive lines:
//!
//! ```text
//! {"type":"cfg","sequence":123,"mac":"mac",
//!  "set":{"roaming_set":{"enable":"yes","threshold_rssi":-50}}}
//! ^ResponseKeyWord^roaming_report
//! ^RecTimeOut^120
//! ^Interface^Roaming configuration / RSSI report
//! ^MessageBox^Move the station away from the AP within 120 seconds, then press Enter.
//! ```

use crate::{Error, Result};
use serde_json::Value;
use std::{fs, path::Path, time::Duration};
use tracing::warn;

const RECEIVE_TIMEOUT: &str = "^RecTimeOut^";
const RESPONSE_KEYWORDS: &str = "^ResponseKeyWord^";
const INTERFACE: &str = "^Interface^";
const MESSAGE_BOX: &str = "^MessageBox^";

/// One scripted request.
#[derive(Debug, Clone, PartialEq)]
pub struct TestItem {
    /// Item file path.
    pub name: String,
    /// Request body; `None` if the file held no valid JSON.
    pub request: Option<Value>,
    /// How long to wait for a matching response.
    pub timeout: Duration,
    /// Substrings a response must contain.
    pub keywords: Vec<String>,
    /// Interface title for the report; empty items are left out of it.
    pub interface: String,
    /// Prompt shown to the operator before sending.
    pub prompt: String,
}

impl TestItem {
    /// Parse an item from file contents.
    pub fn parse(name: &str, contents: &str) -> Self {
        let mut request = String::new();
        let mut timeout_secs = 0i64;
        let mut keywords = Vec::new();
        let mut interface = String::new();
        let mut prompt = String::new();

        for line in contents.lines() {
            if let Some(value) = line.strip_prefix(RECEIVE_TIMEOUT) {
                timeout_secs = value.trim().parse().unwrap_or(0);
            } else if let Some(value) = line.strip_prefix(RESPONSE_KEYWORDS) {
                keywords = value
                    .split('^')
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect();
            } else if let Some(value) = line.strip_prefix(INTERFACE) {
                interface = value.to_string();
            } else if let Some(value) = line.strip_prefix(MESSAGE_BOX) {
                prompt = value.to_string();
            } else if line.starts_with('^') {
                warn!(item = name, line, "unknown directive");
            } else {
                request.push_str(line);
            }
        }

        let request = match serde_json::from_str(&request) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(item = name, error = %e, "request is not valid JSON");
                None
            }
        };

        Self {
            name: name.to_string(),
            request,
            timeout: Duration::from_secs(timeout_secs.max(1) as u64),
            keywords,
            interface,
            prompt,
        }
    }

    /// Load an item file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::parse(&path.to_string_lossy(), &contents))
    }
}

/// Load every item named in a queue file, in order.
///
/// Item files that cannot be read are skipped with a warning.
///
/// # Errors
///
/// Fails if the queue file is missing or is not valid CSV.
pub fn load_queue(path: &Path) -> Result<Vec<TestItem>> {
    if !path.exists() {
        return Err(Error::QueueNotFound(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut items = Vec::new();
    for record in reader.records() {
        for cell in record?.iter().filter(|c| !c.is_empty()) {
            match TestItem::from_file(Path::new(cell)) {
                Ok(item) => items.push(item),
                Err(e) => warn!(item = cell, error = %e, "skipping test item"),
            }
        }
    }
    Ok(items)
}
