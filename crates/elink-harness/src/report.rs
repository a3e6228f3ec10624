//! Conformance report.

use crate::runner::TestResult;
use chrono::{DateTime, Local};
use elink_transport::SessionSnapshot;
use std::fmt;
use tabled::{settings::Style, Table, Tabled};

/// Standard the interface tests check against.
pub const STANDARD: &str = "Q/CT2621-2017";

const RULE: &str =
    "===============================================================================================";

#[derive(Tabled)]
struct Row<'a> {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Interface")]
    interface: &'a str,
    #[tabled(rename = "Test case")]
    name: &'a str,
    #[tabled(rename = "Result")]
    result: &'static str,
}

/// Test report for one run.
#[derive(Debug, Clone)]
pub struct Report<'a> {
    snapshot: &'a SessionSnapshot,
    results: &'a [TestResult],
    test_mac: &'a str,
    tester: String,
    time: DateTime<Local>,
}

impl<'a> Report<'a> {
    /// Build a report from the engine state and the test results.
    pub fn new(snapshot: &'a SessionSnapshot, test_mac: &'a str, results: &'a [TestResult]) -> Self {
        Self {
            snapshot,
            results,
            test_mac,
            tester: tester_name(),
            time: Local::now(),
        }
    }

    /// Override the tester name.
    pub fn with_tester(mut self, tester: impl Into<String>) -> Self {
        self.tester = tester.into();
        self
    }

    /// Override the report time.
    pub fn with_time(mut self, time: DateTime<Local>) -> Self {
        self.time = time;
        self
    }

    /// Number of passed items.
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    fn table(&self) -> String {
        let rows = self
            .results
            .iter()
            .filter(|r| !r.interface.is_empty())
            .enumerate()
            .map(|(i, r)| Row {
                index: i + 1,
                interface: &r.interface,
                name: &r.name,
                result: if r.passed { "PASS" } else { "FAIL" },
            });
        Table::new(rows).with(Style::ascii()).to_string()
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let identity = &self.snapshot.identity;
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            "{} {} e-Link interface conformance test report",
            identity.vendor, identity.model
        )?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "Standard:          {STANDARD}")?;
        writeln!(f, "Test time:         {}", self.time.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "Tester:            {}", self.tester)?;
        writeln!(f, "Test terminal MAC: {}", self.test_mac)?;
        writeln!(f, "Device MAC:        {}", identity.mac)?;
        writeln!(f, "Software version:  {}", identity.sw_version)?;
        writeln!(f, "Connections:       {}", self.snapshot.connection_count)?;
        writeln!(f, "Passed:            {}/{}", self.passed(), self.results.len())?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "{}", self.table())?;
        write!(f, "{RULE}")
    }
}

/// Name of the user running the tests.
pub fn tester_name() -> String {
    ["USER", "USERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "nobody".to_string())
}
