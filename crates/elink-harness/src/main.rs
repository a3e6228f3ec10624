//! e-Link interface conformance harness.
//!
//! Listens for a device, completes the e-Link handshake, runs the test queue and prints
//! a report.

use anyhow::{bail, Context, Result};
use clap::Parser;
use elink_harness::{
    config::{bind_address, normalize_mac},
    logging::{self, LogGate, LogLevel, LogOptions},
    queue::load_queue,
    Report, Runner,
};
use elink_transport::{listener::DEFAULT_PORT, Engine, EngineConfig, Listener};
use std::{path::PathBuf, process::ExitCode};
use tokio::io::BufReader;
use tracing::{error, info, info_span};

#[derive(Parser, Debug)]
#[command(name = "elink-harness", version, about = "e-Link interface conformance harness")]
struct Cli {
    /// Listen address (empty for all interfaces)
    #[arg(long, default_value = "")]
    host: String,

    /// Listen port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Test queue file
    #[arg(long, default_value = "TestQueue.txt")]
    file: PathBuf,

    /// MAC address of the test terminal
    #[arg(long)]
    tmac: String,

    /// Log file to append to
    #[arg(long)]
    logfile: Option<PathBuf>,

    /// Disable logging to stdout
    #[arg(long)]
    nostdout: bool,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    loglevel: LogLevel,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let test_mac = normalize_mac(&cli.tmac).context("--tmac must be a 12-digit MAC address")?;

    let gate = LogGate::stdout();
    let options = LogOptions {
        level: cli.loglevel,
        file: cli.logfile.clone(),
        stdout: !cli.nostdout,
    };
    logging::init(&options, &gate).context("failed to initialize logging")?;
    info!(level = ?cli.loglevel, file = ?cli.logfile, "logging initialized");

    let items = load_queue(&cli.file)
        .with_context(|| format!("failed to load test queue {}", cli.file.display()))?;
    info!(items = items.len(), "test queue loaded");

    let engine = Engine::new(EngineConfig::default().with_span(info_span!("gateway")));
    let addr = bind_address(&cli.host, cli.port);
    let listener = Listener::bind(&addr)
        .await
        .with_context(|| format!("failed to listen on {addr}"))?;
    let mut server = tokio::spawn(listener.serve(engine.clone()));

    let mut runner = Runner::new(engine.clone(), gate, BufReader::new(tokio::io::stdin()));
    let results = tokio::select! {
        results = runner.run(&items) => results?,
        served = &mut server => match served {
            Ok(Ok(())) => bail!("listener stopped"),
            Ok(Err(e)) => return Err(e).context("listener failed"),
            Err(e) => return Err(e).context("listener task failed"),
        },
    };

    let snapshot = engine.snapshot();
    let report = Report::new(&snapshot, &test_mac, &results);
    info!(
        passed = report.passed(),
        total = results.len(),
        connections = snapshot.connection_count,
        "test run complete"
    );
    println!("{report}");

    server.abort();
    Ok(())
}
