//! Logging setup.
//!
//! Console output goes through a [`LogGate`], which can be paused while the operator
//! answers a prompt. Lines logged while paused are held and written out on resume, so
//! device traffic is not lost and does not scroll the prompt away.

use crate::{Error, Result};
use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing_subscriber::{
    filter::LevelFilter, fmt, fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt,
    EnvFilter,
};

/// Minimum log level, as accepted on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// No log output.
    None,
    /// Debug and above.
    Debug,
    /// Info and above.
    #[default]
    Info,
    /// Warnings and errors.
    Warning,
    /// Errors only.
    Error,
    /// Errors only.
    Fatal,
}

impl LogLevel {
    /// Equivalent `tracing` filter.
    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::None => LevelFilter::OFF,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Fatal => LevelFilter::ERROR,
        }
    }
}

/// Log destinations and level.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Minimum level.
    pub level: LogLevel,
    /// File to append to.
    pub file: Option<PathBuf>,
    /// Write to stdout (through the gate).
    pub stdout: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            stdout: true,
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` directives are honoured on top of the configured level. With
/// [`LogLevel::None`] nothing is installed.
///
/// # Errors
///
/// Fails if the log file cannot be opened or a subscriber is already installed.
pub fn init(options: &LogOptions, gate: &LogGate) -> Result<()> {
    if options.level == LogLevel::None {
        return Ok(());
    }

    let filter = EnvFilter::builder()
        .with_default_directive(options.level.filter().into())
        .from_env_lossy();

    let file_layer = match &options.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };
    let console_layer = options
        .stdout
        .then(|| fmt::layer().with_writer(gate.clone()));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

/// Pausable console sink.
///
/// Cloning yields another handle to the same gate.
#[derive(Clone)]
pub struct LogGate {
    inner: Arc<Mutex<GateState>>,
}

struct GateState {
    paused: bool,
    held: Vec<u8>,
    sink: Box<dyn Write + Send>,
}

impl LogGate {
    /// Gate in front of stdout.
    pub fn stdout() -> Self {
        Self::with_sink(io::stdout())
    }

    /// Gate in front of an arbitrary writer.
    pub fn with_sink<W>(sink: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(GateState {
                paused: false,
                held: Vec::new(),
                sink: Box::new(sink),
            })),
        }
    }

    /// Hold output until [`resume`](Self::resume).
    pub fn pause(&self) {
        let mut state = self.lock();
        state.paused = true;
        state.held.clear();
    }

    /// Write out held output and pass output through again.
    pub fn resume(&self) -> io::Result<()> {
        let mut state = self.lock();
        state.paused = false;
        let held = std::mem::take(&mut state.held);
        state.sink.write_all(&held)?;
        state.sink.flush()
    }

    /// Write `text` to the sink immediately, even while paused.
    ///
    /// Used for operator prompts, which must be shown whatever the log level.
    pub fn write_direct(&self, text: &str) -> io::Result<()> {
        let mut state = self.lock();
        state.sink.write_all(text.as_bytes())?;
        state.sink.flush()
    }

    /// Whether output is currently held.
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        // A panic mid-write leaves the buffer usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for LogGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("LogGate")
            .field("paused", &state.paused)
            .field("held", &state.held.len())
            .finish()
    }
}

/// Writer handed out by [`LogGate`] for each log event.
pub struct GateWriter {
    gate: LogGate,
}

impl Write for GateWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.gate.lock();
        if state.paused {
            state.held.extend_from_slice(buf);
            Ok(buf.len())
        } else {
            state.sink.write(buf)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.gate.lock();
        if state.paused {
            Ok(())
        } else {
            state.sink.flush()
        }
    }
}

impl<'a> MakeWriter<'a> for LogGate {
    type Writer = GateWriter;

    fn make_writer(&'a self) -> Self::Writer {
        GateWriter { gate: self.clone() }
    }
}
