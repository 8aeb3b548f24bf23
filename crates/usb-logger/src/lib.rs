//! USB Logger Bridge
//!
//! Wires a transport, the log pipeline and a tracing subscriber together:
//! the process's own diagnostics and everything read from stdin leave through
//! the same non-blocking pipe.

use log_pipeline::{LogWriter, LoggerConfig};
use log_transport::{SerialTransport, StdoutTransport, Transport, TransportError};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{info, Level};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::FmtSubscriber;

/// Errors raised while setting up the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration source could not be read or parsed
    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// Logger settings rejected
    #[error(transparent)]
    Logger(#[from] log_pipeline::ConfigError),

    /// Transport could not be opened
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Tracing subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Where frames are sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Process standard output
    Stdout,
    /// Serial / USB CDC device
    Serial {
        path: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Stdout
    }
}

fn default_baud_rate() -> u32 {
    115_200
}

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Pipeline settings
    pub logger: LoggerConfig,
    /// Output transport
    pub transport: TransportConfig,
    /// Maximum level of the bridge's own diagnostics
    pub log_level: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            logger: LoggerConfig::default(),
            transport: TransportConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load from a file, then apply `USB_LOGGER__*` environment overrides
    /// (e.g. `USB_LOGGER__LOGGER__QUEUE_DEPTH=16`)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(log_pipeline::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.logger.validate()?;
        Ok(config)
    }
}

/// Open the configured transport
pub fn open_transport(config: &TransportConfig) -> Result<Box<dyn Transport>, BridgeError> {
    let transport: Box<dyn Transport> = match config {
        TransportConfig::Stdout => Box::new(StdoutTransport::stdout()),
        TransportConfig::Serial { path, baud_rate } => Box::new(SerialTransport::open(path, *baud_rate)?),
    };
    info!("Using transport {}", transport.name());
    Ok(transport)
}

/// Most verbose level the pipeline's own crates may log at when their output
/// is written back into the pipeline
pub const PIPELINE_LEVEL_CAP: Level = Level::INFO;

/// Route tracing output through the pipeline.
///
/// Events from `log_pipeline` and `log_transport` are capped at
/// [`PIPELINE_LEVEL_CAP`]: the drain task traces every frame it sends, so at
/// trace level each transmitted frame would queue new ones and the drain
/// task would never go idle.
pub fn init_logging(writer: LogWriter, level: &str) -> Result<(), BridgeError> {
    let level: Level = level
        .parse()
        .map_err(|_| BridgeError::Logging(format!("unknown log level '{}'", level)))?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer)
        .finish()
        .with(pipeline_filter(level));

    tracing::subscriber::set_global_default(subscriber).map_err(|e| BridgeError::Logging(e.to_string()))
}

/// Per-target filter keeping the pipeline's own events at or below the cap
pub fn pipeline_filter(level: Level) -> Targets {
    // More verbose levels compare greater
    let capped = level.min(PIPELINE_LEVEL_CAP);
    Targets::new()
        .with_default(level)
        .with_target("log_pipeline", capped)
        .with_target("log_transport", capped)
}

/// Line counts from one bridge run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeSummary {
    /// Lines read from input
    pub lines: usize,
    /// Lines lost, fully or partly, to a full queue
    pub dropped: usize,
}

/// Copy input lines into the pipeline until EOF.
///
/// A line longer than one frame is split across frames. A full queue drops
/// the rest of the line and the bridge moves on; only input errors and a
/// closed logger stop it.
pub fn run_bridge<R: BufRead>(writer: &LogWriter, input: R) -> io::Result<BridgeSummary> {
    let mut writer = writer.clone();
    let mut summary = BridgeSummary::default();

    for line in input.lines() {
        let mut bytes = line?.into_bytes();
        bytes.push(b'\n');
        summary.lines += 1;

        match writer.write_all(&bytes) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => summary.dropped += 1,
            Err(err) => return Err(err),
        }
    }

    Ok(summary)
}
