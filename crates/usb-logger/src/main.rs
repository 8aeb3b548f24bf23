//! USB Logger Bridge - Main Entry Point

use std::io;
use tracing::info;
use usb_logger::{init_logging, open_transport, run_bridge, BridgeConfig};

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => BridgeConfig::load(&path)?,
        None => BridgeConfig::default(),
    };

    let transport = open_transport(&config.transport)?;
    let logger = log_pipeline::Logger::init(config.logger.clone(), transport)?;
    init_logging(logger.writer(), &config.log_level)?;

    info!("=== USB Logger v{} ===", env!("CARGO_PKG_VERSION"));

    let summary = run_bridge(&logger.writer(), io::stdin().lock())?;
    info!("stdin closed after {} lines ({} dropped)", summary.lines, summary.dropped);

    let stats = logger.shutdown()?;

    // The pipeline is closed by now, so report on stderr
    eprintln!("{}", serde_json::to_string(&stats)?);
    Ok(())
}
