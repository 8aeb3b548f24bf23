//! Pipeline Error Types

use log_queue::QueueError;
use thiserror::Error;

/// Why a write was not accepted
#[derive(Debug, Error)]
pub enum WriteError {
    /// Queue held its maximum number of frames; the write was dropped
    #[error("Log queue full, {dropped} bytes dropped")]
    QueueFull { dropped: usize },

    /// Logger has been shut down
    #[error("Logger is shut down")]
    Closed,
}

/// Invalid or unreadable configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration source could not be read or parsed
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A field that must be positive was zero
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// Fields are individually valid but inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while starting or stopping the logger
#[derive(Debug, Error)]
pub enum LoggerError {
    /// Configuration rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Queue could not be created
    #[error("Failed to create log queue: {0}")]
    Queue(#[from] QueueError),

    /// Drain runtime could not be built
    #[error("Failed to build drain runtime: {0}")]
    Runtime(std::io::Error),

    /// Drain thread could not be spawned
    #[error("Failed to spawn drain thread: {0}")]
    Spawn(std::io::Error),

    /// Drain thread panicked
    #[error("Drain thread panicked")]
    ConsumerPanicked,
}
