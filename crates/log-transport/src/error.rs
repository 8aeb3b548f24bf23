//! Transport Error Types

use thiserror::Error;

/// Errors that can occur while bringing up a transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// Serial port could not be opened or configured
    #[error("Serial port error on {device}: {reason}")]
    Serial { device: String, reason: String },

    /// Underlying I/O failure
    #[error("Transport I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}
