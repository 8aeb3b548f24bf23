//! Transmit Result Codes

use serde::{Deserialize, Serialize};
use std::io;

/// Outcome of a single non-blocking transmit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransmitStatus {
    /// Frame accepted by the sink
    Success,
    /// Sink is occupied; the same frame may be offered again immediately
    Busy,
    /// Sink reported an error that is not a transient occupancy
    Fail,
}

impl TransmitStatus {
    /// Check if the frame was accepted
    pub fn is_success(&self) -> bool {
        matches!(self, TransmitStatus::Success)
    }

    /// Check if the attempt should simply be repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransmitStatus::Busy)
    }

    /// Classify an I/O error from a non-blocking write
    pub fn from_io_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
                TransmitStatus::Busy
            }
            _ => TransmitStatus::Fail,
        }
    }
}

impl Default for TransmitStatus {
    fn default() -> Self {
        TransmitStatus::Success
    }
}
