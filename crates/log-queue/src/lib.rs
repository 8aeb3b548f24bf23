//! Bounded Log Frame Queue
//!
//! Provides the fixed-capacity [`Frame`] unit and the bounded, lock-free
//! [`LogQueue`] shared between log producers and the single drain task.

mod buffer;

pub use buffer::{LogQueue, DEFAULT_DEPTH};

use thiserror::Error;

/// Default frame capacity in bytes
pub const DEFAULT_FRAME_CAPACITY: usize = 64;

/// Errors raised by the log queue
#[derive(Debug, Error)]
pub enum QueueError {
    /// A queue or frame was configured with zero capacity
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),
}

/// A single chunk of log bytes, never longer than its capacity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
    capacity: usize,
}

impl Frame {
    /// Copy up to `capacity` bytes of `data` into a new frame.
    ///
    /// Returns the frame and the number of bytes that did not fit.
    pub fn truncating(data: &[u8], capacity: usize) -> (Self, usize) {
        let len = data.len().min(capacity);
        let mut bytes = Vec::with_capacity(capacity);
        bytes.extend_from_slice(&data[..len]);
        (Self { bytes, capacity }, data.len() - len)
    }

    /// Copy up to `capacity` bytes of `data`, silently dropping the rest
    pub fn new(data: &[u8], capacity: usize) -> Self {
        Self::truncating(data, capacity).0
    }

    /// Stored bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of stored bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the frame carries no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Maximum number of bytes this frame can hold
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
