//! Log Transport Capability
//!
//! This crate provides the non-blocking send primitive consumed by the log
//! drain task, with adapters for serial ports, stdout and any
//! [`std::io::Write`] sink, plus a scriptable mock for testing.

mod error;
mod mock;
mod status;
mod writer;

pub use error::TransportError;
pub use mock::{MockBehavior, MockTransport};
pub use status::TransmitStatus;
pub use writer::{SerialTransport, StdoutTransport, WriterTransport};

/// A byte sink that accepts whole frames without blocking.
///
/// `transmit` must return promptly. A sink that cannot take the frame right
/// now reports [`TransmitStatus::Busy`] and expects to be called again with
/// the same bytes.
pub trait Transport: Send {
    /// Offer a frame to the sink
    fn transmit(&mut self, data: &[u8]) -> TransmitStatus;

    /// Short human-readable label for diagnostics
    fn name(&self) -> &str {
        "transport"
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn transmit(&mut self, data: &[u8]) -> TransmitStatus {
        (**self).transmit(data)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
