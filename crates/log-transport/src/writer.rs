//! Writer-Backed Transports
//!
//! Adapts any non-blocking [`Write`] sink to the frame-oriented
//! [`Transport`] contract, the way a USB CDC endpoint behaves: a frame is
//! taken whole, bytes the sink could not absorb yet stay in an internal
//! transmit buffer, and the transport answers `Busy` until that buffer has
//! drained.

use crate::error::TransportError;
use crate::status::TransmitStatus;
use crate::Transport;
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Serial transport over a port opened through `tokio-serial`
pub type SerialTransport = WriterTransport<Box<dyn tokio_serial::SerialPort>>;

/// Transport writing to the process's standard output
pub type StdoutTransport = WriterTransport<io::Stdout>;

/// Frame transport over an [`io::Write`] sink
pub struct WriterTransport<W> {
    /// Underlying sink
    writer: W,
    /// Accepted bytes the sink has not taken yet
    pending: Vec<u8>,
    /// Flush the sink after every accepted frame
    flush_each: bool,
    /// Pending bytes discarded after a hard sink error
    lost_bytes: u64,
    /// Diagnostic label
    label: String,
}

impl<W: Write + Send> WriterTransport<W> {
    /// Wrap a sink
    pub fn new(writer: W, label: impl Into<String>) -> Self {
        Self {
            writer,
            pending: Vec::new(),
            flush_each: false,
            lost_bytes: 0,
            label: label.into(),
        }
    }

    /// Flush the sink after every accepted frame (needed for buffered sinks)
    pub fn flush_each(mut self, enabled: bool) -> Self {
        self.flush_each = enabled;
        self
    }

    /// Number of accepted bytes still waiting for the sink
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Get a reference to the underlying sink
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Unwrap the sink, discarding any pending bytes
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Bytes of earlier frames the sink lost to a hard error
    pub fn lost_bytes(&self) -> u64 {
        self.lost_bytes
    }

    /// Push pending bytes into the sink.
    ///
    /// Returns `false` while the sink is busy. A hard error discards the
    /// remainder, since the frame it belongs to was already reported sent.
    fn drain_pending(&mut self) -> bool {
        while !self.pending.is_empty() {
            let err = match self.writer.write(&self.pending) {
                Ok(0) => io::Error::new(io::ErrorKind::WriteZero, "sink accepted zero bytes"),
                Ok(n) => {
                    self.pending.drain(..n);
                    continue;
                }
                Err(err) => err,
            };

            if TransmitStatus::from_io_error(&err) == TransmitStatus::Busy {
                return false;
            }
            warn!("{}: write failed, dropping {} pending bytes: {}", self.label, self.pending.len(), err);
            self.lost_bytes += self.pending.len() as u64;
            self.pending.clear();
        }
        true
    }
}

impl<W: Write + Send> Transport for WriterTransport<W> {
    fn transmit(&mut self, data: &[u8]) -> TransmitStatus {
        if !self.drain_pending() {
            return TransmitStatus::Busy;
        }

        if data.is_empty() {
            return TransmitStatus::Success;
        }

        match self.writer.write(data) {
            Ok(0) => TransmitStatus::Fail,
            Ok(n) => {
                if n < data.len() {
                    debug!("{}: partial write {}/{} bytes, buffering rest", self.label, n, data.len());
                    self.pending.extend_from_slice(&data[n..]);
                }
                if self.flush_each {
                    if let Err(err) = self.writer.flush() {
                        debug!("{}: flush failed: {}", self.label, err);
                    }
                }
                TransmitStatus::Success
            }
            Err(err) => TransmitStatus::from_io_error(&err),
        }
    }

    fn name(&self) -> &str {
        &self.label
    }
}

impl SerialTransport {
    /// Open a serial port for non-blocking transmit.
    ///
    /// # Arguments
    /// * `device` - Serial port device path (e.g. "/dev/ttyACM0" or "COM3")
    /// * `baud_rate` - Baud rate for serial communication
    pub fn open(device: &str, baud_rate: u32) -> Result<Self, TransportError> {
        info!("Opening serial transport on {} at {} baud", device, baud_rate);

        // A zero timeout turns a full output buffer into TimedOut, i.e. Busy
        let port = tokio_serial::new(device, baud_rate)
            .timeout(Duration::ZERO)
            .open()
            .map_err(|err| TransportError::Serial {
                device: device.to_string(),
                reason: err.to_string(),
            })?;

        Ok(WriterTransport::new(port, device))
    }
}

impl StdoutTransport {
    /// Transport writing frames to stdout, flushed per frame
    pub fn stdout() -> Self {
        WriterTransport::new(io::stdout(), "stdout").flush_each(true)
    }
}
