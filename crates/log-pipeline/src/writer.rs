//! Producer Entry Point
//!
//! [`LogWriter`] is the synchronous, never-blocking surface application code
//! logs through. It can be cloned freely and used from any thread, with or
//! without an async runtime.

use crate::consumer::ConsumerState;
use crate::error::WriteError;
use crate::stats::{Counters, PipelineStats};
use log_queue::{Frame, LogQueue};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing_subscriber::fmt::MakeWriter;

/// Value returned by [`LogWriter::write_raw`] when a write is dropped
pub const WRITE_FAILED: isize = -1;

/// State shared by all writers and the drain task
pub(crate) struct Shared {
    pub queue: LogQueue,
    pub frame_capacity: usize,
    /// Wake signal; a wake sent before the drain task parks is remembered
    pub wake: Notify,
    pub state: AtomicU8,
    pub closed: AtomicBool,
    /// Writers between their closed check and the end of their enqueue
    pub in_flight: AtomicUsize,
    pub counters: Counters,
}

impl Shared {
    pub fn new(queue: LogQueue, frame_capacity: usize) -> Self {
        Self {
            queue,
            frame_capacity,
            wake: Notify::new(),
            state: AtomicU8::new(ConsumerState::Draining as u8),
            closed: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            counters: Counters::default(),
        }
    }

    pub fn state(&self) -> ConsumerState {
        ConsumerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ConsumerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Register a writer, or `None` once the logger is closed.
    ///
    /// The drain task only exits after seeing `closed` with no writer
    /// registered, so every enqueue that got past this check is drained.
    pub fn enter(&self) -> Option<InFlight<'_>> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(InFlight(self))
    }

    pub fn writers_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Registration held for the duration of one write
pub(crate) struct InFlight<'a>(&'a Shared);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Accepted write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Written {
    /// Bytes queued for transmission
    pub accepted: usize,
    /// Bytes cut off because the input exceeded the frame capacity
    pub truncated: usize,
}

impl Written {
    /// Check if part of the input was lost to truncation
    pub fn is_truncated(&self) -> bool {
        self.truncated > 0
    }
}

/// Cloneable handle for emitting log bytes
#[derive(Clone)]
pub struct LogWriter {
    shared: Arc<Shared>,
}

impl LogWriter {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Queue up to one frame of `data` without blocking.
    ///
    /// Input longer than the frame capacity is truncated, and the lost byte
    /// count is reported in [`Written::truncated`]. A full queue drops the
    /// whole write. On success the drain task is woken.
    pub fn write(&self, data: &[u8]) -> Result<Written, WriteError> {
        let _entry = self.shared.enter().ok_or(WriteError::Closed)?;

        let (frame, truncated) = Frame::truncating(data, self.shared.frame_capacity);
        let accepted = frame.len();
        let counters = &self.shared.counters;

        match self.shared.queue.try_enqueue(frame) {
            Ok(()) => {
                Counters::bump(&counters.frames_enqueued);
                Counters::add(&counters.bytes_truncated, truncated);
                self.shared.wake.notify_one();
                Ok(Written { accepted, truncated })
            }
            Err(frame) => {
                Counters::bump(&counters.frames_dropped);
                Err(WriteError::QueueFull {
                    dropped: frame.len() + truncated,
                })
            }
        }
    }

    /// Write returning the accepted length, or [`WRITE_FAILED`] when dropped
    pub fn write_raw(&self, data: &[u8]) -> isize {
        match self.write(data) {
            Ok(written) => written.accepted as isize,
            Err(_) => WRITE_FAILED,
        }
    }

    /// Current drain task state
    pub fn state(&self) -> ConsumerState {
        self.shared.state()
    }

    /// Snapshot of the pipeline counters
    pub fn stats(&self) -> PipelineStats {
        self.shared.counters.snapshot()
    }

    /// Frames waiting in the queue
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// Maximum bytes per write
    pub fn frame_capacity(&self) -> usize {
        self.shared.frame_capacity
    }

    /// Check if the logger has been shut down
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Refuse further writes and wake the drain task so it can finish
    pub(crate) fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.wake.notify_one();
    }
}

/// Byte-stream view: long buffers are split across frames, and a full queue
/// surfaces as `WouldBlock`.
impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match LogWriter::write(self, buf) {
            Ok(written) => Ok(written.accepted),
            Err(err @ WriteError::QueueFull { .. }) => Err(io::Error::new(io::ErrorKind::WouldBlock, err)),
            Err(err) => Err(io::Error::new(io::ErrorKind::BrokenPipe, err)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Write for LogWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        io::Write::write_all(self, s.as_bytes()).map_err(|_| fmt::Error)
    }
}

/// Lets a `tracing_subscriber::fmt` subscriber print through the pipeline
impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogWriter")
            .field("queue", &self.shared.queue)
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish()
    }
}
