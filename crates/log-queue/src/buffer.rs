//! Lock-Free Bounded Log Queue

use crate::{Frame, QueueError};
use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default queue depth (number of frames)
pub const DEFAULT_DEPTH: usize = 5;

/// Bounded MPMC FIFO of log frames.
///
/// Enqueue never blocks and never overwrites: a push against a full queue
/// hands the frame back to the caller and leaves the queue untouched.
pub struct LogQueue {
    /// Pre-allocated slots
    slots: ArrayQueue<Frame>,
    /// Frames accepted since creation (for statistics)
    total_written: AtomicUsize,
    /// Frames rejected because the queue was full
    total_dropped: AtomicUsize,
}

impl LogQueue {
    /// Create a new queue holding at most `capacity` frames
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity("queue depth"));
        }
        Ok(Self {
            slots: ArrayQueue::new(capacity),
            total_written: AtomicUsize::new(0),
            total_dropped: AtomicUsize::new(0),
        })
    }

    /// Create a queue with the default depth (5 frames)
    pub fn with_default_depth() -> Self {
        Self {
            slots: ArrayQueue::new(DEFAULT_DEPTH),
            total_written: AtomicUsize::new(0),
            total_dropped: AtomicUsize::new(0),
        }
    }

    /// Push a frame without waiting.
    ///
    /// Drop-newest policy: when full, the rejected frame is handed back as
    /// the error and the queued frames stay as they were.
    pub fn try_enqueue(&self, frame: Frame) -> Result<(), Frame> {
        match self.slots.push(frame) {
            Ok(()) => {
                self.total_written.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(frame) => {
                self.total_dropped.fetch_add(1, Ordering::Relaxed);
                Err(frame)
            }
        }
    }

    /// Pop the oldest frame, or `None` immediately if the queue is empty
    pub fn try_dequeue(&self) -> Option<Frame> {
        self.slots.pop()
    }

    /// Get the number of frames currently queued
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Check if queue is full
    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }

    /// Get the queue capacity
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Number of unoccupied slots. Equal to `capacity()` means no work pending.
    pub fn free_slots(&self) -> usize {
        self.capacity().saturating_sub(self.len())
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.len() as f64 / self.capacity() as f64
    }

    /// Get total frames accepted
    pub fn total_written(&self) -> usize {
        self.total_written.load(Ordering::Relaxed)
    }

    /// Get total frames rejected on a full queue
    pub fn total_dropped(&self) -> usize {
        self.total_dropped.load(Ordering::Relaxed)
    }

    /// Discard every queued frame, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut removed = 0;
        while self.slots.pop().is_some() {
            removed += 1;
        }
        removed
    }
}

impl Default for LogQueue {
    fn default() -> Self {
        Self::with_default_depth()
    }
}

impl std::fmt::Debug for LogQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("total_written", &self.total_written())
            .field("total_dropped", &self.total_dropped())
            .finish()
    }
}
