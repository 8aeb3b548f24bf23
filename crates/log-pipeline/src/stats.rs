//! Pipeline counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Frames accepted by `write`
    pub frames_enqueued: u64,
    /// Writes rejected because the queue was full
    pub frames_dropped: u64,
    /// Bytes cut off by frame truncation
    pub bytes_truncated: u64,
    /// Frames the transport accepted
    pub frames_transmitted: u64,
    /// Bytes the transport accepted
    pub bytes_transmitted: u64,
    /// Frames given up after a stall or a dropped failure
    pub frames_abandoned: u64,
    /// Transmit attempts answered with `Busy`
    pub busy_retries: u64,
    /// Transmit attempts answered with `Fail`
    pub fail_retries: u64,
    /// Times the stall guard fired
    pub stall_timeouts: u64,
    /// Times the drain task parked itself
    pub suspensions: u64,
    /// Times the drain task was woken from a park
    pub wakeups: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub frames_enqueued: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub bytes_truncated: AtomicU64,
    pub frames_transmitted: AtomicU64,
    pub bytes_transmitted: AtomicU64,
    pub frames_abandoned: AtomicU64,
    pub busy_retries: AtomicU64,
    pub fail_retries: AtomicU64,
    pub stall_timeouts: AtomicU64,
    pub suspensions: AtomicU64,
    pub wakeups: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, amount: usize) {
        counter.fetch_add(amount as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PipelineStats {
            frames_enqueued: load(&self.frames_enqueued),
            frames_dropped: load(&self.frames_dropped),
            bytes_truncated: load(&self.bytes_truncated),
            frames_transmitted: load(&self.frames_transmitted),
            bytes_transmitted: load(&self.bytes_transmitted),
            frames_abandoned: load(&self.frames_abandoned),
            busy_retries: load(&self.busy_retries),
            fail_retries: load(&self.fail_retries),
            stall_timeouts: load(&self.stall_timeouts),
            suspensions: load(&self.suspensions),
            wakeups: load(&self.wakeups),
        }
    }
}
