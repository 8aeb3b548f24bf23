//! Drain Task
//!
//! Single consumer of the log queue. Each pass dequeues one frame and spins
//! on the transport until it is accepted or the stall guard fires. A stalled
//! frame is abandoned, the task backs off for the retry interval, and draining
//! continues with the next frame. With nothing left to send the task parks
//! until a writer wakes it.

use crate::config::{FailPolicy, LoggerConfig};
use crate::guard::TimeoutGuard;
use crate::stats::Counters;
use crate::writer::Shared;
use log_queue::Frame;
use log_transport::{TransmitStatus, Transport};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, trace, warn};

/// Lifecycle state of the drain task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ConsumerState {
    /// Parked, waiting for a write
    Suspended = 0,
    /// Moving frames to the transport
    Draining = 1,
    /// Finished after shutdown
    Stopped = 2,
}

impl ConsumerState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConsumerState::Suspended,
            1 => ConsumerState::Draining,
            _ => ConsumerState::Stopped,
        }
    }
}

/// Result of driving one frame to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    /// Stall guard fired mid-transmit
    Stalled,
    /// Dropped by the fail policy
    Failed,
}

/// Owner of the transport and consumer side of the queue
pub struct LogConsumer<T> {
    shared: Arc<Shared>,
    transport: T,
    config: LoggerConfig,
}

impl<T: Transport> LogConsumer<T> {
    pub(crate) fn new(shared: Arc<Shared>, transport: T, config: LoggerConfig) -> Self {
        Self {
            shared,
            transport,
            config,
        }
    }

    /// Run the drain loop until the logger is closed and the queue is empty.
    ///
    /// Returns the transport so callers can inspect or reuse it.
    pub async fn run(mut self) -> T {
        info!(
            "Starting log drain on {} (depth={}, frame={}B, stall={}ms)",
            self.transport.name(),
            self.config.queue_depth,
            self.config.frame_capacity,
            self.config.stall_timeout_ms
        );

        let guard = TimeoutGuard::spawn(self.config.stall_timeout());
        self.shared.set_state(ConsumerState::Draining);

        loop {
            let Some(frame) = self.shared.queue.try_dequeue() else {
                if self.shared.is_closed() {
                    // A writer that passed its closed check may still be enqueuing
                    if self.shared.writers_in_flight() == 0 && self.shared.queue.is_empty() {
                        break;
                    }
                    tokio::task::yield_now().await;
                    continue;
                }
                suspend(&self.shared).await;
                continue;
            };

            let delivery = self.transmit(&frame, &guard).await;
            trace!("{}-byte frame: {:?}", frame.len(), delivery);

            if delivery == Delivery::Stalled {
                Counters::bump(&self.shared.counters.stall_timeouts);
                warn!(
                    "Transport {} stalled for {:?}, {}-byte frame abandoned; retrying in {:?}",
                    self.transport.name(),
                    guard.period(),
                    frame.len(),
                    self.config.retry_interval()
                );
                tokio::time::sleep(self.config.retry_interval()).await;
                guard.clear();
            }
        }

        self.shared.set_state(ConsumerState::Stopped);
        info!("Log drain stopped");
        self.transport
    }

    /// Spin on the transport until the frame is accepted, the guard fires,
    /// or the fail policy gives up.
    async fn transmit(&mut self, frame: &Frame, guard: &TimeoutGuard) -> Delivery {
        let counters = &self.shared.counters;
        let mut backoff: Option<Duration> = None;

        guard.start();
        loop {
            match self.transport.transmit(frame.as_bytes()) {
                TransmitStatus::Success => {
                    // Lower a flag raised by a tick that raced this attempt
                    guard.clear();
                    Counters::bump(&counters.frames_transmitted);
                    Counters::add(&counters.bytes_transmitted, frame.len());
                    return Delivery::Sent;
                }
                TransmitStatus::Busy => {
                    Counters::bump(&counters.busy_retries);
                }
                TransmitStatus::Fail => {
                    Counters::bump(&counters.fail_retries);
                    match self.config.fail_policy {
                        FailPolicy::RetryUntilTimeout => {}
                        FailPolicy::Drop => {
                            guard.clear();
                            Counters::bump(&counters.frames_abandoned);
                            warn!("Transport {} failed, dropping {}-byte frame", self.transport.name(), frame.len());
                            return Delivery::Failed;
                        }
                        FailPolicy::Backoff { initial_ms, max_ms } => {
                            let delay = next_backoff(backoff, initial_ms, max_ms);
                            trace!("Transport failed, backing off {:?}", delay);
                            backoff = Some(delay);
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }

            if guard.is_tripped() {
                Counters::bump(&counters.frames_abandoned);
                return Delivery::Stalled;
            }
            // Let the guard timer run; no added delay
            tokio::task::yield_now().await;
        }
    }
}

/// Park until a writer signals new work.
///
/// `Notify` keeps a wake issued between the emptiness check and this call,
/// so a frame queued in that window is never left behind.
async fn suspend(shared: &Shared) {
    shared.set_state(ConsumerState::Suspended);
    Counters::bump(&shared.counters.suspensions);
    trace!("Log queue empty, drain suspended");

    shared.wake.notified().await;

    shared.set_state(ConsumerState::Draining);
    Counters::bump(&shared.counters.wakeups);
    trace!("Drain resumed");
}

fn next_backoff(previous: Option<Duration>, initial_ms: u64, max_ms: u64) -> Duration {
    let max = Duration::from_millis(max_ms);
    match previous {
        None => Duration::from_millis(initial_ms).min(max),
        Some(delay) => (delay * 2).min(max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::channel;
    use crate::writer::LogWriter;
    use log_transport::{MockBehavior, MockTransport};
    use std::time::Instant;

    fn test_config() -> LoggerConfig {
        LoggerConfig {
            stall_timeout_ms: 50,
            retry_interval_ms: 20,
            ..Default::default()
        }
    }

    /// Poll `condition` until it holds or two seconds pass
    async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        condition()
    }

    async fn shutdown(writer: &LogWriter, task: tokio::task::JoinHandle<MockTransport>) {
        writer.close();
        task.await.unwrap();
    }

    #[test]
    fn test_backoff_doubles_to_cap() {
        let first = next_backoff(None, 5, 40);
        assert_eq!(first, Duration::from_millis(5));
        let second = next_backoff(Some(first), 5, 40);
        assert_eq!(second, Duration::from_millis(10));
        assert_eq!(next_backoff(Some(Duration::from_millis(30)), 5, 40), Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_drains_in_fifo_order_then_suspends() {
        let transport = MockTransport::new();
        let (writer, consumer) = channel(test_config(), transport.clone()).unwrap();

        let payloads: Vec<Vec<u8>> = (0..5u8).map(|i| vec![b'a' + i; 10]).collect();
        for payload in &payloads {
            assert_eq!(writer.write(payload).unwrap().accepted, 10);
        }

        let task = tokio::spawn(consumer.run());

        assert!(wait_for(|| transport.delivered().len() == 5).await);
        assert_eq!(transport.delivered(), payloads);
        assert!(wait_for(|| writer.state() == ConsumerState::Suspended).await);
        assert_eq!(writer.queued(), 0);

        let stats = writer.stats();
        assert_eq!(stats.frames_transmitted, 5);
        assert_eq!(stats.bytes_transmitted, 50);

        shutdown(&writer, task).await;
        assert_eq!(writer.state(), ConsumerState::Stopped);
    }

    #[tokio::test]
    async fn test_idle_start_suspends_and_write_wakes() {
        let transport = MockTransport::new();
        let (writer, consumer) = channel(test_config(), transport.clone()).unwrap();
        let task = tokio::spawn(consumer.run());

        assert!(wait_for(|| writer.state() == ConsumerState::Suspended).await);
        let suspensions = writer.stats().suspensions;

        // Parked task stays parked without writes
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(writer.stats().suspensions, suspensions);
        assert_eq!(transport.attempts(), 0);

        writer.write(b"wake up").unwrap();
        assert!(wait_for(|| transport.delivered() == vec![b"wake up".to_vec()]).await);
        assert!(writer.stats().wakeups >= 1);
        assert!(wait_for(|| writer.state() == ConsumerState::Suspended).await);

        shutdown(&writer, task).await;
    }

    #[tokio::test]
    async fn test_stalled_frame_is_abandoned() {
        let transport = MockTransport::new();
        transport.stall_on(b"stuck");
        let (writer, consumer) = channel(test_config(), transport.clone()).unwrap();

        writer.write(b"before").unwrap();
        writer.write(b"stuck").unwrap();
        writer.write(b"after").unwrap();

        let started = Instant::now();
        let task = tokio::spawn(consumer.run());

        assert!(wait_for(|| transport.delivered().len() == 2).await);
        // Stall timeout plus retry interval elapsed before "after" went out
        assert!(started.elapsed() >= Duration::from_millis(70));
        assert_eq!(transport.delivered(), vec![b"before".to_vec(), b"after".to_vec()]);

        let attempts = transport.attempts_for(b"stuck");
        assert!(attempts > 1, "busy frame should be retried, got {}", attempts);

        let stats = writer.stats();
        assert_eq!(stats.stall_timeouts, 1);
        assert_eq!(stats.frames_abandoned, 1);
        assert!(stats.busy_retries >= attempts as u64);

        // Abandoned frame is never offered again
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.attempts_for(b"stuck"), attempts);

        shutdown(&writer, task).await;
    }

    #[tokio::test]
    async fn test_recovers_after_transport_returns() {
        let transport = MockTransport::with_behavior(MockBehavior::AlwaysBusy);
        let (writer, consumer) = channel(test_config(), transport.clone()).unwrap();
        let task = tokio::spawn(consumer.run());

        writer.write(b"lost").unwrap();
        assert!(wait_for(|| writer.stats().stall_timeouts == 1).await);

        transport.set_behavior(MockBehavior::Succeed);
        writer.write(b"kept").unwrap();

        assert!(wait_for(|| transport.delivered() == vec![b"kept".to_vec()]).await);
        shutdown(&writer, task).await;
    }

    #[tokio::test]
    async fn test_fail_treated_as_busy_by_default() {
        let transport = MockTransport::new();
        transport.push_responses([TransmitStatus::Fail, TransmitStatus::Busy, TransmitStatus::Fail]);
        let (writer, consumer) = channel(test_config(), transport.clone()).unwrap();

        writer.write(b"persistent").unwrap();
        let task = tokio::spawn(consumer.run());

        assert!(wait_for(|| transport.delivered().len() == 1).await);
        assert_eq!(transport.attempts_for(b"persistent"), 4);

        let stats = writer.stats();
        assert_eq!(stats.fail_retries, 2);
        assert_eq!(stats.busy_retries, 1);
        assert_eq!(stats.stall_timeouts, 0);

        shutdown(&writer, task).await;
    }

    #[tokio::test]
    async fn test_drop_policy_abandons_on_fail() {
        let transport = MockTransport::new();
        transport.push_responses([TransmitStatus::Fail]);
        let config = LoggerConfig {
            fail_policy: FailPolicy::Drop,
            ..test_config()
        };
        let (writer, consumer) = channel(config, transport.clone()).unwrap();

        writer.write(b"doomed").unwrap();
        writer.write(b"fine").unwrap();
        let task = tokio::spawn(consumer.run());

        assert!(wait_for(|| transport.delivered().len() == 1).await);
        assert_eq!(transport.delivered(), vec![b"fine".to_vec()]);
        assert_eq!(transport.attempts_for(b"doomed"), 1);
        assert_eq!(writer.stats().frames_abandoned, 1);
        assert_eq!(writer.stats().stall_timeouts, 0);

        shutdown(&writer, task).await;
    }

    #[tokio::test]
    async fn test_backoff_policy_spaces_out_failures() {
        let transport = MockTransport::new();
        transport.push_responses([TransmitStatus::Fail, TransmitStatus::Fail, TransmitStatus::Fail]);
        let config = LoggerConfig {
            stall_timeout_ms: 1000,
            fail_policy: FailPolicy::Backoff {
                initial_ms: 5,
                max_ms: 10,
            },
            ..test_config()
        };
        let (writer, consumer) = channel(config, transport.clone()).unwrap();

        writer.write(b"eventually").unwrap();
        let started = Instant::now();
        let task = tokio::spawn(consumer.run());

        assert!(wait_for(|| transport.delivered().len() == 1).await);
        // 5 + 10 + 10 ms of backoff
        assert!(started.elapsed() >= Duration::from_millis(25));
        assert_eq!(transport.attempts_for(b"eventually"), 4);

        shutdown(&writer, task).await;
    }

    /// Busy once, then stalls past the guard period inside a single call,
    /// then accepts
    struct LateAck {
        calls: u32,
    }

    impl Transport for LateAck {
        fn transmit(&mut self, _data: &[u8]) -> TransmitStatus {
            self.calls += 1;
            match self.calls {
                1 => TransmitStatus::Busy,
                2 => {
                    std::thread::sleep(Duration::from_millis(80));
                    TransmitStatus::Busy
                }
                _ => TransmitStatus::Success,
            }
        }
    }

    #[tokio::test]
    async fn test_success_after_late_tick_is_not_a_stall() {
        let (writer, consumer) = channel(test_config(), LateAck { calls: 0 }).unwrap();
        writer.write(b"late ack").unwrap();
        writer.close();

        let transport = consumer.run().await;
        assert_eq!(transport.calls, 3);

        let stats = writer.stats();
        assert_eq!(stats.frames_transmitted, 1);
        assert_eq!(stats.stall_timeouts, 0);
        assert_eq!(stats.frames_abandoned, 0);
    }

    #[tokio::test]
    async fn test_close_drains_remaining_frames() {
        let transport = MockTransport::new();
        let (writer, consumer) = channel(test_config(), transport.clone()).unwrap();

        writer.write(b"one").unwrap();
        writer.write(b"two").unwrap();
        writer.close();

        let returned = consumer.run().await;
        assert_eq!(returned.delivered(), vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(writer.state(), ConsumerState::Stopped);
    }
}
