//! Transmit Stall Guard
//!
//! A periodic, auto-reloading timer whose only effect is to raise a shared
//! flag. The drain task polls the flag between transmit attempts, which turns
//! an indefinite spin on a stalled transport into a bounded one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

struct GuardFlag {
    /// Raised by a tick, cleared by the drain task
    tripped: AtomicBool,
    /// Bumped on every start/stop; ticks from older generations are ignored
    generation: AtomicU64,
}

/// Periodic stall timer. Must be created inside a tokio runtime.
pub struct TimeoutGuard {
    flag: Arc<GuardFlag>,
    /// `Some(generation)` while armed
    control: watch::Sender<Option<u64>>,
    task: JoinHandle<()>,
    period: Duration,
}

impl TimeoutGuard {
    /// Spawn the timer task, initially disarmed
    pub fn spawn(period: Duration) -> Self {
        let flag = Arc::new(GuardFlag {
            tripped: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        });
        let (control, rx) = watch::channel(None);
        let task = tokio::spawn(run_timer(Arc::clone(&flag), rx, period));

        Self {
            flag,
            control,
            task,
            period,
        }
    }

    /// Arm the timer, restarting the period from zero
    pub fn start(&self) {
        let generation = self.flag.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.control.send_replace(Some(generation));
    }

    /// Restart from zero; identical to [`start`](Self::start)
    pub fn reset(&self) {
        self.start();
    }

    /// Disarm the timer, leaving the flag as it is
    pub fn stop(&self) {
        self.flag.generation.fetch_add(1, Ordering::AcqRel);
        self.control.send_replace(None);
    }

    /// Disarm the timer and lower the flag
    pub fn clear(&self) {
        self.stop();
        self.flag.tripped.store(false, Ordering::Release);
    }

    /// Check if the period elapsed since the last start
    pub fn is_tripped(&self) -> bool {
        self.flag.tripped.load(Ordering::Acquire)
    }

    /// Timer period
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_timer(flag: Arc<GuardFlag>, mut control: watch::Receiver<Option<u64>>, period: Duration) {
    loop {
        let armed = *control.borrow_and_update();
        match armed {
            None => {
                if control.changed().await.is_err() {
                    return;
                }
            }
            Some(generation) => {
                let mut ticker = interval_at(Instant::now() + period, period);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if flag.generation.load(Ordering::Acquire) == generation {
                                debug!("Stall guard fired after {:?}", period);
                                flag.tripped.store(true, Ordering::Release);
                            }
                        }
                        changed = control.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            break;
                        }
                    }
                }
            }
        }
    }
}
