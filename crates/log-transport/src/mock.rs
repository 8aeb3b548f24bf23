//! Mock Transport for Testing
//!
//! Records every accepted frame and every attempt. Behavior can be changed
//! while the drain task is running through any clone of the handle.

use crate::status::TransmitStatus;
use crate::Transport;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// Default response of the mock when nothing more specific applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Accept every frame
    Succeed,
    /// Report `Busy` forever
    AlwaysBusy,
    /// Report `Fail` forever
    AlwaysFail,
}

#[derive(Default)]
struct Script {
    /// One-shot responses consumed before `behavior`
    queued: VecDeque<TransmitStatus>,
    /// Payloads that always stall
    stall_on: Vec<Vec<u8>>,
    /// Attempts per payload
    attempts_by_payload: HashMap<Vec<u8>, usize>,
    /// Accepted frames in arrival order
    delivered: Vec<Vec<u8>>,
}

struct MockState {
    behavior: Mutex<MockBehavior>,
    script: Mutex<Script>,
    attempts: AtomicUsize,
}

/// Scriptable in-memory transport. Clones share state.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    /// Create a mock that accepts every frame
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::Succeed)
    }

    /// Create a mock with the given default behavior
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            state: Arc::new(MockState {
                behavior: Mutex::new(behavior),
                script: Mutex::new(Script::default()),
                attempts: AtomicUsize::new(0),
            }),
        }
    }

    /// Change the default behavior
    pub fn set_behavior(&self, behavior: MockBehavior) {
        *lock(&self.state.behavior) = behavior;
    }

    /// Report `Busy` for every frame carrying exactly `payload`
    pub fn stall_on(&self, payload: &[u8]) {
        lock(&self.state.script).stall_on.push(payload.to_vec());
    }

    /// Queue one-shot responses returned before the default behavior
    pub fn push_responses(&self, responses: impl IntoIterator<Item = TransmitStatus>) {
        lock(&self.state.script).queued.extend(responses);
    }

    /// Frames accepted so far, in order
    pub fn delivered(&self) -> Vec<Vec<u8>> {
        lock(&self.state.script).delivered.clone()
    }

    /// Total transmit attempts
    pub fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::Acquire)
    }

    /// Transmit attempts for one payload
    pub fn attempts_for(&self, payload: &[u8]) -> usize {
        lock(&self.state.script)
            .attempts_by_payload
            .get(payload)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn transmit(&mut self, data: &[u8]) -> TransmitStatus {
        let behavior = *lock(&self.state.behavior);
        let mut script = lock(&self.state.script);
        *script.attempts_by_payload.entry(data.to_vec()).or_insert(0) += 1;
        self.state.attempts.fetch_add(1, Ordering::AcqRel);

        let status = if script.stall_on.iter().any(|p| p == data) {
            TransmitStatus::Busy
        } else if let Some(status) = script.queued.pop_front() {
            status
        } else {
            match behavior {
                MockBehavior::Succeed => TransmitStatus::Success,
                MockBehavior::AlwaysBusy => TransmitStatus::Busy,
                MockBehavior::AlwaysFail => TransmitStatus::Fail,
            }
        };

        if status.is_success() {
            trace!("mock: accepted {} bytes", data.len());
            script.delivered.push(data.to_vec());
        }
        status
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Lock that survives a panicking test thread
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
