//! Asynchronous control signals: cancellation, suspension and timeout.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Execution settings shared by every algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Wall-clock budget in milliseconds, measured from activation.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ExecutionConfig {
    /// Configuration with a timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout_ms: Some(timeout.as_millis() as u64),
        }
    }

    /// Timeout as a duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Install these settings on a control handle.
    pub fn apply(&self, control: &ExecutionControl) {
        if let Some(timeout) = self.timeout() {
            control.set_timeout(timeout);
        }
    }
}

#[derive(Debug, Default)]
struct ControlState {
    cancelled: AtomicBool,
    suspended: AtomicBool,
    timeout: Mutex<Option<Duration>>,
}

/// Handle for signalling a running algorithm from any thread.
///
/// Signals are only observed at the start of the next step; work already in
/// progress always completes.
#[derive(Debug, Clone, Default)]
pub struct ExecutionControl {
    inner: Arc<ControlState>,
}

impl ExecutionControl {
    /// Create a fresh handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Ask the algorithm to pause at the next safe point.
    pub fn suspend(&self) {
        self.inner.suspended.store(true, Ordering::SeqCst);
    }

    /// Lift a suspension.
    pub fn resume(&self) {
        self.inner.suspended.store(false, Ordering::SeqCst);
    }

    /// Whether a suspension is requested.
    pub fn is_suspended(&self) -> bool {
        self.inner.suspended.load(Ordering::SeqCst)
    }

    /// Set the wall-clock budget, measured from activation.
    pub fn set_timeout(&self, timeout: Duration) {
        *self.inner.timeout.lock() = Some(timeout);
    }

    /// Remove the wall-clock budget.
    pub fn clear_timeout(&self) {
        *self.inner.timeout.lock() = None;
    }

    /// Current wall-clock budget.
    pub fn timeout(&self) -> Option<Duration> {
        *self.inner.timeout.lock()
    }
}

/// Timing information handed to each unit of work.
#[derive(Debug, Clone, Copy)]
pub struct StepContext {
    activated_at: Instant,
    deadline: Option<Instant>,
}

impl StepContext {
    pub(crate) fn new(activated_at: Instant, timeout: Option<Duration>) -> Self {
        Self {
            activated_at,
            deadline: timeout.map(|t| activated_at + t),
        }
    }

    /// Time since activation.
    pub fn elapsed(&self) -> Duration {
        self.activated_at.elapsed()
    }

    /// Time left until the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_between_clones() {
        let control = ExecutionControl::new();
        let remote = control.clone();
        assert!(!control.is_cancelled());
        remote.cancel();
        assert!(control.is_cancelled());
    }

    #[test]
    fn suspend_and_resume() {
        let control = ExecutionControl::new();
        control.suspend();
        assert!(control.is_suspended());
        control.resume();
        assert!(!control.is_suspended());
    }

    #[test]
    fn config_applies_timeout() {
        let control = ExecutionControl::new();
        ExecutionConfig::with_timeout(Duration::from_millis(250)).apply(&control);
        assert_eq!(control.timeout(), Some(Duration::from_millis(250)));
        control.clear_timeout();
        assert_eq!(control.timeout(), None);
    }

    #[test]
    fn step_context_remaining_time() {
        let ctx = StepContext::new(Instant::now(), Some(Duration::from_secs(60)));
        let remaining = ctx.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(59));
        assert!(StepContext::new(Instant::now(), None).remaining().is_none());
    }
}
