//! Circuit breaker for upstream service calls.
//!
//! Each breaker instance guards exactly one upstream operation type and owns
//! its own state; callers only see the call-wrapping operation. Failures are
//! tracked as a percentage over a rolling time window, and every pass-through
//! call is bounded by a timeout that counts as a failure when it expires.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU8, Ordering};
use std::time::Duration;

use thiserror::Error;

use crate::config::BreakerSettings;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Circuit is closed, requests flow through normally
    Closed = 0,
    /// Circuit is open, requests are rejected
    Open = 1,
    /// Circuit is half-open, allowing a single trial request
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open (or the half-open trial slot is taken)
    #[error("circuit breaker is open")]
    Open,
    /// The wrapped operation did not resolve within the call timeout
    #[error("call timed out after {0}ms")]
    Timeout(u64),
    /// The wrapped operation itself failed
    #[error("{0}")]
    Inner(E),
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Timeout applied to every pass-through call
    pub call_timeout: Duration,
    /// Failure percentage within the window that opens the circuit
    pub error_threshold_pct: u8,
    /// Minimum calls in the window before the percentage is evaluated
    pub volume_threshold: u32,
    /// Length of the rolling failure window
    pub window: Duration,
    /// Time to wait before transitioning from open to half-open
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_millis(5_000),
            error_threshold_pct: 50,
            volume_threshold: 5,
            window: Duration::from_millis(10_000),
            reset_timeout: Duration::from_millis(30_000),
        }
    }
}

impl From<&BreakerSettings> for BreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        Self {
            call_timeout: Duration::from_millis(settings.call_timeout_ms),
            error_threshold_pct: settings.error_threshold_pct,
            volume_threshold: settings.volume_threshold,
            window: Duration::from_millis(settings.window_ms),
            reset_timeout: Duration::from_millis(settings.reset_timeout_ms),
        }
    }
}

/// Circuit breaker guarding a single upstream operation type.
///
/// State transitions:
/// - `Closed` → `Open` when the failure percentage within the rolling window
///   exceeds the threshold (once the window holds the volume floor)
/// - `Open` → `HalfOpen` after the reset timeout elapses
/// - `HalfOpen` → `Closed` on a successful trial call, `HalfOpen` → `Open`
///   on a failed one; exactly one trial call is admitted
pub struct CircuitBreaker {
    /// Operation name for logs and metrics
    name: &'static str,
    /// Current state (0=Closed, 1=Open, 2=HalfOpen)
    state: AtomicU8,
    /// Start of the current failure window (ms since epoch)
    window_start: AtomicI64,
    /// Failures recorded in the current window
    window_failures: AtomicU32,
    /// Successes recorded in the current window
    window_successes: AtomicU32,
    /// Timestamp of last state change (ms since epoch)
    last_state_change: AtomicI64,
    /// Whether the half-open trial slot is taken
    probe_in_flight: AtomicBool,
    /// Configuration
    config: BreakerConfig,
}

/// Get current time in milliseconds since epoch
fn current_time_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl CircuitBreaker {
    /// Create a new circuit breaker for the named operation.
    pub fn new(name: &'static str, config: BreakerConfig) -> Self {
        let now = current_time_ms();
        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            window_start: AtomicI64::new(now),
            window_failures: AtomicU32::new(0),
            window_successes: AtomicU32::new(0),
            last_state_change: AtomicI64::new(now),
            probe_in_flight: AtomicBool::new(false),
            config,
        }
    }

    /// Operation name this breaker guards.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Per-call timeout in milliseconds.
    pub fn call_timeout_ms(&self) -> u64 {
        self.config.call_timeout.as_millis() as u64
    }

    /// Get the current state
    pub fn state(&self) -> CircuitState {
        self.check_state_transition();
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Invoke the wrapped operation through the breaker.
    ///
    /// Fails fast with [`BreakerError::Open`] without invoking `op` when the
    /// circuit is open or the half-open trial slot is already taken. The call
    /// is bounded by the configured timeout; expiry counts as a failure.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire() {
            return Err(BreakerError::Open);
        }

        let timeout_ms = self.call_timeout_ms();
        match tokio::time::timeout(self.config.call_timeout, op()).await {
            Ok(Ok(value)) => {
                self.record_success();
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record_failure();
                Err(BreakerError::Inner(err))
            }
            Err(_) => {
                self.record_failure();
                tracing::warn!(
                    operation = self.name,
                    timeout_ms = timeout_ms,
                    "Upstream call timed out"
                );
                Err(BreakerError::Timeout(timeout_ms))
            }
        }
    }

    /// Check if a request may pass through, claiming the trial slot in
    /// half-open state.
    fn try_acquire(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => self
                .probe_in_flight
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok(),
        }
    }

    /// Record a successful operation
    fn record_success(&self) {
        let state = CircuitState::from(self.state.load(Ordering::Acquire));

        match state {
            CircuitState::Closed => {
                self.roll_window();
                self.window_successes.fetch_add(1, Ordering::AcqRel);
            }
            CircuitState::HalfOpen => {
                self.transition_to(CircuitState::Closed);
                tracing::info!(
                    operation = self.name,
                    "Circuit breaker closed after successful trial call"
                );
            }
            CircuitState::Open => {
                // Shouldn't happen, acquisition gates open state
            }
        }
    }

    /// Record a failed operation
    fn record_failure(&self) {
        let state = CircuitState::from(self.state.load(Ordering::Acquire));

        match state {
            CircuitState::Closed => {
                self.roll_window();
                let failures = self.window_failures.fetch_add(1, Ordering::AcqRel) + 1;
                let total = failures + self.window_successes.load(Ordering::Acquire);

                if total >= self.config.volume_threshold {
                    let failure_pct = failures * 100 / total;
                    if failure_pct > self.config.error_threshold_pct as u32 {
                        self.transition_to(CircuitState::Open);
                        tracing::warn!(
                            operation = self.name,
                            failures = failures,
                            window_calls = total,
                            failure_pct = failure_pct,
                            "Circuit breaker opened due to failure rate"
                        );
                    }
                }
            }
            CircuitState::HalfOpen => {
                // Any failure in half-open state reopens the circuit
                self.transition_to(CircuitState::Open);
                tracing::warn!(
                    operation = self.name,
                    "Circuit breaker reopened after failed trial call"
                );
            }
            CircuitState::Open => {
                // Already open, just restart the cooldown
                self.last_state_change
                    .store(current_time_ms(), Ordering::Release);
            }
        }
    }

    /// Reset the failure window once it is older than the configured length.
    fn roll_window(&self) {
        let now = current_time_ms();
        let start = self.window_start.load(Ordering::Acquire);

        if now - start >= self.config.window.as_millis() as i64
            && self
                .window_start
                .compare_exchange(start, now, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.window_failures.store(0, Ordering::Release);
            self.window_successes.store(0, Ordering::Release);
        }
    }

    /// Check if we should transition from Open to HalfOpen
    fn check_state_transition(&self) {
        let state = CircuitState::from(self.state.load(Ordering::Acquire));

        if state == CircuitState::Open {
            let last_change = self.last_state_change.load(Ordering::Acquire);
            let elapsed = current_time_ms() - last_change;

            if elapsed >= self.config.reset_timeout.as_millis() as i64
                && self
                    .state
                    .compare_exchange(
                        CircuitState::Open as u8,
                        CircuitState::HalfOpen as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
            {
                self.probe_in_flight.store(false, Ordering::Release);
                self.last_state_change
                    .store(current_time_ms(), Ordering::Release);
                tracing::info!(
                    operation = self.name,
                    "Circuit breaker transitioning to half-open state"
                );
            }
        }
    }

    /// Transition to a new state
    fn transition_to(&self, new_state: CircuitState) {
        self.state.store(new_state as u8, Ordering::Release);
        self.last_state_change
            .store(current_time_ms(), Ordering::Release);
        self.probe_in_flight.store(false, Ordering::Release);

        if new_state == CircuitState::Closed {
            self.window_start.store(current_time_ms(), Ordering::Release);
            self.window_failures.store(0, Ordering::Release);
            self.window_successes.store(0, Ordering::Release);
        }
    }

    /// Get statistics snapshot
    pub fn stats(&self) -> BreakerStats {
        BreakerStats {
            state: self.state(),
            window_failures: self.window_failures.load(Ordering::Acquire),
            window_successes: self.window_successes.load(Ordering::Acquire),
            last_state_change_ms: self.last_state_change.load(Ordering::Acquire),
        }
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone)]
pub struct BreakerStats {
    pub state: CircuitState,
    pub window_failures: u32,
    pub window_successes: u32,
    pub last_state_change_ms: i64,
}
