use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Failure classification driving retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network/timeout/contention; retried on the full budget.
    Transient,
    /// Insufficient funds, not-found, validation; surfaced immediately.
    BusinessLogic,
    /// Unclassified internal failure; retried on a reduced budget.
    System,
    /// Constraint violation or corruption; never retried.
    Permanent,
}

/// Exponential backoff settings for one call site.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Recommendation generation: 3 attempts, quick backoff.
    pub fn recommendation() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(2),
        }
    }

    /// Transfer execution: 2 attempts only; a transfer is not something to
    /// hammer on.
    pub fn execution() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(2),
        }
    }

    /// Data access: 3 attempts with a longer base delay.
    pub fn data_access() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }

    /// Backoff for the given zero-based attempt, jittered to 50-100% of the
    /// computed delay to avoid thundering-herd retries.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exact = self.base_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped = exact.min(self.max_delay.as_millis() as f64);
        let jittered = capped * (0.5 + rand::random::<f64>() * 0.5);
        Duration::from_millis(jittered as u64)
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive breaker-relevant failures before opening.
    pub failure_threshold: u32,
    /// Consecutive half-open successes before closing again.
    pub success_threshold: u32,
    /// How long an open circuit waits before probing half-open.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are blocked.
    Open,
    /// Probing whether the dependency has recovered.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker for one named operation.
///
/// CLOSED -> OPEN after `failure_threshold` consecutive failures;
/// OPEN -> HALF_OPEN once `recovery_timeout` has elapsed;
/// HALF_OPEN -> CLOSED after `success_threshold` consecutive successes,
/// back to OPEN on any half-open failure.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    opened_at: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            opened_at: RwLock::new(None),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.check_recovery_timeout();
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether a call may proceed right now. Open circuits fail fast.
    pub fn allow_request(&self) -> bool {
        self.state() != CircuitState::Open
    }

    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        match *state {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.config.success_threshold {
                    info!(breaker = %self.name, successes, "circuit closing after recovery");
                    self.transition(&mut state, CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        match *state {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.failure_threshold {
                    warn!(breaker = %self.name, failures, "circuit opening");
                    self.transition(&mut state, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                warn!(breaker = %self.name, "circuit re-opening after half-open failure");
                self.transition(&mut state, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    fn transition(&self, state: &mut CircuitState, next: CircuitState) {
        *state = next;
        self.failure_count.store(0, Ordering::SeqCst);
        self.success_count.store(0, Ordering::SeqCst);
        let mut opened = self.opened_at.write().unwrap_or_else(|e| e.into_inner());
        *opened = if next == CircuitState::Open {
            Some(Instant::now())
        } else {
            None
        };
    }

    fn check_recovery_timeout(&self) {
        let should_probe = {
            let opened = self.opened_at.read().unwrap_or_else(|e| e.into_inner());
            matches!(*opened, Some(at) if at.elapsed() >= self.config.recovery_timeout)
        };
        if should_probe {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if *state == CircuitState::Open {
                info!(breaker = %self.name, "circuit half-open, probing recovery");
                self.transition(&mut state, CircuitState::HalfOpen);
            }
        }
    }
}
