use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use super::models::{CircuitBreaker, CircuitBreakerConfig, CircuitState, ErrorClass, RetryPolicy};
use crate::config::PipelineConfig;
use crate::errors::AppError;

/// Map an error onto its recovery class. Exhaustive: adding an error
/// variant without deciding its class is a compile error.
pub fn classify(err: &AppError) -> ErrorClass {
    match err {
        AppError::LockTimeout(_) => ErrorClass::Transient,
        AppError::CircuitOpen(_) => ErrorClass::Transient,
        AppError::InternalError(msg) => {
            let lowered = msg.to_lowercase();
            if lowered.contains("timeout")
                || lowered.contains("timed out")
                || lowered.contains("connection")
                || lowered.contains("network")
                || lowered.contains("reset")
            {
                ErrorClass::Transient
            } else {
                ErrorClass::System
            }
        }
        AppError::LockAcquisitionFailure(_) => ErrorClass::System,
        AppError::ValidationFailed { .. }
        | AppError::InvalidAmount(_)
        | AppError::NotFound(_)
        | AppError::Unauthorized(_) => ErrorClass::BusinessLogic,
        AppError::MalformedDocument(_)
        | AppError::EncodingError(_)
        | AppError::Overflow(_)
        | AppError::Conflict(_) => ErrorClass::Permanent,
    }
}

/// Retries, circuit-breaks, and falls back for the pipeline's fallible
/// operations. One instance per process, dependency-injected next to the
/// lock manager.
pub struct RecoveryCoordinator {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    breaker_config: CircuitBreakerConfig,
}

impl RecoveryCoordinator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            breaker_config: CircuitBreakerConfig {
                failure_threshold: config.breaker_failure_threshold,
                success_threshold: config.breaker_success_threshold,
                recovery_timeout: config.breaker_recovery_timeout(),
            },
        }
    }

    /// Run `f` under the retry policy and the operation's circuit breaker.
    ///
    /// Transient failures retry on the full attempt budget, system failures
    /// on a reduced one; business and permanent failures surface
    /// immediately. Business failures are expected outcomes and do not feed
    /// the breaker.
    pub async fn run<F, Fut, T>(
        &self,
        operation: &str,
        policy: &RetryPolicy,
        f: F,
    ) -> Result<T, AppError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let breaker = self.breaker(operation);
        if !breaker.allow_request() {
            return Err(AppError::CircuitOpen(format!(
                "'{operation}' is failing; calls are blocked until it recovers"
            )));
        }

        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    breaker.record_success();
                    return Ok(value);
                }
                Err(err) => {
                    let class = classify(&err);
                    let budget = match class {
                        ErrorClass::Transient => policy.max_attempts,
                        ErrorClass::System => policy.max_attempts.saturating_sub(1).max(1),
                        ErrorClass::BusinessLogic => return Err(err),
                        ErrorClass::Permanent => {
                            breaker.record_failure();
                            return Err(err);
                        }
                    };
                    breaker.record_failure();

                    attempt += 1;
                    if attempt >= budget {
                        warn!(
                            operation,
                            attempts = attempt,
                            error = %err,
                            "retry budget exhausted"
                        );
                        return Err(err);
                    }
                    let delay = policy.delay_for(attempt - 1);
                    debug!(operation, attempt, delay_ms = delay.as_millis() as u64, "retrying");
                    sleep(delay).await;

                    // The breaker may have opened while we were backing off.
                    if !breaker.allow_request() {
                        return Err(AppError::CircuitOpen(format!(
                            "'{operation}' circuit opened during retry"
                        )));
                    }
                }
            }
        }
    }

    /// Like [`run`](Self::run), with a fallback producer invoked only after
    /// retries and the circuit have both given up on a recoverable failure.
    /// A fallback failure is logged and the original error returned, never
    /// masked. Business and permanent failures bypass the fallback.
    pub async fn run_with_fallback<F, Fut, T, FB, FbFut>(
        &self,
        operation: &str,
        policy: &RetryPolicy,
        f: F,
        fallback: FB,
    ) -> Result<T, AppError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
        FB: FnOnce() -> FbFut,
        FbFut: Future<Output = Result<T, AppError>>,
    {
        match self.run(operation, policy, f).await {
            Ok(value) => Ok(value),
            Err(err) if matches!(classify(&err), ErrorClass::Transient | ErrorClass::System) => {
                warn!(operation, error = %err, "primary exhausted, trying fallback");
                match fallback().await {
                    Ok(value) => Ok(value),
                    Err(fallback_err) => {
                        error!(operation, error = %fallback_err, "fallback also failed");
                        Err(err)
                    }
                }
            }
            Err(err) => Err(err),
        }
    }

    pub fn circuit_state(&self, operation: &str) -> CircuitState {
        self.breaker(operation).state()
    }

    fn breaker(&self, operation: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(operation.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(operation, self.breaker_config.clone()))
            })
            .clone()
    }
}
