use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fire_core::config::PipelineConfig;
use fire_core::errors::AppError;
use fire_core::recovery::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, RecoveryCoordinator, RetryPolicy,
};

fn coordinator(failure_threshold: u32) -> RecoveryCoordinator {
    let config = PipelineConfig {
        breaker_failure_threshold: failure_threshold,
        breaker_success_threshold: 1,
        breaker_recovery_timeout_secs: 60,
        ..PipelineConfig::default()
    };
    RecoveryCoordinator::new(&config)
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let recovery = coordinator(10);
    let attempts = Arc::new(AtomicU32::new(0));

    let result = recovery
        .run("flaky", &RetryPolicy::recommendation(), || {
            let attempts = attempts.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AppError::LockTimeout("contended".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn business_failures_surface_without_a_retry() {
    let recovery = coordinator(10);
    let attempts = Arc::new(AtomicU32::new(0));

    let result: Result<(), AppError> = recovery
        .run("validate", &RetryPolicy::recommendation(), || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(AppError::ValidationFailed {
                    errors: vec!["Insufficient funds".to_string()],
                    warnings: vec![],
                })
            }
        })
        .await;

    assert!(matches!(result, Err(AppError::ValidationFailed { .. })));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    // Expected outcomes never feed the breaker.
    assert_eq!(recovery.circuit_state("validate"), CircuitState::Closed);
}

#[tokio::test]
async fn repeated_permanent_failures_open_the_circuit() {
    let recovery = coordinator(2);
    let attempts = Arc::new(AtomicU32::new(0));

    for _ in 0..2 {
        let result: Result<(), AppError> = recovery
            .run("broken", &RetryPolicy::execution(), || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::Conflict("unique constraint".to_string()))
                }
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
    assert_eq!(recovery.circuit_state("broken"), CircuitState::Open);

    // The open circuit fails fast; the operation is never invoked.
    let result: Result<(), AppError> = recovery
        .run("broken", &RetryPolicy::execution(), || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
    assert!(matches!(result, Err(AppError::CircuitOpen(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    // Other operations keep their own breaker.
    assert_eq!(recovery.circuit_state("healthy"), CircuitState::Closed);
}

#[tokio::test]
async fn open_breaker_probes_half_open_then_closes() {
    let breaker = CircuitBreaker::new(
        "probe",
        CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 2,
            recovery_timeout: Duration::from_millis(50),
        },
    );

    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(!breaker.allow_request());

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert!(breaker.allow_request());

    breaker.record_success();
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    breaker.record_success();
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn half_open_failure_reopens_the_circuit() {
    let breaker = CircuitBreaker::new(
        "relapse",
        CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 2,
            recovery_timeout: Duration::from_millis(50),
        },
    );

    breaker.record_failure();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn fallback_runs_after_retries_are_exhausted() {
    let recovery = coordinator(100);
    let attempts = Arc::new(AtomicU32::new(0));

    let result = recovery
        .run_with_fallback(
            "degraded",
            &RetryPolicy::recommendation(),
            || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::LockTimeout("still contended".to_string()))
                }
            },
            || async { Ok(42) },
        )
        .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failed_fallback_never_masks_the_original_error() {
    let recovery = coordinator(100);

    let result: Result<(), AppError> = recovery
        .run_with_fallback(
            "degraded",
            &RetryPolicy::execution(),
            || async { Err(AppError::InternalError("connection refused".to_string())) },
            || async { Err(AppError::NotFound("no cached value".to_string())) },
        )
        .await;

    match result {
        Err(AppError::InternalError(msg)) => assert!(msg.contains("connection refused")),
        other => panic!("expected the original error, got {other:?}"),
    }
}

#[tokio::test]
async fn business_failures_bypass_the_fallback() {
    let recovery = coordinator(100);
    let fallback_ran = Arc::new(AtomicBool::new(false));

    let result: Result<u32, AppError> = recovery
        .run_with_fallback(
            "validate",
            &RetryPolicy::execution(),
            || async { Err(AppError::NotFound("account".to_string())) },
            || {
                let fallback_ran = fallback_ran.clone();
                async move {
                    fallback_ran.store(true, Ordering::SeqCst);
                    Ok(0)
                }
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(!fallback_ran.load(Ordering::SeqCst));
}
