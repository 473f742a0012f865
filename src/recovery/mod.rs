mod models;
mod service;

pub use models::{CircuitBreaker, CircuitBreakerConfig, CircuitState, ErrorClass, RetryPolicy};
pub use service::{classify, RecoveryCoordinator};
