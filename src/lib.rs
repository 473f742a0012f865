pub mod camt;
pub mod concurrency;
pub mod config;
pub mod currency;
pub mod errors;
pub mod imports;
pub mod models;
pub mod recovery;
pub mod storage;
pub mod transfer;

/// Install the global tracing subscriber. Call once at process startup;
/// `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
