use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use super::models::{LockEntry, LockResource};
use crate::config::PipelineConfig;
use crate::errors::AppError;

/// How long a contended acquire sleeps between attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Named-resource advisory locking. One instance per process, constructed
/// explicitly and passed to the services that need it; in-memory and
/// therefore correct only for a single-process deployment (a multi-process
/// deployment would back this with database advisory locks instead).
pub struct LockManager {
    table: Arc<DashMap<String, LockEntry>>,
    next_token: AtomicU64,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table: Arc::new(DashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Acquire the named lock, waiting up to `timeout` for the current
    /// holder to release. Fails with `LockTimeout` otherwise.
    pub async fn acquire(
        &self,
        resource: LockResource,
        resource_id: &str,
        timeout: Duration,
    ) -> Result<LockGuard, AppError> {
        let key = format!("{}:{}", resource.as_str(), resource_id);
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + timeout;

        loop {
            let acquired = match self.table.entry(key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(LockEntry {
                        token,
                        acquired_at: Instant::now(),
                    });
                    true
                }
                Entry::Occupied(_) => false,
            };

            if acquired {
                debug!(%key, token, "lock acquired");
                return Ok(LockGuard {
                    table: Arc::clone(&self.table),
                    key,
                    token,
                });
            }
            if Instant::now() >= deadline {
                return Err(AppError::LockTimeout(format!(
                    "'{key}' was not released within {}ms",
                    timeout.as_millis()
                )));
            }
            sleep(POLL_INTERVAL.min(timeout)).await;
        }
    }

    /// Run `f` under the named lock. The guard is released on every exit
    /// path, success or error.
    pub async fn with_lock<F, Fut, T>(
        &self,
        resource: LockResource,
        resource_id: &str,
        timeout: Duration,
        f: F,
    ) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let _guard = self.acquire(resource, resource_id, timeout).await?;
        f().await
    }

    /// Acquire per-account locks for all of `ids`, always in ascending id
    /// order regardless of argument order. The sort is what makes concurrent
    /// multi-account operations deadlock-free; on any failure every
    /// previously acquired lock is released before the error propagates.
    pub async fn acquire_multiple_account_locks(
        &self,
        ids: &[Uuid],
        timeout: Duration,
    ) -> Result<Vec<LockGuard>, AppError> {
        let mut sorted: Vec<Uuid> = ids.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for id in sorted {
            match self
                .acquire(LockResource::Account, &id.to_string(), timeout)
                .await
            {
                Ok(guard) => guards.push(guard),
                Err(err) => {
                    // Dropping the partial set releases everything held so far.
                    drop(guards);
                    return Err(err);
                }
            }
        }
        Ok(guards)
    }

    /// Background sweep force-releasing locks older than `max_age`, to
    /// recover from crashed holders. A safety net, not the release path.
    pub fn spawn_sweeper(&self, max_age: Duration, sweep_interval: Duration) -> JoinHandle<()> {
        let table = Arc::clone(&self.table);
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                table.retain(|key, entry| {
                    let age = entry.acquired_at.elapsed();
                    if age > max_age {
                        warn!(%key, age_ms = age.as_millis() as u64, "force-releasing stale lock");
                        false
                    } else {
                        true
                    }
                });
            }
        })
    }

    /// Sweeper wired to the configured max age and interval.
    pub fn spawn_sweeper_from_config(&self, config: &PipelineConfig) -> JoinHandle<()> {
        self.spawn_sweeper(config.lock_max_age(), config.lock_sweep_interval())
    }

    pub fn held_locks(&self) -> usize {
        self.table.len()
    }
}

/// RAII handle for one held lock; dropping it releases the lock. A release
/// that finds the entry gone (force-released by the sweeper) is logged and
/// never surfaces to the caller.
pub struct LockGuard {
    table: Arc<DashMap<String, LockEntry>>,
    key: String,
    token: u64,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let removed = self
            .table
            .remove_if(&self.key, |_, entry| entry.token == self.token);
        if removed.is_none() {
            warn!(key = %self.key, "lock was already released (sweeper or double release)");
        } else {
            debug!(key = %self.key, "lock released");
        }
    }
}
