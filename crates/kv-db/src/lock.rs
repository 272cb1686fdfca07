//! Lock options and the shared acquisition loop.

use crate::error::{DbError, DbResult};
use kv_core::Config;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// How a migration run acquires the cross-process lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// Lock name; runs using different keys do not exclude each other
    pub key: String,
    /// Maximum wait before failing with [`DbError::LockTimeout`]
    pub timeout: Duration,
    /// Lease length for lease-based locks
    pub lease: Duration,
    /// Delay between acquisition attempts
    pub poll_interval: Duration,
}

impl LockOptions {
    /// Options for `key` with the default timings.
    pub fn new(key: impl Into<String>) -> Self {
        let defaults = kv_core::LockConfig::default();
        Self {
            key: key.into(),
            timeout: defaults.timeout(),
            lease: defaults.lease(),
            poll_interval: defaults.poll_interval(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            key: config.history.lock_key.clone(),
            timeout: config.lock.timeout(),
            lease: config.lock.lease(),
            poll_interval: config.lock.poll_interval(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Stable 64-bit key for a lock name, used by native advisory locks.
pub fn advisory_key(name: &str) -> i64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

/// Identity of one lock holder: process id plus a random suffix.
pub(crate) fn new_holder_id() -> String {
    format!("{}-{}", std::process::id(), uuid::Uuid::new_v4())
}

/// Call `attempt` every `poll_interval` until it reports success or
/// `timeout` elapses.
pub(crate) async fn poll_acquire<F, Fut>(options: &LockOptions, mut attempt: F) -> DbResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<bool>>,
{
    poll_until(options, "Migration lock", || {
        let fut = attempt();
        async move { Ok(fut.await?.then_some(())) }
    })
    .await
}

/// Call `attempt` every `poll_interval` until it yields a value or
/// `timeout` elapses, then fail with [`DbError::LockTimeout`].
///
/// A timeout too large to represent as a deadline waits without limit.
pub(crate) async fn poll_until<T, F, Fut>(
    options: &LockOptions,
    what: &str,
    mut attempt: F,
) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<Option<T>>>,
{
    let started = Instant::now();
    let deadline = started.checked_add(options.timeout);
    let mut attempts: u32 = 0;

    loop {
        attempts = attempts.saturating_add(1);
        if let Some(value) = attempt().await? {
            log::debug!(
                "{} '{}' acquired after {} attempt(s) in {:?}",
                what,
                options.key,
                attempts,
                started.elapsed()
            );
            return Ok(value);
        }

        let now = Instant::now();
        let wait = match deadline {
            Some(deadline) if now >= deadline => {
                return Err(DbError::LockTimeout {
                    key: options.key.clone(),
                    timeout: options.timeout,
                });
            }
            Some(deadline) => options.poll_interval.min(deadline - now),
            None => options.poll_interval,
        };
        if attempts == 1 {
            log::info!(
                "{} '{}' is held by another run; waiting up to {:?}",
                what,
                options.key,
                options.timeout
            );
        }
        tokio::time::sleep(wait).await;
    }
}
