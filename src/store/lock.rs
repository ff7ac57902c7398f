//! Advisory locking of target environments.
//!
//! At most one promotion may write into an environment at a time. The lock
//! is advisory and leased: it carries an expiry so a crashed promotion never
//! wedges its target, and a later acquire takes over an expired lock.

use crate::error::{Result, ValidationError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Information about one held environment lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates a lock expiring `expiry_secs` from now.
    #[must_use]
    pub fn new(holder: &str, expiry_secs: u64) -> Self {
        let now = Utc::now();
        let ttl = chrono::Duration::seconds(i64::try_from(expiry_secs).unwrap_or(i64::MAX));
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    /// Checks if the lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Returns the remaining time until expiry in seconds.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        let remaining = self.expires_at - Utc::now();
        remaining.num_seconds().max(0)
    }
}

/// Proof of a held environment lock, required to release it.
#[derive(Debug, Clone)]
pub struct LockLease {
    environment_id: String,
    info: LockInfo,
}

impl LockLease {
    /// Creates a lease for a freshly acquired lock.
    #[must_use]
    pub fn new(environment_id: impl Into<String>, info: LockInfo) -> Self {
        Self {
            environment_id: environment_id.into(),
            info,
        }
    }

    /// The locked environment.
    #[must_use]
    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    /// The lock id this lease proves ownership of.
    #[must_use]
    pub fn lock_id(&self) -> &str {
        &self.info.lock_id
    }

    /// The underlying lock information.
    #[must_use]
    pub const fn info(&self) -> &LockInfo {
        &self.info
    }
}

/// Mutual exclusion per target environment.
#[async_trait]
pub trait PromotionLock: Send + Sync {
    /// Acquires the lock on one environment, taking over expired locks.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TargetLocked`] (retryable) when another
    /// holder has a live lock, or a
    /// [`StoreError`](crate::error::StoreError) when the lock backend fails.
    async fn acquire(
        &self,
        environment_id: &str,
        holder: &str,
        expiry_secs: u64,
    ) -> Result<LockLease>;

    /// Releases a held lock. Releasing a lease that was taken over after
    /// expiry is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::error::StoreError) when the lock
    /// backend fails.
    async fn release(&self, lease: &LockLease) -> Result<()>;
}

/// Process-local [`PromotionLock`] over a map of environment ids.
#[derive(Debug, Default)]
pub struct MemoryPromotionLock {
    locks: Mutex<HashMap<String, LockInfo>>,
}

impl MemoryPromotionLock {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromotionLock for MemoryPromotionLock {
    async fn acquire(
        &self,
        environment_id: &str,
        holder: &str,
        expiry_secs: u64,
    ) -> Result<LockLease> {
        let mut locks = self.locks.lock().await;

        if let Some(existing) = locks.get(environment_id) {
            if !existing.is_expired() {
                return Err(ValidationError::TargetLocked {
                    environment_id: environment_id.to_string(),
                    holder: existing.holder.clone(),
                }
                .into());
            }
            info!(
                "Taking over expired lock on {} from {}",
                environment_id, existing.holder
            );
        }

        let lock_info = LockInfo::new(holder, expiry_secs);
        locks.insert(environment_id.to_string(), lock_info.clone());
        debug!("Acquired lock {} on {environment_id}", lock_info.lock_id);

        Ok(LockLease::new(environment_id, lock_info))
    }

    async fn release(&self, lease: &LockLease) -> Result<()> {
        let mut locks = self.locks.lock().await;

        match locks.get(lease.environment_id()) {
            Some(current) if current.lock_id == lease.lock_id() => {
                locks.remove(lease.environment_id());
                debug!(
                    "Released lock {} on {}",
                    lease.lock_id(),
                    lease.environment_id()
                );
            }
            Some(current) => {
                debug!(
                    "Lock on {} now held by {}, not releasing",
                    lease.environment_id(),
                    current.holder
                );
            }
            None => {
                debug!("Lock on {} already released", lease.environment_id());
            }
        }

        Ok(())
    }
}

/// Generates a unique holder identifier for the current process.
#[must_use]
pub fn generate_holder_id() -> String {
    let host = hostname::get()
        .map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());

    let pid = std::process::id();
    let uuid = &Uuid::new_v4().to_string()[..8];

    format!("{host}-{pid}-{uuid}")
}
