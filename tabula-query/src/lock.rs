//! Entity-keyed advisory leases.
//!
//! A lease is a short-lived, process-wide claim on a key. Acquisition never
//! blocks: a caller that finds the key held skips its work. Leases expire on
//! their own after the TTL, so a crashed holder cannot wedge a key forever,
//! and a [`LeaseGuard`] releases its lease when dropped.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tabula_query::lock::AdvisoryLocks;
//!
//! let locks = Arc::new(AdvisoryLocks::new());
//! let guard = locks.try_acquire("product_tags:5", Duration::from_secs(60)).unwrap();
//! assert!(locks.try_acquire("product_tags:5", Duration::from_secs(60)).is_none());
//!
//! guard.release();
//! assert!(locks.try_acquire("product_tags:5", Duration::from_secs(60)).is_some());
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::DataError;

#[derive(Debug, Clone, Copy)]
struct Lease {
    token: Uuid,
    expires_at: Instant,
}

/// A table of advisory leases.
#[derive(Debug, Default)]
pub struct AdvisoryLocks {
    leases: Mutex<HashMap<String, Lease>>,
}

impl AdvisoryLocks {
    /// Create an empty lease table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lease on `key` for `ttl`.
    ///
    /// Returns `None` if a live lease is held elsewhere. An expired lease is
    /// taken over.
    pub fn try_acquire(self: &Arc<Self>, key: impl Into<String>, ttl: Duration) -> Option<LeaseGuard> {
        let key = key.into();
        let now = Instant::now();
        let mut leases = self.leases.lock();

        if let Some(existing) = leases.get(&key) {
            if existing.expires_at > now {
                debug!(key = %key, "lease held elsewhere");
                return None;
            }
            debug!(key = %key, "taking over expired lease");
        }

        let lease = Lease {
            token: Uuid::new_v4(),
            expires_at: now + ttl,
        };
        leases.insert(key.clone(), lease);
        trace!(key = %key, token = %lease.token, "lease acquired");

        Some(LeaseGuard {
            locks: Arc::clone(self),
            key,
            token: lease.token,
            expires_at: lease.expires_at,
            released: false,
        })
    }

    /// Check whether a live lease exists on `key`.
    pub fn is_held(&self, key: &str) -> bool {
        self.leases
            .lock()
            .get(key)
            .is_some_and(|lease| lease.expires_at > Instant::now())
    }

    fn release_token(&self, key: &str, token: Uuid) -> bool {
        let mut leases = self.leases.lock();
        match leases.get(key) {
            Some(lease) if lease.token == token => {
                leases.remove(key);
                trace!(key, "lease released");
                true
            }
            _ => false,
        }
    }
}

/// Proof of holding a lease. Releases it on drop.
#[derive(Debug)]
pub struct LeaseGuard {
    locks: Arc<AdvisoryLocks>,
    key: String,
    token: Uuid,
    expires_at: Instant,
    released: bool,
}

impl LeaseGuard {
    /// The leased key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The token identifying this holder.
    pub fn token(&self) -> Uuid {
        self.token
    }

    /// When the lease runs out.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Check whether the lease has run out.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Fail with [`DataError::LeaseExpired`] once the lease has run out.
    pub fn ensure_live(&self) -> Result<(), DataError> {
        if self.is_expired() {
            return Err(DataError::LeaseExpired {
                key: self.key.clone(),
            });
        }
        Ok(())
    }

    /// Release the lease now.
    ///
    /// Returns `false` if it had already expired and been taken over.
    pub fn release(mut self) -> bool {
        self.released = true;
        self.locks.release_token(&self.key, self.token)
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if !self.released {
            self.locks.release_token(&self.key, self.token);
        }
    }
}
