//! Token revocation stores.
//!
//! Revocation is keyed by the token's `jti`. Entries only need to outlive the
//! point after which the token could no longer be refreshed, so every entry
//! carries its own retention deadline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use super::TokenError;

/// Denylist of revoked token ids.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record `token_id` as revoked until `retain_until`.
    async fn revoke(&self, token_id: &str, retain_until: DateTime<Utc>) -> Result<(), TokenError>;

    /// Revoke `token_id` unless it is already revoked. Returns whether this
    /// call did the revoking; concurrent callers see exactly one `true`.
    async fn revoke_if_absent(&self, token_id: &str, retain_until: DateTime<Utc>) -> Result<bool, TokenError>;

    async fn is_revoked(&self, token_id: &str) -> Result<bool, TokenError>;
}

/// Store that never revokes anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRevocationStore;

#[async_trait]
impl RevocationStore for NoopRevocationStore {
    async fn revoke(&self, _token_id: &str, _retain_until: DateTime<Utc>) -> Result<(), TokenError> {
        Ok(())
    }

    async fn revoke_if_absent(&self, _token_id: &str, _retain_until: DateTime<Utc>) -> Result<bool, TokenError> {
        Ok(true)
    }

    async fn is_revoked(&self, _token_id: &str) -> Result<bool, TokenError> {
        Ok(false)
    }
}

/// Process-local denylist with per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryRevocationStore {
    entries: DashMap<String, DateTime<Utc>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop entries whose retention deadline has passed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, until| *until > now);
        let purged = before - self.entries.len();
        if purged > 0 {
            debug!(purged, "purged expired revocations");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, token_id: &str, retain_until: DateTime<Utc>) -> Result<(), TokenError> {
        self.purge_expired(Utc::now());
        self.entries
            .entry(token_id.to_string())
            .and_modify(|until| *until = (*until).max(retain_until))
            .or_insert(retain_until);
        Ok(())
    }

    async fn revoke_if_absent(&self, token_id: &str, retain_until: DateTime<Utc>) -> Result<bool, TokenError> {
        let now = Utc::now();
        self.purge_expired(now);
        // The entry guard holds the shard lock, so check and insert are atomic.
        match self.entries.entry(token_id.to_string()) {
            Entry::Occupied(entry) if *entry.get() > now => Ok(false),
            Entry::Occupied(mut entry) => {
                entry.insert(retain_until);
                Ok(true)
            }
            Entry::Vacant(entry) => {
                entry.insert(retain_until);
                Ok(true)
            }
        }
    }

    async fn is_revoked(&self, token_id: &str) -> Result<bool, TokenError> {
        let now = Utc::now();
        Ok(self
            .entries
            .get(token_id)
            .is_some_and(|until| *until > now))
    }
}
