use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::Principal;
use crate::utils::clock::Clock;

/// Short-lived memo of successful API key lookups.
///
/// Not an authority: a miss or an expired entry always falls back to the
/// record store. Entries are never invalidated early, so a revoked key keeps
/// working until its entry expires.
pub trait CredentialCache: Send + Sync {
    fn get(&self, api_key: &str) -> Option<Principal>;
    fn set(&self, api_key: String, principal: Principal);
    fn ttl(&self) -> Duration;
}

struct CacheEntry {
    principal: Principal,
    expires_at: Instant,
}

/// In-memory [`CredentialCache`] with a fixed time-to-live per entry.
///
/// Each entry is replaced as a whole, so concurrent writers for the same key
/// simply race to the last write.
pub struct TtlCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialCache for TtlCache {
    fn get(&self, api_key: &str) -> Option<Principal> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(api_key)
            && now < entry.expires_at
        {
            return Some(entry.principal.clone());
        }
        self.entries
            .remove_if(api_key, |_, entry| now >= entry.expires_at);
        None
    }

    fn set(&self, api_key: String, principal: Principal) {
        let expires_at = self.clock.now() + self.ttl;
        self.entries.insert(
            api_key,
            CacheEntry {
                principal,
                expires_at,
            },
        );
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
