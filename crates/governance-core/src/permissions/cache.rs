//! TTL-bounded permission decision cache.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::model::PermissionDecision;

/// `(principal_id, resource_id, action)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub principal_id: String,
    pub resource_id: String,
    pub action: String,
}

impl CacheKey {
    pub fn new(principal_id: &str, resource_id: &str, action: &str) -> Self {
        Self {
            principal_id: principal_id.to_string(),
            resource_id: resource_id.to_string(),
            action: action.to_string(),
        }
    }
}

struct CachedDecision {
    decision: PermissionDecision,
    inserted_at: DateTime<Utc>,
}

/// Read-mostly cache. Entries expire at `decision.cached_until`; when full,
/// expired entries are purged first, then the oldest.
pub struct DecisionCache {
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<CacheKey, CachedDecision>>,
}

impl DecisionCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live decision for `key` at `now`.
    pub async fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<PermissionDecision> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|c| c.decision.cached_until > now)
            .map(|c| c.decision.clone())
    }

    /// Store `decision`; a zero capacity or zero TTL disables caching.
    pub async fn insert(&self, key: CacheKey, decision: PermissionDecision, now: DateTime<Utc>) {
        if self.max_entries == 0 || self.ttl <= Duration::zero() {
            return;
        }
        let mut entries = self.entries.write().await;
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            entries.retain(|_, c| c.decision.cached_until > now);
            while entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, c)| c.inserted_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        entries.remove(&k);
                    }
                    None => break,
                }
            }
        }
        entries.insert(
            key,
            CachedDecision {
                decision,
                inserted_at: now,
            },
        );
    }

    /// Drop every decision for `principal_id`; returns how many were removed.
    pub async fn invalidate_principal(&self, principal_id: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|k, _| k.principal_id != principal_id);
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
