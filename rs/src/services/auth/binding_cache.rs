//! Token → binding cache.
//!
//! Entries are keyed by the SHA-256 of the access token so raw tokens never
//! reach the backend. A backend failure is treated as a miss: the caller
//! then falls back to introspection, which decides fail-closed on its own.

use std::sync::Arc;

use dpop::compute_ath;
use tracing::warn;

use super::types::TokenBindingFact;
use crate::services::cache::{CacheClient, ttl_seconds};

const KEY_PREFIX: &str = "dpop:binding";

#[derive(Clone)]
pub struct TokenBindingCache {
    cache: Arc<dyn CacheClient>,
    prefix: &'static str,
}

impl TokenBindingCache {
    pub fn new(cache: Arc<dyn CacheClient>) -> Self {
        Self {
            cache,
            prefix: KEY_PREFIX,
        }
    }

    fn key(&self, token: &str) -> String {
        format!("{}:{}", self.prefix, compute_ath(token))
    }

    /// Live binding for `token`, or `None`.
    ///
    /// An entry with `expires_at <= now` is evicted and reported absent.
    pub async fn lookup(&self, token: &str, now: i64) -> Option<TokenBindingFact> {
        let key = self.key(token);
        let raw = match self.cache.get_string(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(backend = self.cache.backend_name(), error = %err, "binding cache lookup failed");
                return None;
            }
        };

        let fact = match serde_json::from_str::<TokenBindingFact>(&raw) {
            Ok(fact) => fact,
            Err(err) => {
                warn!(error = %err, "discarding undecodable binding cache entry");
                self.remove(&key).await;
                return None;
            }
        };

        if fact.expires_at <= now {
            self.remove(&key).await;
            return None;
        }
        Some(fact)
    }

    /// Insert or overwrite the binding for `token`.
    ///
    /// The backend TTL follows `expires_at`; already expired facts are not stored.
    pub async fn store(&self, token: &str, fact: &TokenBindingFact, now: i64) {
        let remaining = fact.expires_at.saturating_sub(now);
        if remaining <= 0 {
            return;
        }
        let value = match serde_json::to_string(fact) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "failed to encode binding cache entry");
                return;
            }
        };
        if let Err(err) = self
            .cache
            .set_with_ttl(&self.key(token), &value, ttl_seconds(remaining))
            .await
        {
            warn!(backend = self.cache.backend_name(), error = %err, "binding cache store failed");
        }
    }

    /// Remove the binding for `token`. Absent entries are a no-op.
    pub async fn invalidate(&self, token: &str) {
        let key = self.key(token);
        self.remove(&key).await;
    }

    async fn remove(&self, key: &str) {
        if let Err(err) = self.cache.del(key).await {
            warn!(backend = self.cache.backend_name(), error = %err, "binding cache delete failed");
        }
    }
}
