use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use super::store::{ReplayError, ReplayStore};
use crate::services::cache::CacheClient;

/// Replay store on top of any `CacheClient` (memory or Valkey).
///
/// Fail-closed policy is implemented by returning `Err` on any backend error;
/// callers should treat that as authentication failure.
#[derive(Clone)]
pub struct CacheReplayStore {
    cache: Arc<dyn CacheClient>,
    // Key prefix to avoid collisions with binding entries
    prefix: &'static str,
}

impl CacheReplayStore {
    pub fn new(cache: Arc<dyn CacheClient>) -> Self {
        Self {
            cache,
            prefix: "dpop:replay",
        }
    }

    pub fn key(&self, raw: &str) -> String {
        format!("{}:{}", self.prefix, raw)
    }
}

impl ReplayStore for CacheReplayStore {
    fn check_and_store<'a>(
        &'a self,
        key: &'a str,
        ttl_secs: u64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ReplayError>> + Send + 'a>> {
        Box::pin(async move {
            let full_key = self.key(key);

            // SET <key> "1" NX EX <ttl>
            let fresh = self
                .cache
                .set_if_absent_with_ttl(&full_key, "1", Duration::from_secs(ttl_secs.max(1)))
                .await?;

            Ok(fresh)
        })
    }
}
