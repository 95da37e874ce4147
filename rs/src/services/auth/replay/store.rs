use std::{future::Future, pin::Pin};

use crate::services::cache::CacheError;

/// Remembers proof `jti`s for the lifetime of a proof.
///
/// - `Ok(true)`: first time (stored)
/// - `Ok(false)`: replay detected (already exists)
/// - `Err(_)`: store failure (treat as fail-closed)
pub trait ReplayStore: Send + Sync {
    // Check whether `key` was already seen and store it with TTL, atomically.
    fn check_and_store<'a>(
        &'a self,
        key: &'a str,
        ttl_secs: u64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ReplayError>> + Send + 'a>>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(transparent)]
    Cache(#[from] CacheError),
}
