//! Wiring of the authorization services from `Config`.

use std::sync::Arc;

use anyhow::Context;
use dpop::{DpopPolicy, ProofVerifier};
use tracing::info;

use super::{
    authorizer::DpopAuthorizer, binding_cache::TokenBindingCache,
    introspection::IntrospectionClient, replay::CacheReplayStore,
};
use crate::config::Config;
use crate::services::cache::{CacheClient, MemoryCacheClient, ValkeyClient};

/// Valkey when `VALKEY_URL` is set, otherwise a process-local map.
pub async fn build_cache_client(config: &Config) -> anyhow::Result<Arc<dyn CacheClient>> {
    let cache: Arc<dyn CacheClient> = match config.valkey_url.as_deref() {
        Some(url) => Arc::new(
            ValkeyClient::new(url)
                .await
                .context("failed to connect to valkey")?,
        ),
        None => Arc::new(MemoryCacheClient::new()),
    };
    info!(backend = cache.backend_name(), "cache backend ready");
    Ok(cache)
}

pub fn build_authorizer(
    config: &Config,
    cache: Arc<dyn CacheClient>,
) -> anyhow::Result<DpopAuthorizer> {
    let policy = DpopPolicy {
        iat_leeway_seconds: config.dpop_clock_skew_seconds,
        max_age_seconds: config.dpop_max_age_seconds,
        ..DpopPolicy::default()
    };

    let introspector = IntrospectionClient::new(
        config.introspection_endpoint.clone(),
        config.introspection_client_id.clone(),
        config.introspection_client_secret.clone(),
        config.introspection_timeout,
    )
    .context("failed to build introspection client")?;

    let mut authorizer = DpopAuthorizer::new(
        ProofVerifier::new(policy),
        TokenBindingCache::new(cache.clone()),
        Arc::new(introspector),
    )
    .with_introspection_timeout(config.introspection_timeout);

    if config.dpop_replay_protection {
        info!("dpop jti replay protection enabled");
        authorizer = authorizer.with_replay_store(Arc::new(CacheReplayStore::new(cache)));
    }

    Ok(authorizer)
}
