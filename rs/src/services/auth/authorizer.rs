//! Per-request DPoP authorization: proof check, optional jti replay check,
//! then the token binding (cache first, introspection on miss).

use std::{sync::Arc, time::Duration};

use dpop::{ProofContext, ProofVerifier};
use tracing::{debug, warn};

use super::{
    binding_cache::TokenBindingCache,
    introspection::{IntrospectionError, TokenIntrospector},
    replay::ReplayStore,
    request::DpopRequest,
    types::{Authorized, Rejection, TokenBindingFact},
};

pub const DEFAULT_INTROSPECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DpopAuthorizer {
    verifier: ProofVerifier,
    bindings: TokenBindingCache,
    introspector: Arc<dyn TokenIntrospector>,
    replay: Option<Arc<dyn ReplayStore>>,
    introspection_timeout: Duration,
}

impl DpopAuthorizer {
    pub fn new(
        verifier: ProofVerifier,
        bindings: TokenBindingCache,
        introspector: Arc<dyn TokenIntrospector>,
    ) -> Self {
        Self {
            verifier,
            bindings,
            introspector,
            replay: None,
            introspection_timeout: DEFAULT_INTROSPECTION_TIMEOUT,
        }
    }

    /// Enable single-use `jti` tracking.
    pub fn with_replay_store(mut self, store: Arc<dyn ReplayStore>) -> Self {
        self.replay = Some(store);
        self
    }

    pub fn with_introspection_timeout(mut self, timeout: Duration) -> Self {
        self.introspection_timeout = timeout;
        self
    }

    pub async fn authorize(&self, request: &DpopRequest) -> Result<Authorized, Rejection> {
        self.authorize_at(request, chrono::Utc::now().timestamp()).await
    }

    pub async fn authorize_at(
        &self,
        request: &DpopRequest,
        now: i64,
    ) -> Result<Authorized, Rejection> {
        let result = self.evaluate(request, now).await;
        if let Err(rejection) = &result {
            warn!(
                code = rejection.code(),
                reason = %rejection,
                method = %request.method,
                htu = %request.htu,
                "dpop authorization rejected"
            );
        }
        result
    }

    async fn evaluate(&self, request: &DpopRequest, now: i64) -> Result<Authorized, Rejection> {
        let token = request
            .access_token()
            .ok_or(Rejection::InvalidAuthorization)?;

        let proofs = request.proofs();
        let ctx = ProofContext {
            method: &request.method,
            htu: &request.htu,
            access_token: Some(token),
        };
        let proof = self.verifier.verify(&proofs, &ctx, now)?;

        if let Some(store) = &self.replay {
            let policy = self.verifier.policy();
            let ttl = policy
                .max_age_seconds
                .saturating_add(policy.iat_leeway_seconds)
                .max(1) as u64;
            let key = format!("{}:{}", proof.jkt, proof.jti);
            match store.check_and_store(&key, ttl).await {
                Ok(true) => {}
                Ok(false) => return Err(Rejection::ProofReplayed),
                Err(err) => {
                    warn!(error = %err, "replay store failure (fail-closed)");
                    return Err(Rejection::ReplayStoreUnavailable);
                }
            }
        }

        if let Some(cached) = self.bindings.lookup(token, now).await {
            if cached.jkt != proof.jkt {
                self.bindings.invalidate(token).await;
                return Err(Rejection::KeyBindingMismatch);
            }
            debug!(jkt = %proof.jkt, "token binding cache hit");
            return Ok(Authorized {
                jkt: proof.jkt,
                jti: proof.jti,
                expires_at: cached.expires_at,
                cache_hit: true,
            });
        }

        let fact = self.introspect(token, now).await?;
        if fact.jkt != proof.jkt {
            self.bindings.invalidate(token).await;
            return Err(Rejection::KeyBindingMismatch);
        }

        self.bindings.store(token, &fact, now).await;
        Ok(Authorized {
            jkt: proof.jkt,
            jti: proof.jti,
            expires_at: fact.expires_at,
            cache_hit: false,
        })
    }

    async fn introspect(&self, token: &str, now: i64) -> Result<TokenBindingFact, Rejection> {
        let outcome =
            tokio::time::timeout(self.introspection_timeout, self.introspector.introspect(token))
                .await;

        let fact = match outcome {
            Err(_elapsed) => {
                warn!(timeout_ms = self.introspection_timeout.as_millis() as u64, "introspection timed out");
                return Err(Rejection::IntrospectionUnavailable);
            }
            Ok(Err(IntrospectionError::Inactive)) => {
                self.bindings.invalidate(token).await;
                return Err(Rejection::TokenInactive);
            }
            Ok(Err(IntrospectionError::Unbound)) => return Err(Rejection::KeyBindingMismatch),
            Ok(Err(err)) => {
                warn!(error = %err, "introspection failed");
                return Err(Rejection::IntrospectionUnavailable);
            }
            Ok(Ok(fact)) => fact,
        };

        if fact.expires_at <= now {
            self.bindings.invalidate(token).await;
            return Err(Rejection::TokenInactive);
        }
        Ok(fact)
    }
}
