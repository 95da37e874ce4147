use crate::services::auth::Authorized;

/// Who called: the key the access token is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCtx {
    pub jkt: String,
    pub jti: String,
    pub token_expires_at: i64,
    pub binding_cached: bool,
}

impl From<Authorized> for AuthCtx {
    fn from(authorized: Authorized) -> Self {
        Self {
            jkt: authorized.jkt,
            jti: authorized.jti,
            token_expires_at: authorized.expires_at,
            binding_cached: authorized.cache_hit,
        }
    }
}
