use dpop::DpopError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the authorization server says a token is bound to.
///
/// Produced by a successful introspection; never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBindingFact {
    /// `cnf.jkt`: thumbprint of the key the token was issued to.
    pub jkt: String,
    /// Token expiry (unix seconds).
    pub expires_at: i64,
}

/// Accepted request, as seen by handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    pub jkt: String,
    pub jti: String,
    pub expires_at: i64,
    /// `true` when the binding came from the cache (no introspection call).
    pub cache_hit: bool,
}

/// Why a request was refused. Every variant maps to 401.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("missing or malformed DPoP authorization header")]
    InvalidAuthorization,
    #[error(transparent)]
    Proof(#[from] DpopError),
    #[error("DPoP proof jti already used")]
    ProofReplayed,
    #[error("replay store unavailable")]
    ReplayStoreUnavailable,
    #[error("access token is not bound to the proof key")]
    KeyBindingMismatch,
    #[error("access token is not active")]
    TokenInactive,
    #[error("token introspection unavailable")]
    IntrospectionUnavailable,
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAuthorization => "INVALID_AUTHORIZATION",
            Self::Proof(err) => err.code(),
            Self::ProofReplayed => "PROOF_REPLAYED",
            Self::ReplayStoreUnavailable => "REPLAY_STORE_UNAVAILABLE",
            Self::KeyBindingMismatch => "KEY_BINDING_MISMATCH",
            Self::TokenInactive => "TOKEN_INACTIVE",
            Self::IntrospectionUnavailable => "INTROSPECTION_UNAVAILABLE",
        }
    }

    /// `error` parameter of the `WWW-Authenticate: DPoP` challenge (RFC 9449 §7.1).
    pub fn challenge_error(&self) -> &'static str {
        match self {
            Self::Proof(_) | Self::ProofReplayed => "invalid_dpop_proof",
            _ => "invalid_token",
        }
    }
}
