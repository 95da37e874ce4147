use thiserror::Error;

/// Why a received proof was refused.
///
/// Every variant is terminal for the request that carried the proof.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DpopError {
    #[error("more than one DPoP proof in the request")]
    MultipleProofHeaders,
    #[error("malformed DPoP proof: {0}")]
    MalformedProof(&'static str),
    #[error("invalid DPoP typ")]
    WrongTypeHeader,
    #[error("unsupported DPoP alg: {0}")]
    UnsupportedAlgorithm(String),
    #[error("DPoP signature does not verify against the embedded jwk")]
    BadSignature,
    #[error("missing required claim: {0}")]
    MissingClaim(&'static str),
    #[error("htm mismatch")]
    MethodMismatch,
    #[error("htu mismatch")]
    UriMismatch,
    #[error("DPoP proof expired")]
    ProofExpired,
    #[error("DPoP proof issued in the future")]
    ProofNotYetValid,
    #[error("ath mismatch")]
    TokenBindingMismatch,
}

impl DpopError {
    /// Stable machine-readable code (error bodies, logs).
    pub fn code(&self) -> &'static str {
        match self {
            Self::MultipleProofHeaders => "MULTIPLE_PROOF_HEADERS",
            Self::MalformedProof(_) => "MALFORMED_PROOF",
            Self::WrongTypeHeader => "WRONG_TYPE_HEADER",
            Self::UnsupportedAlgorithm(_) => "UNSUPPORTED_ALGORITHM",
            Self::BadSignature => "BAD_SIGNATURE",
            Self::MissingClaim(_) => "MISSING_CLAIM",
            Self::MethodMismatch => "METHOD_MISMATCH",
            Self::UriMismatch => "URI_MISMATCH",
            Self::ProofExpired => "PROOF_EXPIRED",
            Self::ProofNotYetValid => "PROOF_NOT_YET_VALID",
            Self::TokenBindingMismatch => "TOKEN_BINDING_MISMATCH",
        }
    }
}

/// Proof construction failures (sender side).
///
/// A failed attempt leaves nothing behind; callers retry by building again.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("signing failure: {0}")]
    SigningFailure(String),
    #[error("encoding failure: {0}")]
    EncodingFailure(String),
}
