use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::htu::normalize_htu;
use crate::jwk::compute_ath;

/// `typ` header value that marks a JWT as a DPoP proof.
pub const DPOP_TYP: &str = "dpop+jwt";

/// DPoP proof JWT header (RFC 9449)
///
/// `typ` is optional here so a missing value is reported as a wrong type,
/// not as a parse failure. `jwk` stays raw JSON until we have checked that
/// it carries no private members.
#[derive(Debug, Clone, Deserialize)]
pub struct ProofHeader {
    #[serde(default)]
    pub typ: Option<String>,
    pub alg: String,
    #[serde(default)]
    pub jwk: Option<serde_json::Value>,
}

/// DPoP proof JWT claims
///
/// Every claim is optional at the parse boundary; the verifier decides
/// which ones are required for a given request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>, // unique proof ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>, // issued at (unix seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub htm: Option<String>, // HTTP method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub htu: Option<String>, // HTTP URI (absolute, no query/fragment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ath: Option<String>, // base64url(SHA-256(access_token))
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>, // server-provided nonce, passed through
}

impl ProofClaims {
    /// Claims for one request: fresh `jti`, given `iat`, uppercased method,
    /// URI without query/fragment and `ath` when an access token is sent.
    pub fn for_request(
        method: &str,
        uri: &str,
        access_token: Option<&str>,
        iat: i64,
    ) -> Result<Self, BuildError> {
        let htm = method.trim().to_ascii_uppercase();
        if htm.is_empty() || !htm.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(BuildError::EncodingFailure(format!(
                "invalid HTTP method: {method:?}"
            )));
        }

        let htu = normalize_htu(uri).ok_or_else(|| {
            BuildError::EncodingFailure(format!("htu is not an absolute URI: {uri:?}"))
        })?;

        Ok(Self {
            jti: Some(uuid::Uuid::new_v4().to_string()),
            iat: Some(iat),
            htm: Some(htm),
            htu: Some(htu),
            ath: access_token.map(compute_ath),
            nonce: None,
        })
    }
}

/// Result of a successful proof verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedProof {
    pub jti: String,
    pub iat: i64,
    pub htm: String,
    pub htu: String,
    pub nonce: Option<String>,
    /// RFC 7638 thumbprint of the embedded key; compared against `cnf.jkt`.
    pub jkt: String,
}
