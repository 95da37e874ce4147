//! DPoP proof construction (sender side).

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, jwk::Jwk};
use serde::Serialize;

use crate::error::BuildError;
use crate::jwk::jwk_thumbprint;
use crate::types::{DPOP_TYP, ProofClaims};

/// Capability to sign with an asymmetric key and expose its public half.
///
/// Where the private key lives (software, keystore, HSM) is up to the
/// implementation; the builder only ever calls these three methods.
pub trait KeyHolder: Send + Sync {
    /// JWS `alg` the signatures are produced with.
    fn algorithm(&self) -> Algorithm;

    /// Public key as a JWK object. Must not contain private members.
    fn public_jwk(&self) -> serde_json::Value;

    /// Raw JWS signature bytes over `message`.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, BuildError>;
}

#[derive(Serialize)]
struct Header<'a> {
    typ: &'static str,
    alg: Algorithm,
    jwk: &'a serde_json::Value,
}

/// Builds DPoP proofs signed by one key holder.
#[derive(Debug, Clone)]
pub struct ProofBuilder<K> {
    key: K,
}

impl<K: KeyHolder> ProofBuilder<K> {
    pub fn new(key: K) -> Self {
        Self { key }
    }

    /// Proof for `method uri`, issued now. Pass the access token when
    /// calling a protected resource; omit it when requesting a token.
    pub fn build(
        &self,
        method: &str,
        uri: &str,
        access_token: Option<&str>,
    ) -> Result<String, BuildError> {
        self.build_at(method, uri, access_token, chrono::Utc::now().timestamp())
    }

    pub fn build_at(
        &self,
        method: &str,
        uri: &str,
        access_token: Option<&str>,
        iat: i64,
    ) -> Result<String, BuildError> {
        let claims = ProofClaims::for_request(method, uri, access_token, iat)?;
        self.sign_claims(&claims)
    }

    /// Sign caller-prepared claims as `base64url(header).base64url(payload).base64url(sig)`.
    pub fn sign_claims(&self, claims: &ProofClaims) -> Result<String, BuildError> {
        let jwk = self.key.public_jwk();
        let header = Header {
            typ: DPOP_TYP,
            alg: self.key.algorithm(),
            jwk: &jwk,
        };

        let encoded_header = b64url_json(&header)?;
        let encoded_payload = b64url_json(claims)?;
        let signing_input = format!("{encoded_header}.{encoded_payload}");

        let signature = self.key.sign(signing_input.as_bytes())?;
        if signature.is_empty() {
            return Err(BuildError::SigningFailure("key produced an empty signature".into()));
        }

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// `jkt` of the builder's key, i.e. what the authorization server puts
    /// in `cnf.jkt` for tokens bound to it.
    pub fn thumbprint(&self) -> Result<String, BuildError> {
        let jwk: Jwk = serde_json::from_value(self.key.public_jwk())
            .map_err(|e| BuildError::EncodingFailure(format!("invalid public jwk: {e}")))?;
        jwk_thumbprint(&jwk).map_err(|e| BuildError::EncodingFailure(e.to_string()))
    }
}

fn b64url_json<T: Serialize>(value: &T) -> Result<String, BuildError> {
    let json =
        serde_json::to_vec(value).map_err(|e| BuildError::EncodingFailure(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}
