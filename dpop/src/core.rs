//! DPoP proof validation (RFC 9449) - core logic.
//!
//! This module is "core-only": it does not know about Axum, caches or the
//! authorization server. Callers pass in the `DPoP` header values and the
//! reconstructed request target; replay tracking and the `cnf.jkt` binding
//! check happen in the resource server.

use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind, jwk::Jwk};
use serde::de::IgnoredAny;
use tracing::{debug, warn};

use crate::error::DpopError;
use crate::htu::normalize_htu;
use crate::jwk::{compute_ath, jwk_thumbprint};
use crate::types::{DPOP_TYP, ProofClaims, ProofHeader, VerifiedProof};

/// Registered asymmetric JWS algorithms. `none` and HMAC never qualify.
pub const ASYMMETRIC_ALGORITHMS: [Algorithm; 9] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

// JWK members that only exist on private (or symmetric) keys.
const PRIVATE_JWK_MEMBERS: [&str; 7] = ["d", "p", "q", "dp", "dq", "qi", "k"];

/// Policy knobs needed by the core verifier.
///
/// Kept here (instead of depending on the server `Config`) so the core
/// stays testable and reusable.
#[derive(Debug, Clone)]
pub struct DpopPolicy {
    // Accepted clock skew for an iat in the future, seconds.
    pub iat_leeway_seconds: i64,
    // Proof lifetime counted from iat, seconds.
    pub max_age_seconds: i64,
    pub allowed_algorithms: Vec<Algorithm>,
}

impl Default for DpopPolicy {
    fn default() -> Self {
        Self {
            iat_leeway_seconds: 5,
            max_age_seconds: 60,
            allowed_algorithms: ASYMMETRIC_ALGORITHMS.to_vec(),
        }
    }
}

/// The request a proof must match.
#[derive(Debug, Clone, Copy)]
pub struct ProofContext<'a> {
    /// Request method as received (compared case-sensitively with `htm`).
    pub method: &'a str,
    /// Absolute request URI as reconstructed by the receiver.
    pub htu: &'a str,
    /// Access token presented with the request; requires a matching `ath`.
    pub access_token: Option<&'a str>,
}

/// Stateless DPoP proof verifier. Safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct ProofVerifier {
    policy: DpopPolicy,
}

struct Halt;

struct Findings {
    collect_all: bool,
    errors: Vec<DpopError>,
}

impl Findings {
    fn fail_fast() -> Self {
        Self {
            collect_all: false,
            errors: Vec::new(),
        }
    }

    fn collect_all() -> Self {
        Self {
            collect_all: true,
            errors: Vec::new(),
        }
    }

    // Record a failed check; stop unless we are collecting everything.
    fn fail(&mut self, err: DpopError) -> Result<(), Halt> {
        self.errors.push(err);
        if self.collect_all { Ok(()) } else { Err(Halt) }
    }

    // Record a failure after which nothing else can be checked.
    fn halt(&mut self, err: DpopError) -> Halt {
        self.errors.push(err);
        Halt
    }
}

struct ParsedProof<'a> {
    raw: &'a str,
    header: ProofHeader,
    payload: Vec<u8>,
}

impl<'a> ParsedProof<'a> {
    fn parse(raw: &'a str) -> Result<Self, DpopError> {
        let mut segments = raw.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(DpopError::MalformedProof("expected three segments"));
        };

        let header = URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|_| DpopError::MalformedProof("header is not base64url"))?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| DpopError::MalformedProof("payload is not base64url"))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| DpopError::MalformedProof("signature is not base64url"))?;
        if signature.is_empty() {
            return Err(DpopError::MalformedProof("empty signature"));
        }

        let header: ProofHeader = serde_json::from_slice(&header)
            .map_err(|_| DpopError::MalformedProof("header is not a JOSE header object"))?;

        Ok(Self {
            raw,
            header,
            payload,
        })
    }
}

impl ProofVerifier {
    pub fn new(policy: DpopPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DpopPolicy {
        &self.policy
    }

    /// Verify the proof(s) sent with one request. Reports the first failing check.
    ///
    /// - `proofs`: every `DPoP` header value of the request
    /// - `ctx`: method, reconstructed URI and the bound access token (if any)
    /// - `now`: current unix time, seconds
    pub fn verify(
        &self,
        proofs: &[&str],
        ctx: &ProofContext<'_>,
        now: i64,
    ) -> Result<VerifiedProof, DpopError> {
        let mut findings = Findings::fail_fast();
        match self.evaluate(proofs, ctx, now, &mut findings) {
            Ok(verified) => Ok(verified),
            Err(Halt) => Err(findings
                .errors
                .into_iter()
                .next()
                .unwrap_or(DpopError::MalformedProof("rejected"))),
        }
    }

    /// Run every applicable check and report all failures (empty when valid).
    ///
    /// Structural failures (wrong header count, unparseable segments) still
    /// end the evaluation since nothing after them can be read.
    pub fn diagnose(&self, proofs: &[&str], ctx: &ProofContext<'_>, now: i64) -> Vec<DpopError> {
        let mut findings = Findings::collect_all();
        let _ = self.evaluate(proofs, ctx, now, &mut findings);
        findings.errors
    }

    fn evaluate(
        &self,
        proofs: &[&str],
        ctx: &ProofContext<'_>,
        now: i64,
        findings: &mut Findings,
    ) -> Result<VerifiedProof, Halt> {
        // 1) Exactly one proof. A comma means a list folded into one header value.
        let raw = match proofs {
            [] => return Err(findings.halt(DpopError::MalformedProof("missing DPoP header"))),
            [single] if single.contains(',') => {
                return Err(findings.halt(DpopError::MultipleProofHeaders));
            }
            [single] => single.trim(),
            _ => return Err(findings.halt(DpopError::MultipleProofHeaders)),
        };

        // 2) Three base64url segments, JSON header.
        let parsed = ParsedProof::parse(raw).map_err(|e| findings.halt(e))?;

        // 3) typ must be exactly "dpop+jwt".
        if parsed.header.typ.as_deref() != Some(DPOP_TYP) {
            findings.fail(DpopError::WrongTypeHeader)?;
        }

        // 4) Supported alg + signature against the embedded jwk.
        let jwk = match self.verify_signature(&parsed) {
            Ok(jwk) => Some(jwk),
            Err(err) => {
                findings.fail(err)?;
                None
            }
        };

        let claims: ProofClaims = serde_json::from_slice(&parsed.payload)
            .map_err(|_| findings.halt(DpopError::MalformedProof("payload is not a claims object")))?;

        // 5) Required claims.
        let jti = required(non_empty(&claims.jti), "jti", findings)?;
        let iat = required(claims.iat, "iat", findings)?;
        let htm = required(non_empty(&claims.htm), "htm", findings)?;
        let htu = required(non_empty(&claims.htu), "htu", findings)?;
        let ath = match ctx.access_token {
            Some(_) => required(non_empty(&claims.ath), "ath", findings)?,
            None => None,
        };

        // 6) htm check (exact).
        if htm.is_some_and(|htm| htm != ctx.method) {
            findings.fail(DpopError::MethodMismatch)?;
        }

        // 7) htu check, query and fragment ignored on both sides.
        if htu.is_some_and(|htu| !htu_matches(htu, ctx.htu)) {
            findings.fail(DpopError::UriMismatch)?;
        }

        // 8) iat window.
        if let Some(iat) = iat {
            if iat > now.saturating_add(self.policy.iat_leeway_seconds) {
                findings.fail(DpopError::ProofNotYetValid)?;
            } else if iat.saturating_add(self.policy.max_age_seconds) <= now {
                findings.fail(DpopError::ProofExpired)?;
            }
        }

        // 9) ath check (bind proof to access token).
        if let (Some(token), Some(ath)) = (ctx.access_token, ath) {
            if ath != compute_ath(token) {
                findings.fail(DpopError::TokenBindingMismatch)?;
            }
        }

        if !findings.errors.is_empty() {
            return Err(Halt);
        }

        let (Some(jwk), Some(jti), Some(iat), Some(htm), Some(htu)) = (jwk, jti, iat, htm, htu)
        else {
            return Err(findings.halt(DpopError::MalformedProof("incomplete proof")));
        };

        let jkt = jwk_thumbprint(&jwk).map_err(|e| findings.halt(e))?;

        debug!(jti = %jti, jkt = %jkt, "DPoP proof verified");

        Ok(VerifiedProof {
            jti: jti.to_string(),
            iat,
            htm: htm.to_string(),
            htu: htu.to_string(),
            nonce: claims.nonce.clone(),
            jkt,
        })
    }

    fn verify_signature(&self, parsed: &ParsedProof<'_>) -> Result<Jwk, DpopError> {
        let alg_name = &parsed.header.alg;
        let alg = Algorithm::from_str(alg_name)
            .map_err(|_| DpopError::UnsupportedAlgorithm(alg_name.clone()))?;
        if !self.policy.allowed_algorithms.contains(&alg) {
            return Err(DpopError::UnsupportedAlgorithm(alg_name.clone()));
        }

        let jwk_value = parsed
            .header
            .jwk
            .as_ref()
            .ok_or(DpopError::MalformedProof("missing jwk in DPoP header"))?;
        let members = jwk_value
            .as_object()
            .ok_or(DpopError::MalformedProof("jwk is not an object"))?;
        if PRIVATE_JWK_MEMBERS.iter().any(|m| members.contains_key(*m)) {
            return Err(DpopError::MalformedProof("jwk contains private key material"));
        }

        let jwk: Jwk = serde_json::from_value(jwk_value.clone()).map_err(|e| {
            debug!(error = %e, "invalid DPoP jwk");
            DpopError::MalformedProof("invalid jwk")
        })?;
        let decoding_key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            debug!(error = ?e, "unusable DPoP jwk");
            DpopError::MalformedProof("unusable jwk")
        })?;

        // A DPoP proof is not an access token: no exp/nbf/aud/iss here,
        // freshness is judged from iat by the caller.
        let mut validation = Validation::new(alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<IgnoredAny>(parsed.raw, &decoding_key, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                    DpopError::MalformedProof("undecodable proof segment")
                }
                ErrorKind::InvalidSignature => DpopError::BadSignature,
                _ => {
                    // e.g. jwk key type does not fit the declared alg
                    warn!(error = ?e, alg = %alg_name, "DPoP signature check failed");
                    DpopError::BadSignature
                }
            },
        )?;

        Ok(jwk)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn required<T>(value: Option<T>, name: &'static str, findings: &mut Findings) -> Result<Option<T>, Halt> {
    if value.is_none() {
        findings.fail(DpopError::MissingClaim(name))?;
    }
    Ok(value)
}

fn htu_matches(claimed: &str, expected: &str) -> bool {
    match (normalize_htu(claimed), normalize_htu(expected)) {
        (Some(claimed), Some(expected)) => claimed == expected,
        _ => false,
    }
}
