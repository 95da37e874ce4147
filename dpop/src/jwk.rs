use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk};
use sha2::{Digest, Sha256};

use crate::error::DpopError;

/// `ath` value for an access token: base64url(SHA-256(token)), no padding.
pub fn compute_ath(access_token: &str) -> String {
    sha256_b64url(access_token.as_bytes())
}

pub(crate) fn sha256_b64url(input: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(input))
}

/// RFC 7638 SHA-256 thumbprint of a public JWK (the `jkt` value).
///
/// Only the required members take part, serialized with lexicographically
/// ordered keys and no whitespace.
pub fn jwk_thumbprint(jwk: &Jwk) -> Result<String, DpopError> {
    let mut members = BTreeMap::new();

    match &jwk.algorithm {
        AlgorithmParameters::RSA(params) => {
            members.insert("e", params.e.as_str());
            members.insert("kty", "RSA");
            members.insert("n", params.n.as_str());
        }
        AlgorithmParameters::EllipticCurve(params) => {
            members.insert("crv", curve_name(&params.curve)?);
            members.insert("kty", "EC");
            members.insert("x", params.x.as_str());
            members.insert("y", params.y.as_str());
        }
        AlgorithmParameters::OctetKeyPair(params) => {
            members.insert("crv", curve_name(&params.curve)?);
            members.insert("kty", "OKP");
            members.insert("x", params.x.as_str());
        }
        _ => return Err(DpopError::MalformedProof("jwk is not an asymmetric public key")),
    }

    let canonical = serde_json::to_string(&members)
        .map_err(|_| DpopError::MalformedProof("jwk is not serializable"))?;

    Ok(sha256_b64url(canonical.as_bytes()))
}

fn curve_name(curve: &EllipticCurve) -> Result<&'static str, DpopError> {
    // `EllipticCurve` does not implement Display, so match explicitly.
    match curve {
        EllipticCurve::P256 => Ok("P-256"),
        EllipticCurve::P384 => Ok("P-384"),
        EllipticCurve::P521 => Ok("P-521"),
        EllipticCurve::Ed25519 => Ok("Ed25519"),
        #[allow(unreachable_patterns)]
        _ => Err(DpopError::MalformedProof("unsupported jwk curve")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn okp(x: &str) -> Jwk {
        serde_json::from_value(serde_json::json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": x,
        }))
        .unwrap()
    }

    #[test]
    fn ath_is_unpadded_base64url_sha256() {
        let ath = compute_ath("Kz~8mXK1EalYznwH-LC-1fBAo.4Ljp~zsPE_NeO.gxU");
        assert_eq!(ath.len(), 43);
        assert!(!ath.contains('='));
        assert!(!ath.contains('+') && !ath.contains('/'));
        assert_ne!(ath, compute_ath("another-token"));
    }

    #[test]
    fn okp_thumbprint_uses_canonical_members() {
        let x = "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo";
        let expected = sha256_b64url(
            format!("{{\"crv\":\"Ed25519\",\"kty\":\"OKP\",\"x\":\"{x}\"}}").as_bytes(),
        );
        assert_eq!(jwk_thumbprint(&okp(x)).unwrap(), expected);
    }

    #[test]
    fn optional_members_do_not_change_thumbprint() {
        let x = "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo";
        let with_extras: Jwk = serde_json::from_value(serde_json::json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": x,
            "kid": "device-key-1",
            "use": "sig",
        }))
        .unwrap();
        assert_eq!(
            jwk_thumbprint(&with_extras).unwrap(),
            jwk_thumbprint(&okp(x)).unwrap()
        );
    }

    #[test]
    fn ec_thumbprint_orders_members() {
        let jwk: Jwk = serde_json::from_value(serde_json::json!({
            "kty": "EC",
            "crv": "P-256",
            "x": "l8tFrhx-34tV3hRICRDY9zCkDlpBhF42UQUfWVAWBFs",
            "y": "9VE4jf_Ok_o64zbTTlcuNJajHmt6v9TDVrU0CdvGRDA",
        }))
        .unwrap();
        let expected = sha256_b64url(
            concat!(
                "{\"crv\":\"P-256\",\"kty\":\"EC\",",
                "\"x\":\"l8tFrhx-34tV3hRICRDY9zCkDlpBhF42UQUfWVAWBFs\",",
                "\"y\":\"9VE4jf_Ok_o64zbTTlcuNJajHmt6v9TDVrU0CdvGRDA\"}"
            )
            .as_bytes(),
        );
        assert_eq!(jwk_thumbprint(&jwk).unwrap(), expected);
    }

    #[test]
    fn rsa_thumbprint_matches_rfc7638_example() {
        let jwk: Jwk = serde_json::from_value(serde_json::json!({
            "kty": "RSA",
            "n": concat!(
                "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECP",
                "ebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2Q",
                "vzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQF",
                "h6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw"
            ),
            "e": "AQAB",
            "alg": "RS256",
            "kid": "2011-04-29",
        }))
        .unwrap();
        assert_eq!(
            jwk_thumbprint(&jwk).unwrap(),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }

    #[test]
    fn symmetric_key_has_no_thumbprint() {
        let jwk: Jwk = serde_json::from_value(serde_json::json!({
            "kty": "oct",
            "k": "c2VjcmV0",
        }))
        .unwrap();
        assert!(matches!(
            jwk_thumbprint(&jwk),
            Err(DpopError::MalformedProof(_))
        ));
    }
}
