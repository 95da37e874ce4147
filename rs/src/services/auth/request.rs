//! Lift the DPoP-relevant parts out of an HTTP request.

use axum::http::{HeaderMap, Method, Uri, header};

/// Authorization scheme for DPoP-bound access tokens.
pub const DPOP_SCHEME: &str = "DPoP";

/// What the authorizer needs from an incoming request.
#[derive(Clone)]
pub struct DpopRequest {
    pub method: String,
    /// Absolute request URI as the client should have seen it.
    pub htu: String,
    pub authorization: Option<String>,
    /// Every `DPoP` header value, in order.
    pub proofs: Vec<String>,
}

impl std::fmt::Debug for DpopRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the access token
        f.debug_struct("DpopRequest")
            .field("method", &self.method)
            .field("htu", &self.htu)
            .field("authorization", &self.authorization.as_ref().map(|_| "[REDACTED]"))
            .field("proofs", &self.proofs.len())
            .finish()
    }
}

impl DpopRequest {
    pub fn from_http(
        headers: &HeaderMap,
        method: &Method,
        uri: &Uri,
        public_base_url: Option<&str>,
    ) -> Self {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Non-UTF-8 values are kept as empty strings so they fail parsing
        // instead of silently disappearing from the count.
        let proofs = headers
            .get_all("DPoP")
            .iter()
            .map(|v| v.to_str().unwrap_or_default().to_string())
            .collect();

        Self {
            method: method.as_str().to_string(),
            htu: build_expected_htu(headers, uri, public_base_url),
            authorization,
            proofs,
        }
    }

    /// Access token from `Authorization: DPoP <token>`.
    pub fn access_token(&self) -> Option<&str> {
        let value = self.authorization.as_deref()?;
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case(DPOP_SCHEME) {
            return None;
        }
        let token = token.trim();
        (!token.is_empty() && !token.contains(' ')).then_some(token)
    }

    pub fn proofs(&self) -> Vec<&str> {
        self.proofs.iter().map(String::as_str).collect()
    }
}

fn build_expected_htu(headers: &HeaderMap, uri: &Uri, public_base_url: Option<&str>) -> String {
    if let Some(base) = public_base_url {
        if let Ok(url) = build_htu_from_base(base, uri) {
            return url;
        }
        // Misconfigured PUBLIC_BASE_URL: fall back to forwarded headers.
    }
    build_htu_from_forwarded(headers, uri)
}

fn build_htu_from_base(base: &str, uri: &Uri) -> Result<String, url::ParseError> {
    // `base` is like https://api.example.com or https://api.example.com/rs
    // (path prefix stripped by the proxy before the request reaches us).
    let mut url = url::Url::parse(base)?;
    let path = format!("{}{}", url.path().trim_end_matches('/'), uri.path());
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

fn build_htu_from_forwarded(headers: &HeaderMap, uri: &Uri) -> String {
    // Prefer proxy headers when present.
    let scheme = forwarded_value(headers, "x-forwarded-proto")
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");

    let host = forwarded_value(headers, "x-forwarded-host")
        .or_else(|| headers.get(header::HOST).and_then(|v| v.to_str().ok()))
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");

    format!("{}://{}{}", scheme, host, uri.path())
}

// Proxy chains append: "https, http". The first entry is the client-facing hop.
fn forwarded_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
