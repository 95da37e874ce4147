//! Token introspection client (RFC 7662) for DPoP-bound access tokens.
//!
//! The authorization server is asked for `cnf.jkt` and `exp`; anything else in
//! the response is ignored.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::types::TokenBindingFact;

#[derive(Debug, Error)]
pub enum IntrospectionError {
    #[error("introspection request failed: {0}")]
    Http(String),
    #[error("introspection endpoint returned status {0}")]
    Status(u16),
    #[error("invalid introspection response: {0}")]
    InvalidResponse(String),
    #[error("token is not active")]
    Inactive,
    #[error("token has no cnf.jkt binding")]
    Unbound,
}

/// Source of token binding facts. Object-safe so tests can swap in a mock.
#[async_trait]
pub trait TokenIntrospector: Send + Sync + 'static {
    async fn introspect(&self, token: &str) -> Result<TokenBindingFact, IntrospectionError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Confirmation {
    #[serde(default)]
    pub jkt: Option<String>,
}

/// The subset of the introspection response this server reads.
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionResponse {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub cnf: Option<Confirmation>,
}

impl IntrospectionResponse {
    pub fn into_binding_fact(self) -> Result<TokenBindingFact, IntrospectionError> {
        if self.active == Some(false) {
            return Err(IntrospectionError::Inactive);
        }
        let jkt = self
            .cnf
            .and_then(|cnf| cnf.jkt)
            .filter(|jkt| !jkt.is_empty())
            .ok_or(IntrospectionError::Unbound)?;
        let expires_at = self
            .exp
            .ok_or_else(|| IntrospectionError::InvalidResponse("missing exp".to_string()))?;
        Ok(TokenBindingFact { jkt, expires_at })
    }
}

/// HTTP introspection client using client-secret-basic authentication.
#[derive(Clone)]
pub struct IntrospectionClient {
    http: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
}

// Manual Debug impl to keep the client secret out of logs
impl std::fmt::Debug for IntrospectionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntrospectionClient")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl IntrospectionClient {
    pub fn new(
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, IntrospectionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IntrospectionError::Http(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }
}

#[async_trait]
impl TokenIntrospector for IntrospectionClient {
    async fn introspect(&self, token: &str) -> Result<TokenBindingFact, IntrospectionError> {
        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("token", token), ("token_type_hint", "DPoP")])
            .send()
            .await
            .map_err(|e| IntrospectionError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntrospectionError::Status(status.as_u16()));
        }

        let body = response
            .json::<IntrospectionResponse>()
            .await
            .map_err(|e| IntrospectionError::InvalidResponse(e.to_string()))?;

        debug!(active = ?body.active, exp = ?body.exp, "introspection response");
        body.into_binding_fact()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Form, Json, Router,
        http::{HeaderMap, StatusCode, header},
        response::IntoResponse,
        routing::post,
    };
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use std::collections::HashMap;

    async fn introspect_handler(
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> axum::response::Response {
        let expected = format!("Basic {}", STANDARD.encode("rs-client:rs-secret"));
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            == Some(expected.as_str());
        if !authorized {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        if form.get("token_type_hint").map(String::as_str) != Some("DPoP") {
            return StatusCode::BAD_REQUEST.into_response();
        }

        match form.get("token").map(String::as_str) {
            Some("bound") => Json(serde_json::json!({
                "active": true,
                "exp": 4_102_444_800_i64,
                "cnf": { "jkt": "thumb-1" }
            }))
            .into_response(),
            Some("inactive") => Json(serde_json::json!({ "active": false })).into_response(),
            Some("unbound") => {
                Json(serde_json::json!({ "active": true, "exp": 4_102_444_800_i64 }))
                    .into_response()
            }
            Some("garbage") => "not json".into_response(),
            _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }

    async fn spawn_server() -> String {
        let app = Router::new().route("/introspect", post(introspect_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/introspect")
    }

    fn client(endpoint: &str, secret: &str) -> IntrospectionClient {
        IntrospectionClient::new(endpoint, "rs-client", secret, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn bound_token_yields_binding_fact() {
        let endpoint = spawn_server().await;
        let fact = client(&endpoint, "rs-secret").introspect("bound").await.unwrap();
        assert_eq!(
            fact,
            TokenBindingFact {
                jkt: "thumb-1".to_string(),
                expires_at: 4_102_444_800,
            }
        );
    }

    #[tokio::test]
    async fn inactive_and_unbound_tokens() {
        let endpoint = spawn_server().await;
        let client = client(&endpoint, "rs-secret");

        assert!(matches!(
            client.introspect("inactive").await,
            Err(IntrospectionError::Inactive)
        ));
        assert!(matches!(
            client.introspect("unbound").await,
            Err(IntrospectionError::Unbound)
        ));
    }

    #[tokio::test]
    async fn non_success_and_bad_body() {
        let endpoint = spawn_server().await;

        assert!(matches!(
            client(&endpoint, "wrong").introspect("bound").await,
            Err(IntrospectionError::Status(401))
        ));
        assert!(matches!(
            client(&endpoint, "rs-secret").introspect("other").await,
            Err(IntrospectionError::Status(500))
        ));
        assert!(matches!(
            client(&endpoint, "rs-secret").introspect("garbage").await,
            Err(IntrospectionError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_http_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = client(&format!("http://{addr}/introspect"), "rs-secret")
            .introspect("bound")
            .await;
        assert!(matches!(result, Err(IntrospectionError::Http(_))));
    }

    #[test]
    fn response_mapping() {
        let parse = |v: serde_json::Value| {
            serde_json::from_value::<IntrospectionResponse>(v)
                .unwrap()
                .into_binding_fact()
        };

        // `active` is optional; absent means the server only sent the binding.
        assert!(parse(serde_json::json!({ "exp": 10, "cnf": { "jkt": "a" } })).is_ok());
        assert!(matches!(
            parse(serde_json::json!({ "cnf": { "jkt": "a" } })),
            Err(IntrospectionError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse(serde_json::json!({ "exp": 10, "cnf": { "jkt": "" } })),
            Err(IntrospectionError::Unbound)
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let client = client("http://127.0.0.1:1/introspect", "super-secret");
        let printed = format!("{client:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("[REDACTED]"));
    }
}
