use axum::{Router, routing::get};

use crate::api::handlers::{index::index, status::status, validate_token::validate_token};
use crate::middleware;
use crate::state::AppState;

/// `/` and `/status` (open) + `/validate-token` (DPoP protected).
pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new().route(
        "/validate-token",
        get(validate_token).post(validate_token),
    );
    let protected = middleware::auth::access::apply(protected, state);

    Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .merge(protected)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use dpop::{DpopPolicy, Ed25519KeyHolder, ProofBuilder, ProofVerifier};
    use tower::ServiceExt;

    use super::*;
    use crate::services::auth::{
        DpopAuthorizer, IntrospectionError, TokenBindingCache, TokenBindingFact, TokenIntrospector,
    };
    use crate::services::cache::MemoryCacheClient;

    const BASE: &str = "https://rs.example.com";
    const TOKEN: &str = "at-xyz";

    struct FixedIntrospector {
        jkt: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenIntrospector for FixedIntrospector {
        async fn introspect(&self, _token: &str) -> Result<TokenBindingFact, IntrospectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TokenBindingFact {
                jkt: self.jkt.clone(),
                expires_at: chrono::Utc::now().timestamp() + 3_600,
            })
        }
    }

    fn builder(seed: u8) -> ProofBuilder<Ed25519KeyHolder> {
        ProofBuilder::new(Ed25519KeyHolder::from_seed(&[seed; 32]))
    }

    fn app() -> (Router, Arc<FixedIntrospector>) {
        let introspector = Arc::new(FixedIntrospector {
            jkt: builder(7).thumbprint().unwrap(),
            calls: AtomicUsize::new(0),
        });
        let authorizer = DpopAuthorizer::new(
            ProofVerifier::new(DpopPolicy::default()),
            TokenBindingCache::new(Arc::new(MemoryCacheClient::new())),
            introspector.clone(),
        );
        let state = AppState::new(Arc::new(authorizer), Some(BASE.to_string()));
        (router(state.clone()).with_state(state), introspector)
    }

    fn validate_request(method: &str, proof: Option<String>) -> Request<Body> {
        let mut req = Request::builder()
            .method(method)
            .uri("/validate-token")
            .header(header::AUTHORIZATION, format!("DPoP {TOKEN}"));
        if let Some(proof) = proof {
            req = req.header("DPoP", proof);
        }
        req.body(Body::empty()).unwrap()
    }

    fn proof(seed: u8, method: &str) -> String {
        builder(seed)
            .build(method, &format!("{BASE}/validate-token"), Some(TOKEN))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn status_is_open() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "Status": "Running" })
        );
    }

    #[tokio::test]
    async fn root_serves_banner() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Web app to demonstrate ISV high assurance flows");
    }

    #[tokio::test]
    async fn valid_proof_gets_no_content() {
        let (app, introspector) = app();

        let response = app
            .clone()
            .oneshot(validate_request("GET", Some(proof(7, "GET"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(validate_request("POST", Some(proof(7, "POST"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_proof_is_unauthorized() {
        let (app, introspector) = app();
        let response = app.oneshot(validate_request("GET", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "DPoP error=\"invalid_dpop_proof\""
        );
        assert_eq!(json_body(response).await["error"]["code"], "MALFORMED_PROOF");
        assert_eq!(introspector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn method_mismatch_is_unauthorized() {
        let (app, _) = app();
        let response = app
            .oneshot(validate_request("POST", Some(proof(7, "GET"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], "METHOD_MISMATCH");
    }

    #[tokio::test]
    async fn proof_from_other_key_is_unauthorized() {
        let (app, _) = app();
        let response = app
            .oneshot(validate_request("GET", Some(proof(8, "GET"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "DPoP error=\"invalid_token\""
        );
        assert_eq!(
            json_body(response).await["error"]["code"],
            "KEY_BINDING_MISMATCH"
        );
    }

    #[tokio::test]
    async fn two_proof_headers_are_rejected() {
        let (app, _) = app();
        let req = Request::get("/validate-token")
            .header(header::AUTHORIZATION, format!("DPoP {TOKEN}"))
            .header("DPoP", proof(7, "GET"))
            .header("DPoP", proof(7, "GET"))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await["error"]["code"],
            "MULTIPLE_PROOF_HEADERS"
        );
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
