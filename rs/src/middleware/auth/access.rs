//! DPoP authorization middleware: verify the request, then put `AuthCtx` in
//! the extensions for handlers.

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::auth::DpopRequest;
use crate::state::AppState;

/// Protect every route of `router` with DPoP authorization.
///
/// ```ignore
/// let protected = Router::new().route("/validate-token", get(validate_token));
/// let protected = middleware::auth::access::apply(protected, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8: from_fn cannot take State, pass it explicitly
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let dpop_request = DpopRequest::from_http(
        req.headers(),
        req.method(),
        &original_uri,
        state.public_base_url(),
    );

    // Rejections are logged by the authorizer.
    let authorized = state.authorizer.authorize(&dpop_request).await?;

    // middleware → extractor
    req.extensions_mut().insert(AuthCtx::from(authorized));

    Ok(next.run(req).await)
}
