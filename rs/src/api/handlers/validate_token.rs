use axum::http::StatusCode;
use tracing::debug;

use crate::api::extractors::AuthCtxExtractor;

/// Reached only after DPoP authorization succeeded.
pub async fn validate_token(AuthCtxExtractor(ctx): AuthCtxExtractor) -> StatusCode {
    debug!(
        jkt = %ctx.jkt,
        jti = %ctx.jti,
        cached = ctx.binding_cached,
        "token validated"
    );
    StatusCode::NO_CONTENT
}
