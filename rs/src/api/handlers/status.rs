use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(rename = "Status")]
    pub status: &'static str,
}

/// Liveness probe kept compatible with existing monitors (`{"Status":"Running"}`).
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse { status: "Running" })
}
