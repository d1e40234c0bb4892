use axum::Json;
use mindlink_shared::types::api::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("mindlink-relay", env!("CARGO_PKG_VERSION")))
}
