use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiResponse, AppState, HealthResponse, SystemInfo};

/// GET /v1/healthcheck
pub async fn healthcheck(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthResponse>> {
    let environment = state.config().read().await.server.environment.clone();

    Json(ApiResponse::success(HealthResponse {
        status: "available".to_string(),
        system_info: SystemInfo {
            environment,
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    }))
}
