use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::JsonBody;
use super::{ApiError, ApiResponse, AppState, MessageResponse, UserResponse};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivateRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub token: String,
}

/// POST /v1/users
pub async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    let user = state
        .account_service()
        .register(&payload.name, &payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(UserResponse { user })),
    ))
}

/// PUT /v1/users/activated
pub async fn activate(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<ActivateRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.account_service().activate(&payload.token).await?;
    Ok(Json(ApiResponse::success(UserResponse { user })))
}

/// PUT /v1/users/password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .account_service()
        .reset_password(&payload.token, &payload.password)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "your password was successfully reset",
    ))))
}
