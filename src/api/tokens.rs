use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::validation::JsonBody;
use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::auth::token::Token;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Serialize)]
pub struct AuthenticationTokenResponse {
    pub authentication_token: Token,
}

/// POST /v1/tokens/authentication
pub async fn create_authentication_token(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<CredentialsRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthenticationTokenResponse>>), ApiError> {
    let token = state
        .account_service()
        .create_authentication_token(&payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(AuthenticationTokenResponse {
            authentication_token: token,
        })),
    ))
}

/// POST /v1/tokens/activation
pub async fn create_activation_token(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<EmailRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessageResponse>>), ApiError> {
    state
        .account_service()
        .create_activation_token(&payload.email)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(MessageResponse::new(
            "an email will be sent to you containing activation instructions",
        ))),
    ))
}

/// POST /v1/tokens/password-reset
pub async fn create_password_reset_token(
    State(state): State<Arc<AppState>>,
    JsonBody(payload): JsonBody<EmailRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessageResponse>>), ApiError> {
    state
        .account_service()
        .create_password_reset_token(&payload.email)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(MessageResponse::new(
            "an email will be sent to you containing password reset instructions",
        ))),
    ))
}
