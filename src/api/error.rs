use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::auth::gate::GateError;
use crate::db::StoreError;
use crate::models::InvariantViolation;
use crate::services::account_service::AccountError;
use crate::services::movie_service::MovieError;
use crate::validation::FieldErrors;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),

    Validation(FieldErrors),

    InvalidCredentials,

    InvalidAuthenticationToken,

    AuthenticationRequired,

    InactiveAccount,

    NotPermitted,

    NotFound,

    MethodNotAllowed(String),

    EditConflict,

    RateLimited,

    DatabaseError(String),

    InternalError(String),

    InvariantViolation(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            Self::Validation(errors) => write!(f, "Validation failed: {errors:?}"),
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::InvalidAuthenticationToken => write!(f, "Invalid authentication token"),
            Self::AuthenticationRequired => write!(f, "Authentication required"),
            Self::InactiveAccount => write!(f, "Inactive account"),
            Self::NotPermitted => write!(f, "Not permitted"),
            Self::NotFound => write!(f, "Not found"),
            Self::MethodNotAllowed(method) => write!(f, "Method not allowed: {method}"),
            Self::EditConflict => write!(f, "Edit conflict"),
            Self::RateLimited => write!(f, "Rate limited"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
            Self::InvariantViolation(msg) => write!(f, "Invariant violated: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidCredentials
            | Self::InvalidAuthenticationToken
            | Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::InactiveAccount | Self::NotPermitted => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::EditConflict => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::InvariantViolation(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::BadRequest(msg) => msg.clone(),
            Self::Validation(_) => String::new(),
            Self::InvalidCredentials => "invalid authentication credentials".to_string(),
            Self::InvalidAuthenticationToken => {
                "invalid or missing authentication token".to_string()
            }
            Self::AuthenticationRequired => {
                "you must be authenticated to access this resource".to_string()
            }
            Self::InactiveAccount => {
                "your user account must be activated to access this resource".to_string()
            }
            Self::NotPermitted => {
                "your user account doesn't have the necessary permissions to access this resource"
                    .to_string()
            }
            Self::NotFound => "the requested resource could not be found".to_string(),
            Self::MethodNotAllowed(method) => {
                format!("the {method} method is not supported for this resource")
            }
            Self::EditConflict => {
                "unable to update the record due to an edit conflict, please try again"
                    .to_string()
            }
            Self::RateLimited => "rate limit exceeded".to_string(),
            Self::DatabaseError(_) | Self::InternalError(_) | Self::InvariantViolation(_) => {
                SERVER_ERROR_MESSAGE.to_string()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::DatabaseError(msg) => tracing::error!(error = %msg, "Database error"),
            Self::InternalError(msg) => tracing::error!(error = %msg, "Internal error"),
            Self::InvariantViolation(msg) => {
                tracing::error!(error = %msg, "Internal invariant violated");
            }
            _ => {}
        }

        let status = self.status();
        let challenge = matches!(self, Self::InvalidAuthenticationToken);
        let mut response = match self {
            Self::Validation(errors) => {
                (status, Json(ApiResponse::<()>::field_errors(errors))).into_response()
            }
            other => (status, Json(ApiResponse::<()>::error(other.client_message()))).into_response(),
        };

        if challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<InvariantViolation> for ApiError {
    fn from(err: InvariantViolation) -> Self {
        Self::InvariantViolation(err.0)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::EditConflict => Self::EditConflict,
            StoreError::DuplicateEmail => {
                let mut errors = FieldErrors::new();
                errors.insert(
                    "email".to_string(),
                    "a user with this email address already exists".to_string(),
                );
                Self::Validation(errors)
            }
            StoreError::Invariant(violation) => violation.into(),
            StoreError::Database(e) => Self::DatabaseError(e.to_string()),
            timeout @ StoreError::Timeout { .. } => Self::DatabaseError(timeout.to_string()),
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::AuthenticationRequired => Self::AuthenticationRequired,
            GateError::InactiveAccount => Self::InactiveAccount,
            GateError::NotPermitted(_) => Self::NotPermitted,
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(errors) => Self::Validation(errors),
            AccountError::InvalidCredentials => Self::InvalidCredentials,
            AccountError::InvalidAuthenticationToken => Self::InvalidAuthenticationToken,
            AccountError::InactiveAccount => Self::InactiveAccount,
            AccountError::UserNotFound => Self::NotFound,
            AccountError::EditConflict => Self::EditConflict,
            AccountError::Store(e) => e.into(),
            AccountError::Invariant(violation) => violation.into(),
            other @ (AccountError::Credential(_) | AccountError::Token(_)) => {
                Self::InternalError(other.to_string())
            }
        }
    }
}

impl From<MovieError> for ApiError {
    fn from(err: MovieError) -> Self {
        match err {
            MovieError::Validation(errors) => Self::Validation(errors),
            MovieError::NotFound => Self::NotFound,
            MovieError::EditConflict => Self::EditConflict,
            MovieError::Store(e) => e.into(),
            MovieError::Invariant(violation) => violation.into(),
        }
    }
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }
}
