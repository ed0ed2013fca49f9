use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::HeaderMap,
};

use super::ApiError;
use crate::validation::Validator;

pub const EXPECTED_VERSION_HEADER: &str = "x-expected-version";

/// `Json<T>` whose rejections use the API error envelope.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

/// Path ids are positive integers; anything else is simply not found.
pub fn parse_id(raw: &str) -> Result<i32, ApiError> {
    match raw.parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}

/// Optional `X-Expected-Version` precondition.
pub fn expected_version(headers: &HeaderMap) -> Result<Option<i32>, ApiError> {
    let Some(value) = headers.get(EXPECTED_VERSION_HEADER) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::bad_request("X-Expected-Version must be an integer"))
}

/// Integer query parameter, `default` when absent. A value that does not
/// parse is recorded on `v`.
pub fn read_int(v: &mut Validator, raw: Option<&str>, key: &str, default: u64) -> u64 {
    match raw {
        None | Some("") => default,
        Some(s) => s.parse().unwrap_or_else(|_| {
            v.add_error(key, "must be an integer value");
            default
        }),
    }
}

/// Comma-separated query parameter.
pub fn read_csv(raw: Option<&str>) -> Vec<String> {
    raw.filter(|s| !s.is_empty())
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
