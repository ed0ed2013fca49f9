use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

use super::{ApiError, AppState};

/// Per-client-IP throttle. The client address comes from axum's
/// `ConnectInfo`, so the server must be started with
/// `into_make_service_with_connect_info`.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(limiter) = state.limiter.as_ref() else {
        return Ok(next.run(request).await);
    };

    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .ok_or_else(|| ApiError::internal("client address unavailable for rate limiting"))?;

    if !limiter.allow(ip) {
        debug!(%ip, "Rate limit exceeded");
        metrics::counter!("http_requests_rate_limited_total").increment(1);
        return Err(ApiError::RateLimited);
    }

    Ok(next.run(request).await)
}
