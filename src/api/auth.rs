use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header, request::Parts},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};
use std::sync::Arc;
use tracing::debug;

use super::{ApiError, AppState};
use crate::auth::gate::{require_activated, require_permissions};
use crate::auth::identity::{Identity, parse_authorization};
use crate::models::InvariantViolation;

// ============================================================================
// Authenticator
// ============================================================================

/// Resolves the `Authorization` header into an [`Identity`] request
/// extension. Requests without the header continue as anonymous.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = parse_authorization(
        request
            .headers()
            .get(header::AUTHORIZATION)
            .map(HeaderValue::as_bytes),
    )
    .map(|token| token.map(str::to_string));

    let identity = match presented {
        Ok(None) => Identity::Anonymous,
        Ok(Some(token)) => {
            let user = state.account_service().authenticate(&token).await?;
            tracing::Span::current().record("user_id", user.id);
            Identity::User(user)
        }
        Err(e) => {
            debug!(error = %e, "Malformed Authorization header");
            return Err(ApiError::InvalidAuthenticationToken);
        }
    };

    request.extensions_mut().insert(identity);

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    Ok(response)
}

/// The identity attached by [`authenticate`].
///
/// Extracting it on a route the authenticator does not cover is a wiring
/// bug and surfaces as a 500, never as a client auth failure.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                InvariantViolation::new("identity read before the authenticator ran").into()
            })
    }
}

// ============================================================================
// Authorization gate
// ============================================================================

#[derive(Clone)]
pub struct Gate {
    state: Arc<AppState>,
    permissions: &'static [&'static str],
}

async fn gate_middleware(
    State(gate): State<Gate>,
    CurrentIdentity(identity): CurrentIdentity,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = require_activated(&identity)?;

    if !gate.permissions.is_empty() {
        let held = gate.state.account_service().permissions_for(user.id).await?;
        require_permissions(&held, gate.permissions)?;
    }

    Ok(next.run(request).await)
}

/// Admits only activated users holding every code in `permissions`.
/// An empty list means activation alone.
pub fn gated(
    state: &Arc<AppState>,
    permissions: &'static [&'static str],
    route: MethodRouter<Arc<AppState>>,
) -> MethodRouter<Arc<AppState>> {
    route.route_layer(middleware::from_fn_with_state(
        Gate {
            state: state.clone(),
            permissions,
        },
        gate_middleware,
    ))
}

