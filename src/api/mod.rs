use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, patch, post, put},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::models::permission::{MOVIES_READ, MOVIES_WRITE};
use crate::ratelimit::RateLimiter;
use crate::services::{AccountService, MovieService};
use crate::state::SharedState;

pub mod auth;
mod error;
mod healthcheck;
mod movies;
mod observability;
mod rate_limit;
mod tokens;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    /// `None` when `limiter.enabled` is off.
    pub limiter: Option<Arc<RateLimiter>>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn account_service(&self) -> &Arc<dyn AccountService> {
        &self.shared.account_service
    }

    #[must_use]
    pub fn movie_service(&self) -> &Arc<dyn MovieService> {
        &self.shared.movie_service
    }
}

pub async fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    let limiter = {
        let config = shared.config.read().await;
        config
            .limiter
            .enabled
            .then(|| Arc::new(RateLimiter::from_config(&config.limiter)))
    };

    Arc::new(AppState {
        shared,
        limiter,
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle).await)
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().read().await.server.cors_allowed_origins.clone();

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .route("/v1/healthcheck", get(healthcheck::healthcheck))
        .route(
            "/v1/movies",
            auth::gated(&state, &[MOVIES_READ], get(movies::list_movies)).merge(auth::gated(
                &state,
                &[MOVIES_WRITE],
                post(movies::create_movie),
            )),
        )
        .route(
            "/v1/movies/{id}",
            auth::gated(&state, &[MOVIES_READ], get(movies::show_movie)).merge(auth::gated(
                &state,
                &[MOVIES_WRITE],
                patch(movies::update_movie).delete(movies::delete_movie),
            )),
        )
        .route("/v1/users", post(users::register))
        .route("/v1/users/activated", put(users::activate))
        .route("/v1/users/password", put(users::reset_password))
        .route(
            "/v1/tokens/authentication",
            post(tokens::create_authentication_token),
        )
        .route(
            "/v1/tokens/activation",
            post(tokens::create_activation_token),
        )
        .route(
            "/v1/tokens/password-reset",
            post(tokens::create_password_reset_token),
        )
        .route("/debug/metrics", get(observability::get_metrics))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit,
        ))
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(
            cors_layer
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                ])
                .allow_headers(Any),
        )
        .layer(CatchPanicLayer::custom(observability::handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method.to_string())
}
