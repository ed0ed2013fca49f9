use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::{JsonBody, expected_version, parse_id, read_csv, read_int};
use super::{
    ApiError, ApiResponse, AppState, MessageResponse, MovieListResponse, MovieResponse,
};
use crate::models::filters::Filters;
use crate::models::movie::{MovieInput, MoviePatch, SORT_SAFELIST};
use crate::services::MovieQuery;
use crate::validation::Validator;

#[derive(Debug, Default, Deserialize)]
pub struct MovieListParams {
    pub title: Option<String>,
    pub genres: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
}

/// GET /v1/movies
pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MovieListParams>,
) -> Result<Json<ApiResponse<MovieListResponse>>, ApiError> {
    let mut v = Validator::new();
    let mut filters = Filters::new(SORT_SAFELIST);
    filters.page = read_int(&mut v, params.page.as_deref(), "page", 1);
    filters.page_size = read_int(&mut v, params.page_size.as_deref(), "page_size", 20);
    filters.sort = params.sort.unwrap_or_else(|| "id".to_string());
    v.finish().map_err(ApiError::Validation)?;

    let query = MovieQuery {
        title: params.title.unwrap_or_default(),
        genres: read_csv(params.genres.as_deref()),
        filters,
    };

    let (movies, metadata) = state.movie_service().list(query).await?;
    Ok(Json(ApiResponse::success(MovieListResponse {
        movies,
        metadata,
    })))
}

/// POST /v1/movies
pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    JsonBody(input): JsonBody<MovieInput>,
) -> Result<Response, ApiError> {
    let movie = state.movie_service().create(input).await?;

    let location = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id))
        .map_err(|e| ApiError::internal(format!("Invalid location header: {e}")))?;

    let mut response = (
        StatusCode::CREATED,
        Json(ApiResponse::success(MovieResponse { movie })),
    )
        .into_response();
    response.headers_mut().insert(header::LOCATION, location);
    Ok(response)
}

/// GET /v1/movies/{id}
pub async fn show_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MovieResponse>>, ApiError> {
    let movie = state.movie_service().get(parse_id(&id)?).await?;
    Ok(Json(ApiResponse::success(MovieResponse { movie })))
}

/// PATCH /v1/movies/{id}
pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    JsonBody(patch): JsonBody<MoviePatch>,
) -> Result<Json<ApiResponse<MovieResponse>>, ApiError> {
    let id = parse_id(&id)?;
    let expected = expected_version(&headers)?;

    let movie = state.movie_service().update(id, patch, expected).await?;
    Ok(Json(ApiResponse::success(MovieResponse { movie })))
}

/// DELETE /v1/movies/{id}
pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.movie_service().delete(parse_id(&id)?).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "movie successfully deleted",
    ))))
}
