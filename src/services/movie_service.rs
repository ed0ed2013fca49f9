//! Domain service for the movie catalog.

use thiserror::Error;

use crate::db::StoreError;
use crate::models::InvariantViolation;
use crate::models::filters::{Filters, Metadata};
use crate::models::movie::{Movie, MovieInput, MoviePatch};
use crate::validation::FieldErrors;

/// Errors specific to movie operations.
#[derive(Debug, Error)]
pub enum MovieError {
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("Movie not found")]
    NotFound,

    #[error("Edit conflict")]
    EditConflict,

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl From<StoreError> for MovieError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::EditConflict => Self::EditConflict,
            StoreError::Invariant(violation) => Self::Invariant(violation),
            other => Self::Store(other),
        }
    }
}

impl From<FieldErrors> for MovieError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

/// Listing criteria for [`MovieService::list`].
#[derive(Debug, Clone)]
pub struct MovieQuery {
    pub title: String,
    pub genres: Vec<String>,
    pub filters: Filters,
}

#[async_trait::async_trait]
pub trait MovieService: Send + Sync {
    async fn create(&self, input: MovieInput) -> Result<Movie, MovieError>;

    async fn get(&self, id: i32) -> Result<Movie, MovieError>;

    /// Applies `patch` to the current record.
    ///
    /// # Errors
    ///
    /// Returns [`MovieError::EditConflict`] when `expected_version` is given
    /// and differs from the stored version, or when another writer bumps the
    /// version between our read and our write.
    async fn update(
        &self,
        id: i32,
        patch: MoviePatch,
        expected_version: Option<i32>,
    ) -> Result<Movie, MovieError>;

    async fn delete(&self, id: i32) -> Result<(), MovieError>;

    async fn list(&self, query: MovieQuery) -> Result<(Vec<Movie>, Metadata), MovieError>;
}
