//! `SeaORM` implementation of the `MovieService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::db::Store;
use crate::models::filters::{Metadata, validate_filters};
use crate::models::movie::{Movie, MovieInput, MoviePatch, validate_movie};
use crate::services::movie_service::{MovieError, MovieQuery, MovieService};
use crate::validation::Validator;

pub struct SeaOrmMovieService {
    store: Store,
}

impl SeaOrmMovieService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MovieService for SeaOrmMovieService {
    async fn create(&self, input: MovieInput) -> Result<Movie, MovieError> {
        let movie = input.into_movie();

        let mut v = Validator::new();
        validate_movie(&mut v, &movie);
        v.finish()?;

        let movie = self.store.insert_movie(&movie).await?;
        info!(movie_id = movie.id, "Movie created");
        Ok(movie)
    }

    async fn get(&self, id: i32) -> Result<Movie, MovieError> {
        self.store.get_movie(id).await?.ok_or(MovieError::NotFound)
    }

    async fn update(
        &self,
        id: i32,
        patch: MoviePatch,
        expected_version: Option<i32>,
    ) -> Result<Movie, MovieError> {
        let mut movie = self.get(id).await?;

        // Early rejection only; the conditional write below stays authoritative.
        if let Some(expected) = expected_version
            && expected != movie.version
        {
            return Err(MovieError::EditConflict);
        }

        patch.apply(&mut movie);

        let mut v = Validator::new();
        validate_movie(&mut v, &movie);
        v.finish()?;

        let movie = self.store.update_movie(&movie).await?;
        info!(movie_id = movie.id, version = movie.version, "Movie updated");
        Ok(movie)
    }

    async fn delete(&self, id: i32) -> Result<(), MovieError> {
        self.store.delete_movie(id).await?;
        info!(movie_id = id, "Movie deleted");
        Ok(())
    }

    async fn list(&self, query: MovieQuery) -> Result<(Vec<Movie>, Metadata), MovieError> {
        let mut v = Validator::new();
        validate_filters(&mut v, &query.filters);
        v.finish()?;

        Ok(self
            .store
            .list_movies(&query.title, &query.genres, &query.filters)
            .await?)
    }
}
