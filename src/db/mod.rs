use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::token::{Token, TokenScope};
use crate::models::InvariantViolation;
use crate::models::filters::{Filters, Metadata};
use crate::models::movie::Movie;
use crate::models::permission::Permissions;
use crate::models::user::User;

pub mod migrator;
pub mod repositories;

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("edit conflict")]
    EditConflict,

    #[error("a user with this email address already exists")]
    DuplicateEmail,

    #[error("{operation} exceeded its {after:?} deadline")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error(transparent)]
    Database(#[from] DbErr),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
    query_timeout: Duration,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self {
            conn,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        })
    }

    /// Deadline applied to every store operation.
    #[must_use]
    pub const fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub async fn ping(&self) -> StoreResult<()> {
        self.bounded("ping", async {
            let backend = self.conn.get_database_backend();
            self.conn
                .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
                .await?;
            Ok(())
        })
        .await
    }

    /// Runs `fut` under the store deadline. Dropping the future on timeout
    /// hands its pooled connection back.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        if let Ok(result) = tokio::time::timeout(self.query_timeout, fut).await {
            result
        } else {
            warn!(operation, timeout = ?self.query_timeout, "Store operation timed out");
            metrics::counter!("store_timeouts_total", "operation" => operation).increment(1);
            Err(StoreError::Timeout {
                operation,
                after: self.query_timeout,
            })
        }
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn token_repo(&self) -> repositories::token::TokenRepository {
        repositories::token::TokenRepository::new(self.conn.clone())
    }

    fn permission_repo(&self) -> repositories::permission::PermissionRepository {
        repositories::permission::PermissionRepository::new(self.conn.clone())
    }

    fn movie_repo(&self) -> repositories::movie::MovieRepository {
        repositories::movie::MovieRepository::new(self.conn.clone())
    }

    // Users

    pub async fn insert_user(&self, user: &User) -> StoreResult<User> {
        self.bounded("insert_user", self.user_repo().insert(user))
            .await
    }

    pub async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.bounded("get_user_by_email", self.user_repo().get_by_email(email))
            .await
    }

    pub async fn update_user(&self, user: &User) -> StoreResult<User> {
        self.bounded("update_user", self.user_repo().update(user))
            .await
    }

    /// User owning a live token of `scope` whose plaintext hashes to `hash`.
    pub async fn get_user_for_token(
        &self,
        scope: TokenScope,
        hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        self.bounded(
            "get_user_for_token",
            self.user_repo().get_for_token(scope, hash, now),
        )
        .await
    }

    // Tokens

    pub async fn insert_token(&self, token: &Token) -> StoreResult<()> {
        self.bounded("insert_token", self.token_repo().insert(token))
            .await
    }

    pub async fn delete_tokens_for_user(&self, scope: TokenScope, user_id: i32) -> StoreResult<u64> {
        self.bounded(
            "delete_tokens_for_user",
            self.token_repo().delete_all_for_user(scope, user_id),
        )
        .await
    }

    /// Counts stored tokens with this hash and scope regardless of expiry.
    pub async fn count_tokens_with_hash(&self, scope: TokenScope, hash: &str) -> StoreResult<u64> {
        self.bounded(
            "count_tokens_with_hash",
            self.token_repo().count_with_hash(scope, hash),
        )
        .await
    }

    pub async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.bounded("purge_expired_tokens", self.token_repo().purge_expired(now))
            .await
    }

    // Permissions

    pub async fn get_permissions_for_user(&self, user_id: i32) -> StoreResult<Permissions> {
        self.bounded(
            "get_permissions_for_user",
            self.permission_repo().get_all_for_user(user_id),
        )
        .await
    }

    pub async fn add_permissions_for_user(&self, user_id: i32, codes: &[&str]) -> StoreResult<u64> {
        self.bounded(
            "add_permissions_for_user",
            self.permission_repo().add_for_user(user_id, codes),
        )
        .await
    }

    // Movies

    pub async fn insert_movie(&self, movie: &Movie) -> StoreResult<Movie> {
        self.bounded("insert_movie", self.movie_repo().insert(movie))
            .await
    }

    pub async fn get_movie(&self, id: i32) -> StoreResult<Option<Movie>> {
        self.bounded("get_movie", self.movie_repo().get(id)).await
    }

    pub async fn update_movie(&self, movie: &Movie) -> StoreResult<Movie> {
        self.bounded("update_movie", self.movie_repo().update(movie))
            .await
    }

    pub async fn delete_movie(&self, id: i32) -> StoreResult<()> {
        self.bounded("delete_movie", self.movie_repo().delete(id))
            .await
    }

    pub async fn list_movies(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> StoreResult<(Vec<Movie>, Metadata)> {
        self.bounded(
            "list_movies",
            self.movie_repo().get_all(title, genres, filters),
        )
        .await
    }
}
