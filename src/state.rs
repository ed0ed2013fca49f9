use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::mailer::{self, SharedMailer};
use crate::services::{
    AccountService, MovieService, SeaOrmAccountService, SeaOrmMovieService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub mailer: SharedMailer,

    pub account_service: Arc<dyn AccountService>,

    pub movie_service: Arc<dyn MovieService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let mailer = mailer::from_config(&config.mailer)?;
        Self::init_with_mailer(config, mailer).await
    }

    /// Same as [`SharedState::new`] but delivering mail through `mailer`.
    pub async fn with_mailer(config: Config, mailer: SharedMailer) -> anyhow::Result<Self> {
        Self::init_with_mailer(config, mailer).await
    }

    async fn init_with_mailer(config: Config, mailer: SharedMailer) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?
        .with_query_timeout(config.security.store_timeout());

        let account_service = Arc::new(SeaOrmAccountService::new(
            store.clone(),
            mailer.clone(),
            config.security.clone(),
            Duration::from_secs(config.mailer.timeout_seconds),
        )) as Arc<dyn AccountService>;

        let movie_service = Arc::new(SeaOrmMovieService::new(store.clone())) as Arc<dyn MovieService>;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            mailer,
            account_service,
            movie_service,
        })
    }
}
