use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::storage::{Storage, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        // A bad secret or algorithm must abort boot, not surface as a 500
        // on the first login.
        let jwt = JwtKeys::from_config(&config.jwt).context("configure JWT keys")?;

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let storage = Arc::new(Storage::new(&config.s3).await?) as Arc<dyn StorageClient>;

        Ok(Self {
            db,
            config,
            jwt,
            storage,
        })
    }
}
