pub mod migrations;
pub mod sqlite_batch_repository;
pub mod sqlite_feed_repository;
pub mod sqlite_image_generation_repository;
pub mod sqlite_image_repository;
pub mod sqlite_post_repository;
pub mod sqlite_stats_repository;

pub use migrations::run_migrations;
pub use sqlite_batch_repository::SqliteBatchRepository;
pub use sqlite_feed_repository::SqliteFeedRepository;
pub use sqlite_image_generation_repository::SqliteImageGenerationRepository;
pub use sqlite_image_repository::SqliteImageRepository;
pub use sqlite_post_repository::SqlitePostRepository;
pub use sqlite_stats_repository::SqliteStatsRepository;

use anyhow::Result;
use imagebatch_core::DatabaseConfig;
use imagebatch_errors::{PipelineError, PipelineResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(1800)) // 30分钟默认生命周期
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        run_migrations(&self.pool).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn feed_repository(&self) -> Arc<SqliteFeedRepository> {
        Arc::new(SqliteFeedRepository::new(self.pool.clone()))
    }

    pub fn post_repository(&self) -> Arc<SqlitePostRepository> {
        Arc::new(SqlitePostRepository::new(self.pool.clone()))
    }

    pub fn image_repository(&self) -> Arc<SqliteImageRepository> {
        Arc::new(SqliteImageRepository::new(self.pool.clone()))
    }

    pub fn image_generation_repository(&self) -> Arc<SqliteImageGenerationRepository> {
        Arc::new(SqliteImageGenerationRepository::new(self.pool.clone()))
    }

    pub fn batch_repository(&self) -> Arc<SqliteBatchRepository> {
        Arc::new(SqliteBatchRepository::new(self.pool.clone()))
    }

    pub fn stats_repository(&self) -> Arc<SqliteStatsRepository> {
        Arc::new(SqliteStatsRepository::new(self.pool.clone()))
    }
}

pub type DbPool = Pool<Sqlite>;

/// SQLite没有无符号整数，读出的i64在这里做范围检查
pub(crate) fn to_u32(value: i64, field: &str) -> PipelineResult<u32> {
    u32::try_from(value)
        .map_err(|_| PipelineError::Serialization(format!("字段 {field} 超出范围: {value}")))
}

pub(crate) fn to_u8(value: i64, field: &str) -> PipelineResult<u8> {
    u8::try_from(value)
        .map_err(|_| PipelineError::Serialization(format!("字段 {field} 超出范围: {value}")))
}
