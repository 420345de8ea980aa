use async_trait::async_trait;
use imagebatch_domain::{entities::Feed, repositories::FeedRepository};
use imagebatch_errors::PipelineResult;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

pub struct SqliteFeedRepository {
    pool: SqlitePool,
}

impl SqliteFeedRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_feed(row: &sqlx::sqlite::SqliteRow) -> PipelineResult<Feed> {
        Ok(Feed {
            id: row.try_get("id")?,
            provider: row.try_get("provider")?,
            source_tag: row.try_get("source_tag")?,
            active: row.try_get("active")?,
        })
    }

    /// 新增Feed，返回带ID的记录
    pub async fn create(&self, feed: &Feed) -> PipelineResult<Feed> {
        let row = sqlx::query(
            r#"
            INSERT INTO feeds (provider, source_tag, active)
            VALUES ($1, $2, $3)
            RETURNING id, provider, source_tag, active
            "#,
        )
        .bind(&feed.provider)
        .bind(&feed.source_tag)
        .bind(feed.active)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_feed(&row)
    }
}

#[async_trait]
impl FeedRepository for SqliteFeedRepository {
    #[instrument(skip(self))]
    async fn get_active_partition(
        &self,
        start_row: i64,
        end_row: i64,
    ) -> PipelineResult<Vec<Feed>> {
        if end_row <= start_row || start_row < 0 {
            debug!("空的Feed分区: [{start_row}, {end_row})");
            return Ok(vec![]);
        }

        let rows = sqlx::query(
            r#"
            SELECT id, provider, source_tag, active
            FROM feeds
            WHERE active = 1
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(end_row - start_row)
        .bind(start_row)
        .fetch_all(&self.pool)
        .await?;

        let feeds: PipelineResult<Vec<Feed>> = rows.iter().map(Self::row_to_feed).collect();
        feeds
    }
}
