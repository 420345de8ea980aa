use async_trait::async_trait;
use chrono::Utc;
use imagebatch_domain::{
    entities::{Batch, BatchItem, BatchItemStatus, BatchStatus, BatchType},
    repositories::BatchRepository,
};
use imagebatch_errors::{PipelineError, PipelineResult};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

const BATCH_COLUMNS: &str = "id, batch_type, schedule_id, status, pending_items, error, \
     created_at, started_at, completed_at";
const ITEM_COLUMNS: &str = "id, batch_id, feed_id, status, error, stack, posts_total, \
     posts_failed, created_at, completed_at";

pub struct SqliteBatchRepository {
    pool: SqlitePool,
}

impl SqliteBatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_batch(row: &sqlx::sqlite::SqliteRow) -> PipelineResult<Batch> {
        Ok(Batch {
            id: row.try_get("id")?,
            batch_type: row.try_get("batch_type")?,
            schedule_id: row.try_get("schedule_id")?,
            status: row.try_get("status")?,
            pending_items: row.try_get("pending_items")?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> PipelineResult<BatchItem> {
        Ok(BatchItem {
            id: row.try_get("id")?,
            batch_id: row.try_get("batch_id")?,
            feed_id: row.try_get("feed_id")?,
            status: row.try_get("status")?,
            error: row.try_get("error")?,
            stack: row.try_get("stack")?,
            posts_total: row.try_get("posts_total")?,
            posts_failed: row.try_get("posts_failed")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

#[async_trait]
impl BatchRepository for SqliteBatchRepository {
    #[instrument(skip(self))]
    async fn add_task(
        &self,
        batch_type: BatchType,
        schedule_id: Option<String>,
        status: BatchStatus,
    ) -> PipelineResult<Batch> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO batches (batch_type, schedule_id, status, pending_items, created_at)
            VALUES ($1, $2, $3, 0, $4)
            RETURNING {BATCH_COLUMNS}
            "#
        ))
        .bind(batch_type)
        .bind(&schedule_id)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        let batch = Self::row_to_batch(&row)?;
        debug!("创建批次成功: ID {}", batch.id);
        Ok(batch)
    }

    async fn update_status(&self, batch: &Batch) -> PipelineResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE batches
            SET status = $2, pending_items = $3, started_at = $4
            WHERE id = $1
            "#,
        )
        .bind(batch.id)
        .bind(batch.status)
        .bind(batch.pending_items)
        .bind(batch.started_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PipelineError::BatchNotFound { id: batch.id });
        }
        Ok(())
    }

    async fn add_item(&self, batch_id: i64, feed_id: i64) -> PipelineResult<BatchItem> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO batch_items (batch_id, feed_id, status, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(batch_id)
        .bind(feed_id)
        .bind(BatchItemStatus::Processing)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_item(&row)
    }

    /// 条目写入与批次计数递减在同一事务中完成
    #[instrument(skip(self, item), fields(item_id = item.id, batch_id = item.batch_id))]
    async fn complete_batch_item(&self, item: &BatchItem) -> PipelineResult<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE batch_items
            SET status = $2, error = $3, stack = $4, posts_total = $5, posts_failed = $6,
                completed_at = $7
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(item.status)
        .bind(&item.error)
        .bind(&item.stack)
        .bind(item.posts_total)
        .bind(item.posts_failed)
        .bind(item.completed_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PipelineError::BatchItemNotFound { id: item.id });
        }

        let remaining: i64 = sqlx::query(
            r#"
            UPDATE batches SET pending_items = pending_items - 1
            WHERE id = $1
            RETURNING pending_items
            "#,
        )
        .bind(item.batch_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(PipelineError::BatchNotFound { id: item.batch_id })?
        .try_get("pending_items")?;

        tx.commit().await?;
        debug!("批次条目完成, 剩余 {}", remaining);
        Ok(remaining)
    }

    async fn complete_task(&self, batch: &Batch) -> PipelineResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE batches
            SET status = $2, error = $3, started_at = $4, completed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(batch.id)
        .bind(batch.status)
        .bind(&batch.error)
        .bind(batch.started_at)
        .bind(batch.completed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PipelineError::BatchNotFound { id: batch.id });
        }
        debug!("批次 {} 结束: {}", batch.id, batch.status.as_str());
        Ok(())
    }

    async fn get_by_id(&self, batch_id: i64) -> PipelineResult<Option<Batch>> {
        let row = sqlx::query(&format!("SELECT {BATCH_COLUMNS} FROM batches WHERE id = $1"))
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_batch).transpose()
    }

    async fn list_items(&self, batch_id: i64) -> PipelineResult<Vec<BatchItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM batch_items WHERE batch_id = $1 ORDER BY id"
        ))
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_item).collect()
    }
}
