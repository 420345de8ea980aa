use async_trait::async_trait;
use imagebatch_domain::{entities::StatSnapshot, ports::StatsSink};
use imagebatch_errors::{PipelineError, PipelineResult};
use sqlx::{Row, SqlitePool};

/// 把统计快照写入 `process_stats` 表
pub struct SqliteStatsRepository {
    pool: SqlitePool,
}

impl SqliteStatsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_by_name(&self, name: &str) -> PipelineResult<Vec<StatSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT scope, name, success_count, success_bytes, error_count, started_at, finished_at
            FROM process_stats WHERE name = $1 ORDER BY id
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> PipelineResult<StatSnapshot> {
                Ok(StatSnapshot {
                    scope: row.try_get("scope")?,
                    name: row.try_get("name")?,
                    success_count: to_u64(row.try_get("success_count")?)?,
                    success_bytes: to_u64(row.try_get("success_bytes")?)?,
                    error_count: to_u64(row.try_get("error_count")?)?,
                    started_at: row.try_get("started_at")?,
                    finished_at: row.try_get("finished_at")?,
                })
            })
            .collect()
    }
}

fn to_i64(value: u64) -> PipelineResult<i64> {
    i64::try_from(value).map_err(|_| PipelineError::Serialization(format!("统计值溢出: {value}")))
}

fn to_u64(value: i64) -> PipelineResult<u64> {
    u64::try_from(value).map_err(|_| PipelineError::Serialization(format!("统计值为负: {value}")))
}

#[async_trait]
impl StatsSink for SqliteStatsRepository {
    async fn flush(&self, snapshot: &StatSnapshot) -> PipelineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO process_stats (scope, name, success_count, success_bytes, error_count,
                                       started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&snapshot.scope)
        .bind(&snapshot.name)
        .bind(to_i64(snapshot.success_count)?)
        .bind(to_i64(snapshot.success_bytes)?)
        .bind(to_i64(snapshot.error_count)?)
        .bind(snapshot.started_at)
        .bind(snapshot.finished_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
