use async_trait::async_trait;
use imagebatch_domain::{
    entities::{BatchType, Post},
    repositories::PostRepository,
};
use imagebatch_errors::{PipelineError, PipelineResult};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

const POST_COLUMNS: &str = "id, feed_id, title, has_post_main_image, has_extracted_main_image, \
     images_processed, has_resized_images, resize_failures";

pub struct SqlitePostRepository {
    pool: SqlitePool,
}

impl SqlitePostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_post(row: &sqlx::sqlite::SqliteRow) -> PipelineResult<Post> {
        Ok(Post {
            id: row.try_get("id")?,
            feed_id: row.try_get("feed_id")?,
            title: row.try_get("title")?,
            has_post_main_image: row.try_get("has_post_main_image")?,
            has_extracted_main_image: row.try_get("has_extracted_main_image")?,
            images_processed: row.try_get("images_processed")?,
            has_resized_images: row.try_get("has_resized_images")?,
            resize_failures: row.try_get("resize_failures")?,
        })
    }

    pub async fn create(&self, post: &Post) -> PipelineResult<Post> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO posts (feed_id, title, has_post_main_image, has_extracted_main_image,
                               images_processed, has_resized_images, resize_failures)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(post.has_post_main_image)
        .bind(post.has_extracted_main_image)
        .bind(post.images_processed)
        .bind(post.has_resized_images)
        .bind(post.resize_failures)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_post(&row)
    }

    pub async fn get_by_id(&self, id: i64) -> PipelineResult<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_post).transpose()
    }
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    #[instrument(skip(self))]
    async fn find_by_status(
        &self,
        feed_id: i64,
        batch_type: BatchType,
    ) -> PipelineResult<Vec<Post>> {
        let filter = match batch_type {
            BatchType::ProcessImages => "images_processed = 0",
        };
        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE feed_id = $1 AND {filter} ORDER BY id"
        ))
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;

        let posts: PipelineResult<Vec<Post>> = rows.iter().map(Self::row_to_post).collect();
        posts
    }

    async fn update_one(&self, post: &Post) -> PipelineResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET images_processed = $2, has_resized_images = $3, resize_failures = $4
            WHERE id = $1
            "#,
        )
        .bind(post.id)
        .bind(post.images_processed)
        .bind(post.has_resized_images)
        .bind(post.resize_failures)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PipelineError::persistence(format!("Post不存在: {}", post.id)));
        }

        debug!("更新Post成功: ID {}", post.id);
        Ok(())
    }
}
