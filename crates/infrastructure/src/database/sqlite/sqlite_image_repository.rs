use async_trait::async_trait;
use imagebatch_domain::{entities::Image, repositories::ImageRepository};
use imagebatch_errors::PipelineResult;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use super::{to_u32, to_u8};

const IMAGE_COLUMNS: &str = "id, post_id, image_index, width, height, extension, image_type, \
     source_extension, use_for_main_image, fit_mode, cropped, quality, file_size, created_at";

pub struct SqliteImageRepository {
    pool: SqlitePool,
}

impl SqliteImageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_image(row: &sqlx::sqlite::SqliteRow) -> PipelineResult<Image> {
        let quality: Option<i64> = row.try_get("quality")?;
        Ok(Image {
            id: row.try_get("id")?,
            post_id: row.try_get("post_id")?,
            index: row.try_get("image_index")?,
            width: to_u32(row.try_get("width")?, "width")?,
            height: to_u32(row.try_get("height")?, "height")?,
            extension: row.try_get("extension")?,
            image_type: row.try_get("image_type")?,
            source_extension: row.try_get("source_extension")?,
            use_for_main_image: row.try_get("use_for_main_image")?,
            fit_mode: row.try_get("fit_mode")?,
            cropped: row.try_get("cropped")?,
            quality: quality.map(|q| to_u8(q, "quality")).transpose()?,
            file_size: row.try_get("file_size")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// 某个Post的全部图片记录，按索引排序
    pub async fn list_for_post(&self, post_id: i64) -> PipelineResult<Vec<Image>> {
        let rows = sqlx::query(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE post_id = $1 ORDER BY image_index, id"
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_image).collect()
    }
}

#[async_trait]
impl ImageRepository for SqliteImageRepository {
    #[instrument(skip(self))]
    async fn find_one(&self, post_id: i64, index: i32) -> PipelineResult<Option<Image>> {
        let row = sqlx::query(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE post_id = $1 AND image_index = $2 \
             ORDER BY id LIMIT 1"
        ))
        .bind(post_id)
        .bind(index)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_image).transpose()
    }

    #[instrument(skip(self, image), fields(post_id = image.post_id, index = image.index))]
    async fn create(&self, image: &Image) -> PipelineResult<Image> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO images (post_id, image_index, width, height, extension, image_type,
                                source_extension, use_for_main_image, fit_mode, cropped,
                                quality, file_size, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(image.post_id)
        .bind(image.index)
        .bind(i64::from(image.width))
        .bind(i64::from(image.height))
        .bind(&image.extension)
        .bind(&image.image_type)
        .bind(&image.source_extension)
        .bind(image.use_for_main_image)
        .bind(image.fit_mode)
        .bind(image.cropped)
        .bind(image.quality.map(i64::from))
        .bind(image.file_size)
        .bind(image.created_at)
        .fetch_one(&self.pool)
        .await?;

        let created = Self::row_to_image(&row)?;
        debug!("写入图片记录: ID {}", created.id);
        Ok(created)
    }
}
