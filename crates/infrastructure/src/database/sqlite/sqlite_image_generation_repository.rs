use async_trait::async_trait;
use imagebatch_domain::{entities::ImageGenerationSpec, repositories::ImageGenerationRepository};
use imagebatch_errors::PipelineResult;
use sqlx::{Row, SqlitePool};

use super::{to_u32, to_u8};

const SPEC_COLUMNS: &str =
    "id, width, height, fit_mode, crop, quality, ext_dest, use_for_main_image, active";

pub struct SqliteImageGenerationRepository {
    pool: SqlitePool,
}

impl SqliteImageGenerationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_spec(row: &sqlx::sqlite::SqliteRow) -> PipelineResult<ImageGenerationSpec> {
        Ok(ImageGenerationSpec {
            id: row.try_get("id")?,
            width: to_u32(row.try_get("width")?, "width")?,
            height: to_u32(row.try_get("height")?, "height")?,
            fit_mode: row.try_get("fit_mode")?,
            crop: row.try_get("crop")?,
            quality: to_u8(row.try_get("quality")?, "quality")?,
            ext_dest: row.try_get("ext_dest")?,
            use_for_main_image: row.try_get("use_for_main_image")?,
            active: row.try_get("active")?,
        })
    }

    pub async fn create(&self, spec: &ImageGenerationSpec) -> PipelineResult<ImageGenerationSpec> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO image_generations (width, height, fit_mode, crop, quality, ext_dest,
                                           use_for_main_image, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {SPEC_COLUMNS}
            "#
        ))
        .bind(i64::from(spec.width))
        .bind(i64::from(spec.height))
        .bind(spec.fit_mode)
        .bind(spec.crop)
        .bind(i64::from(spec.quality))
        .bind(&spec.ext_dest)
        .bind(spec.use_for_main_image)
        .bind(spec.active)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_spec(&row)
    }
}

#[async_trait]
impl ImageGenerationRepository for SqliteImageGenerationRepository {
    async fn find_active(&self) -> PipelineResult<Vec<ImageGenerationSpec>> {
        let rows = sqlx::query(&format!(
            "SELECT {SPEC_COLUMNS} FROM image_generations WHERE active = 1 ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_spec).collect()
    }
}
