use std::sync::Arc;

use imagebatch_domain::{
    Feed, Image, ImageGenerationSpec, ImageLocation, ImageMetadata, PipelineError,
    PipelineResult, Post, RENDITION_IMAGE_INDEX,
};
use tracing::{debug, instrument, warn};

use crate::context::PipelineContext;
use crate::stats::ConversionStatsAggregator;

/// 单个 (源图, 规格) 的衍生图生成
///
/// 读取源图字节、按规格缩放编码、写入存储并登记图片记录。
/// 成功与失败都会计入本次运行的 "Image Conversions" 统计。
pub struct ImageConversionStage {
    ctx: Arc<PipelineContext>,
    stats: Arc<ConversionStatsAggregator>,
}

impl ImageConversionStage {
    pub fn new(ctx: Arc<PipelineContext>, stats: Arc<ConversionStatsAggregator>) -> Self {
        Self { ctx, stats }
    }

    #[instrument(skip_all, fields(post_id = post.id, spec_id = spec.id))]
    pub async fn convert(
        &self,
        feed: &Feed,
        post: &Post,
        source: &Image,
        spec: &ImageGenerationSpec,
    ) -> PipelineResult<Image> {
        let attempt = self.attempt(feed, post, source, spec);
        let result = match self.ctx.settings.conversion_timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Timeout(format!(
                    "衍生图转换超过 {} 秒",
                    limit.as_secs_f64()
                ))),
            },
            None => attempt.await,
        };

        match result {
            Ok((image, metadata)) => {
                self.stats.inc(metadata.size);
                debug!(
                    width = metadata.width,
                    height = metadata.height,
                    bytes = metadata.size,
                    "衍生图生成完成"
                );
                Ok(image)
            }
            Err(e) => {
                self.stats.inc_err();
                warn!(kind = e.kind(), "衍生图生成失败: {e}");
                Err(match e {
                    PipelineError::Conversion { .. } => e,
                    other => PipelineError::conversion(spec.id, other.to_string()),
                })
            }
        }
    }

    async fn attempt(
        &self,
        feed: &Feed,
        post: &Post,
        source: &Image,
        spec: &ImageGenerationSpec,
    ) -> PipelineResult<(Image, ImageMetadata)> {
        let request = spec.resize_request()?;
        let source_location = ImageLocation::new(
            feed.id,
            post.id,
            source.index,
            source.width,
            source.height,
            source.extension.clone(),
        );

        let bytes = self.ctx.storage.read_image_bytes(&source_location).await?;
        let resized = self.ctx.codec.resize(bytes, request).await?;
        if resized.is_empty() {
            return Err(PipelineError::codec("Image Resize Failed : 输出为空"));
        }

        let mut metadata = self.ctx.codec.read_metadata(&resized).await?;
        metadata.size = resized.len() as u64;

        let target = ImageLocation::new(
            feed.id,
            post.id,
            RENDITION_IMAGE_INDEX,
            spec.width,
            spec.height,
            spec.ext_dest.clone(),
        );
        self.ctx.storage.write_image_bytes(&target, &resized).await?;

        let record = Image::rendition(source, spec, &metadata);
        let created = self.ctx.images.create(&record).await?;
        Ok((created, metadata))
    }
}
