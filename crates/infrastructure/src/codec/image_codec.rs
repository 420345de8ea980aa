use std::io::Cursor;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use imagebatch_domain::entities::{FitMode, ImageMetadata, OutputFormat, ResizeRequest};
use imagebatch_domain::ports::ImageCodec;
use imagebatch_errors::{PipelineError, PipelineResult};
use tracing::debug;

/// 基于 `image` crate 的编解码实现
///
/// 解码、缩放与编码都是CPU密集型操作，在阻塞线程池中执行。
#[derive(Debug, Clone, Copy)]
pub struct ImageRsCodec {
    filter: FilterType,
}

impl ImageRsCodec {
    pub fn new() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }

    pub fn with_filter(filter: FilterType) -> Self {
        Self { filter }
    }

    fn decode(bytes: &[u8]) -> PipelineResult<DynamicImage> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::codec(format!("无法识别图片格式: {e}")))?
            .decode()
            .map_err(|e| PipelineError::codec(format!("图片解码失败: {e}")))
    }

    /// 按缩放模式计算输出图像
    ///
    /// - `min` + crop：覆盖目标区域后居中裁剪到精确尺寸
    /// - `min`：短边对齐，输出至少覆盖目标区域
    /// - `max`：长边对齐，输出完整放入目标区域
    fn transform(&self, source: &DynamicImage, request: &ResizeRequest) -> DynamicImage {
        match (request.fit_mode, request.crop) {
            (FitMode::Min, true) => {
                source.resize_to_fill(request.width, request.height, self.filter)
            }
            (FitMode::Min, false) => {
                let (w, h) = cover_dimensions(
                    source.width(),
                    source.height(),
                    request.width,
                    request.height,
                );
                source.resize_exact(w, h, self.filter)
            }
            (FitMode::Max, _) => source.resize(request.width, request.height, self.filter),
        }
    }

    fn encode(image: &DynamicImage, request: &ResizeRequest) -> PipelineResult<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        match request.format {
            OutputFormat::Jpeg => {
                let rgb = image.to_rgb8();
                let quality = request.quality.clamp(1, 100);
                JpegEncoder::new_with_quality(&mut out, quality)
                    .encode_image(&rgb)
                    .map_err(|e| PipelineError::codec(format!("JPEG编码失败: {e}")))?;
            }
            OutputFormat::Png => image
                .write_to(&mut out, ImageFormat::Png)
                .map_err(|e| PipelineError::codec(format!("PNG编码失败: {e}")))?,
            OutputFormat::WebP => DynamicImage::ImageRgba8(image.to_rgba8())
                .write_to(&mut out, ImageFormat::WebP)
                .map_err(|e| PipelineError::codec(format!("WebP编码失败: {e}")))?,
        }
        Ok(out.into_inner())
    }
}

impl Default for ImageRsCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// 保持宽高比、让两条边都不小于目标的尺寸
fn cover_dimensions(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 {
        return (dst_w.max(1), dst_h.max(1));
    }
    let scale = f64::max(
        f64::from(dst_w) / f64::from(src_w),
        f64::from(dst_h) / f64::from(src_h),
    );
    let w = (f64::from(src_w) * scale).round().max(1.0) as u32;
    let h = (f64::from(src_h) * scale).round().max(1.0) as u32;
    (w.max(dst_w), h.max(dst_h))
}

#[async_trait]
impl ImageCodec for ImageRsCodec {
    async fn resize(&self, bytes: Vec<u8>, request: ResizeRequest) -> PipelineResult<Vec<u8>> {
        if request.width == 0 || request.height == 0 {
            return Err(PipelineError::validation_error(format!(
                "目标尺寸无效: {}x{}",
                request.width, request.height
            )));
        }

        let codec = *self;
        tokio::task::spawn_blocking(move || {
            let source = Self::decode(&bytes)?;
            let resized = codec.transform(&source, &request);
            debug!(
                "缩放 {}x{} -> {}x{}",
                source.width(),
                source.height(),
                resized.width(),
                resized.height()
            );
            Self::encode(&resized, &request)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("缩放任务异常退出: {e}")))?
    }

    async fn read_metadata(&self, bytes: &[u8]) -> PipelineResult<ImageMetadata> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::codec(format!("无法识别图片格式: {e}")))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| PipelineError::codec(format!("读取图片尺寸失败: {e}")))?;

        Ok(ImageMetadata {
            width,
            height,
            size: bytes.len() as u64,
        })
    }
}
