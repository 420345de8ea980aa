//! 外部能力端口：图片字节存储、图片编解码、统计存储

use async_trait::async_trait;
use imagebatch_errors::PipelineResult;

use crate::entities::{ImageMetadata, ResizeRequest, StatSnapshot};

/// 一张图片在存储中的位置
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageLocation {
    pub feed_id: i64,
    pub post_id: i64,
    pub index: i32,
    pub width: u32,
    pub height: u32,
    pub extension: String,
}

impl ImageLocation {
    pub fn new(
        feed_id: i64,
        post_id: i64,
        index: i32,
        width: u32,
        height: u32,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            feed_id,
            post_id,
            index,
            width,
            height,
            extension: extension.into(),
        }
    }

    /// 相对存储路径：`{feed}/{post}/{index}_{w}x{h}.{ext}`
    pub fn relative_path(&self) -> String {
        format!(
            "{}/{}/{}_{}x{}.{}",
            self.feed_id,
            self.post_id,
            self.index,
            self.width,
            self.height,
            self.extension.trim_start_matches('.')
        )
    }
}

/// 图片字节存储
#[async_trait]
pub trait ImageStorage: Send + Sync {
    async fn read_image_bytes(&self, location: &ImageLocation) -> PipelineResult<Vec<u8>>;

    async fn write_image_bytes(&self, location: &ImageLocation, bytes: &[u8])
        -> PipelineResult<()>;
}

/// 图片编解码能力
///
/// 实现可能是CPU密集型的，调用方假定它们不会阻塞异步运行时。
#[async_trait]
pub trait ImageCodec: Send + Sync {
    async fn resize(&self, bytes: Vec<u8>, request: ResizeRequest) -> PipelineResult<Vec<u8>>;

    async fn read_metadata(&self, bytes: &[u8]) -> PipelineResult<ImageMetadata>;
}

/// 统计快照的外部存储
#[async_trait]
pub trait StatsSink: Send + Sync {
    async fn flush(&self, snapshot: &StatSnapshot) -> PipelineResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path() {
        let location = ImageLocation::new(3, 42, 99, 640, 480, ".jpg");
        assert_eq!(location.relative_path(), "3/42/99_640x480.jpg");
    }
}
