use std::sync::Arc;
use std::time::Duration;

use imagebatch_core::PipelineConfig;
use imagebatch_domain::{
    BatchRepository, FeedRepository, ImageCodec, ImageGenerationRepository, ImageRepository,
    ImageStorage, PostRepository, StatsSink,
};

/// 并发与超时设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub max_concurrent_feeds: usize,
    pub max_concurrent_posts: usize,
    /// 单次衍生图转换的超时，`None` 表示不限制
    pub conversion_timeout: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_concurrent_feeds: config.max_concurrent_feeds.max(1),
            max_concurrent_posts: config.max_concurrent_posts.max(1),
            conversion_timeout: config.conversion_timeout(),
        }
    }
}

/// 流水线依赖的全部协作者
///
/// 由应用装配层创建一次，在所有批次运行之间共享。
#[derive(Clone)]
pub struct PipelineContext {
    pub feeds: Arc<dyn FeedRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub images: Arc<dyn ImageRepository>,
    pub generations: Arc<dyn ImageGenerationRepository>,
    pub batches: Arc<dyn BatchRepository>,
    pub storage: Arc<dyn ImageStorage>,
    pub codec: Arc<dyn ImageCodec>,
    pub stats_sink: Arc<dyn StatsSink>,
    pub settings: PipelineSettings,
}
