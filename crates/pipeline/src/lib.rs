//! 图片批处理流水线
//!
//! 批次 → Feed（有界并发）→ Post（每个Feed内有界并发）→ 生成规格（顺序）→ 转换。
//!
//! - [`BatchCoordinator`] 创建批次、加载Feed分区并在结束时写入终态
//! - [`FeedProcessor`] 维护单个Feed的 `BatchItem`
//! - [`PostProcessor`] 驱动单个Post的源图定位与衍生图生成
//! - [`ImageConversionStage`] 完成一次 (源图, 规格) 转换
//! - [`ConversionStatsAggregator`] 汇总本次运行的转换统计

pub mod catalog;
pub mod context;
pub mod conversion;
pub mod coordinator;
pub mod feed_processor;
pub mod post_processor;
pub mod run;
pub mod stats;
pub mod tracker;

pub use catalog::GenerationCatalog;
pub use context::{PipelineContext, PipelineSettings};
pub use conversion::ImageConversionStage;
pub use coordinator::BatchCoordinator;
pub use feed_processor::{FeedOutcome, FeedProcessor};
pub use post_processor::{PostOutcome, PostProcessor};
pub use run::{BatchProgress, BatchRun};
pub use stats::{
    ConversionStatsAggregator, IMAGE_CONVERSIONS_STAT, PROCESS_IMAGES_STAT, PROCESS_SCOPE,
};
pub use tracker::BatchTracker;
