//! 数据仓储层接口定义
//!
//! 流水线只通过这些trait访问持久化记录，具体实现位于infrastructure crate
//! （SQLite），测试使用testing-utils中的内存实现。
//!
//! - `FeedRepository` - 按行区间读取活跃Feed分区
//! - `PostRepository` - 查询待处理Post并回写处理结果
//! - `ImageRepository` - 源图查找与衍生图记录写入
//! - `ImageGenerationRepository` - 衍生图生成规格目录
//! - `BatchRepository` - Batch/BatchItem 生命周期
//!
//! 所有接口要求 `Send + Sync`，以便在并发任务之间通过 `Arc<dyn ...>` 共享。

use async_trait::async_trait;
use imagebatch_errors::PipelineResult;

use crate::entities::{
    Batch, BatchItem, BatchStatus, BatchType, Feed, Image, ImageGenerationSpec, Post,
};

/// Feed仓储接口
#[async_trait]
pub trait FeedRepository: Send + Sync {
    /// 获取活跃Feed在 `[start_row, end_row)` 区间内的分区
    ///
    /// 行号基于活跃Feed按ID排序后的位置。`end_row <= start_row` 时返回空列表。
    async fn get_active_partition(&self, start_row: i64, end_row: i64)
        -> PipelineResult<Vec<Feed>>;
}

/// Post仓储接口
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// 查询某个Feed下尚未被指定批次类型处理过的Post
    async fn find_by_status(&self, feed_id: i64, batch_type: BatchType)
        -> PipelineResult<Vec<Post>>;

    /// 回写Post（处理标记与失败计数）
    async fn update_one(&self, post: &Post) -> PipelineResult<()>;
}

/// 图片记录仓储接口
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// 按 (post_id, index) 查找图片记录，未找到返回 `None`
    async fn find_one(&self, post_id: i64, index: i32) -> PipelineResult<Option<Image>>;

    /// 写入一条图片记录，返回带有生成ID的记录
    async fn create(&self, image: &Image) -> PipelineResult<Image>;
}

/// 衍生图生成规格仓储接口
#[async_trait]
pub trait ImageGenerationRepository: Send + Sync {
    /// 返回所有 `active = true` 的规格，按目录顺序（ID升序）
    async fn find_active(&self) -> PipelineResult<Vec<ImageGenerationSpec>>;
}

/// 批次仓储接口
///
/// 负责Batch与BatchItem的生命周期：
///
/// 1. `add_task` 创建Pending批次
/// 2. `update_status` 写入Processing状态与待完成数量
/// 3. 每个Feed调用 `add_item` 创建条目，结束时调用 `complete_batch_item`
/// 4. `complete_task` 写入终态
///
/// `complete_batch_item` 必须原子地递减批次的 `pending_items` 并返回剩余数量，
/// 多个Feed任务会并发调用它。
#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// 创建新批次，返回带有生成ID的记录
    async fn add_task(
        &self,
        batch_type: BatchType,
        schedule_id: Option<String>,
        status: BatchStatus,
    ) -> PipelineResult<Batch>;

    /// 持久化批次的状态与 `pending_items`
    async fn update_status(&self, batch: &Batch) -> PipelineResult<()>;

    /// 为Feed创建一条Processing状态的批次条目
    async fn add_item(&self, batch_id: i64, feed_id: i64) -> PipelineResult<BatchItem>;

    /// 写入条目终态并原子递减批次待完成数量，返回递减后的剩余数量
    async fn complete_batch_item(&self, item: &BatchItem) -> PipelineResult<i64>;

    /// 写入批次终态（Completed 或 Error）
    ///
    /// 不写 `pending_items`，该计数只由 `complete_batch_item` 递减。
    async fn complete_task(&self, batch: &Batch) -> PipelineResult<()>;

    async fn get_by_id(&self, batch_id: i64) -> PipelineResult<Option<Batch>>;

    async fn list_items(&self, batch_id: i64) -> PipelineResult<Vec<BatchItem>>;
}
