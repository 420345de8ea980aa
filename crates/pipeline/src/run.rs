use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use imagebatch_domain::{Batch, PipelineError};
use tracing::{debug, error, info, warn};

use crate::catalog::GenerationCatalog;
use crate::context::PipelineContext;
use crate::stats::ConversionStatsAggregator;

/// 批次内Feed的完成进度
///
/// `pending` 在进入Processing时设为Feed数量，每个Feed结束时递减一次；
/// `finalized` 保证批次终态只写一次。
#[derive(Debug, Default)]
pub struct BatchProgress {
    pending: AtomicI64,
    last_error: Mutex<Option<String>>,
    finalized: AtomicBool,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, feed_count: usize) {
        self.pending.store(feed_count as i64, Ordering::SeqCst);
    }

    pub fn pending(&self) -> i64 {
        self.pending.load(Ordering::SeqCst)
    }

    /// 记录一个Feed结束，返回剩余数量
    pub fn item_finished(&self, error: Option<&str>) -> i64 {
        if let Some(message) = error {
            self.record_error(message);
        }
        self.pending.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn record_error(&self, message: &str) {
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(message.to_string());
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|last| last.clone())
    }

    /// 只有第一次调用返回true
    pub fn try_finalize(&self) -> bool {
        self.finalized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }
}

/// 一次批次运行的共享状态
pub struct BatchRun {
    batch: Mutex<Batch>,
    pub conversion_stats: Arc<ConversionStatsAggregator>,
    pub process_stats: Arc<ConversionStatsAggregator>,
    pub catalog: GenerationCatalog,
    pub progress: BatchProgress,
}

impl BatchRun {
    pub fn new(ctx: &PipelineContext, batch: Batch) -> Self {
        Self {
            batch: Mutex::new(batch),
            conversion_stats: Arc::new(ConversionStatsAggregator::image_conversions()),
            process_stats: Arc::new(ConversionStatsAggregator::process_images()),
            catalog: GenerationCatalog::new(ctx.generations.clone()),
            progress: BatchProgress::new(),
        }
    }

    pub fn batch_id(&self) -> i64 {
        self.batch().id
    }

    /// 当前批次状态的副本
    pub fn batch(&self) -> Batch {
        match self.batch.lock() {
            Ok(batch) => batch.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update_batch<F: FnOnce(&mut Batch)>(&self, f: F) -> Batch {
        let mut guard = match self.batch.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
        guard.clone()
    }

    /// 进入Processing状态并持久化待完成Feed数量
    pub async fn begin_processing(&self, ctx: &PipelineContext, feed_count: usize) -> Batch {
        self.progress.start(feed_count);
        let batch = self.update_batch(|b| b.mark_processing(feed_count as i64));
        if let Err(e) = ctx.batches.update_status(&batch).await {
            error!(batch_id = batch.id, "更新批次状态失败: {e}");
        }
        info!(batch_id = batch.id, feeds = feed_count, "批次开始处理");
        batch
    }

    /// 记录一个Feed结束，同步批次的剩余数量并返回它
    pub fn item_finished(&self, error: Option<&str>) -> i64 {
        let remaining = self.progress.item_finished(error);
        // 并发的Feed可能乱序到达，只允许计数变小
        self.update_batch(|b| b.pending_items = b.pending_items.min(remaining.max(0)));
        remaining
    }

    /// 所有Feed结束后写入Completed终态。重复调用只返回当前状态
    pub async fn finalize(&self, ctx: &PipelineContext) -> Batch {
        if !self.progress.try_finalize() {
            debug!(batch_id = self.batch_id(), "批次已经结束，跳过");
            return self.batch();
        }

        let last_error = self.progress.last_error();
        let pending = self.progress.pending().max(0);
        let batch = self.update_batch(|b| {
            b.pending_items = pending;
            b.mark_completed(last_error);
        });
        self.persist_terminal(ctx, &batch).await;
        info!(
            batch_id = batch.id,
            error = batch.error.as_deref().unwrap_or(""),
            "批次处理完成"
        );
        batch
    }

    /// 批次级失败（Feed加载失败、没有Feed）写入Error终态
    pub async fn fail(&self, ctx: &PipelineContext, err: PipelineError) -> Batch {
        if !self.progress.try_finalize() {
            warn!(batch_id = self.batch_id(), "批次已经结束，忽略失败: {err}");
            return self.batch();
        }

        let batch = self.update_batch(|b| b.mark_error(err.to_string()));
        self.persist_terminal(ctx, &batch).await;
        warn!(batch_id = batch.id, kind = err.kind(), "批次失败: {err}");
        batch
    }

    async fn persist_terminal(&self, ctx: &PipelineContext, batch: &Batch) {
        if let Err(e) = ctx.batches.complete_task(batch).await {
            error!(batch_id = batch.id, "写入批次终态失败: {e}");
        }
        for stats in [&self.conversion_stats, &self.process_stats] {
            if let Err(e) = stats.flush(ctx.stats_sink.as_ref()).await {
                error!(stat = stats.name(), "统计刷新失败: {e}");
            }
        }
    }
}
