use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use imagebatch_domain::{Batch, BatchStatus, BatchType, PipelineError, PipelineResult};
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::context::PipelineContext;
use crate::feed_processor::{FeedOutcome, FeedProcessor};
use crate::run::BatchRun;
use crate::tracker::{log_joined, BatchTracker};

/// 批次协调器
///
/// 创建批次记录、加载Feed分区并以有界并发处理每个Feed。
/// 所有Feed完成后批次恰好结束一次。
#[derive(Clone)]
pub struct BatchCoordinator {
    ctx: Arc<PipelineContext>,
    tracker: Arc<BatchTracker>,
}

impl BatchCoordinator {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            tracker: Arc::new(BatchTracker::new()),
        }
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    /// 创建一条Pending批次记录
    #[instrument(skip(self))]
    pub async fn initiate(&self, schedule_id: Option<String>) -> PipelineResult<Batch> {
        let batch = self
            .ctx
            .batches
            .add_task(BatchType::ProcessImages, schedule_id, BatchStatus::Pending)
            .await?;
        info!(batch_id = batch.id, "创建图片处理批次");
        Ok(batch)
    }

    /// 创建批次后立即返回，处理在后台任务中进行
    ///
    /// 后台任务由协调器跟踪，关闭时通过 [`BatchCoordinator::drain`] 收尾。
    pub async fn start(
        &self,
        schedule_id: Option<String>,
        start_row: i64,
        end_row: i64,
    ) -> PipelineResult<Batch> {
        let batch = self.initiate(schedule_id).await?;
        let run = self.tracker.register(&self.ctx, batch.clone());
        let coordinator = self.clone();
        self.tracker
            .spawn(async move { coordinator.execute(run, start_row, end_row).await })
            .await;
        Ok(batch)
    }

    /// 尚未结束的批次数量
    pub fn running(&self) -> usize {
        self.tracker.running()
    }

    /// 等待后台批次结束
    ///
    /// 超时仍未结束的批次写入Error终态（[`PipelineError::Interrupted`]）后中止。
    /// 返回所有批次的终态。
    pub async fn drain(&self, timeout: Duration) -> Vec<Batch> {
        let mut tasks = self.tracker.take_tasks().await;
        let deadline = Instant::now() + timeout;
        let mut finished = Vec::new();

        loop {
            let next = tokio::time::timeout_at(deadline, tasks.join_next()).await;
            match next {
                Ok(Some(joined)) => finished.extend(log_joined(joined)),
                Ok(None) => break,
                Err(_) => {
                    warn!(remaining = tasks.len(), "等待批次结束超时");
                    break;
                }
            }
        }

        for run in self.tracker.take_runs() {
            warn!(batch_id = run.batch_id(), "服务关闭，中断未完成的批次");
            finished.push(run.fail(&self.ctx, PipelineError::Interrupted).await);
        }
        tasks.abort_all();
        finished
    }

    /// 创建批次并等待处理结束
    pub async fn run_to_completion(
        &self,
        schedule_id: Option<String>,
        start_row: i64,
        end_row: i64,
    ) -> PipelineResult<Batch> {
        let batch = self.initiate(schedule_id).await?;
        Ok(self.process(batch, start_row, end_row).await)
    }

    /// 处理一个已创建的批次，返回终态
    pub async fn process(&self, batch: Batch, start_row: i64, end_row: i64) -> Batch {
        let run = self.tracker.register(&self.ctx, batch);
        self.execute(run, start_row, end_row).await
    }

    async fn execute(&self, run: Arc<BatchRun>, start_row: i64, end_row: i64) -> Batch {
        let batch = self.run_feeds(&run, start_row, end_row).await;
        self.tracker.deregister(batch.id);
        batch
    }

    #[instrument(skip(self, run), fields(batch_id = run.batch_id()))]
    async fn run_feeds(&self, run: &Arc<BatchRun>, start_row: i64, end_row: i64) -> Batch {
        let feeds = match self.ctx.feeds.get_active_partition(start_row, end_row).await {
            Ok(feeds) => feeds,
            Err(e) => {
                error!("加载Feed分区 [{start_row}, {end_row}) 失败: {e}");
                return run.fail(&self.ctx, PipelineError::feed_load(e.to_string())).await;
            }
        };
        if feeds.is_empty() {
            warn!("Feed分区 [{start_row}, {end_row}) 为空");
            return run.fail(&self.ctx, PipelineError::NoFeeds).await;
        }

        let feed_count = feeds.len();
        let max_feeds = self.ctx.settings.max_concurrent_feeds;
        run.begin_processing(&self.ctx, feed_count).await;
        info!("开始并发处理 {} 个Feed (并发限制: {})", feed_count, max_feeds);

        let processor = FeedProcessor::new(self.ctx.clone(), run.clone());
        let outcomes: Vec<FeedOutcome> = stream::iter(feeds)
            .map(|feed| {
                let processor = &processor;
                async move { processor.process(feed).await }
            })
            .buffer_unordered(max_feeds)
            .collect()
            .await;

        let failed = outcomes.iter().filter(|o| o.is_error()).count();
        let posts: usize = outcomes.iter().map(|o| o.posts_total).sum();
        info!(
            "Feed处理完成: {} 个Feed ({} 个出错), {} 个Post",
            outcomes.len(),
            failed,
            posts
        );

        if !run.progress.is_finalized() {
            warn!(
                pending = run.progress.pending(),
                "Feed计数未归零，强制结束批次"
            );
        }
        run.finalize(&self.ctx).await
    }
}
