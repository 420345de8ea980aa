use std::sync::Arc;

use futures::stream::{self, StreamExt};
use imagebatch_domain::{BatchItem, BatchItemStatus, Feed, PipelineError};
use tracing::{debug, error, info, instrument, warn};

use crate::context::PipelineContext;
use crate::post_processor::{PostOutcome, PostProcessor};
use crate::run::BatchRun;

/// 单个Feed的处理结果
#[derive(Debug)]
pub struct FeedOutcome {
    pub feed_id: i64,
    pub item: BatchItem,
    pub posts_total: usize,
    pub posts_failed: usize,
    /// 递减后批次剩余的Feed数量
    pub remaining: i64,
}

impl FeedOutcome {
    pub fn is_error(&self) -> bool {
        self.item.status == BatchItemStatus::Error
    }
}

/// Feed级处理：创建BatchItem，并发处理Post，结束时完成BatchItem并递减批次进度
pub struct FeedProcessor {
    ctx: Arc<PipelineContext>,
    run: Arc<BatchRun>,
    posts: PostProcessor,
}

impl FeedProcessor {
    pub fn new(ctx: Arc<PipelineContext>, run: Arc<BatchRun>) -> Self {
        let posts = PostProcessor::new(ctx.clone(), run.clone());
        Self { ctx, run, posts }
    }

    #[instrument(skip_all, fields(batch_id = self.run.batch_id(), feed_id = feed.id))]
    pub async fn process(&self, feed: Feed) -> FeedOutcome {
        let batch = self.run.batch();
        let mut item = match self.ctx.batches.add_item(batch.id, feed.id).await {
            Ok(item) => item,
            Err(e) => {
                error!("创建批次条目失败: {e}");
                BatchItem::new(batch.id, feed.id)
            }
        };

        match self.ctx.posts.find_by_status(feed.id, batch.batch_type).await {
            Err(e) => {
                let err = PipelineError::post_query(feed.id, e.to_string());
                warn!("{}: {err}", feed.display_name());
                item.record_error(err.to_string(), Some(err.debug_chain()));
            }
            Ok(posts) if posts.is_empty() => {
                debug!("Feed complete : {} 没有需要处理的Post", feed.display_name());
            }
            Ok(posts) => {
                item.posts_total = posts.len() as i64;
                let max_posts = self.ctx.settings.max_concurrent_posts;
                debug!(
                    "开始处理Feed {} 的 {} 个Post (并发限制: {})",
                    feed.display_name(),
                    posts.len(),
                    max_posts
                );

                let feed_ref = &feed;
                let outcomes: Vec<PostOutcome> = stream::iter(posts)
                    .map(|post| {
                        let processor = &self.posts;
                        async move { processor.process(feed_ref, post).await }
                    })
                    .buffer_unordered(max_posts)
                    .collect()
                    .await;

                for outcome in outcomes {
                    self.record_post(&mut item, outcome);
                }
            }
        }

        self.finish(feed, item).await
    }

    fn record_post(&self, item: &mut BatchItem, outcome: PostOutcome) {
        if !outcome.skipped {
            match outcome.error {
                None => self.run.process_stats.inc(0),
                Some(_) => self.run.process_stats.inc_err(),
            }
        }
        if let Some(err) = outcome.error {
            item.posts_failed += 1;
            item.record_error(err.to_string(), Some(err.debug_chain()));
        }
    }

    /// 完成BatchItem。条目按值传入，保证每个Feed只完成一次
    async fn finish(&self, feed: Feed, mut item: BatchItem) -> FeedOutcome {
        item.finish();

        match self.ctx.batches.complete_batch_item(&item).await {
            Ok(remaining) => debug!(remaining, "批次条目已完成"),
            Err(e) => error!("完成批次条目失败: {e}"),
        }

        let remaining = self.run.item_finished(item.error.as_deref());
        info!(
            "Feed {} 处理结束: 状态 {}, Post {} 个, 失败 {} 个, 剩余Feed {}",
            feed.display_name(),
            item.status.as_str(),
            item.posts_total,
            item.posts_failed,
            remaining
        );

        if remaining == 0 {
            self.run.finalize(&self.ctx).await;
        }

        FeedOutcome {
            feed_id: feed.id,
            posts_total: item.posts_total as usize,
            posts_failed: item.posts_failed as usize,
            item,
            remaining,
        }
    }
}
