use std::sync::Arc;

use imagebatch_domain::{Feed, Image, ImageGenerationSpec, PipelineError, PipelineResult, Post};
use tracing::{debug, error, instrument, warn};

use crate::context::PipelineContext;
use crate::conversion::ImageConversionStage;
use crate::run::BatchRun;

/// 单个Post的处理结果
#[derive(Debug)]
pub struct PostOutcome {
    pub post: Post,
    /// 没有源图标记、未尝试任何转换
    pub skipped: bool,
    pub renditions_created: u32,
    pub renditions_failed: u32,
    /// 第一个导致失败的错误
    pub error: Option<PipelineError>,
}

impl PostOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

enum PostState {
    Init,
    SourceResolved(Image),
    Converting {
        source: Image,
        specs: Arc<Vec<ImageGenerationSpec>>,
        next: usize,
    },
    Finalized,
}

/// Post级处理：定位源图，按目录顺序依次生成每个衍生图，最后回写一次Post
pub struct PostProcessor {
    ctx: Arc<PipelineContext>,
    run: Arc<BatchRun>,
    stage: ImageConversionStage,
}

impl PostProcessor {
    pub fn new(ctx: Arc<PipelineContext>, run: Arc<BatchRun>) -> Self {
        let stage = ImageConversionStage::new(ctx.clone(), run.conversion_stats.clone());
        Self { ctx, run, stage }
    }

    #[instrument(skip_all, fields(feed_id = feed.id, post_id = post.id))]
    pub async fn process(&self, feed: &Feed, post: Post) -> PostOutcome {
        let mut post = post;
        post.begin_image_processing();

        let mut outcome_error: Option<PipelineError> = None;
        let mut skipped = false;
        let mut created = 0u32;
        let mut failed = 0u32;
        let mut state = PostState::Init;

        loop {
            state = match state {
                PostState::Init => match post.source_image_index() {
                    None => {
                        debug!("Post没有主图，跳过转换");
                        skipped = true;
                        PostState::Finalized
                    }
                    Some(index) => match self.resolve_source(feed, &post, index).await {
                        Ok(source) => PostState::SourceResolved(source),
                        Err(e) => {
                            keep_first(&mut outcome_error, e);
                            PostState::Finalized
                        }
                    },
                },
                PostState::SourceResolved(source) => {
                    match self.run.catalog.active_specs().await {
                        Ok(specs) => PostState::Converting {
                            source,
                            specs,
                            next: 0,
                        },
                        Err(e) => {
                            warn!("无法加载图片生成规格: {e}");
                            keep_first(&mut outcome_error, e);
                            PostState::Finalized
                        }
                    }
                }
                PostState::Converting {
                    source,
                    specs,
                    next,
                } => match specs.get(next) {
                    None => PostState::Finalized,
                    Some(spec) => {
                        match self.stage.convert(feed, &post, &source, spec).await {
                            Ok(_) => {
                                post.has_resized_images = true;
                                created += 1;
                            }
                            Err(e) => {
                                post.resize_failures += 1;
                                failed += 1;
                                keep_first(&mut outcome_error, e);
                            }
                        }
                        PostState::Converting {
                            source,
                            specs,
                            next: next + 1,
                        }
                    }
                },
                PostState::Finalized => break,
            };
        }

        if let Err(e) = self.ctx.posts.update_one(&post).await {
            error!("回写Post失败: {e}");
            keep_first(&mut outcome_error, PipelineError::persistence(e.to_string()));
        }

        PostOutcome {
            post,
            skipped,
            renditions_created: created,
            renditions_failed: failed,
            error: outcome_error,
        }
    }

    async fn resolve_source(&self, feed: &Feed, post: &Post, index: i32) -> PipelineResult<Image> {
        match self.ctx.images.find_one(post.id, index).await {
            Ok(Some(image)) => Ok(image),
            Ok(None) => {
                let err = PipelineError::image_lookup(feed.display_name(), post.id, index);
                warn!("{err}");
                Err(err)
            }
            Err(e) => {
                let err = PipelineError::persistence(format!(
                    "查询源图失败: {} (post {}, index {index}) - {e}",
                    feed.display_name(),
                    post.id
                ));
                warn!("{err}");
                Err(err)
            }
        }
    }
}

fn keep_first(slot: &mut Option<PipelineError>, err: PipelineError) {
    if slot.is_none() {
        *slot = Some(err);
    }
}
