//! Shared setup for pipeline integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use imagebatch_domain::{
    Image, ImageGenerationSpec, Post, EXTRACTED_MAIN_IMAGE_INDEX, POST_MAIN_IMAGE_INDEX,
};
use imagebatch_pipeline::{BatchCoordinator, PipelineContext, PipelineSettings};
use imagebatch_testing_utils::{
    FeedBuilder, ImageBuilder, ImageGenerationSpecBuilder, MockBatchRepository,
    MockFeedRepository, MockImageCodec, MockImageGenerationRepository, MockImageRepository,
    MockImageStorage, MockPostRepository, MockStatsSink, PostBuilder,
};

/// Pipeline wired to in-memory mocks
pub struct TestPipeline {
    pub feeds: MockFeedRepository,
    pub posts: MockPostRepository,
    pub images: MockImageRepository,
    pub generations: MockImageGenerationRepository,
    pub batches: MockBatchRepository,
    pub storage: MockImageStorage,
    pub codec: MockImageCodec,
    pub stats: MockStatsSink,
    pub settings: PipelineSettings,
}

impl TestPipeline {
    pub fn new() -> Self {
        Self {
            feeds: MockFeedRepository::new(),
            posts: MockPostRepository::new(),
            images: MockImageRepository::new(),
            generations: MockImageGenerationRepository::new(),
            batches: MockBatchRepository::new(),
            storage: MockImageStorage::new(),
            codec: MockImageCodec::new(),
            stats: MockStatsSink::new(),
            settings: PipelineSettings {
                max_concurrent_feeds: 15,
                max_concurrent_posts: 20,
                conversion_timeout: Some(Duration::from_secs(5)),
            },
        }
    }

    pub fn with_specs(self, specs: Vec<ImageGenerationSpec>) -> Self {
        Self {
            generations: MockImageGenerationRepository::with_specs(specs),
            ..self
        }
    }

    /// Two active specs: 320x240 crop jpg and 640x480 max png
    pub fn with_default_specs(self) -> Self {
        self.with_specs(vec![
            ImageGenerationSpecBuilder::new()
                .with_id(1)
                .with_dimensions(320, 240)
                .build(),
            ImageGenerationSpecBuilder::new()
                .with_id(2)
                .with_dimensions(640, 480)
                .with_fit_mode(imagebatch_domain::FitMode::Max)
                .with_crop(false)
                .with_ext_dest("png")
                .build(),
        ])
    }

    pub fn context(&self) -> Arc<PipelineContext> {
        Arc::new(PipelineContext {
            feeds: Arc::new(self.feeds.clone()),
            posts: Arc::new(self.posts.clone()),
            images: Arc::new(self.images.clone()),
            generations: Arc::new(self.generations.clone()),
            batches: Arc::new(self.batches.clone()),
            storage: Arc::new(self.storage.clone()),
            codec: Arc::new(self.codec.clone()),
            stats_sink: Arc::new(self.stats.clone()),
            settings: self.settings,
        })
    }

    pub fn coordinator(&self) -> BatchCoordinator {
        BatchCoordinator::new(self.context())
    }

    pub fn add_feed(&self, feed_id: i64) {
        self.feeds.add_feed(
            FeedBuilder::new()
                .with_id(feed_id)
                .with_provider(&format!("provider-{feed_id}"))
                .build(),
        );
    }

    /// A post whose main image record and bytes exist
    pub fn add_post_with_image(&self, feed_id: i64, post_id: i64) -> Post {
        let post = PostBuilder::new()
            .with_id(post_id)
            .with_feed_id(feed_id)
            .build();
        self.add_source(feed_id, post_id, POST_MAIN_IMAGE_INDEX);
        self.posts.add_post(post.clone());
        post
    }

    /// A post using the extracted main image slot
    pub fn add_post_with_extracted_image(&self, feed_id: i64, post_id: i64) -> Post {
        let post = PostBuilder::new()
            .with_id(post_id)
            .with_feed_id(feed_id)
            .with_post_main_image(false)
            .with_extracted_main_image(true)
            .build();
        self.add_source(feed_id, post_id, EXTRACTED_MAIN_IMAGE_INDEX);
        self.posts.add_post(post.clone());
        post
    }

    /// A post flagged with a main image that has no image record
    pub fn add_post_missing_image(&self, feed_id: i64, post_id: i64) -> Post {
        let post = PostBuilder::new()
            .with_id(post_id)
            .with_feed_id(feed_id)
            .build();
        self.posts.add_post(post.clone());
        post
    }

    pub fn add_post_without_images(&self, feed_id: i64, post_id: i64) -> Post {
        let post = PostBuilder::new()
            .with_id(post_id)
            .with_feed_id(feed_id)
            .without_images()
            .build();
        self.posts.add_post(post.clone());
        post
    }

    fn add_source(&self, feed_id: i64, post_id: i64, index: i32) -> Image {
        let image = ImageBuilder::new()
            .with_id(post_id * 10 + index as i64)
            .with_post_id(post_id)
            .with_index(index)
            .with_image_type(if index == POST_MAIN_IMAGE_INDEX { "pm" } else { "ex" })
            .build();
        self.images.add_image(image.clone());
        self.storage.put_source(feed_id, &image);
        image
    }
}
