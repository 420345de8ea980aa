//! Test data builders for creating test entities
//!
//! This module provides builder patterns for creating test data with
//! sensible defaults and easy customization.

use chrono::Utc;
use imagebatch_domain::entities::{
    Feed, FitMode, Image, ImageGenerationSpec, Post, POST_MAIN_IMAGE_INDEX,
};

/// Builder for creating test Feed entities
pub struct FeedBuilder {
    feed: Feed,
}

impl FeedBuilder {
    pub fn new() -> Self {
        Self {
            feed: Feed {
                id: 1,
                provider: "test_provider".to_string(),
                source_tag: None,
                active: true,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.feed.id = id;
        self
    }

    pub fn with_provider(mut self, provider: &str) -> Self {
        self.feed.provider = provider.to_string();
        self
    }

    pub fn with_source_tag(mut self, tag: &str) -> Self {
        self.feed.source_tag = Some(tag.to_string());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.feed.active = false;
        self
    }

    pub fn build(self) -> Feed {
        self.feed
    }
}

impl Default for FeedBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Post entities
pub struct PostBuilder {
    post: Post,
}

impl PostBuilder {
    pub fn new() -> Self {
        Self {
            post: Post {
                id: 1,
                feed_id: 1,
                title: "test_post".to_string(),
                has_post_main_image: true,
                has_extracted_main_image: false,
                images_processed: false,
                has_resized_images: false,
                resize_failures: 0,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.post.id = id;
        self
    }

    pub fn with_feed_id(mut self, feed_id: i64) -> Self {
        self.post.feed_id = feed_id;
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.post.title = title.to_string();
        self
    }

    pub fn with_post_main_image(mut self, value: bool) -> Self {
        self.post.has_post_main_image = value;
        self
    }

    pub fn with_extracted_main_image(mut self, value: bool) -> Self {
        self.post.has_extracted_main_image = value;
        self
    }

    /// Post with neither main image flag set
    pub fn without_images(mut self) -> Self {
        self.post.has_post_main_image = false;
        self.post.has_extracted_main_image = false;
        self
    }

    pub fn build(self) -> Post {
        self.post
    }
}

impl Default for PostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating source Image records
pub struct ImageBuilder {
    image: Image,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            image: Image {
                id: 1,
                post_id: 1,
                index: POST_MAIN_IMAGE_INDEX,
                width: 1200,
                height: 800,
                extension: "jpg".to_string(),
                image_type: "pm".to_string(),
                source_extension: None,
                use_for_main_image: true,
                fit_mode: None,
                cropped: false,
                quality: None,
                file_size: Some(4096),
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.image.id = id;
        self
    }

    pub fn with_post_id(mut self, post_id: i64) -> Self {
        self.image.post_id = post_id;
        self
    }

    pub fn with_index(mut self, index: i32) -> Self {
        self.image.index = index;
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.image.width = width;
        self.image.height = height;
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.image.extension = extension.to_string();
        self
    }

    pub fn with_image_type(mut self, image_type: &str) -> Self {
        self.image.image_type = image_type.to_string();
        self
    }

    pub fn build(self) -> Image {
        self.image
    }
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating ImageGenerationSpec entities
pub struct ImageGenerationSpecBuilder {
    spec: ImageGenerationSpec,
}

impl ImageGenerationSpecBuilder {
    pub fn new() -> Self {
        Self {
            spec: ImageGenerationSpec {
                id: 1,
                width: 320,
                height: 240,
                fit_mode: FitMode::Min,
                crop: true,
                quality: 80,
                ext_dest: "jpg".to_string(),
                use_for_main_image: false,
                active: true,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.spec.id = id;
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.spec.width = width;
        self.spec.height = height;
        self
    }

    pub fn with_fit_mode(mut self, fit_mode: FitMode) -> Self {
        self.spec.fit_mode = fit_mode;
        self
    }

    pub fn with_crop(mut self, crop: bool) -> Self {
        self.spec.crop = crop;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.spec.quality = quality;
        self
    }

    pub fn with_ext_dest(mut self, ext: &str) -> Self {
        self.spec.ext_dest = ext.to_string();
        self
    }

    pub fn for_main_image(mut self) -> Self {
        self.spec.use_for_main_image = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.spec.active = false;
        self
    }

    pub fn build(self) -> ImageGenerationSpec {
        self.spec
    }
}

impl Default for ImageGenerationSpecBuilder {
    fn default() -> Self {
        Self::new()
    }
}
