mod common;

use std::sync::Arc;

use common::TestPipeline;
use imagebatch_domain::{ImageLocation, PipelineError, RENDITION_IMAGE_INDEX};
use imagebatch_pipeline::{ConversionStatsAggregator, ImageConversionStage};
use imagebatch_testing_utils::{FeedBuilder, ImageBuilder, ImageGenerationSpecBuilder, PostBuilder};

#[tokio::test]
async fn test_conversion_writes_rendition() {
    let pipeline = TestPipeline::new();
    let feed = FeedBuilder::new().with_id(3).build();
    let post = PostBuilder::new().with_id(42).with_feed_id(3).build();
    let source = ImageBuilder::new().with_post_id(42).build();
    pipeline.storage.put_source(feed.id, &source);

    let spec = ImageGenerationSpecBuilder::new()
        .with_id(9)
        .with_dimensions(200, 100)
        .with_quality(70)
        .for_main_image()
        .build();

    let stats = Arc::new(ConversionStatsAggregator::image_conversions());
    let stage = ImageConversionStage::new(pipeline.context(), stats.clone());
    let image = stage.convert(&feed, &post, &source, &spec).await.unwrap();

    assert_eq!(image.index, RENDITION_IMAGE_INDEX);
    assert_eq!((image.width, image.height), (200, 100));
    assert_eq!(image.image_type, "pmr");
    assert_eq!(image.quality, Some(70));
    assert!(image.use_for_main_image);
    assert!(image.cropped);

    let target = ImageLocation::new(3, 42, RENDITION_IMAGE_INDEX, 200, 100, "jpg");
    assert_eq!(pipeline.storage.get(&target).unwrap(), b"200x100.jpg".to_vec());
    assert_eq!(stats.success_count(), 1);
    assert_eq!(stats.success_bytes(), image.file_size.unwrap() as u64);
}

#[tokio::test]
async fn test_conversion_is_repeatable() {
    let pipeline = TestPipeline::new();
    let feed = FeedBuilder::new().build();
    let post = PostBuilder::new().build();
    let source = ImageBuilder::new().build();
    pipeline.storage.put_source(feed.id, &source);
    let spec = ImageGenerationSpecBuilder::new().with_ext_dest("webp").build();

    let stats = Arc::new(ConversionStatsAggregator::image_conversions());
    let stage = ImageConversionStage::new(pipeline.context(), stats);
    let first = stage.convert(&feed, &post, &source, &spec).await.unwrap();
    let second = stage.convert(&feed, &post, &source, &spec).await.unwrap();

    assert_eq!((first.width, first.height), (second.width, second.height));
    assert_eq!(first.extension, second.extension);
    assert_eq!(first.file_size, second.file_size);
}

#[tokio::test]
async fn test_missing_source_bytes_is_conversion_error() {
    let pipeline = TestPipeline::new();
    let feed = FeedBuilder::new().build();
    let post = PostBuilder::new().build();
    let source = ImageBuilder::new().build();
    let spec = ImageGenerationSpecBuilder::new().with_id(5).build();

    let stats = Arc::new(ConversionStatsAggregator::image_conversions());
    let stage = ImageConversionStage::new(pipeline.context(), stats.clone());
    let err = stage
        .convert(&feed, &post, &source, &spec)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Conversion { spec_id: 5, .. }));
    assert_eq!(stats.error_count(), 1);
    assert_eq!(pipeline.images.rendition_count(), 0);
}

#[tokio::test]
async fn test_unsupported_destination_format() {
    let pipeline = TestPipeline::new();
    let feed = FeedBuilder::new().build();
    let post = PostBuilder::new().build();
    let source = ImageBuilder::new().build();
    pipeline.storage.put_source(feed.id, &source);
    let spec = ImageGenerationSpecBuilder::new().with_ext_dest("tiff").build();

    let stats = Arc::new(ConversionStatsAggregator::image_conversions());
    let stage = ImageConversionStage::new(pipeline.context(), stats.clone());
    assert!(stage.convert(&feed, &post, &source, &spec).await.is_err());
    assert_eq!(pipeline.codec.resize_calls(), 0);
    assert_eq!(stats.error_count(), 1);
}
