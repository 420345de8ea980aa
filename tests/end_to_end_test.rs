//! End-to-end batch run against SQLite, the filesystem store and the real codec

use std::io::Cursor;
use std::path::Path;

use imagebatch::app::Application;
use imagebatch_core::AppConfig;
use imagebatch_domain::{
    BatchItemStatus, BatchRepository, BatchStatus, FitMode, ImageLocation, ImageRepository,
    ImageStorage, POST_MAIN_IMAGE_INDEX, RENDITION_IMAGE_INDEX,
};
use imagebatch_infrastructure::FileImageStorage;
use imagebatch_pipeline::IMAGE_CONVERSIONS_STAT;
use imagebatch_testing_utils::{
    FeedBuilder, ImageBuilder, ImageGenerationSpecBuilder, PostBuilder,
};

fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = format!("sqlite://{}", dir.join("imagebatch.db").display());
    config.storage.root_dir = dir.join("images").display().to_string();
    config.observability.metrics_enabled = false;
    config
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Seeds one active feed with one post whose main image is a 400x300 PNG
async fn seed(app: &Application, storage: &FileImageStorage) -> (i64, i64) {
    let db = app.database();

    let feed = db
        .feed_repository()
        .create(&FeedBuilder::new().with_provider("acme").build())
        .await
        .unwrap();
    let post = db
        .post_repository()
        .create(&PostBuilder::new().with_feed_id(feed.id).build())
        .await
        .unwrap();
    let source = db
        .image_repository()
        .create(
            &ImageBuilder::new()
                .with_post_id(post.id)
                .with_index(POST_MAIN_IMAGE_INDEX)
                .with_dimensions(400, 300)
                .with_extension("png")
                .build(),
        )
        .await
        .unwrap();
    storage
        .write_image_bytes(
            &ImageLocation::new(feed.id, post.id, source.index, 400, 300, "png"),
            &png_bytes(400, 300),
        )
        .await
        .unwrap();

    let generations = db.image_generation_repository();
    generations
        .create(
            &ImageGenerationSpecBuilder::new()
                .with_dimensions(200, 150)
                .with_ext_dest("jpg")
                .build(),
        )
        .await
        .unwrap();
    generations
        .create(
            &ImageGenerationSpecBuilder::new()
                .with_dimensions(100, 100)
                .with_fit_mode(FitMode::Max)
                .with_crop(false)
                .with_ext_dest("png")
                .build(),
        )
        .await
        .unwrap();

    (feed.id, post.id)
}

#[tokio::test]
async fn test_batch_run_produces_renditions() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let storage = FileImageStorage::new(&config.storage.root_dir);
    let app = Application::with_metrics(config, None).await.unwrap();
    let (feed_id, post_id) = seed(&app, &storage).await;

    let batch = app
        .run_batch(Some("nightly".to_string()), 0, 10)
        .await
        .unwrap();

    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!(batch.pending_items, 0);
    assert!(batch.error.is_none());

    let db = app.database();
    let stored = db.batch_repository().get_by_id(batch.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BatchStatus::Completed);
    assert!(stored.completed_at.is_some());

    let items = db.batch_repository().list_items(batch.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].feed_id, feed_id);
    assert_eq!(items[0].status, BatchItemStatus::Completed);

    let post = db.post_repository().get_by_id(post_id).await.unwrap().unwrap();
    assert!(post.images_processed);
    assert!(post.has_resized_images);
    assert_eq!(post.resize_failures, 0);

    let renditions: Vec<_> = db
        .image_repository()
        .list_for_post(post_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|i| i.index == RENDITION_IMAGE_INDEX)
        .collect();
    assert_eq!(renditions.len(), 2);
    assert!(renditions.iter().all(|r| r.image_type == "pmr"));

    let cropped = storage.path_for(&ImageLocation::new(
        feed_id,
        post_id,
        RENDITION_IMAGE_INDEX,
        200,
        150,
        "jpg",
    ));
    let bytes = std::fs::read(&cropped).unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (200, 150));

    let stats = db
        .stats_repository()
        .list_by_name(IMAGE_CONVERSIONS_STAT)
        .await
        .unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].success_count, 2);
    assert_eq!(stats[0].error_count, 0);

    app.close().await;
}

#[tokio::test]
async fn test_second_run_skips_processed_posts() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let storage = FileImageStorage::new(&config.storage.root_dir);
    let app = Application::with_metrics(config, None).await.unwrap();
    let (_, post_id) = seed(&app, &storage).await;

    app.run_batch(None, 0, 10).await.unwrap();
    let second = app.run_batch(None, 0, 10).await.unwrap();

    assert_eq!(second.status, BatchStatus::Completed);
    let renditions = app
        .database()
        .image_repository()
        .list_for_post(post_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|i| i.is_rendition())
        .count();
    assert_eq!(renditions, 2);

    app.close().await;
}

#[tokio::test]
async fn test_empty_partition_marks_batch_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = Application::with_metrics(test_config(dir.path()), None)
        .await
        .unwrap();

    let batch = app.run_batch(None, 0, 0).await.unwrap();

    assert_eq!(batch.status, BatchStatus::Error);
    assert_eq!(batch.error.as_deref(), Some("No Feeds"));
    let stored = app
        .database()
        .batch_repository()
        .get_by_id(batch.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, BatchStatus::Error);

    app.close().await;
}
