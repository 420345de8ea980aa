mod common;

use std::time::Duration;

use common::TestPipeline;
use imagebatch_domain::{BatchItemStatus, BatchStatus, PipelineError};
use imagebatch_pipeline::{IMAGE_CONVERSIONS_STAT, PROCESS_IMAGES_STAT};
use imagebatch_testing_utils::TestEnv;

#[tokio::test]
async fn test_empty_partition_marks_batch_error() {
    let pipeline = TestPipeline::new().with_default_specs();
    pipeline.add_feed(1);

    let batch = pipeline
        .coordinator()
        .run_to_completion(Some("sched-1".to_string()), 0, 0)
        .await
        .unwrap();

    assert_eq!(batch.status, BatchStatus::Error);
    assert_eq!(batch.error.as_deref(), Some("No Feeds"));
    assert!(pipeline.batches.items_for(batch.id).is_empty());
    assert!(pipeline.posts.updates().is_empty());
    assert_eq!(pipeline.batches.task_completion_count(), 1);

    // 两个统计都会刷新，即使没有任何工作
    assert_eq!(pipeline.stats.snapshots_named(IMAGE_CONVERSIONS_STAT).len(), 1);
    assert_eq!(pipeline.stats.snapshots_named(PROCESS_IMAGES_STAT).len(), 1);

    let stored = pipeline.batches.batch(batch.id).unwrap();
    assert_eq!(stored.status, BatchStatus::Error);
    assert_eq!(stored.schedule_id.as_deref(), Some("sched-1"));
}

#[tokio::test]
async fn test_feed_load_failure_marks_batch_error() {
    let pipeline = TestPipeline::new().with_default_specs();
    pipeline.feeds.fail_with("connection refused");

    let batch = pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap();

    assert_eq!(batch.status, BatchStatus::Error);
    let message = batch.error.unwrap();
    assert!(message.contains("connection refused"), "{message}");
    assert_eq!(pipeline.batches.task_completion_count(), 1);
}

#[tokio::test]
async fn test_all_renditions_succeed() {
    let pipeline = TestPipeline::new().with_default_specs();
    pipeline.add_feed(1);
    pipeline.add_post_with_extracted_image(1, 100);

    let batch = pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap();

    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!(batch.error, None);

    let post = pipeline.posts.last_update(100).unwrap();
    assert!(post.images_processed);
    assert!(post.has_resized_images);
    assert_eq!(post.resize_failures, 0);
    assert_eq!(pipeline.posts.update_count(100), 1);

    let renditions = pipeline.images.renditions_for(100);
    assert_eq!(renditions.len(), 2);
    assert!(renditions.iter().all(|r| r.image_type == "exr"));
    assert!(renditions.iter().all(|r| r.source_extension.as_deref() == Some("jpg")));

    let items = pipeline.batches.items_for(batch.id);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, BatchItemStatus::Completed);
    assert_eq!(items[0].posts_total, 1);

    let conversions = pipeline.stats.snapshots_named(IMAGE_CONVERSIONS_STAT);
    assert_eq!(conversions.len(), 1);
    assert_eq!(conversions[0].success_count, 2);
    assert_eq!(conversions[0].error_count, 0);
    assert!(conversions[0].success_bytes > 0);

    let processed = pipeline.stats.snapshots_named(PROCESS_IMAGES_STAT);
    assert_eq!(processed[0].success_count, 1);
}

#[tokio::test]
async fn test_partial_conversion_failure() {
    let pipeline = TestPipeline::new().with_default_specs();
    pipeline.add_feed(1);
    pipeline.add_post_with_extracted_image(1, 100);
    pipeline.codec.fail_width(640);

    let batch = pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap();

    let post = pipeline.posts.last_update(100).unwrap();
    assert!(post.images_processed);
    assert!(post.has_resized_images);
    assert_eq!(post.resize_failures, 1);
    assert_eq!(pipeline.images.renditions_for(100).len(), 1);

    let conversions = pipeline.stats.snapshots_named(IMAGE_CONVERSIONS_STAT);
    assert_eq!(conversions[0].success_count, 1);
    assert_eq!(conversions[0].error_count, 1);

    let items = pipeline.batches.items_for(batch.id);
    assert_eq!(items[0].status, BatchItemStatus::Error);
    assert_eq!(items[0].posts_failed, 1);
    let message = items[0].error.clone().unwrap();
    assert!(message.contains("规格 2"), "{message}");
    assert!(items[0].stack.is_some());

    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!(batch.error.as_deref(), Some(message.as_str()));
}

#[tokio::test]
async fn test_post_without_images_is_skipped() {
    let pipeline = TestPipeline::new().with_default_specs();
    pipeline.add_feed(1);
    pipeline.add_post_without_images(1, 100);

    let batch = pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap();

    let post = pipeline.posts.last_update(100).unwrap();
    assert!(post.images_processed);
    assert!(!post.has_resized_images);
    assert_eq!(pipeline.images.probe().peak(), 0);
    assert_eq!(pipeline.codec.resize_calls(), 0);
    assert_eq!(pipeline.generations.load_count(), 0);

    let conversions = pipeline.stats.snapshots_named(IMAGE_CONVERSIONS_STAT);
    assert_eq!(conversions[0].total(), 0);
    let processed = pipeline.stats.snapshots_named(PROCESS_IMAGES_STAT);
    assert_eq!(processed[0].total(), 0);

    assert_eq!(
        pipeline.batches.items_for(batch.id)[0].status,
        BatchItemStatus::Completed
    );
}

#[tokio::test]
async fn test_missing_source_image_fails_only_that_post() {
    let pipeline = TestPipeline::new().with_default_specs();
    pipeline.add_feed(1);
    pipeline.add_post_missing_image(1, 100);
    pipeline.add_post_with_image(1, 101);
    pipeline.add_post_with_image(1, 102);

    let batch = pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap();

    let failed = pipeline.posts.last_update(100).unwrap();
    assert!(failed.images_processed);
    assert!(!failed.has_resized_images);

    for post_id in [101, 102] {
        let post = pipeline.posts.last_update(post_id).unwrap();
        assert!(post.has_resized_images);
        assert_eq!(pipeline.images.renditions_for(post_id).len(), 2);
    }

    let items = pipeline.batches.items_for(batch.id);
    assert_eq!(items[0].status, BatchItemStatus::Error);
    assert_eq!(items[0].posts_total, 3);
    assert_eq!(items[0].posts_failed, 1);
    let message = items[0].error.clone().unwrap();
    assert!(
        message.starts_with("Process Images - No Image record returned: provider-1"),
        "{message}"
    );

    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!(pipeline.batches.item_completion_count(items[0].id), 1);
}

#[tokio::test]
async fn test_source_lookup_error_keeps_repository_message() {
    let pipeline = TestPipeline::new().with_default_specs();
    pipeline.add_feed(1);
    pipeline.add_post_with_image(1, 100);
    pipeline.add_post_with_image(1, 101);
    pipeline.images.fail_lookup(100);

    let batch = pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap();

    assert_eq!(pipeline.images.renditions_for(100).len(), 0);
    assert_eq!(pipeline.images.renditions_for(101).len(), 2);

    let items = pipeline.batches.items_for(batch.id);
    assert_eq!(items[0].status, BatchItemStatus::Error);
    assert_eq!(items[0].posts_failed, 1);
    let message = items[0].error.clone().unwrap();
    assert!(message.contains("image lookup failed for post 100"), "{message}");
    assert!(!message.contains("No Image record returned"), "{message}");
    assert!(items[0].stack.as_deref().unwrap().contains("Persistence"));
}

#[tokio::test]
async fn test_post_query_failure_is_feed_scoped() {
    let pipeline = TestPipeline::new().with_default_specs();
    pipeline.add_feed(1);
    pipeline.add_feed(2);
    pipeline.add_post_with_image(1, 100);
    pipeline.add_post_with_image(2, 200);
    pipeline.posts.fail_feed(1);

    let batch = pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap();

    let items = pipeline.batches.items_for(batch.id);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].feed_id, 1);
    assert_eq!(items[0].status, BatchItemStatus::Error);
    assert_eq!(items[1].status, BatchItemStatus::Completed);

    assert!(pipeline.posts.last_update(100).is_none());
    assert!(pipeline.posts.last_update(200).unwrap().has_resized_images);

    assert_eq!(batch.status, BatchStatus::Completed);
    assert!(batch.error.unwrap().contains("Post查询失败"));
}

#[tokio::test]
async fn test_catalog_failure_is_fatal_only_to_post() {
    let mut pipeline = TestPipeline::new().with_default_specs();
    pipeline.settings.max_concurrent_posts = 1;
    pipeline.add_feed(1);
    pipeline.add_post_with_image(1, 100);
    pipeline.add_post_with_image(1, 101);
    pipeline.generations.fail_next_loads(1);

    let batch = pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap();

    let updates = pipeline.posts.updates();
    assert_eq!(updates.len(), 2);
    assert!(!updates[0].has_resized_images);
    assert!(updates[1].has_resized_images);
    assert_eq!(pipeline.generations.load_count(), 2);

    let item = &pipeline.batches.items_for(batch.id)[0];
    assert_eq!(item.posts_failed, 1);
    assert!(item.error.clone().unwrap().contains("图片生成规格加载失败"));
}

#[tokio::test]
async fn test_catalog_loaded_once_per_run() {
    let pipeline = TestPipeline::new().with_default_specs();
    for feed_id in 1..=3 {
        pipeline.add_feed(feed_id);
        for n in 0..5 {
            pipeline.add_post_with_image(feed_id, feed_id * 100 + n);
        }
    }

    pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap();
    assert_eq!(pipeline.generations.load_count(), 1);

    // 新的运行会重新加载目录
    pipeline.add_post_with_image(1, 199);
    pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap();
    assert_eq!(pipeline.generations.load_count(), 2);
}

#[tokio::test]
async fn test_post_update_failure_recorded() {
    let pipeline = TestPipeline::new().with_default_specs();
    pipeline.add_feed(1);
    pipeline.add_post_with_image(1, 100);
    pipeline.posts.fail_update(100);

    let batch = pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap();

    let item = &pipeline.batches.items_for(batch.id)[0];
    assert_eq!(item.status, BatchItemStatus::Error);
    assert!(item.error.clone().unwrap().contains("持久化失败"));
    assert_eq!(batch.status, BatchStatus::Completed);
}

#[tokio::test]
async fn test_batch_status_transitions() {
    let pipeline = TestPipeline::new().with_default_specs();
    pipeline.add_feed(1);
    pipeline.add_feed(2);
    pipeline.add_post_with_image(1, 100);

    let batch = pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap();

    assert_eq!(
        pipeline.batches.status_history(batch.id),
        vec![
            BatchStatus::Pending,
            BatchStatus::Processing,
            BatchStatus::Completed
        ]
    );
    assert_eq!(batch.pending_items, 0);
    let stored = pipeline.batches.batch(batch.id).unwrap();
    assert_eq!(stored.pending_items, 0);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_pending_items_reach_zero_when_feeds_fail() {
    let pipeline = TestPipeline::new().with_default_specs();
    for feed_id in 1..=3 {
        pipeline.add_feed(feed_id);
    }
    pipeline.add_post_with_image(1, 100);
    pipeline.add_post_missing_image(2, 200);
    pipeline.posts.fail_feed(3);

    let batch = pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap();

    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!(batch.pending_items, 0);
    assert!(batch.error.is_some());

    let stored = pipeline.batches.batch(batch.id).unwrap();
    assert_eq!(stored.status, BatchStatus::Completed);
    assert_eq!(stored.pending_items, 0);
}

#[tokio::test]
async fn test_start_returns_pending_batch() {
    let pipeline = TestPipeline::new().with_default_specs();
    pipeline.add_feed(1);
    pipeline.add_post_with_image(1, 100);

    let coordinator = pipeline.coordinator();
    let batch = coordinator
        .start(Some("nightly".to_string()), 0, 5)
        .await
        .unwrap();
    assert_eq!(batch.status, BatchStatus::Pending);
    assert_eq!(batch.schedule_id.as_deref(), Some("nightly"));

    let finished = coordinator.drain(Duration::from_secs(5)).await;
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].id, batch.id);
    assert_eq!(finished[0].status, BatchStatus::Completed);
    assert_eq!(coordinator.running(), 0);
}

#[tokio::test]
async fn test_drain_interrupts_running_batch() {
    let pipeline = TestPipeline::new().with_default_specs();
    pipeline.add_feed(1);
    pipeline.add_post_with_image(1, 100);
    pipeline.posts.set_delay(Duration::from_secs(30));

    let coordinator = pipeline.coordinator();
    let batch = coordinator.start(None, 0, 5).await.unwrap();

    let batches = pipeline.batches.clone();
    let processing = TestEnv::wait_for(
        || {
            let batches = batches.clone();
            async move {
                batches
                    .batch(batch.id)
                    .map(|b| b.status == BatchStatus::Processing)
                    .unwrap_or(false)
            }
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(processing);
    assert_eq!(coordinator.running(), 1);

    let finished = coordinator.drain(Duration::from_millis(50)).await;
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].status, BatchStatus::Error);

    let stored = pipeline.batches.batch(batch.id).unwrap();
    assert_eq!(stored.status, BatchStatus::Error);
    assert_eq!(
        stored.error.as_deref(),
        Some(PipelineError::Interrupted.to_string().as_str())
    );
    assert!(stored.completed_at.is_some());
    assert_eq!(coordinator.running(), 0);
}

#[tokio::test]
async fn test_initiate_failure_is_returned() {
    let pipeline = TestPipeline::new();
    pipeline.batches.fail_add_task();

    let err = pipeline
        .coordinator()
        .run_to_completion(None, 0, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Persistence(_)));
}
