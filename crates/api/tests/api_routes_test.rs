use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use imagebatch_core::ApiConfig;
use imagebatch_domain::BatchStatus;
use imagebatch_pipeline::{BatchCoordinator, PipelineContext, PipelineSettings};
use imagebatch_testing_utils::{
    FeedBuilder, MockBatchRepository, MockFeedRepository, MockImageCodec,
    MockImageGenerationRepository, MockImageRepository, MockImageStorage, MockPostRepository,
    MockStatsSink, TestEnv,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use imagebatch_api::{create_app, AppState};

struct TestApi {
    feeds: MockFeedRepository,
    posts: MockPostRepository,
    batches: MockBatchRepository,
    coordinator: BatchCoordinator,
    app: Router,
}

fn create_test_api() -> TestApi {
    let feeds = MockFeedRepository::new();
    let posts = MockPostRepository::new();
    let batches = MockBatchRepository::new();
    let ctx = Arc::new(PipelineContext {
        feeds: Arc::new(feeds.clone()),
        posts: Arc::new(posts.clone()),
        images: Arc::new(MockImageRepository::new()),
        generations: Arc::new(MockImageGenerationRepository::new()),
        batches: Arc::new(batches.clone()),
        storage: Arc::new(MockImageStorage::new()),
        codec: Arc::new(MockImageCodec::new()),
        stats_sink: Arc::new(MockStatsSink::new()),
        settings: PipelineSettings::default(),
    });
    let coordinator = BatchCoordinator::new(ctx);
    let state = AppState::new(coordinator.clone());
    let app = create_app(state, &ApiConfig::default());
    TestApi {
        feeds,
        posts,
        batches,
        coordinator,
        app,
    }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_check() {
    let api = create_test_api();
    let (status, body) = get(&api.app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "imagebatch");
    assert_eq!(body["running_batches"], 0);
}

#[tokio::test]
async fn test_process_images_responds_initiated_before_processing() {
    let api = create_test_api();
    api.feeds.add_feed(FeedBuilder::new().with_id(1).build());

    let (status, body) = get(&api.app, "/processimages/nightly/0/10").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Initiated");
    assert_eq!(body["batch"]["status"], "Pending");
    assert_eq!(body["batch"]["type"], "Process Images");
    assert_eq!(body["batch"]["schedule_id"], "nightly");

    let batch_id = body["batch"]["id"].as_i64().unwrap();
    let batches = api.batches.clone();
    let finished = TestEnv::wait_for(
        || {
            let batches = batches.clone();
            async move {
                batches
                    .batch(batch_id)
                    .map(|b| b.status.is_terminal())
                    .unwrap_or(false)
            }
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(finished);
    assert_eq!(
        api.batches.batch(batch_id).unwrap().status,
        BatchStatus::Completed
    );
}

#[tokio::test]
async fn test_process_images_coerces_null_schedule_id() {
    let api = create_test_api();

    for raw in ["null", "undefined"] {
        let (status, body) = get(&api.app, &format!("/processimages/{raw}/0/0")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["batch"]["schedule_id"].is_null());
    }
}

#[tokio::test]
async fn test_empty_partition_still_initiates() {
    let api = create_test_api();

    let (status, body) = get(&api.app, "/processimages/null/0/0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Initiated");

    let batch_id = body["batch"]["id"].as_i64().unwrap();
    let batches = api.batches.clone();
    let failed = TestEnv::wait_for(
        || {
            let batches = batches.clone();
            async move {
                batches
                    .batch(batch_id)
                    .map(|b| b.status == BatchStatus::Error)
                    .unwrap_or(false)
            }
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(failed);
    assert_eq!(
        api.batches.batch(batch_id).unwrap().error.as_deref(),
        Some("No Feeds")
    );
}

#[tokio::test]
async fn test_process_images_rejects_invalid_range() {
    let api = create_test_api();

    let (status, body) = get(&api.app, "/processimages/null/10/5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["type"], "BAD_REQUEST");

    let (status, _) = get(&api.app, "/processimages/null/abc/5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_process_images_reports_batch_creation_failure() {
    let api = create_test_api();
    api.batches.fail_add_task();

    let (status, body) = get(&api.app, "/processimages/null/0/10").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_get_batch_with_items() {
    let api = create_test_api();
    api.feeds.add_feed(FeedBuilder::new().with_id(1).build());
    api.feeds.add_feed(FeedBuilder::new().with_id(2).build());

    let (_, body) = get(&api.app, "/processimages/null/0/10").await;
    let batch_id = body["batch"]["id"].as_i64().unwrap();

    let batches = api.batches.clone();
    assert!(
        TestEnv::wait_for(
            || {
                let batches = batches.clone();
                async move {
                    batches
                        .batch(batch_id)
                        .map(|b| b.status.is_terminal())
                        .unwrap_or(false)
                }
            },
            Duration::from_secs(5),
        )
        .await
    );

    let (status, body) = get(&api.app, &format!("/batches/{batch_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], batch_id);
    assert_eq!(body["data"]["status"], "Completed");
    assert_eq!(body["data"]["pending_items"], 0);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_shutdown_marks_running_batch_error() {
    let api = create_test_api();
    api.feeds.add_feed(FeedBuilder::new().with_id(1).build());
    api.posts.set_delay(Duration::from_secs(30));

    let (status, body) = get(&api.app, "/processimages/nightly/0/10").await;
    assert_eq!(status, StatusCode::OK);
    let batch_id = body["batch"]["id"].as_i64().unwrap();

    let batches = api.batches.clone();
    assert!(
        TestEnv::wait_for(
            || {
                let batches = batches.clone();
                async move {
                    batches
                        .batch(batch_id)
                        .map(|b| b.status == BatchStatus::Processing)
                        .unwrap_or(false)
                }
            },
            Duration::from_secs(5),
        )
        .await
    );

    let finished = api.coordinator.drain(Duration::from_millis(50)).await;
    assert_eq!(finished.len(), 1);

    let (status, body) = get(&api.app, &format!("/batches/{batch_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Error");
    assert!(body["data"]["error"]
        .as_str()
        .unwrap()
        .starts_with("Shutdown"));
    assert!(!body["data"]["completed_at"].is_null());
}

#[tokio::test]
async fn test_get_batch_not_found() {
    let api = create_test_api();

    let (status, body) = get(&api.app, "/batches/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "BATCH_NOT_FOUND");
}

#[tokio::test]
async fn test_metrics_disabled_without_recorder() {
    let api = create_test_api();

    let (status, _) = get(&api.app, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
