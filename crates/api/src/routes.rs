use axum::{routing::get, Router};
use imagebatch_domain::BatchRepository;
use imagebatch_pipeline::BatchCoordinator;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::handlers::{
    batches::{get_batch, process_images},
    health::health_check,
    metrics::render_metrics,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub coordinator: BatchCoordinator,
    pub batches: Arc<dyn BatchRepository>,
    pub metrics: Option<PrometheusHandle>,
    pub metrics_endpoint: String,
}

impl AppState {
    pub fn new(coordinator: BatchCoordinator) -> Self {
        let batches = coordinator.context().batches.clone();
        Self {
            coordinator,
            batches,
            metrics: None,
            metrics_endpoint: "/metrics".to_string(),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle, endpoint: &str) -> Self {
        self.metrics = Some(handle);
        self.metrics_endpoint = endpoint.to_string();
        self
    }
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    let metrics_endpoint = state.metrics_endpoint.clone();
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 批次触发与查询
        .route(
            "/processimages/{schedule_id}/{start_row}/{end_row}",
            get(process_images),
        )
        .route("/batches/{id}", get(get_batch))
        .route(&metrics_endpoint, get(render_metrics))
        .with_state(state)
}
