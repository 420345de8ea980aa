//! # Imagebatch API
//!
//! 图片批处理系统的HTTP入口，基于Axum构建。
//!
//! ## API 端点
//!
//! - `GET /processimages/{schedule_id}/{start_row}/{end_row}` - 发起批次，立即返回 `Initiated`
//! - `GET /batches/{id}` - 查询批次及其条目
//! - `GET /health` - 健康检查
//! - `GET /metrics` - Prometheus指标（启用时）
//!
//! 批次处理在后台进行，调用方只会收到发起应答。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use imagebatch_core::ApiConfig;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

pub use error::{ApiError, ApiResult};
pub use routes::{create_routes, AppState};

/// 创建带中间件的应用
pub fn create_app(state: AppState, config: &ApiConfig) -> Router {
    let app = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(middleware::trace_layer())
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.request_timeout_seconds,
            )))
            .layer(axum::middleware::from_fn(middleware::request_logging)),
    );

    if config.cors_enabled {
        app.layer(middleware::cors_layer())
    } else {
        app
    }
}
