use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::routes::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// 正在后台处理的批次数量
    pub running_batches: usize,
    pub timestamp: DateTime<Utc>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        service: "imagebatch",
        version: env!("CARGO_PKG_VERSION"),
        running_batches: state.coordinator.running(),
        timestamp: Utc::now(),
    })
}
