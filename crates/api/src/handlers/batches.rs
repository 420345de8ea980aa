use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use imagebatch_domain::{Batch, BatchItem};
use imagebatch_errors::PipelineError;
use serde::Serialize;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    response::success,
    routes::AppState,
};

/// 触发请求的立即应答，处理结果不会回传给调用方
#[derive(Debug, Serialize)]
pub struct InitiatedResponse {
    pub success: bool,
    pub message: String,
    pub batch: Batch,
}

#[derive(Debug, Serialize)]
pub struct BatchDetail {
    #[serde(flatten)]
    pub batch: Batch,
    pub items: Vec<BatchItem>,
}

/// 调度器传来的 `null` / `undefined` / 空串都视为没有schedule_id
pub fn normalize_schedule_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    match trimmed {
        "" | "null" | "undefined" => None,
        _ => Some(trimmed.to_string()),
    }
}

/// 发起一次图片处理批次
///
/// 批次记录创建后立即返回，Feed处理在协调器跟踪的后台任务中进行。
pub async fn process_images(
    State(state): State<AppState>,
    Path((schedule_id, start_row, end_row)): Path<(String, i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    if start_row < 0 || end_row < start_row {
        return Err(ApiError::bad_request(format!(
            "行范围无效: [{start_row}, {end_row})"
        )));
    }

    let schedule_id = normalize_schedule_id(&schedule_id);
    let batch = state
        .coordinator
        .start(schedule_id, start_row, end_row)
        .await?;
    info!(batch_id = batch.id, start_row, end_row, "批次已发起");

    Ok(Json(InitiatedResponse {
        success: true,
        message: "Initiated".to_string(),
        batch,
    }))
}

/// 查询批次及其条目
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let batch = state
        .batches
        .get_by_id(id)
        .await?
        .ok_or(PipelineError::BatchNotFound { id })?;
    let items = state.batches.list_items(id).await?;

    Ok(success(BatchDetail { batch, items }))
}
