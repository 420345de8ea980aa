use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use imagebatch_errors::PipelineError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("流水线错误: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源")]
    NotFound,

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_type) = match &self {
            ApiError::Pipeline(PipelineError::BatchNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("批次 ID {} 不存在", id),
                "BATCH_NOT_FOUND",
            ),
            ApiError::Pipeline(PipelineError::ValidationError(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone(), "VALIDATION_ERROR")
            }
            ApiError::Pipeline(PipelineError::Database(e)) => {
                tracing::error!("数据库错误: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "数据库操作失败".to_string(),
                    "DATABASE_ERROR",
                )
            }
            ApiError::Pipeline(e) => {
                tracing::error!("流水线错误: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    e.to_string(),
                    "PIPELINE_ERROR",
                )
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "BAD_REQUEST"),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "请求的资源不存在".to_string(),
                "NOT_FOUND",
            ),
            ApiError::Internal(msg) => {
                tracing::error!("内部错误: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "服务器内部错误".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_not_found_maps_to_404() {
        let err: ApiError = PipelineError::BatchNotFound { id: 7 }.into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_other_pipeline_errors_map_to_500() {
        let err: ApiError = PipelineError::NoFeeds.into();
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_bad_request() {
        let err = ApiError::bad_request("起始行无效");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
