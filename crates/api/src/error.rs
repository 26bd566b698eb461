use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fleet_core::SchedulerError;
use serde_json::json;

use crate::auth::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度器错误: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("认证错误: {0}")]
    Authentication(#[from] AuthError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_type, suggestions) = match &self {
            ApiError::Scheduler(SchedulerError::TaskNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("任务 {} 不存在", id),
                "TASK_NOT_FOUND",
                vec!["使用 GET /api/dashboard/queue 查看活跃任务".to_string()],
            ),
            ApiError::Scheduler(SchedulerError::WorkerNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("Worker {} 不存在", id),
                "WORKER_NOT_FOUND",
                vec!["使用 GET /api/dashboard/workers 查看在线Worker".to_string()],
            ),
            ApiError::Scheduler(SchedulerError::ItemNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("条目 {} 不存在", id),
                "ITEM_NOT_FOUND",
                vec!["使用 GET /api/items 查看所有条目".to_string()],
            ),
            ApiError::Scheduler(SchedulerError::InvalidTaskParams(msg)) => (
                StatusCode::BAD_REQUEST,
                format!("任务参数无效: {}", msg),
                "INVALID_TASK_PARAMS",
                vec!["请检查来源和参数格式".to_string()],
            ),
            ApiError::Scheduler(SchedulerError::InvalidResultPayload(msg)) => (
                StatusCode::BAD_REQUEST,
                format!("结果载荷无效: {}", msg),
                "INVALID_RESULT_PAYLOAD",
                vec![],
            ),
            ApiError::Scheduler(SchedulerError::InvalidWorkerId(msg)) => (
                StatusCode::BAD_REQUEST,
                msg.clone(),
                "INVALID_WORKER_ID",
                vec!["请在 X-Worker-Id 头或请求体 workerId 中提供Worker标识".to_string()],
            ),
            ApiError::Scheduler(SchedulerError::InvalidTaskState { id, actual, .. }) => (
                StatusCode::CONFLICT,
                format!("任务 {} 当前状态为 {}", id, actual),
                "INVALID_TASK_STATE",
                vec!["请刷新任务状态后重试".to_string()],
            ),
            ApiError::Scheduler(SchedulerError::TaskNotOwned { id, worker_id }) => (
                StatusCode::CONFLICT,
                format!("任务 {} 未分配给Worker {}", id, worker_id),
                "TASK_NOT_OWNED",
                vec!["请重新轮询获取任务".to_string()],
            ),
            ApiError::Scheduler(_) | ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "系统内部错误".to_string(),
                "INTERNAL_ERROR",
                vec![
                    "系统遇到内部错误，请稍后重试".to_string(),
                    "查看 GET /health 检查系统状态".to_string(),
                ],
            ),
            ApiError::Serialization(err) => (
                StatusCode::BAD_REQUEST,
                "请求数据格式错误".to_string(),
                "SERIALIZATION_ERROR",
                vec![
                    "请检查JSON格式是否正确".to_string(),
                    format!("详细错误: {}", err),
                ],
            ),
            ApiError::Authentication(auth_error) => {
                let suggestion = match auth_error {
                    AuthError::MissingWorkerId => "请在请求头中添加 X-Worker-Id",
                    AuthError::MissingApiKey | AuthError::InvalidApiKey => {
                        "请在请求头中添加已配置的 X-API-Key"
                    }
                };
                (
                    StatusCode::UNAUTHORIZED,
                    auth_error.to_string(),
                    "AUTHENTICATION_ERROR",
                    vec![suggestion.to_string()],
                )
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {}", msg),
                "BAD_REQUEST",
                vec!["请检查请求格式和参数".to_string()],
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "请求处理失败");
        }

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "suggestions": suggestions,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
