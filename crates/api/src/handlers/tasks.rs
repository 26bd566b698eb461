use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{ApiError, ApiResult},
    response::created,
    routes::AppState,
};

/// 发现任务投放请求
#[derive(Debug, Deserialize)]
pub struct DiscoverTaskRequest {
    pub source: Option<String>,
    #[serde(default)]
    pub params: Value,
    pub priority: Option<i32>,
}

/// 新增一个发现任务，未指定优先级时使用配置的默认值
pub async fn create_discover_task(
    State(state): State<AppState>,
    Json(request): Json<DiscoverTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let source = request
        .source
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("缺少 source 字段".to_string()))?;
    let priority = request
        .priority
        .unwrap_or(state.scheduler_config.default_discover_priority);

    let task = state
        .task_queue
        .enqueue_discover(&source, request.params, priority)
        .await?;
    Ok(created(task))
}
