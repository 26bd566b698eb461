use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use fleet_core::models::TaskDescriptor;

use crate::{
    auth::{AuthError, WorkerCredentials, WorkerIdentity},
    error::{ApiError, ApiResult},
    response::{ack, Ack},
    routes::AppState,
};

/// 注册请求
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(alias = "workerId")]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub info: Value,
}

/// 轮询参数
#[derive(Debug, Deserialize)]
pub struct PollParams {
    pub max: Option<usize>,
}

/// 结果提交请求
#[derive(Debug, Deserialize)]
pub struct ResultRequest {
    pub results: Option<Value>,
}

/// 失败报告请求
#[derive(Debug, Deserialize)]
pub struct FailureRequest {
    pub error: Option<Value>,
}

/// 注册Worker；标识优先取 `X-Worker-Id` 头，其次取请求体中的 `workerId`
pub async fn register(
    State(state): State<AppState>,
    credentials: WorkerCredentials,
    body: Bytes,
) -> ApiResult<Json<Ack>> {
    let request: RegisterRequest = if body.is_empty() {
        RegisterRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let worker_id = credentials
        .worker_id
        .or(request.worker_id.filter(|id| !id.trim().is_empty()))
        .ok_or(ApiError::Authentication(AuthError::MissingWorkerId))?;

    state.registry.register(&worker_id, request.info).await?;
    Ok(ack())
}

/// 轮询任务，返回可能为空的任务描述数组
pub async fn poll(
    State(state): State<AppState>,
    WorkerIdentity(worker_id): WorkerIdentity,
    Query(params): Query<PollParams>,
) -> ApiResult<Json<Vec<TaskDescriptor>>> {
    let batch_size = state.scheduler_config.clamp_batch(params.max);
    let tasks = state.registry.poll(&worker_id, batch_size).await?;
    debug!(worker_id = %worker_id, count = tasks.len(), "轮询返回任务");
    Ok(Json(tasks))
}

/// 提交任务结果；无论任务是否仍由该Worker持有都只返回确认
pub async fn submit_result(
    State(state): State<AppState>,
    WorkerIdentity(worker_id): WorkerIdentity,
    Path(task_id): Path<String>,
    Json(request): Json<ResultRequest>,
) -> ApiResult<Json<Ack>> {
    let results = request
        .results
        .filter(|v| !v.is_null())
        .ok_or_else(|| ApiError::BadRequest("缺少 results 字段".to_string()))?;

    let outcome = state
        .registry
        .on_result(&worker_id, &task_id, results)
        .await?;
    debug!(worker_id = %worker_id, task_id = %task_id, ?outcome, "结果已处理");
    Ok(ack())
}

/// 报告任务失败
pub async fn report_failure(
    State(state): State<AppState>,
    WorkerIdentity(worker_id): WorkerIdentity,
    Path(task_id): Path<String>,
    Json(request): Json<FailureRequest>,
) -> ApiResult<Json<Ack>> {
    let error = match request.error {
        Some(Value::String(message)) if !message.trim().is_empty() => message,
        Some(Value::Null) | Some(Value::String(_)) | None => {
            return Err(ApiError::BadRequest("缺少 error 字段".to_string()))
        }
        Some(other) => other.to_string(),
    };

    let outcome = state
        .registry
        .on_failure(&worker_id, &task_id, &error)
        .await?;
    debug!(worker_id = %worker_id, task_id = %task_id, ?outcome, "失败已处理");
    Ok(ack())
}
