use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use fleet_core::models::{LookbackWindow, TaskHistoryQuery, TaskKind, TaskStatus};

use crate::{
    error::{ApiError, ApiResult},
    response::success,
    routes::AppState,
};

/// 历史查询参数
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub status: Option<String>,
    pub source: Option<String>,
    pub kind: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl HistoryParams {
    fn into_query(self) -> ApiResult<TaskHistoryQuery> {
        let status = self
            .status
            .map(|s| {
                TaskStatus::parse(&s).ok_or_else(|| ApiError::BadRequest(format!("无效的任务状态: {s}")))
            })
            .transpose()?;
        let kind = self
            .kind
            .map(|k| {
                TaskKind::parse(&k).ok_or_else(|| ApiError::BadRequest(format!("无效的任务种类: {k}")))
            })
            .transpose()?;

        Ok(TaskHistoryQuery {
            status,
            source: self.source.filter(|s| !s.is_empty()),
            kind,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PerformanceParams {
    pub window: Option<String>,
}

pub async fn overview(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.query.overview().await?))
}

pub async fn workers(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.query.active_workers().await?))
}

pub async fn queue(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.query.queue().await?))
}

pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<impl IntoResponse> {
    let query = params.into_query()?;
    Ok(success(state.query.history(&query).await?))
}

pub async fn performance(
    State(state): State<AppState>,
    Query(params): Query<PerformanceParams>,
) -> ApiResult<impl IntoResponse> {
    let window = match params.window.as_deref() {
        None | Some("") => LookbackWindow::default(),
        Some(raw) => LookbackWindow::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("无效的时间窗口: {raw}，支持 1h/6h/12h/24h")))?,
    };
    Ok(success(state.query.performance(window).await))
}

pub async fn sources(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.query.source_stats().await))
}
