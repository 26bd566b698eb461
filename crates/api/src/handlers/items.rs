use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use fleet_core::{models::ItemCategory, SchedulerError};
use fleet_dispatcher::ItemFilter;

use crate::{
    error::{ApiError, ApiResult},
    response::{success, ApiResponse},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ItemQueryParams {
    pub category: Option<String>,
    pub q: Option<String>,
    pub source: Option<String>,
}

impl ItemQueryParams {
    fn into_filter(self) -> ApiResult<ItemFilter> {
        let category = self
            .category
            .filter(|c| !c.is_empty())
            .map(|c| {
                ItemCategory::parse(&c).ok_or_else(|| ApiError::BadRequest(format!("无效的分类: {c}")))
            })
            .transpose()?;

        Ok(ItemFilter {
            category,
            query: self.q.filter(|q| !q.trim().is_empty()),
            source: self.source.filter(|s| !s.is_empty()),
        })
    }
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<ItemQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = params.into_filter()?;
    Ok(success(state.query.items(&filter).await?))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let item = state
        .query
        .item(&id)
        .await?
        .ok_or(SchedulerError::ItemNotFound { id })?;
    Ok(success(item))
}

pub async fn item_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.query.item_stats().await?))
}

pub async fn clear_items(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let cleared = state.item_store.clear().await?;
    warn!(cleared, "条目库已被清空");
    Ok(ApiResponse::success_with_message(
        json!({ "cleared": cleared }),
        format!("已清空 {cleared} 个条目"),
    ))
}
