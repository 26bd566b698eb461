//! # Fleet API
//!
//! 协调引擎的HTTP接口，基于Axum构建。
//!
//! ## API 端点
//!
//! ### Worker接口
//! - `POST /api/worker/register` - 注册Worker
//! - `GET|POST /api/worker/poll?max=N` - 轮询任务
//! - `POST /api/worker/result/{task_id}` - 提交结果
//! - `POST /api/worker/failure/{task_id}` - 报告失败
//!
//! Worker通过 `X-Worker-Id` 头标识自己；启用认证时还需携带 `X-API-Key`。
//! 这些接口只返回确认，不暴露调度器内部状态。
//!
//! ### 运维接口
//! - `GET /api/dashboard/{overview,workers,queue,history,performance,sources}`
//! - `GET /api/items`、`GET /api/items/{id}`、`GET /api/items/stats`、`DELETE /api/items`
//! - `POST /api/tasks/discover` - 投放发现任务
//! - `GET /health`、`GET /metrics`

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;

use fleet_core::AppConfig;
use fleet_dispatcher::FleetEngine;

use middleware::{cors_layer, request_logging, timeout_layer, trace_layer};
use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(
    engine: &FleetEngine,
    config: &AppConfig,
    metrics_handle: Option<PrometheusHandle>,
) -> Router {
    let state = AppState {
        registry: engine.registry.clone(),
        task_queue: engine.task_queue.clone(),
        item_store: engine.item_store.clone(),
        query: engine.query.clone(),
        scheduler_config: config.scheduler.clone(),
        auth: config.api.auth.clone(),
        metrics_handle,
    };

    let router = create_routes(state, &config.observability.metrics_endpoint).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(axum::middleware::from_fn(request_logging))
            .layer(timeout_layer(config.api.request_timeout_seconds)),
    );

    if config.api.cors_enabled {
        router.layer(cors_layer())
    } else {
        router
    }
}
