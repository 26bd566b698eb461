use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;

use fleet_core::{
    config::{AuthConfig, SchedulerConfig},
    traits::{ItemStore, TaskQueue},
};
use fleet_dispatcher::{FleetQueryService, WorkerRegistry};

use crate::handlers::{
    dashboard::{history, overview, performance, queue, sources, workers},
    health::health_check,
    items::{clear_items, get_item, item_stats, list_items},
    metrics::render_metrics,
    tasks::create_discover_task,
    worker::{poll, register, report_failure, submit_result},
};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<WorkerRegistry>,
    pub task_queue: Arc<dyn TaskQueue>,
    pub item_store: Arc<dyn ItemStore>,
    pub query: Arc<FleetQueryService>,
    pub scheduler_config: SchedulerConfig,
    pub auth: AuthConfig,
    pub metrics_handle: Option<PrometheusHandle>,
}

pub fn create_routes(state: AppState, metrics_endpoint: &str) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        // Worker接口
        .route("/api/worker/register", post(register))
        .route("/api/worker/poll", get(poll).post(poll))
        .route("/api/worker/result/{task_id}", post(submit_result))
        .route("/api/worker/failure/{task_id}", post(report_failure))
        // 运维看板
        .route("/api/dashboard/overview", get(overview))
        .route("/api/dashboard/workers", get(workers))
        .route("/api/dashboard/queue", get(queue))
        .route("/api/dashboard/history", get(history))
        .route("/api/dashboard/performance", get(performance))
        .route("/api/dashboard/sources", get(sources))
        // 条目
        .route("/api/items", get(list_items).delete(clear_items))
        .route("/api/items/stats", get(item_stats))
        .route("/api/items/{id}", get(get_item))
        // 任务投放
        .route("/api/tasks/discover", post(create_discover_task));

    if state.metrics_handle.is_some() {
        router = router.route(metrics_endpoint, get(render_metrics));
    }

    router.with_state(state)
}
