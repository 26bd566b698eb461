use std::sync::Arc;

use tracing::info;

use fleet_core::{
    traits::{ItemStore, TaskQueue},
    AppConfig,
};

use crate::{
    FleetQueryService, InMemoryItemStore, InMemoryTaskQueue, JobHandle, MetricsCollector,
    ResultCollector, StatsRotator, WorkerFailureDetector, WorkerRegistry,
};

/// 组件装配
///
/// 按依赖顺序创建条目库、任务队列、结果收集器、注册表和查询门面，
/// 所有组件以 `Arc` 共享。
#[derive(Clone)]
pub struct FleetEngine {
    pub task_queue: Arc<dyn TaskQueue>,
    pub item_store: Arc<dyn ItemStore>,
    pub collector: Arc<ResultCollector>,
    pub registry: Arc<WorkerRegistry>,
    pub query: Arc<FleetQueryService>,
    pub metrics: Arc<MetricsCollector>,
    rotation_interval_seconds: u64,
}

impl FleetEngine {
    pub fn new(config: &AppConfig) -> Self {
        let metrics = Arc::new(MetricsCollector::new());
        let item_store: Arc<dyn ItemStore> = Arc::new(InMemoryItemStore::new());
        let task_queue: Arc<dyn TaskQueue> =
            Arc::new(InMemoryTaskQueue::new(config.scheduler.clone()));

        let collector = Arc::new(ResultCollector::new(
            task_queue.clone(),
            item_store.clone(),
            config.scheduler.clone(),
            config.stats.duration_buffer_size,
            metrics.clone(),
        ));
        let registry = Arc::new(WorkerRegistry::new(
            task_queue.clone(),
            collector.clone(),
            config.registry.clone(),
            metrics.clone(),
        ));
        let query = Arc::new(FleetQueryService::new(
            task_queue.clone(),
            item_store.clone(),
            registry.clone(),
            collector.clone(),
        ));

        info!(
            max_attempts = config.scheduler.max_attempts,
            history_capacity = config.scheduler.history_capacity,
            liveness_timeout_secs = config.registry.liveness_timeout_seconds,
            "协调引擎组件已创建"
        );

        Self {
            task_queue,
            item_store,
            collector,
            registry,
            query,
            metrics,
            rotation_interval_seconds: config.stats.rotation_interval_seconds,
        }
    }

    /// 启动存活清扫和小时桶轮转
    pub fn start_background_jobs(&self) -> Vec<JobHandle> {
        let detector = Arc::new(WorkerFailureDetector::new(self.registry.clone()));
        let rotator = Arc::new(StatsRotator::new(
            self.collector.clone(),
            self.rotation_interval_seconds,
        ));
        vec![detector.start(), rotator.start()]
    }
}
