use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use fleet_core::{
    models::{
        DiscoveredItem, ItemCategory, ItemStoreStats, LookbackWindow, PerformanceMetrics,
        SourceStats, Task, TaskHistoryQuery, TaskPage, TaskQueueStats, Worker, WorkerStatus,
    },
    traits::{ItemStore, TaskQueue},
    SchedulerResult,
};

use crate::result_collector::ResultCollector;
use crate::worker_registry::WorkerRegistry;

/// Worker数量汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerSummary {
    pub total: usize,
    pub idle: usize,
    pub processing: usize,
}

/// 总览
#[derive(Debug, Clone, Serialize)]
pub struct FleetOverview {
    pub workers: WorkerSummary,
    pub tasks: TaskQueueStats,
    pub items: ItemStoreStats,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub last_24h: PerformanceMetrics,
    pub generated_at: DateTime<Utc>,
}

/// 在线Worker及其当前任务
#[derive(Debug, Clone, Serialize)]
pub struct WorkerView {
    #[serde(flatten)]
    pub worker: Worker,
    pub current_task: Option<Task>,
}

/// 条目查询条件；分类、关键词、来源可以组合
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub category: Option<ItemCategory>,
    pub query: Option<String>,
    pub source: Option<String>,
}

/// 只读查询门面
///
/// 面向运维看板，只读取各组件的快照，不修改任何状态。
pub struct FleetQueryService {
    task_queue: Arc<dyn TaskQueue>,
    item_store: Arc<dyn ItemStore>,
    registry: Arc<WorkerRegistry>,
    collector: Arc<ResultCollector>,
}

impl FleetQueryService {
    pub fn new(
        task_queue: Arc<dyn TaskQueue>,
        item_store: Arc<dyn ItemStore>,
        registry: Arc<WorkerRegistry>,
        collector: Arc<ResultCollector>,
    ) -> Self {
        Self {
            task_queue,
            item_store,
            registry,
            collector,
        }
    }

    pub async fn overview(&self) -> SchedulerResult<FleetOverview> {
        let workers = self.registry.list_workers().await;
        let summary = WorkerSummary {
            total: workers.len(),
            idle: workers
                .iter()
                .filter(|w| w.status == WorkerStatus::Idle)
                .count(),
            processing: workers
                .iter()
                .filter(|w| w.status == WorkerStatus::Processing)
                .count(),
        };

        Ok(FleetOverview {
            workers: summary,
            tasks: self.task_queue.stats().await?,
            items: self.item_store.stats().await?,
            success_rate: self.collector.success_rate().await,
            average_duration_ms: self.collector.average_duration_ms().await,
            last_24h: self
                .collector
                .performance(LookbackWindow::TwentyFourHours)
                .await,
            generated_at: Utc::now(),
        })
    }

    pub async fn active_workers(&self) -> SchedulerResult<Vec<WorkerView>> {
        let workers = self.registry.list_workers().await;
        let mut views = Vec::with_capacity(workers.len());
        for worker in workers {
            let current_task = match worker.current_task_id.as_deref() {
                Some(task_id) => self.task_queue.get(task_id).await?,
                None => None,
            };
            views.push(WorkerView {
                worker,
                current_task,
            });
        }
        Ok(views)
    }

    /// 待处理与处理中的任务，按分配顺序
    pub async fn queue(&self) -> SchedulerResult<Vec<Task>> {
        self.task_queue.active_tasks().await
    }

    pub async fn history(&self, query: &TaskHistoryQuery) -> SchedulerResult<TaskPage> {
        self.task_queue.query_history(query).await
    }

    pub async fn performance(&self, window: LookbackWindow) -> PerformanceMetrics {
        self.collector.performance(window).await
    }

    pub async fn source_stats(&self) -> Vec<SourceStats> {
        self.collector.source_stats().await
    }

    pub async fn items(&self, filter: &ItemFilter) -> SchedulerResult<Vec<DiscoveredItem>> {
        let mut items = match (&filter.query, filter.category) {
            (Some(query), _) => self.item_store.search(query).await?,
            (None, Some(category)) => self.item_store.by_category(category).await?,
            (None, None) => self.item_store.all().await?,
        };

        if filter.query.is_some() {
            if let Some(category) = filter.category {
                items.retain(|i| i.category == category);
            }
        }
        if let Some(source) = &filter.source {
            items.retain(|i| &i.source == source);
        }
        Ok(items)
    }

    pub async fn item(&self, id: &str) -> SchedulerResult<Option<DiscoveredItem>> {
        self.item_store.get(id).await
    }

    pub async fn item_stats(&self) -> SchedulerResult<ItemStoreStats> {
        self.item_store.stats().await
    }
}
