use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use fleet_core::{
    config::RegistryConfig,
    models::{TaskDescriptor, Worker},
    traits::TaskQueue,
    SchedulerError, SchedulerResult,
};

use crate::metrics_collector::MetricsCollector;
use crate::result_collector::{CollectOutcome, ResultCollector};

/// Worker注册表
///
/// 跟踪在线Worker及其当前任务。锁顺序固定为"注册表 → 任务队列"，
/// 结果收集器从不获取注册表锁。
pub struct WorkerRegistry {
    workers: Mutex<HashMap<String, Worker>>,
    task_queue: Arc<dyn TaskQueue>,
    collector: Arc<ResultCollector>,
    config: RegistryConfig,
    metrics: Arc<MetricsCollector>,
}

/// 一次存活清扫的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed_workers: Vec<String>,
    pub reclaimed_tasks: Vec<String>,
}

impl WorkerRegistry {
    pub fn new(
        task_queue: Arc<dyn TaskQueue>,
        collector: Arc<ResultCollector>,
        config: RegistryConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            task_queue,
            collector,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// 注册或刷新Worker；已存在的Worker保留当前状态，只更新信息和最后出现时间
    pub async fn register(
        &self,
        worker_id: &str,
        info: serde_json::Value,
    ) -> SchedulerResult<Worker> {
        if worker_id.trim().is_empty() {
            return Err(SchedulerError::InvalidWorkerId(
                "Worker ID不能为空".to_string(),
            ));
        }

        let now = Utc::now();
        let mut workers = self.workers.lock().await;
        let worker = match workers.get_mut(worker_id) {
            Some(existing) => {
                existing.touch(now);
                if !info.is_null() {
                    existing.info = info;
                }
                debug!(worker_id = %worker_id, "刷新已注册Worker");
                existing.clone()
            }
            None => {
                let worker = Worker::new(worker_id, info, now);
                workers.insert(worker_id.to_string(), worker.clone());
                info!(worker_id = %worker_id, "注册新Worker");
                worker
            }
        };
        self.metrics.set_active_workers(workers.len());
        Ok(worker)
    }

    /// 轮询任务
    ///
    /// 未知Worker以占位信息自动注册。分配期间持有注册表锁，
    /// 避免与存活清扫交错。
    pub async fn poll(
        &self,
        worker_id: &str,
        max_batch: usize,
    ) -> SchedulerResult<Vec<TaskDescriptor>> {
        let now = Utc::now();
        let mut workers = self.workers.lock().await;

        let worker = workers.entry(worker_id.to_string()).or_insert_with(|| {
            info!(worker_id = %worker_id, "未注册的Worker发起轮询，自动注册");
            Worker::new(worker_id, Worker::placeholder_info(), now)
        });
        worker.touch(now);

        let batch = self.task_queue.assign(worker_id, max_batch).await?;
        if let Some(first) = batch.first() {
            worker.begin_task(&first.id);
            info!(
                worker_id = %worker_id,
                count = batch.len(),
                first_task = %first.id,
                "向Worker分配任务"
            );
        }

        self.metrics.set_active_workers(workers.len());
        Ok(batch.iter().map(|t| t.descriptor()).collect())
    }

    /// Worker提交结果
    pub async fn on_result(
        &self,
        worker_id: &str,
        task_id: &str,
        payload: serde_json::Value,
    ) -> SchedulerResult<CollectOutcome> {
        self.release_worker(worker_id).await;
        self.collector
            .process_result(worker_id, task_id, payload)
            .await
    }

    /// Worker报告失败
    pub async fn on_failure(
        &self,
        worker_id: &str,
        task_id: &str,
        error: &str,
    ) -> SchedulerResult<CollectOutcome> {
        self.release_worker(worker_id).await;
        self.collector
            .process_failure(worker_id, task_id, error)
            .await
    }

    async fn release_worker(&self, worker_id: &str) {
        let now = Utc::now();
        let mut workers = self.workers.lock().await;
        let worker = workers.entry(worker_id.to_string()).or_insert_with(|| {
            info!(worker_id = %worker_id, "未注册的Worker提交回调，自动注册");
            Worker::new(worker_id, Worker::placeholder_info(), now)
        });
        worker.touch(now);
        worker.finish_task();
        self.metrics.set_active_workers(workers.len());
    }

    /// 存活清扫
    ///
    /// 移除超过存活窗口未出现的Worker，并把分配给它们的所有任务放回待处理，
    /// 不增加尝试次数。
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> SchedulerResult<SweepReport> {
        let mut workers = self.workers.lock().await;
        let expired: Vec<String> = workers
            .values()
            .filter(|w| w.is_expired(now, self.config.liveness_timeout_seconds))
            .map(|w| w.id.clone())
            .collect();

        let mut report = SweepReport::default();
        for worker_id in expired {
            let Some(worker) = workers.remove(&worker_id) else {
                continue;
            };

            let mut task_ids: Vec<String> = self
                .task_queue
                .assigned_to(&worker_id)
                .await?
                .into_iter()
                .map(|t| t.id)
                .collect();
            if let Some(current) = worker.current_task_id {
                if !task_ids.contains(&current) {
                    task_ids.push(current);
                }
            }

            let mut reclaimed = 0;
            for task_id in task_ids {
                match self.task_queue.reclaim(&task_id).await {
                    Ok(task) => {
                        reclaimed += 1;
                        report.reclaimed_tasks.push(task.id);
                    }
                    Err(e) => {
                        debug!(task_id = %task_id, error = %e, "任务无需回收");
                    }
                }
            }

            warn!(
                worker_id = %worker_id,
                last_seen = %worker.last_seen.format("%Y-%m-%d %H:%M:%S UTC"),
                reclaimed,
                "Worker超时未出现，已移除"
            );
            self.metrics.record_worker_reaped(reclaimed);
            report.removed_workers.push(worker_id);
        }

        self.metrics.set_active_workers(workers.len());
        Ok(report)
    }

    /// 按ID排序的Worker快照
    pub async fn list_workers(&self) -> Vec<Worker> {
        let workers = self.workers.lock().await;
        let mut list: Vec<Worker> = workers.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub async fn get(&self, worker_id: &str) -> Option<Worker> {
        self.workers.lock().await.get(worker_id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.workers.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{item_store::InMemoryItemStore, task_queue::InMemoryTaskQueue};
    use chrono::Duration;
    use fleet_core::{config::SchedulerConfig, models::TaskStatus, WorkerStatus};
    use serde_json::json;

    fn registry() -> (Arc<InMemoryTaskQueue>, WorkerRegistry) {
        let config = SchedulerConfig::default();
        let queue = Arc::new(InMemoryTaskQueue::new(config.clone()));
        let metrics = Arc::new(MetricsCollector::new());
        let collector = Arc::new(ResultCollector::new(
            queue.clone(),
            Arc::new(InMemoryItemStore::new()),
            config,
            100,
            metrics.clone(),
        ));
        let registry = WorkerRegistry::new(
            queue.clone(),
            collector,
            RegistryConfig::default(),
            metrics,
        );
        (queue, registry)
    }

    #[tokio::test]
    async fn test_register_is_upsert() {
        let (_, registry) = registry();
        let first = registry.register("w1", json!({"version": "1.0"})).await.unwrap();
        assert_eq!(first.status, WorkerStatus::Idle);

        let second = registry.register("w1", json!({"version": "1.1"})).await.unwrap();
        assert_eq!(second.registered_at, first.registered_at);
        assert_eq!(second.info["version"], "1.1");
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_register_rejects_blank_id() {
        let (_, registry) = registry();
        assert!(registry.register("  ", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_poll_auto_registers_and_assigns() {
        let (queue, registry) = registry();
        queue.enqueue_discover("indeed", json!({}), 1).await.unwrap();

        let batch = registry.poll("w1", 1).await.unwrap();
        assert_eq!(batch.len(), 1);

        let worker = registry.get("w1").await.unwrap();
        assert_eq!(worker.status, WorkerStatus::Processing);
        assert_eq!(worker.current_task_id.as_deref(), Some(batch[0].id.as_str()));
        assert_eq!(worker.info, Worker::placeholder_info());

        let empty = registry.poll("w2", 1).await.unwrap();
        assert!(empty.is_empty());
        assert_eq!(registry.get("w2").await.unwrap().status, WorkerStatus::Idle);
    }

    #[tokio::test]
    async fn test_on_result_releases_worker() {
        let (queue, registry) = registry();
        queue.enqueue_discover("indeed", json!({}), 1).await.unwrap();
        let batch = registry.poll("w1", 1).await.unwrap();

        let outcome = registry.on_result("w1", &batch[0].id, json!([])).await.unwrap();
        assert!(matches!(outcome, CollectOutcome::Completed { .. }));

        let worker = registry.get("w1").await.unwrap();
        assert_eq!(worker.status, WorkerStatus::Idle);
        assert!(worker.current_task_id.is_none());
    }

    #[tokio::test]
    async fn test_sweep_reclaims_batch_without_penalty() {
        let (queue, registry) = registry();
        queue.enqueue_discover("indeed", json!({"p": 1}), 1).await.unwrap();
        queue.enqueue_discover("indeed", json!({"p": 2}), 1).await.unwrap();
        let batch = registry.poll("w1", 2).await.unwrap();
        assert_eq!(batch.len(), 2);

        let later = Utc::now() + Duration::seconds(301);
        let report = registry.sweep_expired(later).await.unwrap();
        assert_eq!(report.removed_workers, vec!["w1".to_string()]);
        assert_eq!(report.reclaimed_tasks.len(), 2);
        assert!(registry.get("w1").await.is_none());

        for descriptor in batch {
            let task = queue.get(&descriptor.id).await.unwrap().unwrap();
            assert_eq!(task.status, TaskStatus::Pending);
            assert_eq!(task.attempts, 0);
            assert!(task.assigned_to.is_none());
        }
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_workers() {
        let (_, registry) = registry();
        registry.register("w1", json!({})).await.unwrap();

        let report = registry
            .sweep_expired(Utc::now() + Duration::seconds(300))
            .await
            .unwrap();
        assert!(report.removed_workers.is_empty());
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_stale_callback_after_reclaim_is_ignored() {
        let (queue, registry) = registry();
        queue.enqueue_discover("indeed", json!({}), 1).await.unwrap();
        let batch = registry.poll("w1", 1).await.unwrap();

        registry
            .sweep_expired(Utc::now() + Duration::seconds(600))
            .await
            .unwrap();
        let reassigned = registry.poll("w2", 1).await.unwrap();
        assert_eq!(reassigned[0].id, batch[0].id);

        let outcome = registry.on_result("w1", &batch[0].id, json!([])).await.unwrap();
        assert_eq!(outcome, CollectOutcome::Ignored);

        let task = queue.get(&batch[0].id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.assigned_to.as_deref(), Some("w2"));
    }
}
