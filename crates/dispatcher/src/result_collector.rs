use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use fleet_core::{
    config::SchedulerConfig,
    models::{
        json_type_name, DiscoveredItem, HourlyBucket, LookbackWindow, PerformanceMetrics,
        SourceStats, Task, TaskKind, TaskStatus,
    },
    traits::{ItemStore, TaskQueue},
    SchedulerError, SchedulerResult,
};

use crate::metrics_collector::MetricsCollector;
use crate::statistics::RollingStats;

/// 发现结果中可能包裹条目列表的字段
const DISCOVER_WRAPPER_KEYS: [&str; 3] = ["items", "jobs", "results"];

/// 回调处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    /// 任务完成，附带写入的条目数和新派生的详情任务数
    Completed { items: usize, derived_tasks: usize },
    /// 失败已记录，任务回到待处理
    Retrying { attempts: u32 },
    /// 达到最大尝试次数，任务终止
    Failed { attempts: u32 },
    /// 过期或重复的回调，未修改任何状态
    Ignored,
}

#[derive(Debug, Default)]
struct Interpretation {
    items: usize,
    derived_tasks: usize,
}

/// 结果收集器
///
/// 解释任务结果、写入条目库、派生详情任务并维护滚动统计。
/// 结果的解释方式由任务自身的种类决定，载荷形状不符按失败处理。
pub struct ResultCollector {
    task_queue: Arc<dyn TaskQueue>,
    item_store: Arc<dyn ItemStore>,
    stats: Mutex<RollingStats>,
    config: SchedulerConfig,
    metrics: Arc<MetricsCollector>,
}

impl ResultCollector {
    pub fn new(
        task_queue: Arc<dyn TaskQueue>,
        item_store: Arc<dyn ItemStore>,
        config: SchedulerConfig,
        duration_buffer_size: usize,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            task_queue,
            item_store,
            stats: Mutex::new(RollingStats::new(duration_buffer_size, Utc::now())),
            config,
            metrics,
        }
    }

    /// 处理成功回调
    pub async fn process_result(
        &self,
        worker_id: &str,
        task_id: &str,
        payload: Value,
    ) -> SchedulerResult<CollectOutcome> {
        let Some(task) = self.owned_task(worker_id, task_id).await? else {
            return Ok(CollectOutcome::Ignored);
        };

        let interpretation = match self.interpret(&task, payload).await {
            Ok(interpretation) => interpretation,
            Err(e) => {
                warn!(task_id = %task.id, worker_id = %worker_id, error = %e, "结果解释失败，按任务失败处理");
                return self.record_failure(&task, worker_id, &e.to_string()).await;
            }
        };

        // 解释期间任务可能已被回收或重新分配，提交时在队列锁内再次校验归属
        let completed = match self.task_queue.complete(&task.id, worker_id).await {
            Ok(completed) => completed,
            Err(e) if is_stale(&e) => {
                warn!(task_id = %task.id, worker_id = %worker_id, error = %e, "任务已不归该Worker持有，忽略完成回调");
                self.metrics.record_ignored_callback();
                return Ok(CollectOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };

        self.stats
            .lock()
            .await
            .record_success(&completed.source, completed.duration_ms);
        self.metrics.record_task_completed(completed.duration_ms);
        self.metrics.record_derived_tasks(interpretation.derived_tasks);

        info!(
            task_id = %completed.id,
            worker_id = %worker_id,
            source = %completed.source,
            items = interpretation.items,
            derived_tasks = interpretation.derived_tasks,
            duration_ms = ?completed.duration_ms,
            "任务完成"
        );

        Ok(CollectOutcome::Completed {
            items: interpretation.items,
            derived_tasks: interpretation.derived_tasks,
        })
    }

    /// 处理失败回调
    pub async fn process_failure(
        &self,
        worker_id: &str,
        task_id: &str,
        error: &str,
    ) -> SchedulerResult<CollectOutcome> {
        let Some(task) = self.owned_task(worker_id, task_id).await? else {
            return Ok(CollectOutcome::Ignored);
        };
        self.record_failure(&task, worker_id, error).await
    }

    /// 查找回调对应的任务，任务不存在、未在处理中或属于其他Worker时返回 `None`
    async fn owned_task(&self, worker_id: &str, task_id: &str) -> SchedulerResult<Option<Task>> {
        let Some(task) = self.task_queue.get(task_id).await? else {
            warn!(task_id = %task_id, worker_id = %worker_id, "回调的任务不在活跃队列中，忽略");
            self.metrics.record_ignored_callback();
            return Ok(None);
        };

        if task.status != TaskStatus::Processing || task.assigned_to.as_deref() != Some(worker_id) {
            warn!(
                task_id = %task_id,
                worker_id = %worker_id,
                status = %task.status,
                assigned_to = ?task.assigned_to,
                "回调的任务未分配给该Worker，忽略"
            );
            self.metrics.record_ignored_callback();
            return Ok(None);
        }

        Ok(Some(task))
    }

    async fn record_failure(
        &self,
        task: &Task,
        worker_id: &str,
        error: &str,
    ) -> SchedulerResult<CollectOutcome> {
        let failed = match self.task_queue.fail(&task.id, worker_id, error).await {
            Ok(failed) => failed,
            Err(e) if is_stale(&e) => {
                warn!(task_id = %task.id, worker_id = %worker_id, error = %e, "任务已不归该Worker持有，忽略失败回调");
                self.metrics.record_ignored_callback();
                return Ok(CollectOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };

        self.stats.lock().await.record_failure(&failed.source);

        let terminal = failed.status == TaskStatus::Failed;
        self.metrics.record_task_failure(terminal);

        if terminal {
            error!(
                task_id = %failed.id,
                source = %failed.source,
                attempts = failed.attempts,
                error = %error,
                "任务达到最大尝试次数，标记为失败"
            );
            Ok(CollectOutcome::Failed {
                attempts: failed.attempts,
            })
        } else {
            info!(
                task_id = %failed.id,
                attempts = failed.attempts,
                max_attempts = failed.max_attempts,
                error = %error,
                "任务失败，等待重新分配"
            );
            Ok(CollectOutcome::Retrying {
                attempts: failed.attempts,
            })
        }
    }

    async fn interpret(&self, task: &Task, payload: Value) -> SchedulerResult<Interpretation> {
        match task.kind {
            TaskKind::Discover => self.interpret_discover(task, payload).await,
            TaskKind::Detail => self.interpret_detail(task, payload).await,
        }
    }

    async fn interpret_discover(
        &self,
        task: &Task,
        payload: Value,
    ) -> SchedulerResult<Interpretation> {
        let entries = discover_entries(payload)?;
        let priority = self.derived_priority(task);
        let mut outcome = Interpretation::default();

        for entry in &entries {
            let item = match DiscoveredItem::from_payload(&task.source, entry) {
                Ok(item) => item,
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "跳过无效条目");
                    continue;
                }
            };

            let stored = self.item_store.upsert(item).await?;
            outcome.items += 1;

            if let Some(locator) = stored.locator.as_deref() {
                let created = self
                    .task_queue
                    .enqueue_detail(&task.source, &stored.id, locator, priority)
                    .await?;
                if created.is_some() {
                    outcome.derived_tasks += 1;
                }
            }
        }

        debug!(
            task_id = %task.id,
            received = entries.len(),
            stored = outcome.items,
            derived = outcome.derived_tasks,
            "发现结果已写入"
        );
        Ok(outcome)
    }

    async fn interpret_detail(&self, task: &Task, payload: Value) -> SchedulerResult<Interpretation> {
        let item_id = task.item_id().ok_or_else(|| {
            SchedulerError::InvalidTaskParams(format!("详情任务 {} 缺少条目ID", task.id))
        })?;

        let Value::Object(mut fields) = payload else {
            return Err(SchedulerError::InvalidResultPayload(format!(
                "详情结果必须是单个对象, 实际为: {}",
                json_type_name(&payload)
            )));
        };
        fields.insert("id".to_string(), Value::String(item_id.to_string()));

        let detail = DiscoveredItem::from_payload(&task.source, &Value::Object(fields))?;
        self.item_store.merge(detail).await?;

        Ok(Interpretation {
            items: 1,
            derived_tasks: 0,
        })
    }

    /// 派生详情任务的优先级总是高于其父任务
    fn derived_priority(&self, parent: &Task) -> i32 {
        parent
            .priority
            .saturating_add(1)
            .max(self.config.detail_priority)
    }

    /// 推进小时桶
    pub async fn rotate_hour(&self, now: DateTime<Utc>) {
        self.stats.lock().await.rotate(now);
    }

    pub async fn performance(&self, window: LookbackWindow) -> PerformanceMetrics {
        self.stats.lock().await.performance(window)
    }

    pub async fn source_stats(&self) -> Vec<SourceStats> {
        self.stats.lock().await.source_stats()
    }

    pub async fn success_rate(&self) -> f64 {
        self.stats.lock().await.success_rate()
    }

    pub async fn average_duration_ms(&self) -> f64 {
        self.stats.lock().await.average_duration_ms()
    }

    pub async fn hourly_buckets(&self) -> Vec<HourlyBucket> {
        self.stats.lock().await.hourly().cloned().collect()
    }
}

/// 任务已离开活跃队列或换了持有者
fn is_stale(err: &SchedulerError) -> bool {
    matches!(
        err,
        SchedulerError::TaskNotFound { .. }
            | SchedulerError::TaskNotOwned { .. }
            | SchedulerError::InvalidTaskState { .. }
    )
}

/// 取出发现结果中的条目列表：裸数组，或在 items / jobs / results 下包裹的数组
fn discover_entries(payload: Value) -> SchedulerResult<Vec<Value>> {
    match payload {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut fields) => DISCOVER_WRAPPER_KEYS
            .iter()
            .find_map(|key| match fields.remove(*key) {
                Some(Value::Array(entries)) => Some(entries),
                _ => None,
            })
            .ok_or_else(|| {
                SchedulerError::InvalidResultPayload("发现结果中没有条目列表".to_string())
            }),
        other => Err(SchedulerError::InvalidResultPayload(format!(
            "发现结果必须是条目列表, 实际为: {}",
            json_type_name(&other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{item_store::InMemoryItemStore, task_queue::InMemoryTaskQueue};
    use async_trait::async_trait;
    use fleet_core::models::{ItemCategory, ItemStoreStats};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    /// 第一次 upsert 时挂起，直到测试放行
    struct GatedItemStore {
        inner: InMemoryItemStore,
        armed: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl GatedItemStore {
        fn new() -> Self {
            Self {
                inner: InMemoryItemStore::new(),
                armed: AtomicBool::new(true),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl ItemStore for GatedItemStore {
        async fn upsert(&self, item: DiscoveredItem) -> SchedulerResult<DiscoveredItem> {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.upsert(item).await
        }

        async fn merge(&self, item: DiscoveredItem) -> SchedulerResult<DiscoveredItem> {
            self.inner.merge(item).await
        }

        async fn get(&self, id: &str) -> SchedulerResult<Option<DiscoveredItem>> {
            self.inner.get(id).await
        }

        async fn all(&self) -> SchedulerResult<Vec<DiscoveredItem>> {
            self.inner.all().await
        }

        async fn by_category(
            &self,
            category: ItemCategory,
        ) -> SchedulerResult<Vec<DiscoveredItem>> {
            self.inner.by_category(category).await
        }

        async fn search(&self, query: &str) -> SchedulerResult<Vec<DiscoveredItem>> {
            self.inner.search(query).await
        }

        async fn stats(&self) -> SchedulerResult<ItemStoreStats> {
            self.inner.stats().await
        }

        async fn clear(&self) -> SchedulerResult<usize> {
            self.inner.clear().await
        }
    }

    fn gated_fixture() -> (Arc<InMemoryTaskQueue>, Arc<GatedItemStore>, Arc<ResultCollector>) {
        let config = SchedulerConfig::default();
        let queue = Arc::new(InMemoryTaskQueue::new(config.clone()));
        let store = Arc::new(GatedItemStore::new());
        let collector = Arc::new(ResultCollector::new(
            queue.clone(),
            store.clone(),
            config,
            100,
            Arc::new(MetricsCollector::new()),
        ));
        (queue, store, collector)
    }

    struct Fixture {
        queue: Arc<InMemoryTaskQueue>,
        items: Arc<InMemoryItemStore>,
        collector: ResultCollector,
    }

    fn fixture() -> Fixture {
        let config = SchedulerConfig::default();
        let queue = Arc::new(InMemoryTaskQueue::new(config.clone()));
        let items = Arc::new(InMemoryItemStore::new());
        let collector = ResultCollector::new(
            queue.clone(),
            items.clone(),
            config,
            100,
            Arc::new(MetricsCollector::new()),
        );
        Fixture {
            queue,
            items,
            collector,
        }
    }

    async fn assigned_discover(f: &Fixture, worker: &str) -> Task {
        f.queue
            .enqueue_discover("indeed", json!({"q": "rust"}), 1)
            .await
            .unwrap();
        f.queue.assign(worker, 1).await.unwrap().remove(0)
    }

    #[test]
    fn test_discover_entries_accepts_wrappers() {
        assert_eq!(discover_entries(json!([1, 2])).unwrap().len(), 2);
        assert_eq!(discover_entries(json!({"jobs": [1]})).unwrap().len(), 1);
        assert_eq!(discover_entries(json!({"results": []})).unwrap().len(), 0);
        assert!(discover_entries(json!({"title": "x"})).is_err());
        assert!(discover_entries(json!("text")).is_err());
    }

    #[tokio::test]
    async fn test_discover_result_spawns_detail_tasks() {
        let f = fixture();
        let task = assigned_discover(&f, "w1").await;

        let outcome = f
            .collector
            .process_result(
                "w1",
                &task.id,
                json!([
                    {"id": "a", "title": "Rust Engineer", "url": "https://x.test/a"},
                    {"id": "b", "title": "Designer", "url": "https://x.test/b"},
                    {"id": "c", "title": "No link"}
                ]),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CollectOutcome::Completed {
                items: 3,
                derived_tasks: 2
            }
        );
        assert_eq!(f.items.all().await.unwrap().len(), 3);

        let active = f.queue.active_tasks().await.unwrap();
        assert_eq!(active.len(), 2);
        assert!(active
            .iter()
            .all(|t| t.kind == TaskKind::Detail && t.priority > task.priority));
        assert!(f.queue.get(&task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_detail_priority_exceeds_parent() {
        let f = fixture();
        f.queue
            .enqueue_discover("indeed", json!({}), 7)
            .await
            .unwrap();
        let task = f.queue.assign("w1", 1).await.unwrap().remove(0);

        f.collector
            .process_result("w1", &task.id, json!([{"id": "a", "url": "https://x.test/a"}]))
            .await
            .unwrap();

        let detail = f
            .queue
            .get(&Task::detail_task_id("indeed", "a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.priority, 8);
    }

    #[tokio::test]
    async fn test_duplicate_discovery_does_not_duplicate_detail_tasks() {
        let f = fixture();
        let first = assigned_discover(&f, "w1").await;
        f.collector
            .process_result("w1", &first.id, json!([{"id": "a", "url": "https://x.test/a"}]))
            .await
            .unwrap();

        f.queue
            .enqueue_discover("indeed", json!({"q": "again"}), 0)
            .await
            .unwrap();
        let second = f.queue.assign("w2", 10).await.unwrap();
        let second = second.iter().find(|t| t.kind == TaskKind::Discover).unwrap();

        let outcome = f
            .collector
            .process_result("w2", &second.id, json!({"items": [{"id": "a", "url": "https://x.test/a"}]}))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CollectOutcome::Completed {
                items: 1,
                derived_tasks: 0
            }
        );
    }

    #[tokio::test]
    async fn test_detail_result_merges_into_item() {
        let f = fixture();
        let task = assigned_discover(&f, "w1").await;
        f.collector
            .process_result(
                "w1",
                &task.id,
                json!([{"id": "a", "title": "Analyst", "url": "https://x.test/a"}]),
            )
            .await
            .unwrap();

        let detail = f.queue.assign("w1", 1).await.unwrap().remove(0);
        assert_eq!(detail.kind, TaskKind::Detail);

        let outcome = f
            .collector
            .process_result(
                "w1",
                &detail.id,
                json!({"description": "Machine learning platform", "salary": "100k"}),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, CollectOutcome::Completed { items: 1, .. }));

        let item = f.items.get("a").await.unwrap().unwrap();
        assert_eq!(item.title.as_deref(), Some("Analyst"));
        assert_eq!(item.description.as_deref(), Some("Machine learning platform"));
        assert_eq!(item.attributes.get("salary"), Some(&json!("100k")));
    }

    #[tokio::test]
    async fn test_detail_result_echoing_id_alias_completes() {
        let f = fixture();
        let task = assigned_discover(&f, "w1").await;
        f.collector
            .process_result("w1", &task.id, json!([{"id": "a", "url": "https://x.test/a"}]))
            .await
            .unwrap();
        let detail = f.queue.assign("w1", 1).await.unwrap().remove(0);

        let outcome = f
            .collector
            .process_result(
                "w1",
                &detail.id,
                json!({"jobId": "a", "description": "Rust backend", "link": "https://x.test/a"}),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, CollectOutcome::Completed { items: 1, .. }));

        let item = f.items.get("a").await.unwrap().unwrap();
        assert_eq!(item.description.as_deref(), Some("Rust backend"));
        assert!(f.queue.get(&detail.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_discover_items_with_repeated_aliases_all_spawn_details() {
        let f = fixture();
        let task = assigned_discover(&f, "w1").await;

        let outcome = f
            .collector
            .process_result(
                "w1",
                &task.id,
                json!([
                    {"id": "a", "url": "https://x.test/a", "link": "https://x.test/a"},
                    {"jobId": "b", "href": "https://x.test/b", "company": "Acme", "companyName": "Acme"}
                ]),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CollectOutcome::Completed {
                items: 2,
                derived_tasks: 2
            }
        );
        assert!(f
            .queue
            .get(&Task::detail_task_id("indeed", "b"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_shape_mismatch_becomes_failure() {
        let f = fixture();
        let task = assigned_discover(&f, "w1").await;

        let outcome = f
            .collector
            .process_result("w1", &task.id, json!({"title": "single object"}))
            .await
            .unwrap();
        assert_eq!(outcome, CollectOutcome::Retrying { attempts: 1 });

        let stored = f.queue.get(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Pending);
        assert!(stored.last_error.is_some());
        assert!(stored.assigned_to.is_none());
    }

    #[tokio::test]
    async fn test_callback_from_other_worker_is_ignored() {
        let f = fixture();
        let task = assigned_discover(&f, "w1").await;

        let outcome = f
            .collector
            .process_failure("w2", &task.id, "boom")
            .await
            .unwrap();
        assert_eq!(outcome, CollectOutcome::Ignored);

        let stored = f.queue.get(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Processing);
        assert_eq!(stored.attempts, 0);
    }

    #[tokio::test]
    async fn test_in_flight_result_cannot_complete_reassigned_task() {
        let (queue, store, collector) = gated_fixture();
        let task = queue
            .enqueue_discover("indeed", json!({}), 1)
            .await
            .unwrap();
        queue.assign("w1", 1).await.unwrap();

        let in_flight = {
            let collector = collector.clone();
            let task_id = task.id.clone();
            tokio::spawn(async move {
                collector
                    .process_result("w1", &task_id, json!([{"id": "a", "url": "https://x.test/a"}]))
                    .await
            })
        };
        store.entered.notified().await;

        // 结果仍在写入时，同一Worker又报告失败，任务随后被w2领走
        let outcome = collector.process_failure("w1", &task.id, "timeout").await.unwrap();
        assert_eq!(outcome, CollectOutcome::Retrying { attempts: 1 });
        let reassigned = queue.assign("w2", 1).await.unwrap();
        assert_eq!(reassigned[0].id, task.id);

        store.release.notify_one();
        let outcome = in_flight.await.unwrap().unwrap();
        assert_eq!(outcome, CollectOutcome::Ignored);

        let current = queue.get(&task.id).await.unwrap().unwrap();
        assert_eq!(current.status, TaskStatus::Processing);
        assert_eq!(current.assigned_to.as_deref(), Some("w2"));
        assert_eq!(current.attempts, 1);
        assert_eq!(collector.performance(LookbackWindow::OneHour).await.completed, 0);
    }

    #[tokio::test]
    async fn test_concurrent_results_complete_once() {
        let (queue, store, collector) = gated_fixture();
        let task = queue
            .enqueue_discover("indeed", json!({}), 1)
            .await
            .unwrap();
        queue.assign("w1", 1).await.unwrap();

        let first = {
            let collector = collector.clone();
            let task_id = task.id.clone();
            tokio::spawn(async move {
                collector
                    .process_result("w1", &task_id, json!([{"id": "a", "url": "https://x.test/a"}]))
                    .await
            })
        };
        store.entered.notified().await;

        let second = collector
            .process_result("w1", &task.id, json!([{"id": "a", "url": "https://x.test/a"}]))
            .await
            .unwrap();
        assert!(matches!(second, CollectOutcome::Completed { items: 1, .. }));

        store.release.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), CollectOutcome::Ignored);

        let sources = collector.source_stats().await;
        assert_eq!(sources[0].successes, 1);
        let page = queue
            .query_history(&fleet_core::models::TaskHistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_unknown_task_is_ignored() {
        let f = fixture();
        let outcome = f
            .collector
            .process_result("w1", "missing", json!([]))
            .await
            .unwrap();
        assert_eq!(outcome, CollectOutcome::Ignored);
        assert_eq!(f.collector.success_rate().await, 0.0);
    }

    #[tokio::test]
    async fn test_failures_until_terminal() {
        let f = fixture();
        let task = assigned_discover(&f, "w1").await;

        for (i, error) in ["e1", "e2"].iter().enumerate() {
            let outcome = f
                .collector
                .process_failure("w1", &task.id, error)
                .await
                .unwrap();
            assert_eq!(
                outcome,
                CollectOutcome::Retrying {
                    attempts: i as u32 + 1
                }
            );
            f.queue.assign("w1", 1).await.unwrap();
        }

        let outcome = f
            .collector
            .process_failure("w1", &task.id, "e3")
            .await
            .unwrap();
        assert_eq!(outcome, CollectOutcome::Failed { attempts: 3 });

        let sources = f.collector.source_stats().await;
        assert_eq!(sources[0].failures, 3);
        let perf = f.collector.performance(LookbackWindow::OneHour).await;
        assert_eq!(perf.failed, 3);
    }

    #[tokio::test]
    async fn test_rotation_keeps_24_buckets() {
        let f = fixture();
        for _ in 0..30 {
            f.collector.rotate_hour(Utc::now()).await;
        }
        assert_eq!(f.collector.hourly_buckets().await.len(), 24);
    }
}
