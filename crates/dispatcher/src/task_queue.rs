use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use fleet_core::{
    config::SchedulerConfig,
    models::{Task, TaskHistoryQuery, TaskPage, TaskQueueStats, TaskStatus},
    traits::TaskQueue,
    SchedulerError, SchedulerResult,
};

/// 内存任务队列
///
/// 活跃任务（PENDING / PROCESSING）按ID保存在一张表中，终止任务移入有界历史。
/// 所有修改都在同一把锁内完成，`assign` 的"挑选 + 标记"因此是原子的。
pub struct InMemoryTaskQueue {
    state: Mutex<QueueState>,
    config: SchedulerConfig,
}

#[derive(Default)]
struct QueueState {
    active: HashMap<String, Task>,
    history: VecDeque<Task>,
}

impl QueueState {
    fn push_history(&mut self, task: Task, capacity: usize) {
        self.history.push_back(task);
        while self.history.len() > capacity {
            if let Some(evicted) = self.history.pop_front() {
                debug!(task_id = %evicted.id, "历史记录已满，淘汰最旧任务");
            }
        }
    }

    fn active_mut(&mut self, task_id: &str) -> SchedulerResult<&mut Task> {
        self.active
            .get_mut(task_id)
            .ok_or_else(|| SchedulerError::TaskNotFound {
                id: task_id.to_string(),
            })
    }
}

impl InMemoryTaskQueue {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    async fn insert_if_absent(&self, task: Task) -> Option<Task> {
        let mut state = self.state.lock().await;
        if state.active.contains_key(&task.id) {
            debug!(task_id = %task.id, "任务已在队列中，忽略重复插入");
            return None;
        }
        state.active.insert(task.id.clone(), task.clone());
        Some(task)
    }
}

/// 分配顺序：优先级降序，创建时间升序，ID作为最后的决胜条件
fn assignment_order(a: &Task, b: &Task) -> std::cmp::Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue_discover(
        &self,
        source: &str,
        params: serde_json::Value,
        priority: i32,
    ) -> SchedulerResult<Task> {
        if source.trim().is_empty() {
            return Err(SchedulerError::InvalidTaskParams(
                "来源不能为空".to_string(),
            ));
        }

        let task = Task::discover(source, params, priority, self.config.max_attempts);
        let id = task.id.clone();
        let created = self
            .insert_if_absent(task)
            .await
            .ok_or_else(|| SchedulerError::Internal(format!("发现任务ID冲突: {id}")))?;

        info!(task_id = %created.id, source = %source, priority, "新增发现任务");
        Ok(created)
    }

    async fn enqueue_detail(
        &self,
        source: &str,
        item_id: &str,
        locator: &str,
        priority: i32,
    ) -> SchedulerResult<Option<Task>> {
        if item_id.trim().is_empty() || locator.trim().is_empty() {
            return Err(SchedulerError::InvalidTaskParams(
                "详情任务需要条目ID和定位URL".to_string(),
            ));
        }

        let task = Task::detail(source, item_id, locator, priority, self.config.max_attempts);
        let created = self.insert_if_absent(task).await;
        if let Some(task) = &created {
            debug!(task_id = %task.id, source = %source, priority, "新增详情任务");
        }
        Ok(created)
    }

    async fn assign(&self, worker_id: &str, max_batch: usize) -> SchedulerResult<Vec<Task>> {
        if max_batch == 0 {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut state = self.state.lock().await;

        let mut candidates: Vec<&Task> = state
            .active
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .collect();
        candidates.sort_by(|a, b| assignment_order(a, b));
        let selected: Vec<String> = candidates
            .into_iter()
            .take(max_batch)
            .map(|t| t.id.clone())
            .collect();

        let mut batch = Vec::with_capacity(selected.len());
        for id in selected {
            let task = state.active_mut(&id)?;
            task.mark_processing(worker_id, now)?;
            batch.push(task.clone());
        }

        if !batch.is_empty() {
            info!(worker_id = %worker_id, count = batch.len(), "分配任务批次");
        }
        Ok(batch)
    }

    async fn complete(&self, task_id: &str, worker_id: &str) -> SchedulerResult<Task> {
        let mut state = self.state.lock().await;
        let task = state.active_mut(task_id)?;
        task.ensure_held_by(worker_id)?;
        task.mark_completed(Utc::now())?;

        let task = state
            .active
            .remove(task_id)
            .ok_or_else(|| SchedulerError::TaskNotFound {
                id: task_id.to_string(),
            })?;
        state.push_history(task.clone(), self.config.history_capacity);

        info!(task_id = %task_id, duration_ms = ?task.duration_ms, "任务完成");
        Ok(task)
    }

    async fn fail(&self, task_id: &str, worker_id: &str, error: &str) -> SchedulerResult<Task> {
        let mut state = self.state.lock().await;
        let task = state.active_mut(task_id)?;
        task.ensure_held_by(worker_id)?;
        let status = task.record_failure(error, Utc::now())?;
        let attempts = task.attempts;
        let max_attempts = task.max_attempts;

        if status == TaskStatus::Failed {
            let task = state
                .active
                .remove(task_id)
                .ok_or_else(|| SchedulerError::TaskNotFound {
                    id: task_id.to_string(),
                })?;
            state.push_history(task.clone(), self.config.history_capacity);
            warn!(
                task_id = %task_id,
                attempts,
                error = %error,
                "任务达到最大尝试次数，标记为失败"
            );
            return Ok(task);
        }

        info!(
            task_id = %task_id,
            attempts,
            max_attempts,
            error = %error,
            "任务失败，重新进入待处理队列"
        );
        Ok(task.clone())
    }

    async fn reclaim(&self, task_id: &str) -> SchedulerResult<Task> {
        let mut state = self.state.lock().await;
        let task = state.active_mut(task_id)?;
        let previous = task.assigned_to.clone();
        task.reclaim()?;

        info!(
            task_id = %task_id,
            worker_id = ?previous,
            attempts = task.attempts,
            "回收失联Worker的任务"
        );
        Ok(task.clone())
    }

    async fn get(&self, task_id: &str) -> SchedulerResult<Option<Task>> {
        let state = self.state.lock().await;
        Ok(state.active.get(task_id).cloned())
    }

    async fn assigned_to(&self, worker_id: &str) -> SchedulerResult<Vec<Task>> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .active
            .values()
            .filter(|t| t.assigned_to.as_deref() == Some(worker_id))
            .cloned()
            .collect();
        tasks.sort_by(assignment_order);
        Ok(tasks)
    }

    async fn active_tasks(&self) -> SchedulerResult<Vec<Task>> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state.active.values().cloned().collect();
        tasks.sort_by(assignment_order);
        Ok(tasks)
    }

    async fn query_history(&self, query: &TaskHistoryQuery) -> SchedulerResult<TaskPage> {
        let limit = query.effective_limit();
        let offset = query.effective_offset();

        let state = self.state.lock().await;
        let matching: Vec<&Task> = state
            .history
            .iter()
            .rev()
            .filter(|t| query.matches(t))
            .collect();

        Ok(TaskPage {
            total: matching.len(),
            items: matching
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
            limit,
            offset,
        })
    }

    async fn stats(&self) -> SchedulerResult<TaskQueueStats> {
        let state = self.state.lock().await;
        let mut stats = TaskQueueStats {
            history_size: state.history.len(),
            ..Default::default()
        };
        for task in state.active.values().chain(state.history.iter()) {
            stats.record(task);
        }
        Ok(stats)
    }
}
