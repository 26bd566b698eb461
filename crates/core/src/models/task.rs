use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SchedulerError};

/// 任务种类
///
/// - `Discover`: 按搜索条件发现条目，结果为条目列表
/// - `Detail`: 抓取单个条目的完整记录，结果为单个对象
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskKind {
    #[serde(rename = "DISCOVER")]
    Discover,
    #[serde(rename = "DETAIL")]
    Detail,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Discover => "DISCOVER",
            TaskKind::Detail => "DETAIL",
        }
    }

    /// 大小写不敏感地解析任务种类
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "DISCOVER" => Some(TaskKind::Discover),
            "DETAIL" => Some(TaskKind::Detail),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务状态
///
/// 状态流转:
/// ```text
/// PENDING → PROCESSING → COMPLETED
///    ↑           ↓
///    └─── (失败未达上限 / Worker失联回收)
///                ↓
///              FAILED (attempts ≥ max_attempts)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PROCESSING")]
    Processing,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => Some(TaskStatus::Pending),
            "PROCESSING" => Some(TaskStatus::Processing),
            "COMPLETED" => Some(TaskStatus::Completed),
            "FAILED" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    /// 是否为终止状态（COMPLETED / FAILED）
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 远程抓取任务
///
/// 不变量: `assigned_to` 当且仅当 `status == Processing` 时有值。
/// `attempts` 只在显式失败回调时增加，Worker失联回收不计入。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub kind: TaskKind,
    pub source: String,
    pub params: serde_json::Value,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub assigned_to: Option<String>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub status: TaskStatus,
    pub last_error: Option<String>,
}

/// 下发给Worker的任务描述
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDescriptor {
    pub id: String,
    pub kind: TaskKind,
    pub source: String,
    pub params: serde_json::Value,
}

impl Task {
    /// 创建发现任务
    ///
    /// ID 由种类、来源、创建时间和随机后缀组成，同一来源可并存多个发现任务。
    pub fn discover(
        source: &str,
        params: serde_json::Value,
        priority: i32,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let id = format!(
            "discover:{}:{}:{}",
            source,
            now.timestamp_millis(),
            &suffix[..8]
        );
        Self::new(id, TaskKind::Discover, source, params, priority, max_attempts, now)
    }

    /// 创建详情任务
    ///
    /// ID 只取决于 `(source, item_id)`，重复发现同一条目不会产生重复任务。
    pub fn detail(
        source: &str,
        item_id: &str,
        locator: &str,
        priority: i32,
        max_attempts: u32,
    ) -> Self {
        let params = serde_json::json!({
            "item_id": item_id,
            "url": locator,
        });
        Self::new(
            Self::detail_task_id(source, item_id),
            TaskKind::Detail,
            source,
            params,
            priority,
            max_attempts,
            Utc::now(),
        )
    }

    pub fn detail_task_id(source: &str, item_id: &str) -> String {
        format!("detail:{source}:{item_id}")
    }

    fn new(
        id: String,
        kind: TaskKind,
        source: &str,
        params: serde_json::Value,
        priority: i32,
        max_attempts: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            source: source.to_string(),
            params,
            priority,
            created_at,
            started_at: None,
            completed_at: None,
            failed_at: None,
            duration_ms: None,
            assigned_to: None,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            status: TaskStatus::Pending,
            last_error: None,
        }
    }

    /// 详情任务关联的条目ID
    pub fn item_id(&self) -> Option<&str> {
        self.params.get("item_id").and_then(|v| v.as_str())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor {
            id: self.id.clone(),
            kind: self.kind,
            source: self.source.clone(),
            params: self.params.clone(),
        }
    }

    fn ensure_status(&self, expected: TaskStatus) -> Result<()> {
        if self.status != expected {
            return Err(SchedulerError::InvalidTaskState {
                id: self.id.clone(),
                expected: expected.to_string(),
                actual: self.status.to_string(),
            });
        }
        Ok(())
    }

    /// PENDING → PROCESSING
    pub fn mark_processing(&mut self, worker_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_status(TaskStatus::Pending)?;
        self.status = TaskStatus::Processing;
        self.assigned_to = Some(worker_id.to_string());
        self.started_at = Some(now);
        Ok(())
    }

    /// PROCESSING → COMPLETED，同时计算耗时
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_status(TaskStatus::Processing)?;
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now);
        self.duration_ms = self
            .started_at
            .map(|started| (now - started).num_milliseconds().max(0));
        self.assigned_to = None;
        Ok(())
    }

    /// 检查任务正由指定Worker处理
    pub fn ensure_held_by(&self, worker_id: &str) -> Result<()> {
        if self.status != TaskStatus::Processing || self.assigned_to.as_deref() != Some(worker_id) {
            return Err(SchedulerError::TaskNotOwned {
                id: self.id.clone(),
                worker_id: worker_id.to_string(),
            });
        }
        Ok(())
    }

    /// 记录一次失败，只接受 PROCESSING 状态
    ///
    /// 未达上限时回到 PENDING，否则进入 FAILED。返回失败后的状态。
    pub fn record_failure(&mut self, error: &str, now: DateTime<Utc>) -> Result<TaskStatus> {
        self.ensure_status(TaskStatus::Processing)?;

        self.attempts += 1;
        self.last_error = Some(error.to_string());
        self.assigned_to = None;

        if self.attempts >= self.max_attempts {
            self.status = TaskStatus::Failed;
            self.failed_at = Some(now);
            self.duration_ms = self
                .started_at
                .map(|started| (now - started).num_milliseconds().max(0));
        } else {
            self.status = TaskStatus::Pending;
            self.started_at = None;
        }

        Ok(self.status)
    }

    /// PROCESSING → PENDING，不增加 attempts
    pub fn reclaim(&mut self) -> Result<()> {
        self.ensure_status(TaskStatus::Processing)?;
        self.status = TaskStatus::Pending;
        self.assigned_to = None;
        self.started_at = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detail_task_id_is_deterministic() {
        let a = Task::detail("indeed", "job-1", "https://example.com/1", 2, 3);
        let b = Task::detail("indeed", "job-1", "https://example.com/other", 5, 3);
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, "detail:indeed:job-1");
        assert_eq!(a.item_id(), Some("job-1"));
    }

    #[test]
    fn test_discover_task_ids_are_unique() {
        let a = Task::discover("indeed", json!({"q": "rust"}), 1, 3);
        let b = Task::discover("indeed", json!({"q": "rust"}), 1, 3);
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("discover:indeed:"));
        assert_eq!(a.status, TaskStatus::Pending);
        assert!(a.assigned_to.is_none());
    }

    #[test]
    fn test_processing_and_completion_sets_duration() {
        let mut task = Task::discover("linkedin", json!({}), 1, 3);
        let start = Utc::now();
        task.mark_processing("worker-a", start).unwrap();
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.assigned_to.as_deref(), Some("worker-a"));

        task.mark_completed(start + chrono::Duration::milliseconds(1500))
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.duration_ms, Some(1500));
        assert!(task.assigned_to.is_none());
    }

    #[test]
    fn test_cannot_assign_processing_task() {
        let mut task = Task::discover("indeed", json!({}), 1, 3);
        task.mark_processing("worker-a", Utc::now()).unwrap();
        let err = task.mark_processing("worker-b", Utc::now()).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidTaskState { .. }));
        assert_eq!(task.assigned_to.as_deref(), Some("worker-a"));
    }

    #[test]
    fn test_failure_until_max_attempts() {
        let mut task = Task::discover("indeed", json!({}), 1, 2);
        task.mark_processing("worker-a", Utc::now()).unwrap();

        let status = task.record_failure("timeout", Utc::now()).unwrap();
        assert_eq!(status, TaskStatus::Pending);
        assert_eq!(task.attempts, 1);
        assert!(task.assigned_to.is_none());

        task.mark_processing("worker-b", Utc::now()).unwrap();
        let status = task.record_failure("captcha", Utc::now()).unwrap();
        assert_eq!(status, TaskStatus::Failed);
        assert_eq!(task.attempts, 2);
        assert_eq!(task.last_error.as_deref(), Some("captcha"));
        assert!(task.failed_at.is_some());

        assert!(task.record_failure("again", Utc::now()).is_err());
    }

    #[test]
    fn test_failure_requires_processing() {
        let mut task = Task::discover("indeed", json!({}), 1, 3);
        let err = task.record_failure("early", Utc::now()).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidTaskState { .. }));
        assert_eq!(task.attempts, 0);

        task.mark_processing("worker-a", Utc::now()).unwrap();
        task.record_failure("timeout", Utc::now()).unwrap();
        assert!(task.record_failure("duplicate", Utc::now()).is_err());
        assert_eq!(task.attempts, 1);
    }

    #[test]
    fn test_ensure_held_by() {
        let mut task = Task::discover("indeed", json!({}), 1, 3);
        assert!(matches!(
            task.ensure_held_by("worker-a"),
            Err(SchedulerError::TaskNotOwned { .. })
        ));

        task.mark_processing("worker-a", Utc::now()).unwrap();
        assert!(task.ensure_held_by("worker-a").is_ok());
        assert!(task.ensure_held_by("worker-b").is_err());
    }

    #[test]
    fn test_reclaim_keeps_attempts() {
        let mut task = Task::discover("indeed", json!({}), 1, 3);
        task.mark_processing("worker-a", Utc::now()).unwrap();
        task.record_failure("boom", Utc::now()).unwrap();
        task.mark_processing("worker-b", Utc::now()).unwrap();

        task.reclaim().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.attempts, 1);
        assert!(task.assigned_to.is_none());
        assert!(task.reclaim().is_err());
    }

    #[test]
    fn test_status_and_kind_parsing() {
        assert_eq!(TaskStatus::parse("failed"), Some(TaskStatus::Failed));
        assert_eq!(TaskKind::parse("Detail"), Some(TaskKind::Detail));
        assert_eq!(TaskKind::parse("unknown"), None);
        assert_eq!(
            serde_json::to_value(TaskKind::Discover).unwrap(),
            json!("DISCOVER")
        );
    }
}
