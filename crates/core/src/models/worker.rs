use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 远程抓取Worker（浏览器扩展代理）
///
/// Worker只存在于进程内存中，超过存活窗口未出现即被移除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub last_seen: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
    pub status: WorkerStatus,
    /// 版本、平台等诊断信息
    pub info: serde_json::Value,
    pub current_task_id: Option<String>,
}

/// Worker状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkerStatus {
    #[serde(rename = "IDLE")]
    Idle,
    #[serde(rename = "PROCESSING")]
    Processing,
}

impl Worker {
    /// 创建新的Worker记录
    pub fn new(id: &str, info: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            last_seen: now,
            registered_at: now,
            status: WorkerStatus::Idle,
            info,
            current_task_id: None,
        }
    }

    /// 未提供信息时使用的占位元数据
    pub fn placeholder_info() -> serde_json::Value {
        serde_json::json!({ "registered_via": "poll" })
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen = now;
    }

    /// 检查是否超过存活窗口
    pub fn is_expired(&self, now: DateTime<Utc>, timeout_seconds: i64) -> bool {
        (now - self.last_seen).num_seconds() > timeout_seconds
    }

    pub fn begin_task(&mut self, task_id: &str) {
        self.status = WorkerStatus::Processing;
        self.current_task_id = Some(task_id.to_string());
    }

    pub fn finish_task(&mut self) {
        self.status = WorkerStatus::Idle;
        self.current_task_id = None;
    }
}
