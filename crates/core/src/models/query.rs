use serde::{Deserialize, Serialize};

use super::{Task, TaskKind, TaskStatus};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 500;

/// 历史任务查询条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskHistoryQuery {
    pub status: Option<TaskStatus>,
    pub source: Option<String>,
    pub kind: Option<TaskKind>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl TaskHistoryQuery {
    pub fn matches(&self, task: &Task) -> bool {
        self.status.is_none_or(|s| task.status == s)
            && self.kind.is_none_or(|k| task.kind == k)
            && self.source.as_deref().is_none_or(|s| task.source == s)
    }

    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT)
    }

    pub fn effective_offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

/// 分页后的任务列表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPage {
    pub items: Vec<Task>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}
