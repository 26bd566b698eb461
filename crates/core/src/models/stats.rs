use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ItemCategory, Task, TaskKind, TaskStatus};

/// 每小时统计桶
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HourlyBucket {
    pub hour_start: DateTime<Utc>,
    pub completed_count: u64,
    pub failed_count: u64,
}

impl HourlyBucket {
    pub fn new(hour_start: DateTime<Utc>) -> Self {
        Self {
            hour_start,
            completed_count: 0,
            failed_count: 0,
        }
    }
}

/// 单个来源的统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceStats {
    pub source: String,
    pub successes: u64,
    pub failures: u64,
    pub average_duration_ms: f64,
}

impl SourceStats {
    pub fn success_rate(&self) -> f64 {
        rate(self.successes, self.failures)
    }
}

/// 性能指标查询的回看窗口
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LookbackWindow {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[default]
    #[serde(rename = "24h")]
    TwentyFourHours,
}

impl LookbackWindow {
    pub fn hours(&self) -> usize {
        match self {
            LookbackWindow::OneHour => 1,
            LookbackWindow::SixHours => 6,
            LookbackWindow::TwelveHours => 12,
            LookbackWindow::TwentyFourHours => 24,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1h" => Some(LookbackWindow::OneHour),
            "6h" => Some(LookbackWindow::SixHours),
            "12h" => Some(LookbackWindow::TwelveHours),
            "24h" => Some(LookbackWindow::TwentyFourHours),
            _ => None,
        }
    }
}

/// 性能指标快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub window: LookbackWindow,
    pub completed: u64,
    pub failed: u64,
    /// 窗口内成功率（0.0-1.0），无数据时为0
    pub success_rate: f64,
    pub tasks_per_hour: f64,
    /// 最近完成任务的滑动平均耗时
    pub average_duration_ms: f64,
    pub hourly: Vec<HourlyBucket>,
}

/// 任务队列统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskQueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub history_size: usize,
    pub by_source: HashMap<String, usize>,
    pub by_kind: HashMap<TaskKind, usize>,
}

impl TaskQueueStats {
    pub fn record(&mut self, task: &Task) {
        match task.status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Processing => self.processing += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
        *self.by_source.entry(task.source.clone()).or_default() += 1;
        *self.by_kind.entry(task.kind).or_default() += 1;
    }

    pub fn active(&self) -> usize {
        self.pending + self.processing
    }
}

/// 条目库统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemStoreStats {
    pub total: usize,
    pub by_category: HashMap<ItemCategory, usize>,
    pub by_source: HashMap<String, usize>,
}

pub fn rate(successes: u64, failures: u64) -> f64 {
    let total = successes + failures;
    if total == 0 {
        0.0
    } else {
        successes as f64 / total as f64
    }
}
