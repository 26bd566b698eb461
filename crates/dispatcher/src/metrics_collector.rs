use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};

/// 调度指标
///
/// 句柄在创建时从全局recorder获取；未安装recorder时所有记录都是空操作。
pub struct MetricsCollector {
    // 任务指标
    tasks_completed_total: Counter,
    tasks_failed_total: Counter,
    task_retries_total: Counter,
    task_duration: Histogram,
    derived_tasks_total: Counter,
    callbacks_ignored_total: Counter,

    // Worker指标
    active_workers: Gauge,
    workers_reaped_total: Counter,
    tasks_reclaimed_total: Counter,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            tasks_completed_total: counter!("fleet_tasks_completed_total"),
            tasks_failed_total: counter!("fleet_tasks_failed_total"),
            task_retries_total: counter!("fleet_task_retries_total"),
            task_duration: histogram!("fleet_task_duration_seconds"),
            derived_tasks_total: counter!("fleet_derived_tasks_total"),
            callbacks_ignored_total: counter!("fleet_callbacks_ignored_total"),
            active_workers: gauge!("fleet_active_workers"),
            workers_reaped_total: counter!("fleet_workers_reaped_total"),
            tasks_reclaimed_total: counter!("fleet_tasks_reclaimed_total"),
        }
    }

    pub fn record_task_completed(&self, duration_ms: Option<i64>) {
        self.tasks_completed_total.increment(1);
        if let Some(ms) = duration_ms {
            self.task_duration.record(ms.max(0) as f64 / 1000.0);
        }
    }

    /// 终止失败计入failed，仍可重试的失败计入retries
    pub fn record_task_failure(&self, terminal: bool) {
        if terminal {
            self.tasks_failed_total.increment(1);
        } else {
            self.task_retries_total.increment(1);
        }
    }

    pub fn record_derived_tasks(&self, count: usize) {
        self.derived_tasks_total.increment(count as u64);
    }

    pub fn record_ignored_callback(&self) {
        self.callbacks_ignored_total.increment(1);
    }

    pub fn set_active_workers(&self, count: usize) {
        self.active_workers.set(count as f64);
    }

    pub fn record_worker_reaped(&self, reclaimed_tasks: usize) {
        self.workers_reaped_total.increment(1);
        self.tasks_reclaimed_total.increment(reclaimed_tasks as u64);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let metrics = MetricsCollector::new();
        metrics.record_task_completed(Some(1500));
        metrics.record_task_failure(true);
        metrics.record_task_failure(false);
        metrics.record_derived_tasks(3);
        metrics.set_active_workers(2);
        metrics.record_worker_reaped(1);
    }
}
