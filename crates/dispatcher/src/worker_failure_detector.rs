use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use fleet_core::SchedulerResult;

use crate::scheduled_job::{spawn_periodic, JobHandle};
use crate::worker_registry::{SweepReport, WorkerRegistry};

/// Worker失效检测
///
/// 系统唯一的失效检测手段：周期性清扫超过存活窗口未出现的Worker，
/// 回收其在途任务。
pub struct WorkerFailureDetector {
    registry: Arc<WorkerRegistry>,
}

impl WorkerFailureDetector {
    pub fn new(registry: Arc<WorkerRegistry>) -> Self {
        Self { registry }
    }

    /// 执行一次检测
    pub async fn detect_and_reap(&self) -> SchedulerResult<SweepReport> {
        debug!("开始检测失效的Worker");
        let report = self.registry.sweep_expired(Utc::now()).await?;

        if !report.removed_workers.is_empty() {
            info!(
                "检测到 {} 个失效的Worker，回收 {} 个任务",
                report.removed_workers.len(),
                report.reclaimed_tasks.len()
            );
        }
        Ok(report)
    }

    /// 按注册表配置的间隔启动检测循环
    pub fn start(self: Arc<Self>) -> JobHandle {
        let period = Duration::from_secs(self.registry.config().sweep_interval_seconds);
        info!(
            interval_secs = period.as_secs(),
            timeout_secs = self.registry.config().liveness_timeout_seconds,
            "启动Worker失效检测服务"
        );

        spawn_periodic("worker-failure-detector", period, move || {
            let detector = self.clone();
            async move {
                if let Err(e) = detector.detect_and_reap().await {
                    error!("Worker失效检测时出错: {}", e);
                }
            }
        })
    }
}
