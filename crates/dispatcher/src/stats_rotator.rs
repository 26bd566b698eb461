use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, DurationRound, Utc};
use tracing::{debug, info};

use crate::result_collector::ResultCollector;
use crate::scheduled_job::{spawn_periodic_after, JobHandle};

/// 小时桶轮转任务
pub struct StatsRotator {
    collector: Arc<ResultCollector>,
    interval: Duration,
}

impl StatsRotator {
    pub fn new(collector: Arc<ResultCollector>, rotation_interval_seconds: u64) -> Self {
        Self {
            collector,
            interval: Duration::from_secs(rotation_interval_seconds.max(1)),
        }
    }

    pub async fn rotate_once(&self) {
        self.collector.rotate_hour(Utc::now()).await;
        debug!("统计小时桶已轮转");
    }

    /// 首次轮转对齐到下一个整点，此后按配置周期执行
    pub fn start(self: Arc<Self>) -> JobHandle {
        let period = self.interval;
        let first_delay = until_next_hour(Utc::now()).min(period);
        info!(
            interval_secs = period.as_secs(),
            first_delay_secs = first_delay.as_secs(),
            "启动统计轮转任务"
        );
        spawn_periodic_after("stats-rotator", first_delay, period, move || {
            let rotator = self.clone();
            async move { rotator.rotate_once().await }
        })
    }
}

/// 距下一个整点的时长
fn until_next_hour(now: DateTime<Utc>) -> Duration {
    let hour = chrono::Duration::hours(1);
    let current = now.duration_trunc(hour).unwrap_or(now);
    (current + hour - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        item_store::InMemoryItemStore, metrics_collector::MetricsCollector,
        task_queue::InMemoryTaskQueue,
    };
    use fleet_core::config::SchedulerConfig;

    #[test]
    fn test_until_next_hour() {
        let now = DateTime::parse_from_rfc3339("2024-05-01T10:59:30Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(until_next_hour(now), Duration::from_secs(30));

        let on_the_hour = DateTime::parse_from_rfc3339("2024-05-01T11:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(until_next_hour(on_the_hour), Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_rotation_advances_window() {
        let collector = Arc::new(ResultCollector::new(
            Arc::new(InMemoryTaskQueue::new(SchedulerConfig::default())),
            Arc::new(InMemoryItemStore::new()),
            SchedulerConfig::default(),
            100,
            Arc::new(MetricsCollector::new()),
        ));
        let before = collector.hourly_buckets().await;

        let rotator = StatsRotator::new(collector.clone(), 3600);
        rotator.rotate_once().await;

        let after = collector.hourly_buckets().await;
        assert_eq!(after.len(), 24);
        assert_eq!(after[0].hour_start, before[1].hour_start);
        assert!(after[23].hour_start > before[23].hour_start);
    }
}
