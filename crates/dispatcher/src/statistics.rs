use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, DurationRound, Utc};

use fleet_core::models::{rate, HourlyBucket, LookbackWindow, PerformanceMetrics, SourceStats};

/// 小时桶窗口长度，固定覆盖最近24小时
pub const WINDOW_HOURS: usize = 24;

/// 滚动统计
///
/// - 固定24个小时桶，队尾为当前小时，由定时任务轮转
/// - 最近任务耗时的有界环形缓冲区，用于计算滑动平均
/// - 按来源的成功、失败计数和平均耗时
#[derive(Debug, Clone)]
pub struct RollingStats {
    hourly: VecDeque<HourlyBucket>,
    durations: VecDeque<i64>,
    duration_capacity: usize,
    sources: HashMap<String, SourceAccumulator>,
    total_completed: u64,
    total_failed: u64,
}

#[derive(Debug, Clone, Default)]
struct SourceAccumulator {
    stats: SourceStats,
    timed_samples: u64,
}

fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::hours(1)).unwrap_or(ts)
}

impl RollingStats {
    pub fn new(duration_capacity: usize, now: DateTime<Utc>) -> Self {
        let current_hour = truncate_to_hour(now);
        let hourly = (0..WINDOW_HOURS)
            .rev()
            .map(|offset| HourlyBucket::new(current_hour - Duration::hours(offset as i64)))
            .collect();

        Self {
            hourly,
            durations: VecDeque::with_capacity(duration_capacity),
            duration_capacity: duration_capacity.max(1),
            sources: HashMap::new(),
            total_completed: 0,
            total_failed: 0,
        }
    }

    /// 推进一个小时桶，丢弃最旧的桶
    pub fn rotate(&mut self, now: DateTime<Utc>) {
        let next_hour = self
            .hourly
            .back()
            .map(|b| b.hour_start + Duration::hours(1))
            .unwrap_or_else(|| truncate_to_hour(now));
        let hour_start = next_hour.max(truncate_to_hour(now));

        self.hourly.push_back(HourlyBucket::new(hour_start));
        while self.hourly.len() > WINDOW_HOURS {
            self.hourly.pop_front();
        }
    }

    pub fn record_success(&mut self, source: &str, duration_ms: Option<i64>) {
        self.total_completed += 1;
        if let Some(bucket) = self.hourly.back_mut() {
            bucket.completed_count += 1;
        }

        let acc = self.source_entry(source);
        acc.stats.successes += 1;

        if let Some(duration) = duration_ms {
            acc.timed_samples += 1;
            let n = acc.timed_samples as f64;
            acc.stats.average_duration_ms += (duration as f64 - acc.stats.average_duration_ms) / n;

            self.durations.push_back(duration);
            while self.durations.len() > self.duration_capacity {
                self.durations.pop_front();
            }
        }
    }

    pub fn record_failure(&mut self, source: &str) {
        self.total_failed += 1;
        if let Some(bucket) = self.hourly.back_mut() {
            bucket.failed_count += 1;
        }
        self.source_entry(source).stats.failures += 1;
    }

    fn source_entry(&mut self, source: &str) -> &mut SourceAccumulator {
        self.sources
            .entry(source.to_string())
            .or_insert_with(|| SourceAccumulator {
                stats: SourceStats {
                    source: source.to_string(),
                    ..Default::default()
                },
                timed_samples: 0,
            })
    }

    pub fn hourly(&self) -> impl Iterator<Item = &HourlyBucket> {
        self.hourly.iter()
    }

    pub fn bucket_count(&self) -> usize {
        self.hourly.len()
    }

    /// 最近任务耗时的滑动平均
    pub fn average_duration_ms(&self) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        self.durations.iter().sum::<i64>() as f64 / self.durations.len() as f64
    }

    /// 启动以来的总体成功率
    pub fn success_rate(&self) -> f64 {
        rate(self.total_completed, self.total_failed)
    }

    pub fn performance(&self, window: LookbackWindow) -> PerformanceMetrics {
        let hours = window.hours().min(self.hourly.len());
        let hourly: Vec<HourlyBucket> = self
            .hourly
            .iter()
            .skip(self.hourly.len() - hours)
            .cloned()
            .collect();
        let completed: u64 = hourly.iter().map(|b| b.completed_count).sum();
        let failed: u64 = hourly.iter().map(|b| b.failed_count).sum();

        PerformanceMetrics {
            window,
            completed,
            failed,
            success_rate: rate(completed, failed),
            tasks_per_hour: if hours == 0 {
                0.0
            } else {
                completed as f64 / hours as f64
            },
            average_duration_ms: self.average_duration_ms(),
            hourly,
        }
    }

    /// 按来源名称排序的统计
    pub fn source_stats(&self) -> Vec<SourceStats> {
        let mut stats: Vec<SourceStats> = self.sources.values().map(|a| a.stats.clone()).collect();
        stats.sort_by(|a, b| a.source.cmp(&b.source));
        stats
    }
}
