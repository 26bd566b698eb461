use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 周期任务句柄，持有独立的取消通道
pub struct JobHandle {
    name: &'static str,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl JobHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 发送停止信号并等待循环退出
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.handle.await {
            warn!(job = self.name, error = %e, "周期任务异常退出");
        }
        info!(job = self.name, "周期任务已停止");
    }
}

/// 按固定周期执行 `tick`，首次执行在一个周期之后
pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, tick: F) -> JobHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    spawn_periodic_after(name, period, period, tick)
}

/// 首次执行在 `first_delay` 之后，此后按 `period` 重复
pub fn spawn_periodic_after<F, Fut>(
    name: &'static str,
    first_delay: Duration,
    period: Duration,
    mut tick: F,
) -> JobHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, mut stop_rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + first_delay, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            job = name,
            first_delay_secs = first_delay.as_secs_f64(),
            period_secs = period.as_secs_f64(),
            "周期任务已启动"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!(job = name, "执行周期任务");
                    tick().await;
                }
                _ = &mut stop_rx => {
                    debug!(job = name, "收到停止信号");
                    break;
                }
            }
        }
    });

    JobHandle {
        name,
        stop_tx: Some(stop_tx),
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_job_ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let job = spawn_periodic("counter", Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(job.name(), "counter");
        job.stop().await;

        let observed = ticks.load(Ordering::SeqCst);
        assert!(observed >= 1);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), observed);
    }

    #[tokio::test]
    async fn test_first_delay_overrides_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let job = spawn_periodic_after(
            "aligned",
            Duration::from_millis(10),
            Duration::from_secs(3600),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        job.stop().await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_tick_is_delayed() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let job = spawn_periodic("slow", Duration::from_secs(3600), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        job.stop().await;
    }
}
