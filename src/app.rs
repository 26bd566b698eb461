use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info, warn};

use fleet_api::create_app;
use fleet_core::AppConfig;
use fleet_dispatcher::FleetEngine;

/// 主应用程序
pub struct Application {
    config: AppConfig,
    engine: FleetEngine,
    metrics_handle: Option<PrometheusHandle>,
}

impl Application {
    pub fn new(config: AppConfig) -> Result<Self> {
        let metrics_handle = if config.observability.metrics_enabled {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .context("安装Prometheus指标导出器失败")?;
            info!("Prometheus指标已启用: {}", config.observability.metrics_endpoint);
            Some(handle)
        } else {
            None
        };

        // 指标句柄在recorder安装之后创建
        let engine = FleetEngine::new(&config);

        Ok(Self {
            config,
            engine,
            metrics_handle,
        })
    }

    /// 运行HTTP服务和后台任务，直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let jobs = self.engine.start_background_jobs();

        let app = create_app(&self.engine, &self.config, self.metrics_handle.clone());
        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;
        info!("API服务器监听: {}", self.config.api.bind_address);

        let served = axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            })
            .await;

        for job in jobs {
            job.stop().await;
        }

        if let Err(e) = served {
            warn!("API服务器异常退出: {e}");
            return Err(e).context("API服务器运行失败");
        }

        info!("API服务器已停止");
        Ok(())
    }
}
