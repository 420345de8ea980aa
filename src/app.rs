use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use imagebatch_api::{create_app, AppState};
use imagebatch_core::AppConfig;
use imagebatch_domain::{Batch, BatchStatus, StatsSink};
use imagebatch_infrastructure::{
    init_metrics, CompositeStatsSink, DatabaseManager, FileImageStorage, ImageRsCodec,
    MetricsStatsSink,
};
use imagebatch_pipeline::{BatchCoordinator, PipelineContext, PipelineSettings};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info, warn};

/// 主应用程序
///
/// 持有数据库连接与装配好的批次协调器，可以作为HTTP服务运行，
/// 也可以直接在进程内执行一个批次。
pub struct Application {
    config: AppConfig,
    db: DatabaseManager,
    coordinator: BatchCoordinator,
    metrics: Option<PrometheusHandle>,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig) -> Result<Self> {
        let metrics = if config.observability.metrics_enabled {
            Some(init_metrics().context("初始化指标导出失败")?)
        } else {
            None
        };
        Self::with_metrics(config, metrics).await
    }

    /// 使用已安装的指标句柄创建应用
    pub async fn with_metrics(
        config: AppConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self> {
        info!("初始化应用程序");

        let db = DatabaseManager::new(&config.database)
            .await
            .with_context(|| format!("连接数据库失败: {}", config.database.url))?;
        db.migrate().await.context("执行数据库迁移失败")?;

        let sinks: Vec<Arc<dyn StatsSink>> = vec![
            db.stats_repository() as Arc<dyn StatsSink>,
            Arc::new(MetricsStatsSink::new()) as Arc<dyn StatsSink>,
        ];
        let stats_sink: Arc<dyn StatsSink> = Arc::new(CompositeStatsSink::new(sinks));

        let ctx = Arc::new(PipelineContext {
            feeds: db.feed_repository(),
            posts: db.post_repository(),
            images: db.image_repository(),
            generations: db.image_generation_repository(),
            batches: db.batch_repository(),
            storage: Arc::new(FileImageStorage::new(&config.storage.root_dir)),
            codec: Arc::new(ImageRsCodec::new()),
            stats_sink,
            settings: PipelineSettings::from(&config.pipeline),
        });

        info!(
            "流水线并发限制: Feed {} / Post {}",
            ctx.settings.max_concurrent_feeds, ctx.settings.max_concurrent_posts
        );

        Ok(Self {
            config,
            db,
            coordinator: BatchCoordinator::new(ctx),
            metrics,
        })
    }

    pub fn coordinator(&self) -> &BatchCoordinator {
        &self.coordinator
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    /// 运行HTTP服务，直到收到关闭信号
    pub async fn serve(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut state = AppState::new(self.coordinator.clone());
        if let Some(handle) = &self.metrics {
            let endpoint = &self.config.observability.metrics_endpoint;
            state = state.with_metrics(handle.clone(), endpoint);
        }
        let app = create_app(state, &self.config.api);

        let bind_address = &self.config.api.bind_address;
        let listener = TcpListener::bind(bind_address)
            .await
            .with_context(|| format!("绑定API地址失败: {bind_address}"))?;
        info!("API服务器启动在: {bind_address}");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            })
            .await
            .context("API服务器运行失败")?;

        Ok(())
    }

    /// 在当前进程内执行一个批次并等待终态
    pub async fn run_batch(
        &self,
        schedule_id: Option<String>,
        start_row: i64,
        end_row: i64,
    ) -> Result<Batch> {
        let batch = self
            .coordinator
            .run_to_completion(schedule_id, start_row, end_row)
            .await
            .context("创建批次失败")?;
        info!(
            batch_id = batch.id,
            status = batch.status.as_str(),
            "批次执行结束"
        );
        Ok(batch)
    }

    /// 等待HTTP触发的批次结束，超时的批次标记为Error
    pub async fn drain_batches(&self, timeout: Duration) -> Vec<Batch> {
        let running = self.coordinator.running();
        if running > 0 {
            info!("等待 {running} 个批次结束 (最多 {timeout:?})");
        }
        let batches = self.coordinator.drain(timeout).await;
        let interrupted = batches
            .iter()
            .filter(|b| b.status == BatchStatus::Error)
            .count();
        if interrupted > 0 {
            warn!("{interrupted} 个批次以Error结束");
        }
        batches
    }

    pub async fn close(&self) {
        self.db.close().await;
        info!("数据库连接已关闭");
    }
}
