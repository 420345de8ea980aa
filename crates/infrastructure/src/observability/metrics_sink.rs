//! 统计快照输出到 `metrics` 指标，以及同时写多个sink的组合器

use std::sync::Arc;

use async_trait::async_trait;
use imagebatch_domain::{entities::StatSnapshot, ports::StatsSink};
use imagebatch_errors::PipelineResult;
use metrics::counter;
use tracing::warn;

/// 把每次刷新的快照累加到进程级计数器
#[derive(Debug, Default, Clone)]
pub struct MetricsStatsSink;

impl MetricsStatsSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StatsSink for MetricsStatsSink {
    async fn flush(&self, snapshot: &StatSnapshot) -> PipelineResult<()> {
        let labels = [
            ("scope", snapshot.scope.clone()),
            ("stat", snapshot.name.clone()),
        ];
        counter!("imagebatch_stat_success_total", &labels).increment(snapshot.success_count);
        counter!("imagebatch_stat_success_bytes_total", &labels).increment(snapshot.success_bytes);
        counter!("imagebatch_stat_errors_total", &labels).increment(snapshot.error_count);
        counter!("imagebatch_stat_flushes_total", &labels).increment(1);
        Ok(())
    }
}

/// 依次写入所有sink；第一个错误在全部写完后返回
pub struct CompositeStatsSink {
    sinks: Vec<Arc<dyn StatsSink>>,
}

impl CompositeStatsSink {
    pub fn new(sinks: Vec<Arc<dyn StatsSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl StatsSink for CompositeStatsSink {
    async fn flush(&self, snapshot: &StatSnapshot) -> PipelineResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.flush(snapshot).await {
                warn!(stat = %snapshot.name, "统计写入失败: {e}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
