use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use imagebatch_domain::{PipelineResult, StatSnapshot, StatsSink};
use tracing::{debug, info};

/// 进程级统计作用域
pub const PROCESS_SCOPE: &str = "p";
/// 衍生图转换统计名
pub const IMAGE_CONVERSIONS_STAT: &str = "Image Conversions";
/// Post处理统计名
pub const PROCESS_IMAGES_STAT: &str = "processimages";

/// 线程安全的转换统计计数器
///
/// 同一次运行内被大量任务并发递增，运行结束时刷新到 [`StatsSink`] 一次。
#[derive(Debug)]
pub struct ConversionStatsAggregator {
    scope: String,
    name: String,
    success_count: AtomicU64,
    success_bytes: AtomicU64,
    error_count: AtomicU64,
    started_at: DateTime<Utc>,
    flushed: AtomicBool,
}

impl ConversionStatsAggregator {
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
            success_count: AtomicU64::new(0),
            success_bytes: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            started_at: Utc::now(),
            flushed: AtomicBool::new(false),
        }
    }

    pub fn image_conversions() -> Self {
        Self::new(PROCESS_SCOPE, IMAGE_CONVERSIONS_STAT)
    }

    pub fn process_images() -> Self {
        Self::new(PROCESS_SCOPE, PROCESS_IMAGES_STAT)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inc(&self, bytes: u64) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.success_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn inc_err(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    pub fn success_bytes(&self) -> u64 {
        self.success_bytes.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StatSnapshot {
        StatSnapshot {
            scope: self.scope.clone(),
            name: self.name.clone(),
            success_count: self.success_count(),
            success_bytes: self.success_bytes(),
            error_count: self.error_count(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }

    /// 刷新到统计存储。只有第一次调用会真正写出，之后返回 `Ok(false)`
    pub async fn flush(&self, sink: &dyn StatsSink) -> PipelineResult<bool> {
        if self
            .flushed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("统计 {} 已经刷新过，跳过", self.name);
            return Ok(false);
        }

        let snapshot = self.snapshot();
        info!(
            stat = %snapshot.name,
            success = snapshot.success_count,
            bytes = snapshot.success_bytes,
            errors = snapshot.error_count,
            "刷新统计"
        );
        sink.flush(&snapshot).await?;
        Ok(true)
    }
}
