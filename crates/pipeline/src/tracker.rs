use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use imagebatch_domain::Batch;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::context::PipelineContext;
use crate::run::BatchRun;

/// 正在运行的批次
///
/// 后台批次任务放在同一个 `JoinSet` 中，关闭时可以统一等待或中止；
/// `runs` 保存尚未结束的批次运行状态，用于写入中断终态。
#[derive(Default)]
pub struct BatchTracker {
    tasks: tokio::sync::Mutex<JoinSet<Batch>>,
    runs: Mutex<HashMap<i64, Arc<BatchRun>>>,
}

impl BatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, ctx: &PipelineContext, batch: Batch) -> Arc<BatchRun> {
        let id = batch.id;
        let run = Arc::new(BatchRun::new(ctx, batch));
        self.lock_runs().insert(id, run.clone());
        run
    }

    pub fn deregister(&self, batch_id: i64) {
        self.lock_runs().remove(&batch_id);
    }

    /// 尚未结束的批次数量
    pub fn running(&self) -> usize {
        self.lock_runs().len()
    }

    /// 取出所有尚未结束的批次运行状态
    pub fn take_runs(&self) -> Vec<Arc<BatchRun>> {
        self.lock_runs().drain().map(|(_, run)| run).collect()
    }

    pub async fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Batch> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().await;
        // 顺便回收已经结束的任务
        while let Some(joined) = tasks.try_join_next() {
            log_joined(joined);
        }
        tasks.spawn(task);
    }

    /// 取走当前所有后台任务，之后启动的批次进入新的集合
    pub async fn take_tasks(&self) -> JoinSet<Batch> {
        std::mem::take(&mut *self.tasks.lock().await)
    }

    fn lock_runs(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Arc<BatchRun>>> {
        match self.runs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub(crate) fn log_joined(joined: Result<Batch, tokio::task::JoinError>) -> Option<Batch> {
    match joined {
        Ok(batch) => {
            info!(
                batch_id = batch.id,
                status = batch.status.as_str(),
                "批次后台处理结束"
            );
            Some(batch)
        }
        Err(e) => {
            error!("批次后台任务异常退出: {e}");
            None
        }
    }
}
