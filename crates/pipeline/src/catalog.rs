use std::sync::Arc;

use imagebatch_domain::{
    ImageGenerationRepository, ImageGenerationSpec, PipelineError, PipelineResult,
};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// 一次运行内的衍生图规格目录
///
/// 首次成功加载后在本次运行内复用；加载失败不会被缓存，
/// 失败只影响发起加载的Post，后续Post会重新尝试。
pub struct GenerationCatalog {
    repository: Arc<dyn ImageGenerationRepository>,
    specs: OnceCell<Arc<Vec<ImageGenerationSpec>>>,
}

impl GenerationCatalog {
    pub fn new(repository: Arc<dyn ImageGenerationRepository>) -> Self {
        Self {
            repository,
            specs: OnceCell::new(),
        }
    }

    /// 返回 `active = true` 的规格，保持目录顺序
    pub async fn active_specs(&self) -> PipelineResult<Arc<Vec<ImageGenerationSpec>>> {
        let specs = self
            .specs
            .get_or_try_init(|| async {
                let specs = self.repository.find_active().await.map_err(|e| {
                    warn!("加载图片生成规格失败: {e}");
                    PipelineError::spec_load(e.to_string())
                })?;
                debug!("加载了 {} 条图片生成规格", specs.len());
                Ok::<_, PipelineError>(Arc::new(specs))
            })
            .await?;
        Ok(specs.clone())
    }
}
