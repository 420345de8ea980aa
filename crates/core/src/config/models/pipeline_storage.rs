use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 流水线并发配置
///
/// 两级并发上限互相独立：外层限制同时处理的Feed数量，
/// 内层限制单个Feed内同时处理的Post数量。同一Post的规格始终串行。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_concurrent_feeds: usize,
    pub max_concurrent_posts: usize,
    /// 单次衍生图转换的超时时间，0表示不限制
    pub conversion_timeout_seconds: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_feeds: 15,
            max_concurrent_posts: 20,
            conversion_timeout_seconds: 300,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrent_feeds == 0 {
            return Err(anyhow::anyhow!("Feed最大并发数必须大于0"));
        }

        if self.max_concurrent_posts == 0 {
            return Err(anyhow::anyhow!("Post最大并发数必须大于0"));
        }

        Ok(())
    }

    pub fn conversion_timeout(&self) -> Option<Duration> {
        match self.conversion_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// 图片文件存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: "data/images".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.root_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("图片存储目录不能为空"));
        }
        Ok(())
    }
}
