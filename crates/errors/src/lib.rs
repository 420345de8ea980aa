use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Feed加载失败: {0}")]
    FeedLoad(String),
    #[error("No Feeds")]
    NoFeeds,
    #[error("Post查询失败: feed {feed_id} - {message}")]
    PostQuery { feed_id: i64, message: String },
    #[error(
        "Process Images - No Image record returned: {provider} (post {post_id}, index {index})"
    )]
    ImageLookup {
        provider: String,
        post_id: i64,
        index: i32,
    },
    #[error("图片生成规格加载失败: {0}")]
    SpecLoad(String),
    #[error("图片转换失败: 规格 {spec_id} - {message}")]
    Conversion { spec_id: i64, message: String },
    #[error("持久化失败: {0}")]
    Persistence(String),
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("存储错误: {0}")]
    Storage(String),
    #[error("图片编解码错误: {0}")]
    Codec(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("批次未找到: {id}")]
    BatchNotFound { id: i64 },
    #[error("批次条目未找到: {id}")]
    BatchItemNotFound { id: i64 },
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("数据验证失败: {0}")]
    ValidationError(String),
    #[error("Shutdown - 服务关闭，批次中断")]
    Interrupted,
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn feed_load<S: Into<String>>(msg: S) -> Self {
        Self::FeedLoad(msg.into())
    }
    pub fn post_query<S: Into<String>>(feed_id: i64, msg: S) -> Self {
        Self::PostQuery {
            feed_id,
            message: msg.into(),
        }
    }
    pub fn image_lookup<S: Into<String>>(provider: S, post_id: i64, index: i32) -> Self {
        Self::ImageLookup {
            provider: provider.into(),
            post_id,
            index,
        }
    }
    pub fn spec_load<S: Into<String>>(msg: S) -> Self {
        Self::SpecLoad(msg.into())
    }
    pub fn conversion<S: Into<String>>(spec_id: i64, msg: S) -> Self {
        Self::Conversion {
            spec_id,
            message: msg.into(),
        }
    }
    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Self::Persistence(msg.into())
    }
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }
    pub fn codec<S: Into<String>>(msg: S) -> Self {
        Self::Codec(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }

    /// 终止整个批次的错误：Feed加载失败、分区内没有Feed或服务关闭
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::FeedLoad(_) | PipelineError::NoFeeds | PipelineError::Interrupted
        )
    }

    /// 只终止单个Feed的错误
    pub fn is_feed_fatal(&self) -> bool {
        matches!(self, PipelineError::PostQuery { .. })
    }

    /// 只终止单个Post剩余转换工作的错误
    pub fn is_post_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ImageLookup { .. }
                | PipelineError::SpecLoad(_)
                | PipelineError::Conversion { .. }
                | PipelineError::Persistence(_)
        )
    }

    /// 错误分类标签，用于日志字段与指标
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::FeedLoad(_) => "feed_load",
            PipelineError::NoFeeds => "no_feeds",
            PipelineError::PostQuery { .. } => "post_query",
            PipelineError::ImageLookup { .. } => "image_lookup",
            PipelineError::SpecLoad(_) => "spec_load",
            PipelineError::Conversion { .. } => "conversion",
            PipelineError::Persistence(_) => "persistence",
            PipelineError::Database(_) => "database",
            PipelineError::Storage(_) => "storage",
            PipelineError::Codec(_) => "codec",
            PipelineError::Timeout(_) => "timeout",
            PipelineError::BatchNotFound { .. } => "batch_not_found",
            PipelineError::BatchItemNotFound { .. } => "batch_item_not_found",
            PipelineError::Serialization(_) => "serialization",
            PipelineError::Configuration(_) => "configuration",
            PipelineError::ValidationError(_) => "validation",
            PipelineError::Interrupted => "interrupted",
            PipelineError::Internal(_) => "internal",
        }
    }

    /// 错误链的调试文本，写入BatchItem的stack字段
    pub fn debug_chain(&self) -> String {
        let mut chain = format!("{self:?}");
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            chain.push_str("\ncaused by: ");
            chain.push_str(&err.to_string());
            source = err.source();
        }
        chain
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Internal(err.to_string())
    }
}
