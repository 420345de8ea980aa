use chrono::{DateTime, Utc};
use imagebatch_errors::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 帖子自带主图的索引
pub const POST_MAIN_IMAGE_INDEX: i32 = 0;
/// 从正文中提取的主图索引，存在时优先使用
pub const EXTRACTED_MAIN_IMAGE_INDEX: i32 = 1;
/// 衍生图（rendition）统一写入的索引槽位
pub const RENDITION_IMAGE_INDEX: i32 = 99;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BatchType {
    #[serde(rename = "Process Images")]
    ProcessImages,
}

impl BatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchType::ProcessImages => "Process Images",
        }
    }
}

impl fmt::Display for BatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Process Images" => Ok(BatchType::ProcessImages),
            _ => Err(PipelineError::validation_error(format!(
                "无效的批次类型: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "Pending",
            BatchStatus::Processing => "Processing",
            BatchStatus::Completed => "Completed",
            BatchStatus::Error => "Error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Error)
    }
}

impl FromStr for BatchStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(BatchStatus::Pending),
            "Processing" => Ok(BatchStatus::Processing),
            "Completed" => Ok(BatchStatus::Completed),
            "Error" => Ok(BatchStatus::Error),
            _ => Err(PipelineError::validation_error(format!(
                "无效的批次状态: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BatchItemStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl BatchItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchItemStatus::Pending => "Pending",
            BatchItemStatus::Processing => "Processing",
            BatchItemStatus::Completed => "Completed",
            BatchItemStatus::Error => "Error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchItemStatus::Completed | BatchItemStatus::Error)
    }
}

impl FromStr for BatchItemStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(BatchItemStatus::Pending),
            "Processing" => Ok(BatchItemStatus::Processing),
            "Completed" => Ok(BatchItemStatus::Completed),
            "Error" => Ok(BatchItemStatus::Error),
            _ => Err(PipelineError::validation_error(format!(
                "无效的批次条目状态: {s}"
            ))),
        }
    }
}

/// 一次图片处理批次
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub id: i64,
    #[serde(rename = "type")]
    pub batch_type: BatchType,
    pub schedule_id: Option<String>,
    pub status: BatchStatus,
    pub pending_items: i64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    pub fn new(batch_type: BatchType, schedule_id: Option<String>) -> Self {
        Self {
            id: 0, // 将由仓储生成
            batch_type,
            schedule_id,
            status: BatchStatus::Pending,
            pending_items: 0,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// 进入Processing状态并记录待完成的Feed数量
    pub fn mark_processing(&mut self, pending_items: i64) {
        self.status = BatchStatus::Processing;
        self.pending_items = pending_items;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    pub fn mark_completed(&mut self, last_error: Option<String>) {
        self.status = BatchStatus::Completed;
        self.error = last_error;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_error<S: Into<String>>(&mut self, error: S) {
        self.status = BatchStatus::Error;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }
}

/// 单个Feed在批次中的进度记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchItem {
    pub id: i64,
    pub batch_id: i64,
    pub feed_id: i64,
    pub status: BatchItemStatus,
    pub error: Option<String>,
    pub stack: Option<String>,
    pub posts_total: i64,
    pub posts_failed: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchItem {
    pub fn new(batch_id: i64, feed_id: i64) -> Self {
        Self {
            id: 0,
            batch_id,
            feed_id,
            status: BatchItemStatus::Processing,
            error: None,
            stack: None,
            posts_total: 0,
            posts_failed: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// 记录一次失败。多个Post失败时保留最后一次的错误信息
    pub fn record_error<S: Into<String>>(&mut self, message: S, stack: Option<String>) {
        self.status = BatchItemStatus::Error;
        self.error = Some(message.into());
        self.stack = stack;
    }

    pub fn finish(&mut self) {
        if self.status != BatchItemStatus::Error {
            self.status = BatchItemStatus::Completed;
        }
        self.completed_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feed {
    pub id: i64,
    pub provider: String,
    pub source_tag: Option<String>,
    pub active: bool,
}

impl Feed {
    /// 日志中使用的 "provider : source_tag" 形式
    pub fn display_name(&self) -> String {
        match &self.source_tag {
            Some(tag) if !tag.is_empty() => format!("{} : {}", self.provider, tag),
            _ => self.provider.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub has_post_main_image: bool,
    pub has_extracted_main_image: bool,
    pub images_processed: bool,
    pub has_resized_images: bool,
    pub resize_failures: i32,
}

impl Post {
    /// 源图索引：优先使用提取的主图；两个标记都没有时返回None
    pub fn source_image_index(&self) -> Option<i32> {
        if self.has_extracted_main_image {
            Some(EXTRACTED_MAIN_IMAGE_INDEX)
        } else if self.has_post_main_image {
            Some(POST_MAIN_IMAGE_INDEX)
        } else {
            None
        }
    }

    /// 标记本轮已处理，重置衍生图结果
    pub fn begin_image_processing(&mut self) {
        self.images_processed = true;
        self.has_resized_images = false;
        self.resize_failures = 0;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// 覆盖目标区域（短边对齐），配合crop做居中裁剪
    Min,
    /// 完整放入目标区域（长边对齐）
    Max,
}

impl FitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitMode::Min => "min",
            FitMode::Max => "max",
        }
    }
}

impl FromStr for FitMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "min" => Ok(FitMode::Min),
            "max" => Ok(FitMode::Max),
            _ => Err(PipelineError::validation_error(format!(
                "无效的缩放模式: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn from_extension(ext: &str) -> PipelineResult<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            other => Err(PipelineError::validation_error(format!(
                "不支持的目标格式: {other}"
            ))),
        }
    }
}

/// 存储中的图片记录（源图或衍生图）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub id: i64,
    pub post_id: i64,
    pub index: i32,
    pub width: u32,
    pub height: u32,
    pub extension: String,
    pub image_type: String,
    pub source_extension: Option<String>,
    pub use_for_main_image: bool,
    pub fit_mode: Option<FitMode>,
    pub cropped: bool,
    pub quality: Option<u8>,
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Image {
    /// 根据源图与生成规格构造衍生图记录
    pub fn rendition(
        source: &Image,
        spec: &ImageGenerationSpec,
        metadata: &ImageMetadata,
    ) -> Self {
        Self {
            id: 0,
            post_id: source.post_id,
            index: RENDITION_IMAGE_INDEX,
            width: spec.width,
            height: spec.height,
            extension: spec.ext_dest.clone(),
            image_type: rendition_type_code(&source.image_type),
            source_extension: Some(source.extension.clone()),
            use_for_main_image: spec.use_for_main_image,
            fit_mode: Some(spec.fit_mode),
            cropped: spec.crop,
            quality: Some(spec.quality),
            file_size: Some(metadata.size as i64),
            created_at: Utc::now(),
        }
    }

    pub fn is_rendition(&self) -> bool {
        self.index == RENDITION_IMAGE_INDEX
    }
}

/// 衍生图类型码：源类型码的前两位加上 'r'
pub fn rendition_type_code(source_type: &str) -> String {
    let mut code: String = source_type.chars().take(2).collect();
    code.push('r');
    code
}

/// 一条衍生图生成规格
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageGenerationSpec {
    pub id: i64,
    pub width: u32,
    pub height: u32,
    pub fit_mode: FitMode,
    pub crop: bool,
    pub quality: u8,
    pub ext_dest: String,
    pub use_for_main_image: bool,
    pub active: bool,
}

impl ImageGenerationSpec {
    pub fn resize_request(&self) -> PipelineResult<ResizeRequest> {
        Ok(ResizeRequest {
            width: self.width,
            height: self.height,
            fit_mode: self.fit_mode,
            crop: self.crop,
            quality: self.quality,
            format: OutputFormat::from_extension(&self.ext_dest)?,
        })
    }
}

/// 交给编解码器的缩放参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeRequest {
    pub width: u32,
    pub height: u32,
    pub fit_mode: FitMode,
    pub crop: bool,
    pub quality: u8,
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

/// 统计计数器的快照，刷新到外部统计存储
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatSnapshot {
    pub scope: String,
    pub name: String,
    pub success_count: u64,
    pub success_bytes: u64,
    pub error_count: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StatSnapshot {
    pub fn total(&self) -> u64 {
        self.success_count + self.error_count
    }
}
