pub mod api_observability;
pub mod app_config;
pub mod database;
pub mod pipeline_storage;

// Re-export main types for easier imports
pub use api_observability::{ApiConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use pipeline_storage::{PipelineConfig, StorageConfig};
