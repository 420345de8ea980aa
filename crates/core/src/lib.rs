pub mod config;
pub mod logging;

pub use config::{
    ApiConfig, AppConfig, DatabaseConfig, ObservabilityConfig, PipelineConfig, StorageConfig,
};
pub use logging::{init_logging, LogFormat};
