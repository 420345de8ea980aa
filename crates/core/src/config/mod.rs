//! 应用配置
//!
//! 默认值 → TOML配置文件 → `IMAGEBATCH__` 前缀环境变量，后者覆盖前者。

pub mod models;

pub use models::*;
