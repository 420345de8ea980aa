pub mod entities;
pub mod ports;
pub mod repositories;

// SQLx 实现（仅在启用 sqlx-support feature 时编译）
#[cfg(feature = "sqlx-support")]
pub mod sqlx_impls;

pub use entities::*;
pub use imagebatch_errors::{PipelineError, PipelineResult};
pub use ports::*;
pub use repositories::*;
