pub mod codec;
pub mod database;
pub mod observability;
pub mod storage;

pub use codec::*;
pub use database::*;
pub use observability::*;
pub use storage::*;
