pub mod fs_storage;

pub use fs_storage::FileImageStorage;
