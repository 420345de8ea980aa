//! # Imagebatch Testing Utils
//!
//! Shared testing utilities for the image batch pipeline.
//! This crate provides in-memory implementations of every repository and
//! port trait, test data builders, and small helpers for concurrency tests.
//!
//! ## Features
//!
//! - **Mock Repositories**: In-memory feeds, posts, images, generation specs and batches
//! - **Mock Ports**: Image storage, a deterministic fake codec and a recording stats sink
//! - **Failure Injection**: Per-feed, per-post and per-spec failures
//! - **Concurrency Probes**: Track the peak number of in-flight calls
//! - **Test Data Builders**: Utilities for creating test data
//!
//! ## Usage
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! imagebatch-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! Then use the mocks in your tests:
//!
//! ```rust
//! use imagebatch_testing_utils::mocks::*;
//! use imagebatch_testing_utils::builders::*;
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

// Re-export commonly used items
pub use builders::*;
pub use helpers::*;
pub use mocks::*;
