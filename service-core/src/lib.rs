//! service-core: Shared infrastructure for the workflow engine.
pub mod cache;
pub mod config;
pub mod error;
pub mod observability;
pub mod retry;

pub use anyhow;
pub use async_trait;
pub use serde;
pub use tokio;
pub use tracing;
