//! Engine services for workflow-service.

pub mod cache_keys;
pub mod calculator;
pub mod chain;
pub mod conversion;
pub mod lifecycle;
pub mod numbering;
pub mod scope;

pub use chain::ChainResolver;
pub use conversion::ConversionService;
pub use lifecycle::LifecycleService;
pub use scope::ScopeResolver;
