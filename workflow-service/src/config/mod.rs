use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::EngineError;
use service_core::retry::RetryConfig;
use std::time::Duration;

/// Configuration for the workflow engine.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    #[serde(default)]
    pub engine: EngineSettings,
}

/// Tunable engine knobs, all with production defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Attempt cap for the number-collision retry loop.
    #[serde(default = "default_number_retry_attempts")]
    pub number_retry_attempts: u32,
    /// Ceiling of the randomized backoff between attempts, in ms.
    #[serde(default = "default_number_retry_jitter_ms")]
    pub number_retry_jitter_ms: u64,
    /// Hard hop cap for chain resolution.
    #[serde(default = "default_chain_max_depth")]
    pub chain_max_depth: u32,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
}

fn default_number_retry_attempts() -> u32 {
    5
}

fn default_number_retry_jitter_ms() -> u64 {
    50
}

fn default_chain_max_depth() -> u32 {
    10
}

fn default_cache_ttl_seconds() -> u64 {
    300
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            number_retry_attempts: default_number_retry_attempts(),
            number_retry_jitter_ms: default_number_retry_jitter_ms(),
            chain_max_depth: default_chain_max_depth(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
        }
    }
}

impl EngineSettings {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.number_retry_attempts,
            max_backoff: Duration::from_millis(self.number_retry_jitter_ms),
        }
    }
}

impl WorkflowConfig {
    pub fn load() -> Result<Self, EngineError> {
        core_config::load_as()
    }
}
