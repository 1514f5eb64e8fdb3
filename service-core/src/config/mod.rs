use crate::error::EngineError;
use config::{Config as Cfg, File};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Common configuration shared by every service in the workspace.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load any config type from the shared source stack: an optional
/// `configuration` file overridden by `APP__`-prefixed environment
/// variables. Services with their own sections deserialize their full
/// config through this so the flattened common section and the service
/// tables come from the same pass.
pub fn load_as<T: DeserializeOwned>() -> Result<T, EngineError> {
    dotenvy::dotenv().ok();

    let config = Cfg::builder()
        .add_source(File::with_name("configuration").required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;

    Ok(config.try_deserialize()?)
}

impl Config {
    pub fn load() -> Result<Self, EngineError> {
        load_as()
    }
}
