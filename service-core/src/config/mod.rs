use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Settings every vault service shares. Service-specific configuration
/// flattens this in and layers its own sections on top.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("VAULT").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
