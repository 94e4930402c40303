use config::{Config, Environment, File};
use serde::Deserialize;

use crate::config::{
    BackoffConfig, HealthConfig, ProviderConfig, ServerConfig, ThrottleConfig, ValidationConfig,
};
use crate::error::{Error, Result};

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("FEEDROUTER"))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let app: AppConfig = config
            .try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    /// The router needs a primary and supports at most one fallback.
    pub fn validate(&self) -> Result<()> {
        let enabled = self.enabled_providers();
        if enabled.is_empty() {
            return Err(Error::NoProvidersConfigured);
        }
        if enabled.len() > 2 {
            return Err(Error::ConfigError(format!(
                "at most 2 enabled providers supported, got {}",
                enabled.len()
            )));
        }
        Ok(())
    }

    pub fn enabled_providers(&self) -> Vec<&ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }

    pub fn primary(&self) -> &ProviderConfig {
        self.enabled_providers()[0]
    }

    pub fn fallback(&self) -> Option<&ProviderConfig> {
        self.enabled_providers().get(1).copied()
    }
}
