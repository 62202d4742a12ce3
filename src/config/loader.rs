//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered in order of
//! increasing precedence: built-in defaults, the base YAML file, an optional
//! `<stem>.<environment>.yaml` overlay next to it, and `VESSEL_REPLAY__*`
//! environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::ReplayConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ENV_PREFIX: &str = "VESSEL_REPLAY";
const DEFAULT_CONFIG_PATH: &str = "config/vessel-replay.yaml";

/// Loaded configuration together with the environment it was resolved for
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: ReplayConfig,
    environment: String,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    ///
    /// When `path` is `None` the default `config/vessel-replay.yaml` is used if
    /// it exists; otherwise only defaults and environment variables apply.
    pub fn load(path: Option<&Path>, environment: Option<&str>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = environment
            .map(str::to_lowercase)
            .unwrap_or_else(Self::detect_environment);

        let source_path = match path {
            Some(path) if !path.is_file() => {
                return Err(ConfigurationError::FileNotFound(path.display().to_string()));
            }
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                default.is_file().then_some(default)
            }
        };

        debug!(
            environment = %environment,
            source = ?source_path,
            "Loading replay configuration"
        );

        let config = Self::build(source_path.as_deref(), &environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            future_window_days = config.replay.future_window_days,
            past_window_days = config.replay.past_window_days,
            retention_window_days = config.replay.retention_window_days,
            max_attempts = config.retry.max_attempts,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            source_path,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: ReplayConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            source_path: None,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    fn build(path: Option<&Path>, environment: &str) -> ConfigResult<ReplayConfig> {
        let mut builder = Config::builder().add_source(Config::try_from(&ReplayConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));

            if let Some(overlay) = Self::environment_overlay(path, environment) {
                debug!(overlay = %overlay.display(), "Applying environment overlay");
                builder = builder.add_source(File::from(overlay.as_path()).required(false));
            }
        }

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<ReplayConfig>()
            .map_err(ConfigurationError::from)
    }

    /// `config/vessel-replay.yaml` + `production` -> `config/vessel-replay.production.yaml`
    fn environment_overlay(path: &Path, environment: &str) -> Option<PathBuf> {
        let stem = path.file_stem()?.to_str()?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("yaml");
        let overlay = path.with_file_name(format!("{stem}.{environment}.{extension}"));
        overlay.is_file().then_some(overlay)
    }

    /// Detect current environment
    pub fn detect_environment() -> String {
        env::var("VESSEL_REPLAY_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }
}
