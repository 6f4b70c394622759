//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! Model resource locations and the storage root are configuration, not
//! protocol: they are resolved here once and passed explicitly to the
//! session store and model selector at construction. There are no
//! process-wide mutable path constants.
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_STORAGE_ROOT, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub models: ModelsConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Session storage configuration.
///
/// ## Fields:
/// - `root`: directory holding one subdirectory per session
/// - `retention_secs`: session age after which the sweep may delete it
/// - `sweep_interval_secs`: how often the background sweep runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub retention_secs: u64,
    pub sweep_interval_secs: u64,
}

/// Speech model configuration: one pre-provisioned model directory per
/// supported language, plus a high-accuracy variant for English only.
///
/// The directory names default to the Vosk model releases the service was
/// provisioned with; only `dir` normally needs to change per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing the per-language model directories
    pub dir: PathBuf,

    /// English, fast/small variant (default for `en`)
    pub en: String,

    /// English, slow/large variant (selected by the high-accuracy flag)
    pub en_high_accuracy: String,

    pub es: String,
    pub fr: String,
    pub ru: String,
    pub de: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            storage: StorageConfig {
                root: PathBuf::from("storage"),
                retention_secs: 3600, // one hour retention window
                sweep_interval_secs: 300,
            },
            models: ModelsConfig {
                dir: PathBuf::from("models"),
                en: "vosk-model-small-en-us-0.15".to_string(),
                en_high_accuracy: "vosk-model-en-us-daanzu".to_string(),
                es: "vosk-model-small-es-0.42".to_string(),
                fr: "vosk-model-small-fr-0.22".to_string(),
                ru: "vosk-model-small-ru-0.22".to_string(),
                de: "vosk-model-small-de-0.15".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, then config.toml, then APP_*
    /// environment variables, with HOST/PORT deployment-platform overrides
    /// on top.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly inject bare HOST/PORT variables that
        // don't follow the APP_ prefix convention.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense before the server
    /// starts. Catching these early gives a clear message instead of a
    /// runtime failure deep inside a pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.storage.root.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Storage root cannot be empty"));
        }

        if self.storage.retention_secs == 0 {
            return Err(anyhow::anyhow!("Retention window must be greater than 0"));
        }

        if self.storage.sweep_interval_secs == 0 {
            return Err(anyhow::anyhow!("Sweep interval must be greater than 0"));
        }

        if self.models.dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Models directory cannot be empty"));
        }

        Ok(())
    }
}
