//! Service level settings.
//!
//! Loaded from, in increasing priority:
//! 1. Defaults
//! 2. TOML file (`EXPORT_AS_CONFIG`, else `export-as.toml`), if present
//! 3. `.env` file (via dotenvy)
//! 4. Environment variables `EXPORT_AS__<KEY>`, e.g. `EXPORT_AS__DOWNLOAD_DIR=/tmp/out`

use std::{env, path::PathBuf};

use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

const CONFIG_ENV_VAR: &str = "EXPORT_AS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "export-as.toml";
const ENV_PREFIX: &str = "EXPORT_AS";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportAsSettings {
    /// Where downloads are materialized.
    pub download_dir: PathBuf,
    /// Base name used when a download is requested without a file name.
    pub default_file_name: String,
}

impl Default for ExportAsSettings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("."),
            default_file_name: "export".to_string(),
        }
    }
}

impl ExportAsSettings {
    pub fn load() -> Result<Self, ConfigError> {
        // a missing .env is fine
        let _ = dotenvy::dotenv();

        let config_path = env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        Self::load_from_sources(config_path)
    }

    /// Load settings from a specific path plus the environment.
    pub fn load_from_sources(config_path: PathBuf) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if config_path.exists() {
            tracing::info!("Loading settings from: {}", config_path.display());
            builder = builder.add_source(File::from(config_path).required(false));
        } else {
            tracing::debug!(
                "Settings file not found at {}, using defaults and environment overrides",
                config_path.display()
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
