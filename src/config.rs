use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::PainelError;

pub const CONFIG_FILE: &str = "psh-painel.json";
pub const DATA_FOLDER_ENV: &str = "DATA_FOLDER_URL";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_DATA_URL: &str =
    "https://drive.google.com/drive/folders/1mrygqlHMjH6_Ix_q2uM429hApB1NJBav?usp=drive_link";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteLayout {
    #[default]
    Archive,
    Files,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub data_folder_url: Option<String>,
    #[serde(default)]
    pub remote_layout: Option<RemoteLayout>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub retry_base_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: usize) -> Duration {
        self.base_delay * (attempt as u32 + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub folder_url: String,
    pub layout: RemoteLayout,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub data_dir: Utf8PathBuf,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<Utf8PathBuf>,
    pub data_folder_url: Option<String>,
}

impl ConfigOverrides {
    pub fn from_env() -> Self {
        Self {
            data_dir: None,
            data_folder_url: std::env::var(DATA_FOLDER_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty()),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `psh-painel.json` when present. A missing default
    /// file is not an error; every setting has a default.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, PainelError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| PainelError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| PainelError::ConfigParse(err.to_string()))?
        };

        Ok(Self::resolve_config(config, overrides))
    }

    pub fn resolve_config(config: Config, overrides: ConfigOverrides) -> ResolvedConfig {
        let defaults = RetryPolicy::default();
        let data_dir = overrides
            .data_dir
            .or_else(|| config.data_dir.map(Utf8PathBuf::from))
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATA_DIR));
        let folder_url = overrides
            .data_folder_url
            .or(config.data_folder_url)
            .unwrap_or_else(|| DEFAULT_DATA_URL.to_string());

        ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            data_dir,
            remote: RemoteConfig {
                folder_url,
                layout: config.remote_layout.unwrap_or_default(),
                timeout: Duration::from_secs(config.timeout_secs.unwrap_or(60)),
                retry: RetryPolicy {
                    max_retries: config.max_retries.unwrap_or(defaults.max_retries),
                    base_delay: config
                        .retry_base_delay_ms
                        .map(Duration::from_millis)
                        .unwrap_or(defaults.base_delay),
                },
            },
        }
    }
}
