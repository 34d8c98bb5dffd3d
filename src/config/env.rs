use std::{path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::ai::RetryPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub queue: QueueConfig,
    pub scanner: ScannerConfig,
    pub labels_file: Option<PathBuf>,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Remote,
    Local,
}

impl FromStr for BackendKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "remote" | "huggingface" | "hf" => Ok(BackendKind::Remote),
            "local" | "offscreen" => Ok(BackendKind::Local),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub backend: BackendKind,
    pub remote: RemoteConfig,
    /// Seeds the settings store when it holds no token yet.
    pub api_token: Option<String>,
    pub fallback: bool,
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub endpoint: Url,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub spacing: Duration,
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub debounce: Duration,
    pub initial_delay: Duration,
    pub rescan_interval: Duration,
    pub max_text_length: usize,
    pub min_text_length: usize,
    pub min_word_count: usize,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub settings_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("invalid URL in {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
}
