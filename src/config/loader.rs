use std::{env, path::PathBuf, str::FromStr, time::Duration};

use url::Url;

use crate::ai::{
    inference::{DEFAULT_MODEL, HF_API_BASE},
    Backoff, RetryPolicy,
};

use super::env::{
    AppConfig, BackendKind, ClassifierConfig, ConfigError, DirectoryConfig, LoggingConfig,
    QueueConfig, RemoteConfig, ScannerConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unset or empty keys fall
    /// back to defaults, unparseable ones are rejected.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Source(lookup);

        let endpoint = match source.get("HF_API_URL") {
            Some(url) => url,
            None => {
                let base = source
                    .get("HF_API_BASE")
                    .unwrap_or_else(|| HF_API_BASE.to_string());
                let model = source
                    .get("HF_MODEL")
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string());
                format!("{}/{}", base.trim_end_matches('/'), model)
            }
        };
        let endpoint = Url::parse(&endpoint).map_err(|source| ConfigError::InvalidUrl {
            key: "HF_API_URL",
            source,
        })?;

        let backoff = match source.get("CLASSIFIER_BACKOFF").as_deref() {
            None | Some("fixed") => Backoff::Fixed,
            Some("exponential") => Backoff::Exponential,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "CLASSIFIER_BACKOFF",
                    value: other.to_string(),
                })
            }
        };

        let classifier = ClassifierConfig {
            backend: source.parse("CLASSIFIER_BACKEND", BackendKind::Remote)?,
            remote: RemoteConfig {
                endpoint,
                timeout: Duration::from_millis(source.parse("CLASSIFIER_TIMEOUT_MS", 30_000)?),
                retry: RetryPolicy {
                    max_attempts: source.parse("CLASSIFIER_MAX_ATTEMPTS", 3)?,
                    delay: Duration::from_millis(source.parse("CLASSIFIER_RETRY_DELAY_MS", 2_000)?),
                    backoff,
                },
            },
            api_token: source.get("HF_API_TOKEN"),
            fallback: source.parse("CLASSIFIER_FALLBACK", true)?,
        };

        let queue = QueueConfig {
            spacing: Duration::from_millis(source.parse("QUEUE_SPACING_MS", 1_000)?),
        };

        let scanner = ScannerConfig {
            debounce: Duration::from_millis(source.parse("SCAN_DEBOUNCE_MS", 1_000)?),
            initial_delay: Duration::from_millis(source.parse("SCAN_INITIAL_DELAY_MS", 3_000)?),
            rescan_interval: Duration::from_secs(source.positive("RESCAN_INTERVAL_SECS", 5)?),
            max_text_length: source.parse("MAX_TEXT_LENGTH", 500)?,
            min_text_length: source.parse("MIN_TEXT_LENGTH", 35)?,
            min_word_count: source.parse("MIN_WORD_COUNT", 6)?,
        };

        let directories = DirectoryConfig {
            logs_dir: source.get("LOGS_DIR").unwrap_or_else(|| "logs".to_string()),
            data_dir: source.get("DATA_DIR").unwrap_or_else(|| "data".to_string()),
            settings_filename: source
                .get("SETTINGS_FILENAME")
                .unwrap_or_else(|| "settings.json".to_string()),
        };

        let logging = LoggingConfig {
            level: source.get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        Ok(Self {
            classifier,
            queue,
            scanner,
            labels_file: source.get("LABELS_FILE").map(PathBuf::from),
            directories,
            logging,
        })
    }
}

struct Source<F>(F);

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { key, value }),
        }
    }

    fn positive(&self, key: &'static str, default: u64) -> Result<u64, ConfigError> {
        match self.parse(key, default)? {
            0 => Err(ConfigError::Invalid {
                key,
                value: "0".to_string(),
            }),
            value => Ok(value),
        }
    }
}
