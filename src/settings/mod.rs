mod file;
mod memory;

pub use file::JsonFileSettingsStore;
pub use memory::MemorySettingsStore;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::domain::types::DEFAULT_SENSITIVITY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enabled: bool,
    pub sensitivity: u8,
    pub show_score: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            sensitivity: DEFAULT_SENSITIVITY,
            show_score: true,
            api_token: None,
        }
    }
}

/// Partial update; absent keys are left untouched. An empty `apiToken`
/// clears the stored token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_score: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl Settings {
    pub fn patched(&self, patch: &SettingsPatch) -> Settings {
        let mut next = self.clone();
        if let Some(enabled) = patch.enabled {
            next.enabled = enabled;
        }
        if let Some(sensitivity) = patch.sensitivity {
            next.sensitivity = sensitivity.min(100);
        }
        if let Some(show_score) = patch.show_score {
            next.show_score = show_score;
        }
        if let Some(token) = &patch.api_token {
            let token = token.trim();
            next.api_token = (!token.is_empty()).then(|| token.to_string());
        }
        next
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Readers call [`SettingsStore::get`] again after every notification.
pub trait SettingsStore: Send + Sync {
    fn get(&self) -> Settings;

    fn update(&self, patch: SettingsPatch) -> Result<Settings, SettingsError>;

    /// Revision counter that ticks on every effective change.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

struct SettingsCell {
    current: RwLock<Settings>,
    revision: watch::Sender<u64>,
}

impl SettingsCell {
    fn new(initial: Settings) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            current: RwLock::new(initial),
            revision,
        }
    }

    fn get(&self) -> Settings {
        self.current.read().clone()
    }

    /// Applies `patch`, calling `persist` with the new value before it becomes
    /// visible. Notifies subscribers only when something changed.
    fn update<F>(&self, patch: &SettingsPatch, persist: F) -> Result<Settings, SettingsError>
    where
        F: FnOnce(&Settings) -> Result<(), SettingsError>,
    {
        let mut current = self.current.write();
        let next = current.patched(patch);
        if next == *current {
            return Ok(next);
        }
        persist(&next)?;
        *current = next.clone();
        drop(current);

        self.revision.send_modify(|rev| *rev += 1);
        tracing::debug!(
            target: "settings",
            enabled = next.enabled,
            sensitivity = next.sensitivity,
            show_score = next.show_score,
            has_token = next.api_token.is_some(),
            "settings updated"
        );
        Ok(next)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_clamps_and_clears_token() {
        let base = Settings {
            api_token: Some("hf_old".into()),
            ..Settings::default()
        };
        let next = base.patched(&SettingsPatch {
            sensitivity: Some(180),
            api_token: Some("".into()),
            ..SettingsPatch::default()
        });
        assert_eq!(next.sensitivity, 100);
        assert_eq!(next.api_token, None);
        assert!(next.enabled);
    }

    #[test]
    fn settings_use_camel_case_keys() {
        let parsed: Settings =
            serde_json::from_str(r#"{"enabled": false, "showScore": false}"#).unwrap();
        assert!(!parsed.enabled);
        assert!(!parsed.show_score);
        assert_eq!(parsed.sensitivity, 50);
    }
}
