use std::{
    fs,
    path::{Path, PathBuf},
};

use tokio::sync::watch;

use super::{Settings, SettingsCell, SettingsError, SettingsPatch, SettingsStore};

/// Settings persisted as camelCase JSON; every effective update is written
/// through before subscribers are notified.
pub struct JsonFileSettingsStore {
    path: PathBuf,
    cell: SettingsCell,
}

impl JsonFileSettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let initial = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| SettingsError::Io {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            Settings::default()
        };

        tracing::info!(target: "settings", path = %path.display(), "settings loaded");
        Ok(Self {
            path,
            cell: SettingsCell::new(initial),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_atomically(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let encoded = serde_json::to_vec_pretty(settings)?;
    let tmp = path.with_extension("json.tmp");
    let io_err = |source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    };
    fs::write(&tmp, encoded).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

impl SettingsStore for JsonFileSettingsStore {
    fn get(&self) -> Settings {
        self.cell.get()
    }

    fn update(&self, patch: SettingsPatch) -> Result<Settings, SettingsError> {
        self.cell
            .update(&patch, |next| write_atomically(&self.path, next))
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.cell.subscribe()
    }
}
