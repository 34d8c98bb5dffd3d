use tokio::sync::watch;

use super::{Settings, SettingsCell, SettingsError, SettingsPatch, SettingsStore};

pub struct MemorySettingsStore {
    cell: SettingsCell,
}

impl MemorySettingsStore {
    pub fn new(initial: Settings) -> Self {
        Self {
            cell: SettingsCell::new(initial),
        }
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self) -> Settings {
        self.cell.get()
    }

    fn update(&self, patch: SettingsPatch) -> Result<Settings, SettingsError> {
        self.cell.update(&patch, |_| Ok(()))
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.cell.subscribe()
    }
}
