pub mod env;
mod loader;

pub use env::{
    AppConfig, BackendKind, ClassifierConfig, DirectoryConfig, QueueConfig, RemoteConfig,
    ScannerConfig,
};
pub use loader::load_config;
