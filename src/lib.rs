pub mod ai;
pub mod app;
pub mod config;
pub mod domain;
pub mod host;
pub mod infrastructure;
pub mod policy;
pub mod scanner;
pub mod settings;
pub mod tasks;
