pub mod client;
pub mod error;
pub mod fallback;
pub mod inference;
pub mod local;
pub mod retry;
pub mod service;
pub mod swap;

pub use client::{BackendStatus, Classifier, HuggingFaceClient};
pub use error::ClassifyError;
pub use fallback::{FallbackClassifier, PatternClassifier};
pub use local::{LexiconLoader, LocalClassifier};
pub use retry::{Backoff, RetryPolicy};
pub use service::ClassificationService;
pub use swap::SwappableClassifier;
