use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{CandidateLabelSet, RawClassification};

use super::{BackendStatus, Classifier, ClassifyError};

/// Classifier whose backend can be replaced at runtime. A call that already
/// started keeps the backend it began with.
pub struct SwappableClassifier {
    inner: RwLock<Arc<dyn Classifier>>,
}

impl SwappableClassifier {
    pub fn new(initial: Arc<dyn Classifier>) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    pub fn swap(&self, next: Arc<dyn Classifier>) -> Arc<dyn Classifier> {
        let previous = std::mem::replace(&mut *self.inner.write(), next);
        tracing::info!(
            target: "classifier",
            from = previous.name(),
            to = self.current().name(),
            "classifier backend swapped"
        );
        previous
    }

    pub fn current(&self) -> Arc<dyn Classifier> {
        self.inner.read().clone()
    }
}

#[async_trait]
impl Classifier for SwappableClassifier {
    async fn classify(
        &self,
        text: &str,
        labels: &CandidateLabelSet,
    ) -> Result<RawClassification, ClassifyError> {
        let backend = self.current();
        backend.classify(text, labels).await
    }

    fn name(&self) -> &str {
        "swappable"
    }

    async fn status(&self) -> BackendStatus {
        let backend = self.current();
        backend.status().await
    }
}
