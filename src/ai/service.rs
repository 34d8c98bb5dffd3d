use std::sync::Arc;

use crate::{
    domain::{CandidateLabelSet, ClassificationOutcome, ClassificationRequest},
    policy,
};

use super::{BackendStatus, Classifier};

#[derive(Clone)]
pub struct ClassificationService {
    classifier: Arc<dyn Classifier>,
    labels: Arc<CandidateLabelSet>,
}

impl ClassificationService {
    pub fn new(classifier: Arc<dyn Classifier>, labels: Arc<CandidateLabelSet>) -> Self {
        Self { classifier, labels }
    }

    pub fn labels(&self) -> &CandidateLabelSet {
        &self.labels
    }

    pub async fn evaluate(&self, request: &ClassificationRequest) -> ClassificationOutcome {
        let raw = self.classifier.classify(&request.text, &self.labels).await?;
        let result = policy::decide(&raw, &self.labels, request.sensitivity);
        tracing::debug!(
            target: "classifier",
            backend = self.classifier.name(),
            top_label = %result.top_label,
            top_score = result.top_score,
            blur_score = result.blur_score,
            pmo_score = result.pmo_score,
            threshold = result.threshold,
            should_blur = result.should_blur,
            "classification decided"
        );
        Ok(result)
    }

    pub async fn status(&self) -> BackendStatus {
        self.classifier.status().await
    }
}
