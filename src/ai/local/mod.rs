mod context;
pub mod model;
pub mod protocol;

use std::sync::Arc;

use async_trait::async_trait;

pub use context::ContextHandle;
pub use model::{LexiconLoader, LexiconModel, ModelLoader, ZeroShotModel};

use crate::{
    ai::{client::validate_input, BackendStatus, Classifier, ClassifyError},
    domain::{types::DEFAULT_SENSITIVITY, CandidateLabelSet, RawClassification},
};

use protocol::{ContextReply, ContextRequest};

#[derive(Clone)]
pub struct LocalClassifier {
    context: ContextHandle,
}

impl LocalClassifier {
    pub fn spawn(loader: Arc<dyn ModelLoader>, labels: Arc<CandidateLabelSet>) -> Self {
        Self {
            context: ContextHandle::spawn(loader, labels),
        }
    }
}

#[async_trait]
impl Classifier for LocalClassifier {
    async fn classify(
        &self,
        text: &str,
        labels: &CandidateLabelSet,
    ) -> Result<RawClassification, ClassifyError> {
        validate_input(text, labels)?;

        let request = ContextRequest::Classify {
            text: text.to_string(),
            sensitivity: DEFAULT_SENSITIVITY,
            candidate_labels: Some(labels.labels().to_vec()),
            blur_labels: Some(labels.blur_labels().map(str::to_string).collect()),
        };
        match self.context.send(&request).await? {
            ContextReply::Classified(reply) => RawClassification::from_parallel(reply.labels, reply.scores),
            ContextReply::Failed { error } => Err(ClassifyError::Unavailable {
                attempts: 1,
                reason: error,
            }),
            ContextReply::Status(_) => Err(ClassifyError::MalformedResponse(
                "model context answered a classify request with a status".into(),
            )),
        }
    }

    fn name(&self) -> &str {
        "local"
    }

    async fn status(&self) -> BackendStatus {
        match self.context.send(&ContextRequest::CheckModelStatus).await {
            Ok(ContextReply::Status(status)) => status,
            _ => BackendStatus {
                ready: false,
                loading: true,
            },
        }
    }
}
