use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    ai::{BackendStatus, ClassifyError},
    domain::{CandidateLabelSet, LabelSetError, RawClassification},
    policy,
};

use super::{
    model::{ModelLoader, ZeroShotModel},
    protocol::{ClassifyReply, ContextReply, ContextRequest},
};

const MAILBOX_CAPACITY: usize = 64;

struct Envelope {
    payload: String,
    reply: oneshot::Sender<String>,
}

#[derive(Clone)]
enum ModelSlot {
    Idle,
    Loading,
    Ready(Arc<dyn ZeroShotModel>),
    Failed(String),
}

/// The model is only reachable through JSON messages.
#[derive(Clone)]
pub struct ContextHandle {
    mailbox: mpsc::Sender<Envelope>,
}

impl ContextHandle {
    pub fn spawn(loader: Arc<dyn ModelLoader>, labels: Arc<CandidateLabelSet>) -> Self {
        let (mailbox, inbox) = mpsc::channel(MAILBOX_CAPACITY);
        let (slot, _) = watch::channel(ModelSlot::Idle);
        let worker = Arc::new(ContextWorker {
            loader,
            labels,
            slot,
        });
        tokio::spawn(worker.run(inbox));
        Self { mailbox }
    }

    pub async fn send(&self, request: &ContextRequest) -> Result<ContextReply, ClassifyError> {
        let payload = serde_json::to_string(request)
            .map_err(|err| ClassifyError::InvalidInput(err.to_string()))?;
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(Envelope { payload, reply })
            .await
            .map_err(|_| ClassifyError::unavailable("model context is not running"))?;
        let raw = response
            .await
            .map_err(|_| ClassifyError::unavailable("model context dropped the request"))?;
        serde_json::from_str(&raw).map_err(|err| {
            ClassifyError::MalformedResponse(format!("model context reply: {err}"))
        })
    }
}

struct ContextWorker {
    loader: Arc<dyn ModelLoader>,
    labels: Arc<CandidateLabelSet>,
    slot: watch::Sender<ModelSlot>,
}

impl ContextWorker {
    async fn run(self: Arc<Self>, mut inbox: mpsc::Receiver<Envelope>) {
        let init = self.clone();
        tokio::spawn(async move {
            let _ = init.ensure_model().await;
        });

        while let Some(envelope) = inbox.recv().await {
            let worker = self.clone();
            tokio::spawn(async move {
                let reply = worker.handle(&envelope.payload).await;
                let _ = envelope.reply.send(reply);
            });
        }
        tracing::debug!(target: "classifier", "model context stopped");
    }

    async fn handle(&self, payload: &str) -> String {
        let reply = match serde_json::from_str::<ContextRequest>(payload) {
            Ok(ContextRequest::CheckModelStatus) => ContextReply::Status(self.status()),
            Ok(ContextRequest::Classify {
                text,
                sensitivity,
                candidate_labels,
                blur_labels,
            }) => self
                .classify(text, sensitivity, candidate_labels, blur_labels)
                .await
                .unwrap_or_else(|error| ContextReply::Failed { error }),
            Err(err) => ContextReply::Failed {
                error: format!("unrecognised message: {err}"),
            },
        };
        serde_json::to_string(&reply)
            .unwrap_or_else(|err| serde_json::json!({ "error": err.to_string() }).to_string())
    }

    fn status(&self) -> BackendStatus {
        match &*self.slot.borrow() {
            ModelSlot::Ready(_) => BackendStatus {
                ready: true,
                loading: false,
            },
            ModelSlot::Loading => BackendStatus {
                ready: false,
                loading: true,
            },
            ModelSlot::Idle | ModelSlot::Failed(_) => BackendStatus {
                ready: false,
                loading: false,
            },
        }
    }

    async fn classify(
        &self,
        text: String,
        sensitivity: u8,
        candidate_labels: Option<Vec<String>>,
        blur_labels: Option<Vec<String>>,
    ) -> Result<ContextReply, String> {
        let model = match self.ensure_model().await {
            Ok(model) => model,
            Err(_) => self
                .ensure_model()
                .await
                .map_err(|reason| format!("Model failed to load: {reason}"))?,
        };
        let label_set = self
            .request_labels(candidate_labels, blur_labels)
            .map_err(|err| err.to_string())?;
        let labels = label_set.labels().to_vec();

        let scored = tokio::task::spawn_blocking(move || model.predict(&text, &labels))
            .await
            .map_err(|err| format!("inference task failed: {err}"))?
            .map_err(|err| err.to_string())?;
        let raw = RawClassification::from_pairs(scored).map_err(|err| err.to_string())?;
        let decision = policy::decide(&raw, &label_set, sensitivity);

        Ok(ContextReply::Classified(ClassifyReply {
            should_blur: decision.should_blur,
            label: decision.top_label,
            score: decision.blur_score,
            pmo_score: decision.pmo_score,
            threshold: decision.threshold,
            labels: raw.labels().to_vec(),
            scores: raw.scores().to_vec(),
        }))
    }

    /// Label set for one request. Without an explicit blur list, requested
    /// labels are blur labels when the context's own set says so.
    fn request_labels(
        &self,
        candidate_labels: Option<Vec<String>>,
        blur_labels: Option<Vec<String>>,
    ) -> Result<CandidateLabelSet, LabelSetError> {
        let Some(requested) = candidate_labels else {
            return Ok(CandidateLabelSet::clone(&self.labels));
        };
        let blur = blur_labels.unwrap_or_else(|| {
            requested
                .iter()
                .filter(|label| self.labels.is_blur(label))
                .cloned()
                .collect()
        });
        CandidateLabelSet::new(requested, blur)
    }

    // A waiter whose awaited load fails gets that failure instead of retrying.
    async fn ensure_model(&self) -> Result<Arc<dyn ZeroShotModel>, String> {
        let mut observer = self.slot.subscribe();
        let mut waited = false;
        loop {
            let current = observer.borrow_and_update().clone();
            match current {
                ModelSlot::Ready(model) => return Ok(model),
                ModelSlot::Failed(reason) if waited => return Err(reason),
                ModelSlot::Loading => {
                    waited = true;
                    if observer.changed().await.is_err() {
                        return Err("model context stopped".into());
                    }
                }
                ModelSlot::Idle | ModelSlot::Failed(_) => {
                    let claimed = self.slot.send_if_modified(|slot| {
                        if matches!(slot, ModelSlot::Idle | ModelSlot::Failed(_)) {
                            *slot = ModelSlot::Loading;
                            true
                        } else {
                            false
                        }
                    });
                    if claimed {
                        break;
                    }
                }
            }
        }

        let model_id = self.loader.model_id().to_string();
        tracing::info!(target: "classifier", model = %model_id, "loading local model");
        match self.loader.load().await {
            Ok(model) => {
                self.slot.send_replace(ModelSlot::Ready(model.clone()));
                tracing::info!(target: "classifier", model = %model_id, "local model ready");
                Ok(model)
            }
            Err(err) => {
                let reason = err.to_string();
                tracing::error!(target: "classifier", model = %model_id, error = %reason, "failed to load local model");
                self.slot.send_replace(ModelSlot::Failed(reason.clone()));
                Err(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct Uniform;

    impl ZeroShotModel for Uniform {
        fn predict(&self, _text: &str, labels: &[String]) -> anyhow::Result<Vec<(String, f64)>> {
            let share = 1.0 / labels.len() as f64;
            Ok(labels.iter().map(|label| (label.clone(), share)).collect())
        }
    }

    struct UniformLoader;

    #[async_trait]
    impl ModelLoader for UniformLoader {
        fn model_id(&self) -> &str {
            "uniform"
        }

        async fn load(&self) -> anyhow::Result<Arc<dyn ZeroShotModel>> {
            Ok(Arc::new(Uniform))
        }
    }

    async fn classify(context: &ContextHandle, request: ContextRequest) -> ClassifyReply {
        match context.send(&request).await.unwrap() {
            ContextReply::Classified(reply) => reply,
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reply_is_decided_against_requested_labels_and_sensitivity() {
        let context = ContextHandle::spawn(
            Arc::new(UniformLoader),
            Arc::new(CandidateLabelSet::default()),
        );

        let reply = classify(
            &context,
            ContextRequest::Classify {
                text: "anything".into(),
                sensitivity: 40,
                candidate_labels: Some(vec!["promo".into(), "other".into()]),
                blur_labels: Some(vec!["promo".into()]),
            },
        )
        .await;
        assert_eq!(reply.labels.len(), 2);
        assert_eq!(reply.pmo_score, 50);
        assert_eq!(reply.threshold, 40);
        assert!(reply.should_blur);

        let reply = classify(
            &context,
            ContextRequest::Classify {
                text: "anything".into(),
                sensitivity: 60,
                candidate_labels: Some(vec!["promo".into(), "other".into()]),
                blur_labels: Some(vec!["promo".into()]),
            },
        )
        .await;
        assert_eq!(reply.threshold, 60);
        assert!(!reply.should_blur);
    }

    #[tokio::test]
    async fn unknown_blur_label_is_reported_as_failure() {
        let context = ContextHandle::spawn(
            Arc::new(UniformLoader),
            Arc::new(CandidateLabelSet::default()),
        );
        let reply = context
            .send(&ContextRequest::Classify {
                text: "anything".into(),
                sensitivity: 50,
                candidate_labels: Some(vec!["other".into()]),
                blur_labels: Some(vec!["promo".into()]),
            })
            .await
            .unwrap();
        assert!(matches!(reply, ContextReply::Failed { .. }));
    }
}
