use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    config::RemoteConfig,
    domain::{CandidateLabelSet, RawClassification},
};

use super::{
    inference::{build_request, parse_body, ZeroShotRequest},
    ClassifyError,
};

/// Supplies the current bearer credential; re-evaluated on every call so a
/// token written to the settings store takes effect without a restart.
pub type CredentialProvider = Arc<dyn Fn() -> Option<String> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatus {
    pub ready: bool,
    pub loading: bool,
}

impl BackendStatus {
    pub fn ready() -> Self {
        Self {
            ready: true,
            loading: false,
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        labels: &CandidateLabelSet,
    ) -> Result<RawClassification, ClassifyError>;

    fn name(&self) -> &str;

    async fn status(&self) -> BackendStatus {
        BackendStatus::ready()
    }
}

pub(crate) fn validate_input(text: &str, labels: &CandidateLabelSet) -> Result<(), ClassifyError> {
    if text.trim().is_empty() {
        return Err(ClassifyError::InvalidInput("text is empty".into()));
    }
    if labels.is_empty() {
        return Err(ClassifyError::InvalidInput("label set is empty".into()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct HuggingFaceClient {
    http: Client,
    config: RemoteConfig,
    credentials: CredentialProvider,
}

impl HuggingFaceClient {
    pub fn new(http: Client, config: RemoteConfig, credentials: CredentialProvider) -> Self {
        Self {
            http,
            config,
            credentials,
        }
    }

    async fn attempt(
        &self,
        attempt: u32,
        token: &str,
        request: &ZeroShotRequest<'_>,
    ) -> Result<RawClassification, ClassifyError> {
        let response = self
            .http
            .post(self.config.endpoint.clone())
            .bearer_auth(token)
            .timeout(self.config.timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(
            target: "classifier",
            attempt,
            status = status.as_u16(),
            "inference endpoint responded"
        );

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Transport {
                status: Some(status.as_u16()),
                message: truncate(&detail, 200),
            });
        }

        let body = response.text().await?;
        parse_body(&body).inspect_err(|err| {
            tracing::error!(
                target: "classifier",
                attempt,
                error = %err,
                body = %truncate(&body, 500),
                "inference endpoint returned an unexpected response shape"
            );
        })
    }
}

#[async_trait]
impl Classifier for HuggingFaceClient {
    async fn classify(
        &self,
        text: &str,
        labels: &CandidateLabelSet,
    ) -> Result<RawClassification, ClassifyError> {
        validate_input(text, labels)?;

        let token = (self.credentials)()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                tracing::error!(target: "classifier", "API token not set; refusing to call the inference endpoint");
                ClassifyError::MissingCredential
            })?;

        let request = build_request(text, labels);
        self.config
            .retry
            .run(self.name(), |attempt| self.attempt(attempt, &token, &request))
            .await
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
