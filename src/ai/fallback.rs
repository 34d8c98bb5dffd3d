use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{CandidateLabelSet, RawClassification};

use super::{client::validate_input, BackendStatus, Classifier, ClassifyError};

static SELF_PROMOTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:excited|thrilled|proud|announce|happy to share|new job|new position|new role|humbled|landed|promoted)\b",
    )
    .expect("valid self-promotion regex")
});

/// Regex-based stand-in used when the primary backend is unavailable. Puts all
/// probability mass on the blur labels when a self-promotion phrase matches and
/// on the neutral labels otherwise, split evenly.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternClassifier;

#[async_trait]
impl Classifier for PatternClassifier {
    async fn classify(
        &self,
        text: &str,
        labels: &CandidateLabelSet,
    ) -> Result<RawClassification, ClassifyError> {
        validate_input(text, labels)?;

        let matched = SELF_PROMOTION_REGEX.is_match(text);
        let favoured = labels
            .labels()
            .iter()
            .filter(|label| labels.is_blur(label) == matched)
            .count();
        let share = if favoured == 0 {
            1.0 / labels.len() as f64
        } else {
            1.0 / favoured as f64
        };

        RawClassification::from_pairs(labels.labels().iter().map(|label| {
            let score = if favoured == 0 || labels.is_blur(label) == matched {
                share
            } else {
                0.0
            };
            (label.clone(), score)
        }))
    }

    fn name(&self) -> &str {
        "pattern"
    }
}

/// Consults `secondary` only after `primary` has given up with
/// [`ClassifyError::Unavailable`]. Other errors pass through unchanged.
pub struct FallbackClassifier {
    primary: Arc<dyn Classifier>,
    secondary: Arc<dyn Classifier>,
    name: String,
}

impl FallbackClassifier {
    pub fn new(primary: Arc<dyn Classifier>, secondary: Arc<dyn Classifier>) -> Self {
        let name = format!("{}+{}", primary.name(), secondary.name());
        Self {
            primary,
            secondary,
            name,
        }
    }
}

#[async_trait]
impl Classifier for FallbackClassifier {
    async fn classify(
        &self,
        text: &str,
        labels: &CandidateLabelSet,
    ) -> Result<RawClassification, ClassifyError> {
        match self.primary.classify(text, labels).await {
            Err(ClassifyError::Unavailable { attempts, reason }) => {
                tracing::warn!(
                    target: "classifier",
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    attempts,
                    reason = %reason,
                    "primary classifier unavailable; using fallback"
                );
                self.secondary.classify(text, labels).await
            }
            other => other,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn status(&self) -> BackendStatus {
        self.primary.status().await
    }
}
