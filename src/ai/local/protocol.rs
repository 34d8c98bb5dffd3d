use serde::{Deserialize, Serialize};

use crate::{ai::BackendStatus, domain::types::DEFAULT_SENSITIVITY};

fn default_sensitivity() -> u8 {
    DEFAULT_SENSITIVITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ContextRequest {
    Classify {
        text: String,
        /// Only shapes `shouldBlur` in the reply; in-process callers decide
        /// again from the returned scores.
        #[serde(default = "default_sensitivity")]
        sensitivity: u8,
        #[serde(
            rename = "candidateLabels",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        candidate_labels: Option<Vec<String>>,
        #[serde(rename = "blurLabels", default, skip_serializing_if = "Option::is_none")]
        blur_labels: Option<Vec<String>>,
    },
    CheckModelStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyReply {
    pub should_blur: bool,
    pub label: String,
    pub score: f64,
    pub pmo_score: u8,
    pub threshold: u8,
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextReply {
    Classified(ClassifyReply),
    Status(BackendStatus),
    Failed { error: String },
}
