use serde::{Deserialize, Serialize};

use crate::domain::{CandidateLabelSet, RawClassification};

use super::ClassifyError;

pub const HF_API_BASE: &str = "https://api-inference.huggingface.co/models";
pub const DEFAULT_MODEL: &str = "facebook/bart-large-mnli";

pub fn build_request<'a>(text: &'a str, labels: &'a CandidateLabelSet) -> ZeroShotRequest<'a> {
    ZeroShotRequest {
        inputs: text,
        parameters: ZeroShotParameters {
            candidate_labels: labels.labels(),
            multi_label: false,
        },
    }
}

pub fn parse_body(body: &str) -> Result<RawClassification, ClassifyError> {
    let parsed: ZeroShotResponse = serde_json::from_str(body).map_err(|err| {
        let detail = serde_json::from_str::<ApiError>(body)
            .map(|api| api.error)
            .unwrap_or_else(|_| err.to_string());
        ClassifyError::MalformedResponse(detail)
    })?;

    match parsed {
        ZeroShotResponse::Parallel(scores) => scores.into_raw(),
        ZeroShotResponse::Pairs(pairs) => {
            RawClassification::from_pairs(pairs.into_iter().map(|p| (p.label, p.score)))
        }
        ZeroShotResponse::Wrapped(mut items) => {
            if items.is_empty() {
                return Err(ClassifyError::MalformedResponse(
                    "response array was empty".into(),
                ));
            }
            items.swap_remove(0).into_raw()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ZeroShotRequest<'a> {
    pub inputs: &'a str,
    pub parameters: ZeroShotParameters<'a>,
}

#[derive(Debug, Serialize)]
pub struct ZeroShotParameters<'a> {
    pub candidate_labels: &'a [String],
    pub multi_label: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Parallel(ParallelScores),
    Pairs(Vec<LabelScore>),
    Wrapped(Vec<ParallelScores>),
}

#[derive(Debug, Deserialize)]
struct ParallelScores {
    labels: Vec<String>,
    scores: Vec<f64>,
}

impl ParallelScores {
    fn into_raw(self) -> Result<RawClassification, ClassifyError> {
        RawClassification::from_parallel(self.labels, self.scores)
    }
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_inference_api() {
        let labels = CandidateLabelSet::new(["a", "b"], ["a"]).unwrap();
        let body = serde_json::to_value(build_request("hello", &labels)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "inputs": "hello",
                "parameters": {"candidate_labels": ["a", "b"], "multi_label": false}
            })
        );
    }

    #[test]
    fn parses_object_shape() {
        let raw = parse_body(
            r#"{"sequence": "x", "labels": ["a", "b"], "scores": [0.9, 0.1]}"#,
        )
        .unwrap();
        assert_eq!(raw.top(), ("a", 0.9));
    }

    #[test]
    fn parses_pair_array_and_sorts() {
        let raw = parse_body(r#"[{"label": "b", "score": 0.2}, {"label": "a", "score": 0.8}]"#)
            .unwrap();
        assert_eq!(raw.labels(), ["a", "b"]);
    }

    #[test]
    fn parses_wrapped_object_shape() {
        let raw = parse_body(r#"[{"labels": ["a", "b"], "scores": [0.6, 0.4]}]"#).unwrap();
        assert_eq!(raw.scores(), [0.6, 0.4]);
    }

    #[test]
    fn api_error_body_is_malformed() {
        let err = parse_body(r#"{"error": "Model is currently loading"}"#).unwrap_err();
        match err {
            ClassifyError::MalformedResponse(detail) => {
                assert_eq!(detail, "Model is currently loading")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_and_mismatched_bodies_are_malformed() {
        assert!(matches!(parse_body("[]"), Err(ClassifyError::MalformedResponse(_))));
        assert!(matches!(
            parse_body(r#"{"labels": ["a"], "scores": []}"#),
            Err(ClassifyError::MalformedResponse(_))
        ));
        assert!(matches!(parse_body("not json"), Err(ClassifyError::MalformedResponse(_))));
    }
}
