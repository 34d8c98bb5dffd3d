use serde::{Deserialize, Serialize};

use crate::ai::ClassifyError;

pub const DEFAULT_MAX_TEXT_LENGTH: usize = 500;
pub const DEFAULT_SENSITIVITY: u8 = 50;

pub type ClassificationOutcome = Result<ClassificationResult, ClassifyError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    pub text: String,
    pub sensitivity: u8,
}

impl ClassificationRequest {
    /// Trims and truncates `text` to at most `max_chars` characters.
    /// Returns `None` when nothing is left to classify.
    pub fn new(text: &str, sensitivity: u8, max_chars: usize) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let text = match trimmed.char_indices().nth(max_chars) {
            Some((cut, _)) => trimmed[..cut].to_string(),
            None => trimmed.to_string(),
        };
        Some(Self {
            text,
            sensitivity: sensitivity.min(100),
        })
    }
}

/// Parallel label/score sequences sorted descending by score.
#[derive(Debug, Clone, PartialEq)]
pub struct RawClassification {
    labels: Vec<String>,
    scores: Vec<f64>,
}

impl RawClassification {
    pub fn from_parallel(labels: Vec<String>, scores: Vec<f64>) -> Result<Self, ClassifyError> {
        if labels.is_empty() {
            return Err(ClassifyError::MalformedResponse(
                "response contained no labels".into(),
            ));
        }
        if labels.len() != scores.len() {
            return Err(ClassifyError::MalformedResponse(format!(
                "{} labels but {} scores",
                labels.len(),
                scores.len()
            )));
        }
        Self::from_pairs(labels.into_iter().zip(scores))
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Self, ClassifyError>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut pairs: Vec<(String, f64)> = pairs.into_iter().collect();
        if pairs.is_empty() {
            return Err(ClassifyError::MalformedResponse(
                "response contained no labels".into(),
            ));
        }
        if let Some((label, score)) = pairs.iter().find(|(_, score)| !score.is_finite()) {
            return Err(ClassifyError::MalformedResponse(format!(
                "non-finite score {score} for label {label:?}"
            )));
        }
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
        let (labels, scores) = pairs.into_iter().unzip();
        Ok(Self { labels, scores })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn top(&self) -> (&str, f64) {
        (self.labels[0].as_str(), self.scores[0])
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.scores.iter().copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    Low,
    Medium,
    High,
}

impl BadgeTone {
    pub fn for_score(score: u8) -> Self {
        match score {
            0..=29 => BadgeTone::Low,
            30..=59 => BadgeTone::Medium,
            _ => BadgeTone::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub should_blur: bool,
    pub top_label: String,
    pub top_score: f64,
    pub blur_score: f64,
    pub pmo_score: u8,
    pub threshold: u8,
    pub raw_scores: Vec<(String, f64)>,
}

impl ClassificationResult {
    /// Combined blur score when blurring, otherwise the top label's score.
    pub fn display_score(&self) -> f64 {
        if self.should_blur {
            self.blur_score
        } else {
            self.top_score
        }
    }

    pub fn display_percent(&self) -> u8 {
        (self.display_score() * 100.0).round().clamp(0.0, 100.0) as u8
    }

    pub fn badge_tone(&self) -> BadgeTone {
        BadgeTone::for_score(self.display_percent())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub depth: usize,
    pub served: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_truncates_on_char_boundary() {
        let text = "é".repeat(600);
        let request = ClassificationRequest::new(&text, 50, 500).unwrap();
        assert_eq!(request.text.chars().count(), 500);
    }

    #[test]
    fn request_rejects_blank_text_and_clamps_sensitivity() {
        assert!(ClassificationRequest::new("   \n", 50, 500).is_none());
        let request = ClassificationRequest::new(" hello ", 250, 500).unwrap();
        assert_eq!(request.text, "hello");
        assert_eq!(request.sensitivity, 100);
    }

    #[test]
    fn raw_classification_sorts_descending() {
        let raw = RawClassification::from_parallel(
            vec!["a".into(), "b".into(), "c".into()],
            vec![0.1, 0.7, 0.2],
        )
        .unwrap();
        assert_eq!(raw.labels(), ["b", "c", "a"]);
        assert_eq!(raw.top(), ("b", 0.7));
    }

    #[test]
    fn raw_classification_rejects_mismatched_lengths() {
        let err = RawClassification::from_parallel(vec!["a".into()], vec![0.5, 0.5]).unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedResponse(_)));
        let err = RawClassification::from_parallel(vec![], vec![]).unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedResponse(_)));
    }

    #[test]
    fn badge_tone_bands() {
        assert_eq!(BadgeTone::for_score(0), BadgeTone::Low);
        assert_eq!(BadgeTone::for_score(29), BadgeTone::Low);
        assert_eq!(BadgeTone::for_score(30), BadgeTone::Medium);
        assert_eq!(BadgeTone::for_score(60), BadgeTone::High);
    }
}
