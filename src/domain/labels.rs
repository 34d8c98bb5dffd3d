use std::{collections::HashSet, fs, path::Path};

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_BLUR_LABELS: &[&str] = &[
    "announcing a new job or promotion",
    "internship announcement or reflection",
    "bragging about personal accomplishments",
    "humble bragging or flexing achievements",
    "sharing acceptance to a selective program",
    "celebrating career milestones or awards",
    "AI or tech buzzword thought leadership",
    "motivational career success story",
    "job offer or competing offers announcement",
    "gratitude post about career opportunity",
];

const DEFAULT_NEUTRAL_LABELS: &[&str] = &[
    "sharing a news article or link",
    "asking a question for discussion",
    "company marketing or event promotion",
    "general work-related comment",
    "technical project or code discussion",
    "industry news or observation",
    "holiday greeting or special day",
    "advertisement or sponsored content",
    "educational content or tutorial",
    "opinion on current events",
];

#[derive(Debug, Error)]
pub enum LabelSetError {
    #[error("candidate label set is empty")]
    Empty,
    #[error("duplicate candidate label: {0}")]
    Duplicate(String),
    #[error("blur label is not a candidate label: {0}")]
    UnknownBlurLabel(String),
    #[error("failed to read label file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse label file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Ordered candidate labels presented to the classifier, partitioned into the
/// blur-triggering subset and the neutral remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLabelSet {
    labels: Vec<String>,
    blur: HashSet<String>,
}

#[derive(Debug, Deserialize)]
struct LabelFile {
    labels: Vec<String>,
    blur: Vec<String>,
}

impl CandidateLabelSet {
    pub fn new<L, B>(labels: L, blur: B) -> Result<Self, LabelSetError>
    where
        L: IntoIterator,
        L::Item: Into<String>,
        B: IntoIterator,
        B::Item: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(LabelSetError::Empty);
        }

        let mut seen = HashSet::with_capacity(labels.len());
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(LabelSetError::Duplicate(label.clone()));
            }
        }

        let mut blur_set = HashSet::new();
        for label in blur.into_iter().map(Into::into) {
            if !seen.contains(label.as_str()) {
                return Err(LabelSetError::UnknownBlurLabel(label));
            }
            blur_set.insert(label);
        }

        Ok(Self {
            labels,
            blur: blur_set,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, LabelSetError> {
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| LabelSetError::Io {
            path: display.clone(),
            source,
        })?;
        let file: LabelFile = serde_json::from_str(&raw).map_err(|source| LabelSetError::Parse {
            path: display,
            source,
        })?;
        Self::new(file.labels, file.blur)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn is_blur(&self, label: &str) -> bool {
        self.blur.contains(label)
    }

    pub fn blur_labels(&self) -> impl Iterator<Item = &str> {
        self.labels
            .iter()
            .map(String::as_str)
            .filter(|label| self.blur.contains(*label))
    }

    pub fn neutral_labels(&self) -> impl Iterator<Item = &str> {
        self.labels
            .iter()
            .map(String::as_str)
            .filter(|label| !self.blur.contains(*label))
    }
}

impl Default for CandidateLabelSet {
    fn default() -> Self {
        let labels = DEFAULT_BLUR_LABELS
            .iter()
            .chain(DEFAULT_NEUTRAL_LABELS.iter())
            .copied();
        Self {
            labels: labels.map(str::to_string).collect(),
            blur: DEFAULT_BLUR_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_partitions_twenty_labels() {
        let set = CandidateLabelSet::default();
        assert_eq!(set.len(), 20);
        assert_eq!(set.blur_labels().count(), 10);
        assert_eq!(set.neutral_labels().count(), 10);
        assert!(set.is_blur("humble bragging or flexing achievements"));
        assert!(!set.is_blur("sharing a news article or link"));
    }

    #[test]
    fn rejects_blur_label_outside_candidates() {
        let err = CandidateLabelSet::new(["a", "b"], ["c"]).unwrap_err();
        assert!(matches!(err, LabelSetError::UnknownBlurLabel(label) if label == "c"));
    }

    #[test]
    fn rejects_duplicates_and_empty_sets() {
        assert!(matches!(
            CandidateLabelSet::new(["a", "a"], Vec::<String>::new()),
            Err(LabelSetError::Duplicate(_))
        ));
        assert!(matches!(
            CandidateLabelSet::new(Vec::<String>::new(), Vec::<String>::new()),
            Err(LabelSetError::Empty)
        ));
    }

    #[test]
    fn loads_label_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        fs::write(
            &path,
            r#"{"labels": ["started a new position", "general work-related comment"], "blur": ["started a new position"]}"#,
        )
        .unwrap();

        let set = CandidateLabelSet::from_file(&path).unwrap();
        assert_eq!(set.labels()[0], "started a new position");
        assert!(set.is_blur("started a new position"));
        assert_eq!(set.neutral_labels().collect::<Vec<_>>(), vec!["general work-related comment"]);
    }
}
