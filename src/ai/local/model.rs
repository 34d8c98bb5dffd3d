use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use anyhow::{ensure, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z0-9][a-z0-9']*").expect("valid token regex"));

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "or", "the", "of", "to", "for", "on", "about", "in", "at", "is",
];

pub trait ZeroShotModel: Send + Sync {
    /// Returns `(label, probability)` for every label, sorted descending.
    fn predict(&self, text: &str, labels: &[String]) -> Result<Vec<(String, f64)>>;
}

#[async_trait]
pub trait ModelLoader: Send + Sync {
    fn model_id(&self) -> &str;

    async fn load(&self) -> Result<Arc<dyn ZeroShotModel>>;
}

/// Affinity is the share of a label's content words found in the text plus one
/// point per matching hint phrase, softmaxed into probabilities.
pub struct LexiconModel {
    hints: HashMap<String, Vec<String>>,
    sharpness: f64,
    neutral_prior: HashMap<String, f64>,
}

impl LexiconModel {
    pub fn new(sharpness: f64) -> Self {
        Self {
            hints: HashMap::new(),
            sharpness,
            neutral_prior: HashMap::new(),
        }
    }

    pub fn with_hints<I, S>(mut self, label: &str, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.hints
            .entry(label.to_string())
            .or_default()
            .extend(phrases.into_iter().map(|p| p.as_ref().to_lowercase()));
        self
    }

    /// Baseline affinity for a label before any evidence is seen.
    pub fn with_prior(mut self, label: &str, prior: f64) -> Self {
        self.neutral_prior.insert(label.to_string(), prior);
        self
    }

    fn affinity(&self, text: &str, tokens: &HashSet<&str>, label: &str) -> f64 {
        let lowered = label.to_lowercase();
        let terms: Vec<&str> = TOKEN_REGEX
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|term| !STOPWORDS.contains(term))
            .collect();

        let overlap = if terms.is_empty() {
            0.0
        } else {
            terms.iter().filter(|term| tokens.contains(**term)).count() as f64 / terms.len() as f64
        };

        let hint_hits = self
            .hints
            .get(label)
            .map(|phrases| phrases.iter().filter(|p| text.contains(p.as_str())).count())
            .unwrap_or(0) as f64;

        let prior = self.neutral_prior.get(label).copied().unwrap_or(0.0);
        overlap + hint_hits + prior
    }
}

impl ZeroShotModel for LexiconModel {
    fn predict(&self, text: &str, labels: &[String]) -> Result<Vec<(String, f64)>> {
        ensure!(!labels.is_empty(), "no candidate labels supplied");

        let lowered = text.to_lowercase();
        let tokens: HashSet<&str> = TOKEN_REGEX.find_iter(&lowered).map(|m| m.as_str()).collect();

        let logits: Vec<f64> = labels
            .iter()
            .map(|label| self.affinity(&lowered, &tokens, label) * self.sharpness)
            .collect();
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f64 = exps.iter().sum();

        let mut scored: Vec<(String, f64)> = labels
            .iter()
            .cloned()
            .zip(exps.into_iter().map(|e| e / total))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(scored)
    }
}

pub struct LexiconLoader;

#[async_trait]
impl ModelLoader for LexiconLoader {
    fn model_id(&self) -> &str {
        "lexicon-zero-shot"
    }

    async fn load(&self) -> Result<Arc<dyn ZeroShotModel>> {
        Ok(Arc::new(default_lexicon()))
    }
}

fn default_lexicon() -> LexiconModel {
    LexiconModel::new(3.0)
        .with_hints(
            "announcing a new job or promotion",
            ["new position", "new role", "starting a new", "promoted", "promotion", "new job"],
        )
        .with_hints(
            "internship announcement or reflection",
            ["internship", "intern at", "summer at"],
        )
        .with_hints(
            "bragging about personal accomplishments",
            ["proud", "achievement", "accomplishment", "milestone"],
        )
        .with_hints(
            "humble bragging or flexing achievements",
            ["humbled", "blessed", "honored", "thrilled to"],
        )
        .with_hints(
            "sharing acceptance to a selective program",
            ["accepted into", "been selected", "admitted to"],
        )
        .with_hints(
            "celebrating career milestones or awards",
            ["award", "anniversary", "recognized"],
        )
        .with_hints(
            "job offer or competing offers announcement",
            ["offer from", "offers", "accepted an offer"],
        )
        .with_hints(
            "gratitude post about career opportunity",
            ["grateful", "thankful", "amazing opportunity", "excited to announce"],
        )
        .with_hints("sharing a news article or link", ["article", "read more", "http"])
        .with_hints("asking a question for discussion", ["?", "what do you think"])
        .with_hints("technical project or code discussion", ["compiler", "code", "rust", "bug"])
        .with_prior("general work-related comment", 0.6)
        .with_prior("industry news or observation", 0.4)
        .with_prior("sharing a news article or link", 0.3)
}
