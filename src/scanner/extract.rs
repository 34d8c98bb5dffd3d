use crate::{config::ScannerConfig, domain::FeedItem};

const DEFAULT_PRIMARY: &[&str] = &["commentary", "update-text", "description"];
const DEFAULT_SECONDARY: &[&str] = &["job-update-title", "job-update-description"];
const DEFAULT_ALLOW_LIST: &[&str] = &["started a new position", "new role", "excited to announce"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource<'a> {
    Region(&'a str),
    FullText,
}

/// Ordered selector strategies, most specific first. The first region with
/// non-blank text wins; the unit's full text is the last resort.
#[derive(Debug, Clone)]
pub struct ExtractionPolicy {
    primary: Vec<String>,
    secondary: Vec<String>,
}

impl Default for ExtractionPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_PRIMARY.iter().map(|s| s.to_string()).collect(),
            DEFAULT_SECONDARY.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl ExtractionPolicy {
    pub fn new(primary: Vec<String>, secondary: Vec<String>) -> Self {
        Self { primary, secondary }
    }

    pub fn extract<'a>(&'a self, item: &'a FeedItem) -> Option<(&'a str, TextSource<'a>)> {
        let region_text = |selector: &'a String| {
            item.regions
                .iter()
                .filter(|region| &region.selector == selector)
                .map(|region| region.text.trim())
                .find(|text| !text.is_empty())
                .map(|text| (text, TextSource::Region(selector.as_str())))
        };

        self.primary
            .iter()
            .chain(self.secondary.iter())
            .find_map(region_text)
            .or_else(|| {
                let text = item.text.trim();
                (!text.is_empty()).then_some((text, TextSource::FullText))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    Empty,
    TooShort,
}

/// Cheap gate in front of the classifier: very short snippets are usually a
/// name or a title, except for a few known short announcement phrases.
#[derive(Debug, Clone)]
pub struct PreFilter {
    min_chars: usize,
    min_words: usize,
    allow_list: Vec<String>,
}

impl Default for PreFilter {
    fn default() -> Self {
        Self::new(35, 6)
    }
}

impl PreFilter {
    pub fn new(min_chars: usize, min_words: usize) -> Self {
        Self {
            min_chars,
            min_words,
            allow_list: DEFAULT_ALLOW_LIST.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(config.min_text_length, config.min_word_count)
    }

    pub fn check(&self, text: &str) -> Verdict {
        let text = text.trim();
        if text.is_empty() {
            return Verdict::Empty;
        }
        let short = text.chars().count() < self.min_chars
            && text.split_whitespace().count() < self.min_words;
        if !short {
            return Verdict::Eligible;
        }
        let lowered = text.to_lowercase();
        if self.allow_list.iter().any(|phrase| lowered.contains(phrase.as_str())) {
            Verdict::Eligible
        } else {
            Verdict::TooShort
        }
    }
}
