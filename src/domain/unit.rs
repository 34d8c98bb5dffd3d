use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UnitId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRegion {
    pub selector: String,
    pub text: String,
}

impl TextRegion {
    pub fn new(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: UnitId,
    #[serde(default)]
    pub regions: Vec<TextRegion>,
    #[serde(default)]
    pub text: String,
}

impl FeedItem {
    pub fn new(id: impl Into<UnitId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            regions: Vec::new(),
            text: text.into(),
        }
    }

    pub fn with_region(mut self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        self.regions.push(TextRegion::new(selector, text));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedBatch {
    #[serde(default)]
    pub added: Vec<FeedItem>,
    #[serde(default)]
    pub removed: Vec<UnitId>,
}

impl FeedBatch {
    pub fn added(items: Vec<FeedItem>) -> Self {
        Self {
            added: items,
            removed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
