pub mod labels;
pub mod types;
pub mod unit;

pub use labels::{CandidateLabelSet, LabelSetError};
pub use types::{
    BadgeTone, ClassificationOutcome, ClassificationRequest, ClassificationResult,
    QueueSnapshot, RawClassification,
};
pub use unit::{FeedBatch, FeedItem, TextRegion, UnitId};
