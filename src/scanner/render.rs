use serde::Serialize;

use crate::domain::{BadgeTone, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub score: u8,
    pub tone: BadgeTone,
}

impl Badge {
    pub fn for_score(score: u8) -> Self {
        Self {
            score,
            tone: BadgeTone::for_score(score),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Effect {
    pub blur: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<Badge>,
}

/// Applies and removes effects on the host's units. Implementations must be
/// idempotent: reverting an untouched unit is a no-op.
pub trait Renderer: Send + Sync {
    fn apply(&self, unit: &UnitId, effect: &Effect);

    fn revert(&self, unit: &UnitId);

    fn remove_badge(&self, unit: &UnitId);
}
