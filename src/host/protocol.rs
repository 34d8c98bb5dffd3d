use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::BackendKind,
    domain::{FeedBatch, UnitId},
    scanner::Badge,
    settings::SettingsPatch,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostCommand {
    Batch(FeedBatch),
    Settings(SettingsPatch),
    Backend { kind: BackendKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RenderAction {
    Apply { blur: bool, badge: Option<Badge> },
    Revert,
    RemoveBadge,
}

#[derive(Debug, Serialize)]
pub struct RenderRecord<'a> {
    pub at: DateTime<Utc>,
    pub unit: &'a UnitId,
    #[serde(flatten)]
    pub action: RenderAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_command_kind() {
        let batch: HostCommand = serde_json::from_str(
            r#"{"type":"batch","added":[{"id":"urn:li:activity:1","text":"hello","regions":[{"selector":"commentary","text":"hi"}]}],"removed":["urn:li:activity:0"]}"#,
        )
        .unwrap();
        let HostCommand::Batch(batch) = batch else {
            panic!("expected batch");
        };
        assert_eq!(batch.added[0].regions[0].selector, "commentary");
        assert_eq!(batch.removed, [UnitId::from("urn:li:activity:0")]);

        let settings: HostCommand =
            serde_json::from_str(r#"{"type":"settings","sensitivity":70,"showScore":false}"#).unwrap();
        assert_eq!(
            settings,
            HostCommand::Settings(SettingsPatch {
                sensitivity: Some(70),
                show_score: Some(false),
                ..SettingsPatch::default()
            })
        );

        let backend: HostCommand = serde_json::from_str(r#"{"type":"backend","kind":"local"}"#).unwrap();
        assert_eq!(backend, HostCommand::Backend { kind: BackendKind::Local });
    }

    #[test]
    fn render_record_is_flat() {
        let unit = UnitId::from("u1");
        let record = RenderRecord {
            at: Utc::now(),
            unit: &unit,
            action: RenderAction::Apply {
                blur: true,
                badge: Some(Badge::for_score(72)),
            },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["unit"], "u1");
        assert_eq!(value["action"], "apply");
        assert_eq!(value["blur"], true);
        assert_eq!(value["badge"]["score"], 72);
        assert_eq!(value["badge"]["tone"], "high");
    }
}
