//! Wire envelope carried on the board event stream.

use serde::Deserialize;
use serde_json::Value;

/// Event types the dashboard understands.
///
/// Anything else on the wire deserializes to [`Unknown`](Self::Unknown) and
/// is ignored by the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoardEventType {
    /// A work item was created.
    ItemAdded,
    /// A work item moved between stages.
    ItemMoved,
    /// A work item's fields changed.
    ItemUpdated,
    /// A work item was removed.
    ItemDeleted,
    /// The whole board snapshot changed.
    BoardUpdated,
    /// The mission finished.
    MissionCompleted,
    /// Final review phase started.
    FinalReviewStarted,
    /// Final review phase finished.
    FinalReviewComplete,
    /// Post-mission checks started.
    PostChecksStarted,
    /// Progress update from a post-mission check.
    PostCheckUpdate,
    /// Post-mission checks finished.
    PostChecksComplete,
    /// Documentation phase started.
    DocumentationStarted,
    /// Documentation phase finished.
    DocumentationComplete,
    /// Unrecognized event type.
    #[serde(other)]
    Unknown,
}

/// One board-mutation notification as it appears on the wire.
///
/// Envelopes are immutable once parsed; the dispatcher destructures them but
/// never mutates or re-emits them.
#[derive(Clone, Debug, Deserialize)]
pub struct BoardEnvelope {
    /// Selects the dispatch target.
    #[serde(rename = "type")]
    pub event_type: BoardEventType,
    /// Server-side ISO-8601 timestamp.
    #[serde(default)]
    pub timestamp: String,
    /// Loosely-typed payload whose required keys vary per event type.
    #[serde(default)]
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_deserializes_known_type() {
        let raw = r#"{"type":"item-moved","timestamp":"2026-08-29T10:00:00Z","data":{"itemId":"001"}}"#;
        let envelope: BoardEnvelope = serde_json::from_str(raw).expect("valid envelope");
        assert_eq!(envelope.event_type, BoardEventType::ItemMoved);
        assert_eq!(envelope.timestamp, "2026-08-29T10:00:00Z");
        assert_eq!(envelope.data["itemId"], "001");
    }

    #[test]
    fn test_envelope_unknown_type() {
        let raw = r#"{"type":"coffee-brewed","timestamp":"2026-08-29T10:00:00Z","data":{}}"#;
        let envelope: BoardEnvelope = serde_json::from_str(raw).expect("valid envelope");
        assert_eq!(envelope.event_type, BoardEventType::Unknown);
    }

    #[test]
    fn test_envelope_tolerates_missing_fields() {
        let raw = r#"{"type":"mission-completed"}"#;
        let envelope: BoardEnvelope = serde_json::from_str(raw).expect("valid envelope");
        assert_eq!(envelope.event_type, BoardEventType::MissionCompleted);
        assert!(envelope.timestamp.is_empty());
        assert!(envelope.data.is_null());
    }

    #[test]
    fn test_kebab_case_spelling() {
        for (raw, expected) in [
            ("\"item-added\"", BoardEventType::ItemAdded),
            ("\"board-updated\"", BoardEventType::BoardUpdated),
            ("\"final-review-started\"", BoardEventType::FinalReviewStarted),
            ("\"final-review-complete\"", BoardEventType::FinalReviewComplete),
            ("\"post-checks-started\"", BoardEventType::PostChecksStarted),
            ("\"post-check-update\"", BoardEventType::PostCheckUpdate),
            ("\"post-checks-complete\"", BoardEventType::PostChecksComplete),
            (
                "\"documentation-started\"",
                BoardEventType::DocumentationStarted,
            ),
            (
                "\"documentation-complete\"",
                BoardEventType::DocumentationComplete,
            ),
        ] {
            let parsed: BoardEventType = serde_json::from_str(raw).expect("valid type");
            assert_eq!(parsed, expected, "{raw}");
        }
    }
}
