//! Transition events.
//!
//! Every successful state transition produces exactly one event. Events are
//! append-only facts consumed by calendar, reporting, and notification
//! collaborators; they are emitted after the owning write commits and are
//! never retracted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ComplaintId, GrievanceId, Stage};

/// What happened to a grievance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// The case moved to its next procedural step.
    Advanced {
        from_step: u32,
        to_step: u32,
        stage: Stage,
        note: String,
        due_date: Option<DateTime<Utc>>,
    },
    /// The case was settled.
    Settled { details: String },
    /// The case was withdrawn.
    Withdrawn { details: String },
    /// The case was created by elevating a complaint.
    Elevated { complaint_id: ComplaintId },
}

impl EventKind {
    /// Wire name used by downstream consumers.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Advanced { .. } => "ADVANCED",
            EventKind::Settled { .. } => "SETTLED",
            EventKind::Withdrawn { .. } => "WITHDRAWN",
            EventKind::Elevated { .. } => "ELEVATED",
        }
    }
}

/// One appended transition record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrievanceEvent {
    pub grievance_id: GrievanceId,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl GrievanceEvent {
    pub fn new(grievance_id: GrievanceId, occurred_at: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            grievance_id,
            occurred_at,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_wire_names() {
        let advanced = EventKind::Advanced {
            from_step: 1,
            to_step: 2,
            stage: Stage::Formal,
            note: "Pay unresolved".into(),
            due_date: None,
        };
        assert_eq!(advanced.name(), "ADVANCED");
        assert_eq!(EventKind::Settled { details: "x".into() }.name(), "SETTLED");
        assert_eq!(
            EventKind::Withdrawn { details: "x".into() }.name(),
            "WITHDRAWN"
        );
        assert_eq!(
            EventKind::Elevated {
                complaint_id: ComplaintId::generate()
            }
            .name(),
            "ELEVATED"
        );
    }

    #[test]
    fn test_event_serialization_carries_type_tag() {
        let event = GrievanceEvent::new(
            GrievanceId::generate(),
            Utc.with_ymd_and_hms(2025, 12, 1, 9, 0, 0).unwrap(),
            EventKind::Settled {
                details: "Paid lump sum".into(),
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SETTLED");
        assert_eq!(json["details"], "Paid lump sum");
    }
}
