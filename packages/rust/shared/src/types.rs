//! Core domain types for tracking-service incidents.
//!
//! Only the fields the summarizer reads are modeled; anything else the API
//! returns is ignored during deserialization.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SummarizerError};

// ---------------------------------------------------------------------------
// IncidentStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    New,
    Ongoing,
    Paused,
    Resolved,
    Closed,
}

impl IncidentStatus {
    /// Every status, in the order the tracking service lists them.
    pub const ALL: [IncidentStatus; 5] = [
        Self::New,
        Self::Ongoing,
        Self::Paused,
        Self::Resolved,
        Self::Closed,
    ];

    /// Wire name used in query filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Ongoing => "ongoing",
            Self::Paused => "paused",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Parse a list of status names, rejecting anything outside the closed set.
    pub fn parse_list<S: AsRef<str>>(values: &[S]) -> Result<Vec<Self>> {
        values.iter().map(|v| v.as_ref().parse()).collect()
    }

    /// Join statuses into the comma-separated form the list endpoint expects.
    pub fn join(statuses: &[Self]) -> String {
        statuses
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromStr for IncidentStatus {
    type Err = SummarizerError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == lowered)
            .ok_or_else(|| SummarizerError::config(format!("invalid status type: {s}")))
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// Type tag of an incident event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Comment,
    FollowUp,
    Escalation,
    ExternalReference,
    AuditLog,
    /// Any tag this tool does not know about.
    #[serde(other)]
    Other,
}

impl EventType {
    /// Event types fed to the summarizer.
    pub const SUMMARY_TYPES: [EventType; 5] = [
        Self::Comment,
        Self::FollowUp,
        Self::Escalation,
        Self::ExternalReference,
        Self::AuditLog,
    ];

    /// Event types that count as a substantive change to an incident.
    /// Audit log entries are excluded: writing a summary produces one.
    pub const CHANGE_TYPES: [EventType; 4] = [
        Self::Comment,
        Self::FollowUp,
        Self::Escalation,
        Self::ExternalReference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::FollowUp => "follow_up",
            Self::Escalation => "escalation",
            Self::ExternalReference => "external_reference",
            Self::AuditLog => "audit_log",
            Self::Other => "other",
        }
    }

    /// Join types into the comma-separated `event_type` filter value.
    pub fn join(types: &[Self]) -> String {
        types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

// ---------------------------------------------------------------------------
// Incident
// ---------------------------------------------------------------------------

/// A person reference (creator, owner, participant).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// An incident record as returned by the tracking service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    /// Opaque internal identifier, used in API paths.
    pub id: String,
    /// Human-facing public identifier (e.g. `ITN-2025-00096`).
    pub incident_id: String,
    pub status: IncidentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Passed through verbatim; the shape is owned by the tracking service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_coordination: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary_updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<Person>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_owner: Option<Person>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<Person>,
}

// ---------------------------------------------------------------------------
// Event / FollowUp
// ---------------------------------------------------------------------------

/// Creator of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventCreator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl EventCreator {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

/// A timestamped entry in an incident's event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<EventCreator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
}

/// A follow-up record; only its modification time matters here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// One page of a list endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Server-reported size of the whole collection.
    #[serde(default)]
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!("Ongoing".parse::<IncidentStatus>().unwrap(), IncidentStatus::Ongoing);
        assert_eq!(" closed ".parse::<IncidentStatus>().unwrap(), IncidentStatus::Closed);
    }

    #[test]
    fn status_parse_rejects_unknown() {
        let err = IncidentStatus::parse_list(&["new", "bogus"]).unwrap_err();
        assert!(err.to_string().contains("invalid status type: bogus"));
    }

    #[test]
    fn status_join_preserves_order() {
        let statuses = IncidentStatus::parse_list(&["PAUSED", "new"]).unwrap();
        assert_eq!(IncidentStatus::join(&statuses), "paused,new");
    }

    #[test]
    fn event_type_join() {
        assert_eq!(
            EventType::join(&EventType::CHANGE_TYPES),
            "comment,follow_up,escalation,external_reference"
        );
        assert!(EventType::join(&EventType::SUMMARY_TYPES).ends_with(",audit_log"));
    }

    #[test]
    fn unknown_event_type_deserializes_as_other() {
        let event: Event =
            serde_json::from_str(r#"{"note":"hi","event_type":"status_change"}"#).unwrap();
        assert_eq!(event.event_type, Some(EventType::Other));
    }

    #[test]
    fn incident_ignores_unknown_fields() {
        let json = r#"{
            "id": "a1b2",
            "incident_id": "ITN-2025-00001",
            "status": "ongoing",
            "severity": "major",
            "last_changed_at": "2025-03-01T10:00:00Z",
            "creator": {"name": "Pat", "username": "pat"}
        }"#;
        let incident: Incident = serde_json::from_str(json).unwrap();
        assert_eq!(incident.incident_id, "ITN-2025-00001");
        assert_eq!(incident.status, IncidentStatus::Ongoing);
        assert!(incident.ai_summary_updated_at.is_none());
        assert_eq!(incident.creator.unwrap().name.as_deref(), Some("Pat"));
        assert!(incident.participants.is_empty());
    }

    #[test]
    fn page_total_defaults_to_zero() {
        let page: Page<FollowUp> = serde_json::from_str(r#"{"items":[]}"#).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
    }
}
