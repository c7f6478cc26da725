//! Field whitelisting.
//!
//! The sanitized types only declare the fields that may reach the
//! summarizer, so anything else in the tracker payload is dropped simply by
//! not being copied over.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use summarizer_shared::{
    Event, EventCreator, Incident, IncidentStatus, Person, Result, SummarizerError,
};

use crate::note::clean_note;

/// An incident stripped to its whitelisted fields, with sanitized events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SanitizedIncident {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub incident_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<Value>,
    pub status: IncidentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_coordination: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<Person>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_owner: Option<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<Person>,
    pub events: Vec<SanitizedEvent>,
}

impl SanitizedIncident {
    /// Compact JSON handed to the summarization backend.
    pub fn to_payload(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            SummarizerError::parse(format!(
                "failed to serialize incident {}: {e}",
                self.incident_id
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SanitizedEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Absent when neither name nor email survived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<EventCreator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

pub fn sanitize_event(event: &Event) -> SanitizedEvent {
    SanitizedEvent {
        note: event.note.as_deref().map(clean_note),
        creator: event
            .creator
            .as_ref()
            .filter(|creator| !creator.is_empty())
            .cloned(),
        created_at: event.created_at,
        updated_at: event.updated_at,
    }
}

/// Build the summarizer view of `incident` and its event log.
///
/// Events keep their input order.
pub fn sanitize_incident(incident: &Incident, events: &[Event]) -> SanitizedIncident {
    let events: Vec<SanitizedEvent> = events.iter().map(sanitize_event).collect();

    debug!(
        incident = %incident.incident_id,
        events = events.len(),
        "sanitized incident"
    );

    SanitizedIncident {
        id: incident.id.clone(),
        summary: incident.summary.clone(),
        description: incident.description.clone(),
        incident_id: incident.incident_id.clone(),
        products: incident.products.clone(),
        status: incident.status,
        external_coordination: incident.external_coordination,
        created_at: incident.created_at,
        resolved_at: incident.resolved_at,
        private: incident.private,
        creator: incident.creator.as_ref().map(name_only),
        incident_owner: incident.incident_owner.as_ref().map(name_only),
        participants: incident.participants.iter().map(name_only).collect(),
        events,
    }
}

fn name_only(person: &Person) -> Person {
    Person {
        name: person.name.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
