//! Shared fakes for unit tests.

use std::sync::{Arc, Mutex};

use summarizer_shared::{Incident, Result};
use summarizer_tracker::{TokenProvider, TrackerClient};

use crate::llm::{SummaryBackend, SummaryHandle, summary_channel};

/// Backend that answers immediately with a canned reply.
pub(crate) struct FakeBackend {
    reply: String,
    fail_when: Option<String>,
    pub payloads: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail_when: None,
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Fail any payload containing `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_when = Some(needle.to_string());
        self
    }
}

impl SummaryBackend for FakeBackend {
    fn summarize(&self, payload: &str, _prompt: &str) -> Result<SummaryHandle> {
        self.payloads.lock().unwrap().push(payload.to_string());

        let (writer, handle) = summary_channel();
        match &self.fail_when {
            Some(needle) if payload.contains(needle.as_str()) => {
                writer.fail("backend unavailable");
            }
            _ => {
                writer.push(&self.reply);
                writer.finish();
            }
        }
        Ok(handle)
    }
}

pub(crate) fn client_for(server: &wiremock::MockServer) -> TrackerClient {
    TrackerClient::new(
        reqwest::Client::new(),
        &server.uri(),
        Arc::new(TokenProvider::with_static_token("test-token")),
    )
}

pub(crate) fn incident(id: &str, public_id: &str) -> Incident {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "incident_id": public_id,
        "status": "ongoing",
        "summary": format!("summary of {public_id}"),
    }))
    .unwrap()
}

/// Serve an event log for `id` in one page.
pub(crate) async fn mount_events(
    server: &wiremock::MockServer,
    id: &str,
    events: serde_json::Value,
) {
    let total = events.as_array().map(Vec::len).unwrap_or(0);
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path(format!("/incidents/{id}/events")))
        .and(wiremock::matchers::query_param("order_by", "occurred_at asc"))
        .and(wiremock::matchers::query_param("size", "999"))
        .and(wiremock::matchers::query_param(
            "event_type",
            "comment,follow_up,escalation,external_reference,audit_log",
        ))
        .respond_with(
            wiremock::ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "items": events, "total": total })),
        )
        .mount(server)
        .await;
}
