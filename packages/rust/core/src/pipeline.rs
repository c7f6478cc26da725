//! One unit of work: summarize an incident and optionally write it back.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use summarizer_shared::{Incident, Result, SummarizerError, WorkerConfig};
use summarizer_sanitize::sanitize_incident;
use summarizer_tracker::TrackerClient;

use crate::llm::{SilentProgress, SummaryBackend, SummaryProgress};

/// Default wait for one summary.
pub const DEFAULT_SUMMARY_TIMEOUT: Duration = Duration::from_secs(600);

/// Read the prompt template handed to the backend.
pub fn load_prompt(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| SummarizerError::io(path, e))
}

/// Fetch, sanitize, summarize, normalize, and (optionally) persist.
///
/// Cheap to clone; every clone shares the tracker client, backend and prompt.
#[derive(Clone)]
pub struct SummaryPipeline {
    client: TrackerClient,
    backend: Arc<dyn SummaryBackend>,
    prompt: Arc<str>,
    timeout: Duration,
}

impl SummaryPipeline {
    pub fn new(
        client: TrackerClient,
        backend: Arc<dyn SummaryBackend>,
        prompt: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            client,
            backend,
            prompt: prompt.into(),
            timeout: DEFAULT_SUMMARY_TIMEOUT,
        }
    }

    /// Build with the timeout and prompt named in `[worker]`.
    pub fn from_config(
        client: TrackerClient,
        backend: Arc<dyn SummaryBackend>,
        worker: &WorkerConfig,
    ) -> Result<Self> {
        let prompt = load_prompt(Path::new(&worker.prompt_path))?;
        Ok(Self::new(client, backend, prompt)
            .with_timeout(Duration::from_secs(worker.summary_timeout_secs)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn client(&self) -> &TrackerClient {
        &self.client
    }

    /// Produce the Markdown summary of one incident.
    ///
    /// A Markdown normalization failure is not an error: the raw backend
    /// text is returned instead.
    #[instrument(skip_all, fields(incident = %incident.incident_id))]
    pub async fn summarize(
        &self,
        incident: &Incident,
        progress: &dyn SummaryProgress,
    ) -> Result<String> {
        let events = self.client.list_events(&incident.id).await?;
        let sanitized = sanitize_incident(incident, &events);
        let payload = sanitized.to_payload()?;

        info!(
            prompt_chars = self.prompt.chars().count(),
            payload_chars = payload.chars().count(),
            events = events.len(),
            "requesting summary"
        );

        let start = Instant::now();
        let handle = self.backend.summarize(&payload, &self.prompt)?;
        let raw = handle.wait(self.timeout, progress).await?;

        info!(
            bytes = raw.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "summary generated"
        );

        match summarizer_markdown::normalize(&raw) {
            Ok(markdown) => Ok(markdown),
            Err(e) => {
                warn!(error = %e, "markdown normalization failed, keeping raw summary");
                Ok(raw)
            }
        }
    }

    /// [`summarize`](Self::summarize), then store the text as the incident's
    /// AI summary.
    pub async fn summarize_and_update(&self, incident: &Incident) -> Result<String> {
        let summary = self.summarize(incident, &SilentProgress).await?;
        self.client.update_ai_summary(&incident.id, &summary).await?;
        info!(incident = %incident.incident_id, "AI summary updated");
        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{FakeBackend, client_for, incident, mount_events};

    fn pipeline(server: &wiremock::MockServer, backend: Arc<FakeBackend>) -> SummaryPipeline {
        SummaryPipeline::new(client_for(server), backend, "Summarize this incident.")
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn summarize_sends_sanitized_payload() {
        let server = wiremock::MockServer::start().await;
        mount_events(
            &server,
            "uuid-1",
            json!([
                {
                    "note": "Stack:\n```\npanic at router.go:42\n```\nsee <https://x.example.com/d|dashboard>",
                    "creator": {"name": "Ada", "email": "ada@example.com", "username": "ada"},
                    "created_at": "2024-05-01T11:00:00Z",
                    "event_type": "comment"
                }
            ]),
        )
        .await;

        let backend = Arc::new(FakeBackend::replying("# Summary\n\n* Router crashed"));
        let summary = pipeline(&server, backend.clone())
            .summarize(&incident("uuid-1", "ITN-1"), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary, "# Summary\n\n- Router crashed\n");

        let payloads = backend.payloads.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        let payload = &payloads[0];
        assert!(payload.contains("[code block/log snippet]"));
        assert!(payload.contains("see dashboard"));
        assert!(!payload.contains("router.go"));
        assert!(!payload.contains("username"));
        assert!(!payload.contains("event_type"));
    }

    #[tokio::test]
    async fn normalization_failure_falls_back_to_raw_text() {
        let server = wiremock::MockServer::start().await;
        mount_events(&server, "uuid-1", json!([])).await;

        let raw = "Summary\n```\nunclosed";
        let backend = Arc::new(FakeBackend::replying(raw));
        let summary = pipeline(&server, backend)
            .summarize(&incident("uuid-1", "ITN-1"), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(summary, raw);
    }

    #[tokio::test]
    async fn summarize_and_update_patches_incident() {
        let server = wiremock::MockServer::start().await;
        mount_events(&server, "uuid-1", json!([])).await;

        wiremock::Mock::given(wiremock::matchers::method("PATCH"))
            .and(wiremock::matchers::path("/incidents/uuid-1"))
            .and(wiremock::matchers::header("authorization", "Bearer test-token"))
            .and(wiremock::matchers::body_json(json!({ "ai_summary": "All good.\n" })))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let backend = Arc::new(FakeBackend::replying("All good."));
        let summary = pipeline(&server, backend)
            .summarize_and_update(&incident("uuid-1", "ITN-1"))
            .await
            .unwrap();
        assert_eq!(summary, "All good.\n");
    }

    #[tokio::test]
    async fn backend_failure_skips_update() {
        let server = wiremock::MockServer::start().await;
        mount_events(&server, "uuid-1", json!([])).await;

        wiremock::Mock::given(wiremock::matchers::method("PATCH"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let backend = Arc::new(FakeBackend::replying("x").failing_on("ITN-1"));
        let err = pipeline(&server, backend)
            .summarize_and_update(&incident("uuid-1", "ITN-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::Summarization(_)));
    }

    #[tokio::test]
    async fn event_fetch_failure_propagates() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let backend = Arc::new(FakeBackend::replying("unused"));
        let err = pipeline(&server, backend.clone())
            .summarize(&incident("uuid-1", "ITN-1"), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, SummarizerError::Http { status: 500, .. }));
        assert!(backend.payloads.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_prompt_is_io_error() {
        let err = load_prompt(Path::new("/nonexistent/prompt.txt")).unwrap_err();
        assert!(matches!(err, SummarizerError::Io { .. }));
    }
}
