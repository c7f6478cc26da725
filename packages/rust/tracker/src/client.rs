//! HTTP client for the incident tracking service.
//!
//! Every request carries a bearer token from the shared [`TokenProvider`].
//! Any transport failure or non-2xx response becomes an error for the whole
//! call; nothing here retries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use summarizer_shared::{
    AppConfig, Event, EventType, FollowUp, Incident, IncidentStatus, Page, Result,
    SummarizerError,
};

use crate::auth::TokenProvider;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("incident-summarizer/", env!("CARGO_PKG_VERSION"));

/// Page size for the per-incident event log; large enough to fit in one page.
pub const EVENT_PAGE_SIZE: u32 = 999;

/// Default page size for the incident list.
pub const DEFAULT_INCIDENT_PAGE_SIZE: u32 = 100;

/// Cap on error bodies carried into [`SummarizerError::Http`].
const MAX_ERROR_BODY: usize = 800;

/// Build the shared reqwest client.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| SummarizerError::Network(format!("failed to build HTTP client: {e}")))
}

/// Query parameters as sent to the API.
pub type Query<'a> = [(&'a str, String)];

// ---------------------------------------------------------------------------
// TrackerClient
// ---------------------------------------------------------------------------

/// Client for the tracking-service REST API. Cheap to clone.
#[derive(Clone)]
pub struct TrackerClient {
    http: Client,
    base_url: String,
    tokens: Arc<TokenProvider>,
    incident_page_size: u32,
}

impl TrackerClient {
    /// Create a client for `base_url` (trailing slashes are ignored).
    pub fn new(http: Client, base_url: &str, tokens: Arc<TokenProvider>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            incident_page_size: DEFAULT_INCIDENT_PAGE_SIZE,
        }
    }

    /// Build a client and token provider from resolved configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let http = build_http_client(Duration::from_secs(config.tracker.request_timeout_secs))?;
        let tokens = Arc::new(TokenProvider::from_env(http.clone(), &config.sso));
        Ok(Self::new(http, &config.tracker.api_base_url, tokens)
            .with_incident_page_size(config.tracker.incident_page_size))
    }

    pub fn with_incident_page_size(mut self, size: u32) -> Self {
        self.incident_page_size = size.max(1);
        self
    }

    // -----------------------------------------------------------------------
    // Raw verbs
    // -----------------------------------------------------------------------

    /// GET `path` with `query` and decode the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &Query<'_>) -> Result<T> {
        let url = self.url(path);
        let request = self.http.get(&url).query(query);
        self.send_json(Method::GET, &url, request).await
    }

    /// PATCH `path` with a JSON body and decode the JSON response.
    pub async fn patch(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = self.url(path);
        let request = self.http.patch(&url).json(body);
        self.send_json(Method::PATCH, &url, request).await
    }

    /// Fetch every item of a paginated collection, in server order.
    ///
    /// Stops once the accumulated count reaches the server-reported total.
    /// Any failed page aborts the whole fetch.
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        filters: &Query<'_>,
        page_size: u32,
    ) -> Result<Vec<T>> {
        let mut items: Vec<T> = Vec::new();
        let mut page = 1_u32;

        loop {
            let mut query = filters.to_vec();
            query.push(("page", page.to_string()));
            query.push(("size", page_size.to_string()));

            let chunk: Page<T> = self.get(path, &query).await?;
            let received = chunk.items.len();
            items.extend(chunk.items);

            debug!(
                path,
                page,
                fetched = items.len(),
                total = chunk.total,
                "fetched page"
            );

            if items.len() >= chunk.total {
                break;
            }
            if received == 0 {
                return Err(SummarizerError::Network(format!(
                    "{path}: page {page} was empty with {} of {} items fetched",
                    items.len(),
                    chunk.total
                )));
            }
            page = page.saturating_add(1);
        }

        Ok(items)
    }

    // -----------------------------------------------------------------------
    // Incident endpoints
    // -----------------------------------------------------------------------

    /// Look up a single incident by its public identifier.
    #[instrument(skip(self))]
    pub async fn find_incident(&self, public_id: &str) -> Result<Incident> {
        info!("fetching incident");

        let page: Page<Incident> = self
            .get("/incidents", &[("public_id", public_id.to_string())])
            .await?;

        page.items
            .into_iter()
            .next()
            .ok_or_else(|| SummarizerError::NotFound(public_id.to_string()))
    }

    /// List every incident whose status is in `statuses` (all incidents if empty).
    pub async fn list_incidents(&self, statuses: &[IncidentStatus]) -> Result<Vec<Incident>> {
        let mut filters = Vec::new();
        if !statuses.is_empty() {
            filters.push(("status", IncidentStatus::join(statuses)));
        }

        let incidents: Vec<Incident> = self
            .get_all("/incidents", &filters, self.incident_page_size)
            .await?;

        info!(count = incidents.len(), "fetched incidents");
        Ok(incidents)
    }

    /// Full event log of an incident, oldest first.
    pub async fn list_events(&self, incident_id: &str) -> Result<Vec<Event>> {
        let filters = [
            ("order_by", "occurred_at asc".to_string()),
            ("event_type", EventType::join(&EventType::SUMMARY_TYPES)),
        ];
        self.get_all(
            &format!("/incidents/{incident_id}/events"),
            &filters,
            EVENT_PAGE_SIZE,
        )
        .await
    }

    /// `updated_at` of the most recently changed substantive event, if any.
    pub async fn latest_event_change(&self, incident_id: &str) -> Result<Option<DateTime<Utc>>> {
        let query = [
            ("order_by", "updated_at desc".to_string()),
            ("size", "1".to_string()),
            ("event_type", EventType::join(&EventType::CHANGE_TYPES)),
        ];
        let page: Page<Event> = self
            .get(&format!("/incidents/{incident_id}/events"), &query)
            .await?;
        Ok(page.items.into_iter().next().and_then(|e| e.updated_at))
    }

    /// `updated_at` of the most recently changed follow-up, if any.
    pub async fn latest_follow_up_change(
        &self,
        incident_id: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let query = [
            ("order_by", "updated_at desc".to_string()),
            ("size", "1".to_string()),
        ];
        let page: Page<FollowUp> = self
            .get(&format!("/incidents/{incident_id}/follow_ups"), &query)
            .await?;
        Ok(page.items.into_iter().next().and_then(|f| f.updated_at))
    }

    /// Write a generated summary back onto the incident.
    pub async fn update_ai_summary(&self, incident_id: &str, summary: &str) -> Result<()> {
        let body = serde_json::json!({ "ai_summary": summary });
        self.patch(&format!("/incidents/{incident_id}"), &body)
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        let token = self.tokens.access_token().await?;

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SummarizerError::Network(format!("{method} {url}: {e}")))?;

        let status = response.status();
        debug!(%method, url, status = status.as_u16(), "HTTP request");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizerError::Http {
                status: status.as_u16(),
                url: url.to_string(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SummarizerError::Network(format!("{url}: body read failed: {e}")))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| SummarizerError::parse(format!("{method} {url}: {e}")))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
