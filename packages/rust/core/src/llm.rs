//! Summarization backend contract and the OpenAI-compatible implementation.
//!
//! A backend returns a [`SummaryHandle`] immediately. Output streams into the
//! handle's content buffer from a background task, and the handle flips to
//! done once the stream ends (successfully or not).

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use summarizer_shared::{LlmConfig, Result, SummarizerError};

/// How often a waiting caller is told how many bytes have arrived.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct SummaryState {
    content: String,
    done: bool,
    error: Option<String>,
}

/// Create a connected writer/handle pair.
pub fn summary_channel() -> (SummaryWriter, SummaryHandle) {
    let (tx, rx) = watch::channel(SummaryState::default());
    (SummaryWriter { tx }, SummaryHandle { rx })
}

/// Producer side, owned by the backend's streaming task.
#[derive(Debug)]
pub struct SummaryWriter {
    tx: watch::Sender<SummaryState>,
}

impl SummaryWriter {
    /// Append a chunk of output.
    pub fn push(&self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        self.tx.send_modify(|state| state.content.push_str(delta));
    }

    /// Mark the summary complete.
    pub fn finish(self) {
        self.tx.send_modify(|state| state.done = true);
    }

    /// Mark the summary failed. Content received so far is kept.
    pub fn fail(self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|state| {
            state.error = Some(message);
            state.done = true;
        });
    }
}

/// Consumer side of an in-flight summary.
#[derive(Debug)]
pub struct SummaryHandle {
    rx: watch::Receiver<SummaryState>,
}

impl SummaryHandle {
    pub fn is_done(&self) -> bool {
        self.rx.borrow().done
    }

    /// Content received so far.
    pub fn content(&self) -> String {
        self.rx.borrow().content.clone()
    }

    pub fn bytes_received(&self) -> usize {
        self.rx.borrow().content.len()
    }

    /// Wait for the done signal and return the full text.
    ///
    /// `progress` hears the byte count at least every [`POLL_INTERVAL`].
    /// Fails if the backend reported an error, the producer went away
    /// without finishing, or `timeout` elapsed.
    pub async fn wait(
        mut self,
        timeout: Duration,
        progress: &dyn SummaryProgress,
    ) -> Result<String> {
        let deadline = Instant::now() + timeout;

        loop {
            {
                let state = self.rx.borrow_and_update();
                if state.done {
                    return match &state.error {
                        Some(message) => Err(SummarizerError::Summarization(message.clone())),
                        None => Ok(state.content.clone()),
                    };
                }
                progress.received(state.content.len());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SummarizerError::Summarization(format!(
                    "timed out after {}s waiting for summary ({} bytes received)",
                    timeout.as_secs(),
                    self.bytes_received()
                )));
            }

            let step = POLL_INTERVAL.min(deadline - now);
            if let Ok(Err(_)) = tokio::time::timeout(step, self.rx.changed()).await {
                if !self.is_done() {
                    return Err(SummarizerError::Summarization(
                        "summary stream closed before completion".into(),
                    ));
                }
            }
        }
    }
}

/// Receives byte counts while a summary is generating.
pub trait SummaryProgress: Send + Sync {
    fn received(&self, bytes: usize);
}

/// No-op progress for headless/test usage.
pub struct SilentProgress;

impl SummaryProgress for SilentProgress {
    fn received(&self, _bytes: usize) {}
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// A summarization service.
pub trait SummaryBackend: Send + Sync {
    /// Start summarizing `payload` under `prompt`. Must be called from
    /// within a tokio runtime; output arrives on the returned handle.
    fn summarize(&self, payload: &str, prompt: &str) -> Result<SummaryHandle>;
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    delta: ChatDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Streams `/chat/completions` from an OpenAI-compatible API.
#[derive(Clone)]
pub struct OpenAiChatBackend {
    http: Client,
    endpoint: String,
    model: String,
    api_key: Arc<str>,
    temperature: f64,
}

impl OpenAiChatBackend {
    pub fn new(http: Client, base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key: Arc::from(api_key),
            temperature: LlmConfig::default().temperature,
        }
    }

    /// Build from config, reading the API key from the env var it names.
    pub fn from_config(http: Client, llm: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&llm.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                SummarizerError::config(format!(
                    "summarization API key not set: export {}",
                    llm.api_key_env
                ))
            })?;

        Ok(Self::new(http, &llm.base_url, &llm.model, &api_key)
            .with_temperature(llm.temperature))
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    fn request_body(&self, payload: &str, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "stream": true,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": prompt },
                { "role": "user", "content": payload },
            ],
        })
    }

    async fn stream(self, body: serde_json::Value, writer: &SummaryWriter) -> Result<()> {
        let mut response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.as_ref())
            .json(&body)
            .send()
            .await
            .map_err(|e| SummarizerError::Summarization(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizerError::Summarization(format!(
                "backend returned HTTP {status}: {body}"
            )));
        }

        let mut buffer: Vec<u8> = Vec::new();
        loop {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| SummarizerError::Summarization(format!("stream interrupted: {e}")))?;
            let Some(chunk) = chunk else {
                break;
            };
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if handle_sse_line(&String::from_utf8_lossy(&line), writer)? {
                    return Ok(());
                }
            }
        }

        // Trailing line without a newline.
        if !buffer.is_empty() {
            handle_sse_line(&String::from_utf8_lossy(&buffer), writer)?;
        }
        Ok(())
    }
}

/// Apply one SSE line. Returns `true` on the `[DONE]` sentinel.
fn handle_sse_line(line: &str, writer: &SummaryWriter) -> Result<bool> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(false);
    };
    let data = data.trim_start();

    if data == "[DONE]" {
        return Ok(true);
    }
    if data.is_empty() {
        return Ok(false);
    }

    let chunk: ChatChunk = serde_json::from_str(data).map_err(|e| {
        SummarizerError::Summarization(format!("undecodable stream chunk: {e}"))
    })?;

    for choice in chunk.choices {
        if let Some(content) = choice.delta.content {
            writer.push(&content);
        }
    }
    Ok(false)
}

impl SummaryBackend for OpenAiChatBackend {
    fn summarize(&self, payload: &str, prompt: &str) -> Result<SummaryHandle> {
        let (writer, handle) = summary_channel();
        let body = self.request_body(payload, prompt);
        let backend = self.clone();

        debug!(endpoint = %self.endpoint, model = %self.model, "starting summary stream");

        tokio::spawn(async move {
            match backend.stream(body, &writer).await {
                Ok(()) => writer.finish(),
                Err(e) => {
                    warn!(error = %e, "summary stream failed");
                    writer.fail(e.to_string());
                }
            }
        });

        Ok(handle)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
