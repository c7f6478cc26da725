//! Application configuration for the incident summarizer.
//!
//! User config lives at `~/.incident-summarizer/config.toml`.
//! Environment variables override config file values, which override defaults.
//! CLI flags are applied last by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SummarizerError};
use crate::types::IncidentStatus;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".incident-summarizer";

// ---------------------------------------------------------------------------
// Config structs (matching config.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tracking-service API settings.
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Batch worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Single sign-on settings for bearer tokens.
    #[serde(default)]
    pub sso: SsoConfig,

    /// Summarization backend settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Log verbosity.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[tracker]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Base URL of the incident API, without a trailing slash.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Status filter applied when listing all incidents.
    #[serde(default = "default_status_types")]
    pub status_types: Vec<String>,

    /// Page size for the incident list.
    #[serde(default = "default_incident_page_size")]
    pub incident_page_size: u32,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            status_types: default_status_types(),
            incident_page_size: default_incident_page_size(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl TrackerConfig {
    /// Parse the configured status filter. Fails on the first unknown value.
    pub fn statuses(&self) -> Result<Vec<IncidentStatus>> {
        IncidentStatus::parse_list(&self.status_types)
    }
}

fn default_api_base_url() -> String {
    "https://api.openshift.com/api/web-rca/v1".into()
}
fn default_status_types() -> Vec<String> {
    IncidentStatus::ALL
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}
fn default_incident_page_size() -> u32 {
    100
}
fn default_request_timeout() -> u64 {
    60
}

/// `[worker]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum summaries generated concurrently.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// How long to wait for one summary before giving up.
    #[serde(default = "default_summary_timeout")]
    pub summary_timeout_secs: u64,

    /// Prompt template handed to the summarization backend.
    #[serde(default = "default_prompt_path")]
    pub prompt_path: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            summary_timeout_secs: default_summary_timeout(),
            prompt_path: default_prompt_path(),
        }
    }
}

fn default_max_workers() -> usize {
    1
}
fn default_summary_timeout() -> u64 {
    600
}
fn default_prompt_path() -> String {
    "prompt.txt".into()
}

/// `[sso]` section. Secrets are read from the named env vars, never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoConfig {
    /// Auth server root (with trailing slash).
    #[serde(default = "default_sso_auth_url")]
    pub auth_url: String,

    #[serde(default = "default_sso_realm")]
    pub realm: String,

    #[serde(default = "default_sso_client_id")]
    pub client_id: String,

    /// Env var holding the client secret for the client-credentials grant.
    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,

    /// Env var holding an offline (refresh) token.
    #[serde(default = "default_offline_token_env")]
    pub offline_token_env: String,

    /// Env var holding a pre-issued access token; takes precedence over SSO.
    #[serde(default = "default_static_token_env")]
    pub static_token_env: String,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            auth_url: default_sso_auth_url(),
            realm: default_sso_realm(),
            client_id: default_sso_client_id(),
            client_secret_env: default_client_secret_env(),
            offline_token_env: default_offline_token_env(),
            static_token_env: default_static_token_env(),
        }
    }
}

impl SsoConfig {
    /// OpenID Connect token endpoint for the configured realm.
    pub fn token_endpoint(&self) -> String {
        let base = self.auth_url.trim_end_matches('/');
        format!(
            "{base}/realms/{}/protocol/openid-connect/token",
            self.realm
        )
    }
}

fn default_sso_auth_url() -> String {
    "https://sso.redhat.com/auth/".into()
}
fn default_sso_realm() -> String {
    "redhat-external".into()
}
fn default_sso_client_id() -> String {
    "cloud-services".into()
}
fn default_client_secret_env() -> String {
    "SSO_CLIENT_SECRET".into()
}
fn default_offline_token_env() -> String {
    "SSO_OFFLINE_TOKEN".into()
}
fn default_static_token_env() -> String {
    "WEBRCA_TOKEN".into()
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API root.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_temperature() -> f64 {
    0.2
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when neither `RUST_LOG` nor `-v` is given.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

// ---------------------------------------------------------------------------
// Env overrides & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Apply environment overrides using `lookup` (usually `std::env::var`).
    ///
    /// Empty values are treated as unset.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("WEBRCA_V1_API_BASE_URL") {
            self.tracker.api_base_url = url;
        }
        if let Some(statuses) = get("STATUS_TYPES") {
            self.tracker.status_types = statuses.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Some(workers) = get("MAX_WORKERS") {
            self.worker.max_workers = workers.trim().parse().map_err(|e| {
                SummarizerError::config(format!("MAX_WORKERS must be an integer ({workers}): {e}"))
            })?;
        }
        if let Some(auth_url) = get("SSO_AUTH_URL") {
            self.sso.auth_url = auth_url;
        }
        if let Some(realm) = get("SSO_REALM_NAME") {
            self.sso.realm = realm;
        }
        if let Some(client_id) = get("SSO_CLIENT_ID") {
            self.sso.client_id = client_id;
        }
        if let Some(base_url) = get("LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(model) = get("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }

        Ok(())
    }

    /// Reject configurations that cannot work, before any network call.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.tracker.api_base_url).map_err(|e| {
            SummarizerError::config(format!(
                "invalid api_base_url '{}': {e}",
                self.tracker.api_base_url
            ))
        })?;
        self.tracker.statuses()?;

        if self.worker.max_workers == 0 {
            return Err(SummarizerError::config("max_workers must be at least 1"));
        }
        if self.tracker.incident_page_size == 0 {
            return Err(SummarizerError::config("incident_page_size must be at least 1"));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.incident-summarizer/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SummarizerError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.incident-summarizer/config.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SummarizerError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SummarizerError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Load the config file, then apply process environment overrides.
pub fn resolve_config() -> Result<AppConfig> {
    let mut config = load_config()?;
    config.apply_env_overrides(|name| std::env::var(name).ok())?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SummarizerError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SummarizerError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SummarizerError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
