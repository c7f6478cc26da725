//! Bearer token acquisition with a single-flight refresh cache.
//!
//! Three credential modes, in precedence order: a static pre-issued token,
//! an offline (refresh) token, or a client-credentials exchange.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use summarizer_shared::{Result, SsoConfig, SummarizerError};

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Upper bound on how long a token is cached, whatever `expires_in` says.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache deadline for a token issued at `now` with the given `expires_in`.
fn expiry_after(now: Instant, expires_in: u64) -> Instant {
    let lifetime = Duration::from_secs(expires_in).min(MAX_TOKEN_LIFETIME);
    now.checked_add(lifetime).unwrap_or(now)
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// How to obtain an access token.
#[derive(Clone)]
pub enum Credentials {
    /// Pre-issued access token, used verbatim and never refreshed.
    Static(String),
    /// Offline token exchanged via the `refresh_token` grant.
    OfflineToken {
        token: String,
        client_secret: Option<String>,
    },
    /// `client_credentials` grant.
    ClientCredentials { client_secret: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credentials").field(&self.mode()).finish()
    }
}

impl Credentials {
    /// Pick a credential mode from the env vars named in `sso`.
    ///
    /// Returns `None` when nothing usable is configured; the error is raised
    /// later, the first time a token is actually needed.
    pub fn resolve<F>(sso: &SsoConfig, lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(token) = get(&sso.static_token_env) {
            return Some(Self::Static(token));
        }

        let client_secret = get(&sso.client_secret_env);

        if let Some(token) = get(&sso.offline_token_env) {
            return Some(Self::OfflineToken {
                token,
                client_secret,
            });
        }

        if sso.client_id.is_empty() {
            return None;
        }
        client_secret.map(|client_secret| Self::ClientCredentials { client_secret })
    }

    fn mode(&self) -> &'static str {
        match self {
            Self::Static(_) => "static",
            Self::OfflineToken { .. } => "offline_token",
            Self::ClientCredentials { .. } => "client_credentials",
        }
    }
}

// ---------------------------------------------------------------------------
// TokenProvider
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + EXPIRY_MARGIN < self.expires_at
    }
}

/// Hands out currently-valid access tokens, refreshing at most once at a time.
pub struct TokenProvider {
    http: Client,
    token_endpoint: String,
    client_id: String,
    credentials: Option<Credentials>,
    /// Held across the refresh request so concurrent callers share one refresh.
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(http: Client, sso: &SsoConfig, credentials: Option<Credentials>) -> Self {
        if let Some(creds) = &credentials {
            debug!(mode = creds.mode(), "token provider configured");
        }
        Self {
            http,
            token_endpoint: sso.token_endpoint(),
            client_id: sso.client_id.clone(),
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// Build from the env vars named in `sso`.
    pub fn from_env(http: Client, sso: &SsoConfig) -> Self {
        let credentials = Credentials::resolve(sso, |name| std::env::var(name).ok());
        Self::new(http, sso, credentials)
    }

    /// Provider that always returns `token`.
    pub fn with_static_token(token: impl Into<String>) -> Self {
        Self::new(
            Client::new(),
            &SsoConfig::default(),
            Some(Credentials::Static(token.into())),
        )
    }

    /// Return a valid access token, refreshing if absent or near expiry.
    pub async fn access_token(&self) -> Result<String> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            SummarizerError::Auth(
                "no credentials configured: set a static token, an offline token, \
                 or a client id and secret"
                    .into(),
            )
        })?;

        if let Credentials::Static(token) = credentials {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Instant::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.request_token(credentials).await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn request_token(&self, credentials: &Credentials) -> Result<CachedToken> {
        let mut form: Vec<(&str, &str)> = vec![("client_id", self.client_id.as_str())];
        match credentials {
            Credentials::OfflineToken {
                token,
                client_secret,
            } => {
                form.push(("grant_type", "refresh_token"));
                form.push(("refresh_token", token.as_str()));
                if let Some(secret) = client_secret {
                    form.push(("client_secret", secret.as_str()));
                }
            }
            Credentials::ClientCredentials { client_secret } => {
                form.push(("grant_type", "client_credentials"));
                form.push(("client_secret", client_secret.as_str()));
            }
            Credentials::Static(_) => {
                return Err(SummarizerError::Auth("static tokens cannot be refreshed".into()));
            }
        }

        info!(mode = credentials.mode(), "requesting new access token");

        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| SummarizerError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizerError::Auth(format!(
                "token endpoint returned HTTP {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SummarizerError::Auth(format!("invalid token response: {e}")))?;

        debug!(expires_in = token.expires_in, "access token refreshed");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: expiry_after(Instant::now(), token.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn sso_for(server: &wiremock::MockServer) -> SsoConfig {
        SsoConfig {
            auth_url: format!("{}/auth/", server.uri()),
            realm: "test".into(),
            ..SsoConfig::default()
        }
    }

    const TOKEN_PATH: &str = "/auth/realms/test/protocol/openid-connect/token";

    #[test]
    fn static_token_takes_precedence() {
        let creds = Credentials::resolve(
            &SsoConfig::default(),
            lookup(&[
                ("WEBRCA_TOKEN", "static"),
                ("SSO_OFFLINE_TOKEN", "offline"),
                ("SSO_CLIENT_SECRET", "secret"),
            ]),
        );
        assert!(matches!(creds, Some(Credentials::Static(t)) if t == "static"));
    }

    #[test]
    fn offline_token_beats_client_credentials() {
        let creds = Credentials::resolve(
            &SsoConfig::default(),
            lookup(&[("SSO_OFFLINE_TOKEN", "offline"), ("SSO_CLIENT_SECRET", "secret")]),
        );
        match creds {
            Some(Credentials::OfflineToken {
                token,
                client_secret,
            }) => {
                assert_eq!(token, "offline");
                assert_eq!(client_secret.as_deref(), Some("secret"));
            }
            other => panic!("expected offline token, got {other:?}"),
        }
    }

    #[test]
    fn nothing_configured_resolves_to_none() {
        let creds = Credentials::resolve(&SsoConfig::default(), lookup(&[]));
        assert!(creds.is_none());
    }

    #[tokio::test]
    async fn missing_credentials_fail_on_first_use() {
        let provider = TokenProvider::new(Client::new(), &SsoConfig::default(), None);
        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, SummarizerError::Auth(_)));
    }

    #[tokio::test]
    async fn static_token_makes_no_requests() {
        let provider = TokenProvider::with_static_token("pre-issued");
        assert_eq!(provider.access_token().await.unwrap(), "pre-issued");
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path(TOKEN_PATH))
            .and(wiremock::matchers::body_string_contains("grant_type=client_credentials"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "access_token": "minted",
                        "expires_in": 300
                    }))
                    .set_delay(Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = Arc::new(TokenProvider::new(
            Client::new(),
            &sso_for(&server),
            Some(Credentials::ClientCredentials {
                client_secret: "secret".into(),
            }),
        ));

        let (a, b, c) = tokio::join!(
            provider.access_token(),
            provider.access_token(),
            provider.access_token(),
        );
        assert_eq!(a.unwrap(), "minted");
        assert_eq!(b.unwrap(), "minted");
        assert_eq!(c.unwrap(), "minted");
    }

    #[tokio::test]
    async fn near_expiry_token_is_refreshed() {
        let server = wiremock::MockServer::start().await;

        // expires_in below the 30s margin: every call must refresh
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path(TOKEN_PATH))
            .and(wiremock::matchers::body_string_contains("grant_type=refresh_token"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "access_token": "short-lived", "expires_in": 10 }),
            ))
            .expect(2)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(
            Client::new(),
            &sso_for(&server),
            Some(Credentials::OfflineToken {
                token: "offline".into(),
                client_secret: None,
            }),
        );

        provider.access_token().await.unwrap();
        provider.access_token().await.unwrap();
    }

    #[test]
    fn huge_expires_in_is_capped() {
        let now = Instant::now();
        assert_eq!(expiry_after(now, u64::MAX), now + MAX_TOKEN_LIFETIME);
        assert_eq!(expiry_after(now, 300), now + Duration::from_secs(300));
    }

    #[tokio::test]
    async fn huge_expires_in_is_cached() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path(TOKEN_PATH))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "access_token": "long-lived", "expires_in": u64::MAX }),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(
            Client::new(),
            &sso_for(&server),
            Some(Credentials::ClientCredentials {
                client_secret: "secret".into(),
            }),
        );

        assert_eq!(provider.access_token().await.unwrap(), "long-lived");
        assert_eq!(provider.access_token().await.unwrap(), "long-lived");
    }

    #[tokio::test]
    async fn token_endpoint_error_is_auth_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path(TOKEN_PATH))
            .respond_with(wiremock::ResponseTemplate::new(401).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let provider = TokenProvider::new(
            Client::new(),
            &sso_for(&server),
            Some(Credentials::OfflineToken {
                token: "revoked".into(),
                client_secret: None,
            }),
        );

        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, SummarizerError::Auth(ref m) if m.contains("401")));
    }
}
