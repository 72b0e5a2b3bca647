//! OAuth2 credential cache.
//!
//! Tokens live in a [`CredentialStore`] (a JSON file in production). The
//! process-wide [`CredentialCache`] hands out access tokens; load, refresh and
//! save all happen while holding one async mutex, so concurrent requests never
//! refresh twice or interleave writes to the store.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::OAuthConfig;
use crate::error::CredentialError;

/// Tokens expiring within this window are refreshed before use.
const EXPIRY_SKEW_SECS: i64 = 60;

/// An OAuth2 access token plus what is needed to renew it.
#[derive(Debug, Clone)]
pub struct OAuthToken {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    /// `None` means the provider did not say; treated as still valid.
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthToken {
    /// Expiry times too close to the start of the calendar to subtract the
    /// skew from count as expired.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| {
            exp.checked_sub_signed(Duration::seconds(EXPIRY_SKEW_SECS))
                .is_none_or(|refresh_at| refresh_at <= now)
        })
    }
}

/// Absolute expiry for a relative `expires_in` from the token endpoint.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, CredentialError> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| CredentialError::Refresh(format!("invalid expires_in: {expires_in}")))
}

/// Persistence for OAuth tokens.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stored token, or `None` if nothing was ever stored.
    async fn load(&self) -> Result<Option<OAuthToken>, CredentialError>;

    async fn save(&self, token: &OAuthToken) -> Result<(), CredentialError>;

    /// Human-readable location, for error messages.
    fn location(&self) -> String;
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &SecretString) -> Result<OAuthToken, CredentialError>;
}

// ── File store ──────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct TokenFile {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

/// JSON-file token store.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<OAuthToken>, CredentialError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CredentialError::Store(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };
        let file: TokenFile = serde_json::from_str(&raw).map_err(|e| {
            CredentialError::Store(format!("cannot parse {}: {e}", self.path.display()))
        })?;
        Ok(Some(OAuthToken {
            access_token: SecretString::from(file.access_token),
            refresh_token: file.refresh_token.map(SecretString::from),
            expires_at: file.expires_at,
        }))
    }

    async fn save(&self, token: &OAuthToken) -> Result<(), CredentialError> {
        let file = TokenFile {
            access_token: token.access_token.expose_secret().to_string(),
            refresh_token: token
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            expires_at: token.expires_at,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| CredentialError::Store(format!("cannot serialize token: {e}")))?;

        // Temp file + rename: readers see the old or the new token, never a partial one.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CredentialError::Store(format!("cannot write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            CredentialError::Store(format!("cannot replace {}: {e}", self.path.display()))
        })
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// ── HTTP refresher ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Standard `grant_type=refresh_token` exchange against an OAuth2 token endpoint.
pub struct OAuthRefresher {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
}

impl OAuthRefresher {
    pub fn new(config: &OAuthConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(&self, refresh_token: &SecretString) -> Result<OAuthToken, CredentialError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("refresh_token", refresh_token.expose_secret()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| CredentialError::Refresh(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Refresh(format!("{status}: {body}")));
        }

        let parsed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Refresh(format!("invalid token response: {e}")))?;

        let expires_at = parsed
            .expires_in
            .map(|secs| expiry_after(Utc::now(), secs))
            .transpose()?;

        Ok(OAuthToken {
            access_token: SecretString::from(parsed.access_token),
            // Providers usually omit the refresh token on renewal; keep the old one.
            refresh_token: Some(
                parsed
                    .refresh_token
                    .map(SecretString::from)
                    .unwrap_or_else(|| refresh_token.clone()),
            ),
            expires_at,
        })
    }
}

// ── Cache ───────────────────────────────────────────────────────────

/// Process-wide token cache with serialized load/refresh/save.
pub struct CredentialCache {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    current: Mutex<Option<OAuthToken>>,
}

impl CredentialCache {
    pub fn new(store: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            current: Mutex::new(None),
        }
    }

    /// Build the file-backed, HTTP-refreshed cache from config.
    pub fn from_config(config: &OAuthConfig) -> Self {
        Self::new(
            Arc::new(FileCredentialStore::new(config.token_path.clone())),
            Arc::new(OAuthRefresher::new(config)),
        )
    }

    /// A currently valid access token, refreshing (and persisting) it if needed.
    ///
    /// The cache lock is held for the whole acquisition and released on every
    /// exit path when the guard drops.
    pub async fn access_token(&self) -> Result<SecretString, CredentialError> {
        let mut current = self.current.lock().await;

        if current.is_none() {
            *current = self.store.load().await?;
        }
        let token = current.as_ref().ok_or_else(|| CredentialError::Missing {
            path: self.store.location(),
        })?;

        if !token.needs_refresh(Utc::now()) {
            return Ok(token.access_token.clone());
        }

        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or(CredentialError::NotRefreshable)?;

        tracing::info!("Refreshing expired mail access token");
        let refreshed = self.refresher.refresh(&refresh_token).await?;
        self.store.save(&refreshed).await?;
        let access = refreshed.access_token.clone();
        *current = Some(refreshed);
        Ok(access)
    }
}
