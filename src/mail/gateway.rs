//! [`MailGateway`] over IMAP (inbox listing) and SMTP (sending).

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use super::credentials::CredentialCache;
use super::{AuthSecret, InboxMessage, MailGateway, imap, smtp};
use crate::config::{MailAuthConfig, MailConfig};
use crate::error::{CredentialError, MailError};

/// Where the gateway gets its secret from on each call.
pub enum MailAuth {
    Password(SecretString),
    /// Shared across all requests; refresh is serialized inside the cache.
    OAuth2(Arc<CredentialCache>),
}

impl MailAuth {
    pub fn from_config(config: &MailAuthConfig) -> Self {
        match config {
            MailAuthConfig::Password(password) => MailAuth::Password(password.clone()),
            MailAuthConfig::OAuth2(oauth) => {
                MailAuth::OAuth2(Arc::new(CredentialCache::from_config(oauth)))
            }
        }
    }

    async fn resolve(&self) -> Result<AuthSecret, CredentialError> {
        match self {
            MailAuth::Password(password) => Ok(AuthSecret::Password(password.clone())),
            MailAuth::OAuth2(cache) => Ok(AuthSecret::Bearer(cache.access_token().await?)),
        }
    }
}

/// IMAP + SMTP mail gateway. Blocking protocol work runs on the blocking pool.
pub struct ImapSmtpGateway {
    config: Arc<MailConfig>,
    auth: MailAuth,
}

impl ImapSmtpGateway {
    pub fn new(config: MailConfig, auth: MailAuth) -> Self {
        Self {
            config: Arc::new(config),
            auth,
        }
    }

    pub fn from_config(config: &MailConfig) -> Self {
        Self::new(config.clone(), MailAuth::from_config(&config.auth))
    }
}

#[async_trait]
impl MailGateway for ImapSmtpGateway {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let secret = self.auth.resolve().await?;
        let config = Arc::clone(&self.config);
        let (to_owned, subject, body) = (to.to_string(), subject.to_string(), body.to_string());

        tokio::task::spawn_blocking(move || {
            smtp::send_message(&config, &secret, &to_owned, &subject, &body)
        })
        .await
        .map_err(|e| MailError::Send {
            recipient: to.to_string(),
            reason: format!("send task panicked: {e}"),
        })??;

        tracing::info!(recipient = %to, "Report email sent");
        Ok(())
    }

    async fn list_recent_messages(&self, limit: usize) -> Result<Vec<InboxMessage>, MailError> {
        let secret = self.auth.resolve().await?;
        let config = Arc::clone(&self.config);

        let messages = tokio::task::spawn_blocking(move || {
            imap::fetch_recent(&config, &secret, limit)
        })
        .await
        .map_err(|e| MailError::Fetch {
            reason: format!("fetch task panicked: {e}"),
        })?
        .map_err(|e| MailError::Fetch {
            reason: e.to_string(),
        })?;

        tracing::debug!(count = messages.len(), limit, "Fetched recent inbox messages");
        Ok(messages)
    }
}
