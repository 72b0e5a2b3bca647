//! Mail provider access: listing recent inbox messages and sending reports.

pub mod credentials;
pub mod gateway;
pub mod imap;
pub mod smtp;

pub use credentials::{CredentialCache, CredentialStore, FileCredentialStore, OAuthToken};
pub use gateway::ImapSmtpGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MailError;

/// Sender shown when a message carries no usable `From` header.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// A message preview as returned by the provider. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxMessage {
    pub id: String,
    pub sender: String,
    /// Preview text, at most 1000 characters.
    pub snippet: String,
}

/// External mail provider.
///
/// `send` is not idempotent: every call dispatches exactly one message.
#[async_trait]
pub trait MailGateway: Send + Sync {
    /// Send a plain-text message.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;

    /// Up to `limit` most recent inbox messages, most recent first.
    async fn list_recent_messages(&self, limit: usize) -> Result<Vec<InboxMessage>, MailError>;
}

/// A resolved secret, ready to hand to IMAP/SMTP.
#[derive(Debug, Clone)]
pub enum AuthSecret {
    /// Plain password / app password.
    Password(secrecy::SecretString),
    /// OAuth2 access token, used with `XOAUTH2`.
    Bearer(secrecy::SecretString),
}
