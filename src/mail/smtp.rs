//! Outbound mail over SMTP via lettre (blocking, run in `spawn_blocking`).

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use super::AuthSecret;
use crate::config::MailConfig;
use crate::error::MailError;

/// Port that speaks plain SMTP and upgrades with STARTTLS; everything else is implicit TLS.
const STARTTLS_PORT: u16 = 587;

/// Build a plain-text message from the configured sender.
pub fn build_message(
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Message, MailError> {
    let send_err = |reason: String| MailError::Send {
        recipient: to.to_string(),
        reason,
    };

    let from = from
        .parse::<Mailbox>()
        .map_err(|e| send_err(format!("Invalid from address: {e}")))?;
    let to_mailbox = to
        .parse::<Mailbox>()
        .map_err(|e| send_err(format!("Invalid to address: {e}")))?;

    Message::builder()
        .from(from)
        .to(to_mailbox)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| send_err(format!("Failed to build email: {e}")))
}

/// Send one message. Exactly one SMTP transaction per call; no retry.
pub fn send_message(
    config: &MailConfig,
    secret: &AuthSecret,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<(), MailError> {
    let email = build_message(&config.from_address, to, subject, body)?;

    let (creds, mechanisms) = match secret {
        AuthSecret::Password(password) => (
            Credentials::new(config.username.clone(), password.expose_secret().to_string()),
            vec![Mechanism::Plain, Mechanism::Login],
        ),
        AuthSecret::Bearer(token) => (
            Credentials::new(config.username.clone(), token.expose_secret().to_string()),
            vec![Mechanism::Xoauth2],
        ),
    };

    let builder = if config.smtp_port == STARTTLS_PORT {
        SmtpTransport::starttls_relay(&config.smtp_host)
    } else {
        SmtpTransport::relay(&config.smtp_host)
    }
    .map_err(|e| MailError::Send {
        recipient: to.to_string(),
        reason: format!("SMTP relay error: {e}"),
    })?;

    let transport = builder
        .port(config.smtp_port)
        .credentials(creds)
        .authentication(mechanisms)
        .build();

    transport.send(&email).map_err(|e| MailError::Send {
        recipient: to.to_string(),
        reason: format!("SMTP send failed: {e}"),
    })?;
    Ok(())
}
