//! Minimal IMAP client for reading the most recent inbox messages.
//!
//! Runs over rustls and is blocking; call it from `spawn_blocking`. The
//! mailbox is opened with `EXAMINE` and bodies are fetched with `BODY.PEEK[]`,
//! so scanning never changes flags on the server.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use mail_parser::MessageParser;
use secrecy::ExposeSecret;

use super::{AuthSecret, InboxMessage, UNKNOWN_SENDER};
use crate::classifier::{MAX_TEXT_CHARS, truncate_chars};
use crate::config::MailConfig;

/// Largest `{n}` literal accepted from the server.
const MAX_LITERAL_BYTES: usize = 50 * 1024 * 1024;

/// Errors from the IMAP conversation.
#[derive(Debug, thiserror::Error)]
pub enum ImapError {
    #[error("IMAP I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IMAP TLS error: {0}")]
    Tls(String),

    #[error("IMAP connection closed by server")]
    Closed,

    #[error("IMAP {command} rejected: {response}")]
    Rejected { command: String, response: String },

    #[error("IMAP protocol error: {0}")]
    Protocol(String),
}

/// One untagged server response, with any literals it carried.
#[derive(Debug, Default)]
struct Untagged {
    text: String,
    literals: Vec<Vec<u8>>,
}

/// A logged-in (or about to be) IMAP conversation over any byte stream.
pub struct ImapSession<S: Read + Write> {
    stream: BufReader<S>,
    next_tag: u32,
}

impl<S: Read + Write> ImapSession<S> {
    /// Wrap a connected stream and consume the server greeting.
    pub fn connect(stream: S) -> Result<Self, ImapError> {
        let mut session = Self {
            stream: BufReader::new(stream),
            next_tag: 1,
        };
        let greeting = session.read_response_line()?;
        if !(greeting.text.starts_with("* OK") || greeting.text.starts_with("* PREAUTH")) {
            return Err(ImapError::Protocol(format!(
                "unexpected greeting: {}",
                greeting.text.trim_end()
            )));
        }
        Ok(session)
    }

    pub fn authenticate(&mut self, username: &str, secret: &AuthSecret) -> Result<(), ImapError> {
        match secret {
            AuthSecret::Password(password) => {
                let cmd = format!(
                    "LOGIN {} {}",
                    quote(username),
                    quote(password.expose_secret())
                );
                self.command_redacted(&cmd, "LOGIN")?;
            }
            AuthSecret::Bearer(token) => {
                let sasl = format!(
                    "user={username}\x01auth=Bearer {}\x01\x01",
                    token.expose_secret()
                );
                let cmd = format!("AUTHENTICATE XOAUTH2 {}", BASE64.encode(sasl));
                self.command_redacted(&cmd, "AUTHENTICATE")?;
            }
        }
        Ok(())
    }

    /// Open a mailbox read-only; returns its message count.
    pub fn examine(&mut self, mailbox: &str) -> Result<u32, ImapError> {
        let untagged = self.command(&format!("EXAMINE {}", quote(mailbox)))?;
        untagged
            .iter()
            .find_map(|u| {
                let mut parts = u.text.split_whitespace();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some("*"), Some(n), Some("EXISTS")) => n.parse::<u32>().ok(),
                    _ => None,
                }
            })
            .ok_or_else(|| ImapError::Protocol("EXAMINE response lacks EXISTS".into()))
    }

    /// Fetch full raw messages for sequence numbers `lo..=hi`, keyed by sequence number.
    pub fn fetch_raw(&mut self, lo: u32, hi: u32) -> Result<Vec<(u32, Vec<u8>)>, ImapError> {
        let untagged = self.command(&format!("FETCH {lo}:{hi} (BODY.PEEK[])"))?;
        let mut out = Vec::new();
        for mut u in untagged {
            let mut parts = u.text.split_whitespace();
            let seq = match (parts.next(), parts.next(), parts.next()) {
                (Some("*"), Some(n), Some("FETCH")) => n.parse::<u32>().ok(),
                _ => None,
            };
            if let Some(seq) = seq
                && !u.literals.is_empty()
            {
                out.push((seq, u.literals.swap_remove(0)));
            }
        }
        Ok(out)
    }

    /// Up to `limit` most recent messages in `mailbox`, newest first.
    pub fn list_recent(
        &mut self,
        mailbox: &str,
        limit: usize,
    ) -> Result<Vec<InboxMessage>, ImapError> {
        let exists = self.examine(mailbox)?;
        if exists == 0 || limit == 0 {
            return Ok(Vec::new());
        }
        let window = u32::try_from(limit).unwrap_or(u32::MAX);
        let lo = exists.saturating_sub(window - 1).max(1);

        let mut raw = self.fetch_raw(lo, exists)?;
        raw.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(raw
            .into_iter()
            .map(|(seq, bytes)| parse_inbox_message(seq, &bytes))
            .collect())
    }

    pub fn logout(mut self) -> Result<S, ImapError> {
        self.command("LOGOUT")?;
        Ok(self.stream.into_inner())
    }

    fn command(&mut self, cmd: &str) -> Result<Vec<Untagged>, ImapError> {
        let verb = cmd.split_whitespace().next().unwrap_or_default().to_string();
        self.command_redacted(cmd, &verb)
    }

    /// Send `cmd`; errors and logs only ever mention `label`.
    fn command_redacted(&mut self, cmd: &str, label: &str) -> Result<Vec<Untagged>, ImapError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        let writer = self.stream.get_mut();
        writer.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        writer.flush()?;
        tracing::debug!(tag = %tag, command = label, "IMAP command sent");

        let mut untagged = Vec::new();
        loop {
            let line = self.read_response_line()?;
            if let Some(rest) = line.text.strip_prefix(&format!("{tag} ")) {
                return if rest.starts_with("OK") {
                    Ok(untagged)
                } else {
                    Err(ImapError::Rejected {
                        command: label.to_string(),
                        response: rest.trim_end().to_string(),
                    })
                };
            }
            if line.text.starts_with('+') {
                // Continuation during SASL means the server wants more; cancel it.
                let writer = self.stream.get_mut();
                writer.write_all(b"\r\n")?;
                writer.flush()?;
                continue;
            }
            untagged.push(line);
        }
    }

    /// Read one logical response line, pulling in any `{n}` literals it announces.
    fn read_response_line(&mut self) -> Result<Untagged, ImapError> {
        let mut response = Untagged::default();
        loop {
            let mut buf = Vec::new();
            if self.stream.read_until(b'\n', &mut buf)? == 0 {
                return Err(ImapError::Closed);
            }
            let line = String::from_utf8_lossy(&buf).into_owned();

            match literal_len(&line) {
                Some(len) if len > MAX_LITERAL_BYTES => {
                    return Err(ImapError::Protocol(format!(
                        "literal of {len} bytes exceeds {MAX_LITERAL_BYTES}"
                    )));
                }
                Some(len) => {
                    response.text.push_str(&line);
                    let mut literal = vec![0u8; len];
                    self.stream.read_exact(&mut literal)?;
                    response.literals.push(literal);
                }
                None => {
                    response.text.push_str(&line);
                    return Ok(response);
                }
            }
        }
    }
}

/// Length announced by a trailing `{n}` before CRLF, if any.
fn literal_len(line: &str) -> Option<usize> {
    let trimmed = line.strip_suffix("\r\n").or_else(|| line.strip_suffix('\n'))?;
    let inner = trimmed.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    inner[open + 1..].trim_end_matches('+').parse().ok()
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Connect over TLS, authenticate and list the newest `limit` inbox messages.
pub fn fetch_recent(
    config: &MailConfig,
    secret: &AuthSecret,
    limit: usize,
) -> Result<Vec<InboxMessage>, ImapError> {
    let tcp = TcpStream::connect((&*config.imap_host, config.imap_port))?;
    tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(config.imap_host.clone())
        .map_err(|e| ImapError::Tls(e.to_string()))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| ImapError::Tls(e.to_string()))?;
    let tls = rustls::StreamOwned::new(conn, tcp);

    let mut session = ImapSession::connect(tls)?;
    session.authenticate(&config.username, secret)?;
    let messages = session.list_recent("INBOX", limit)?;
    if let Err(e) = session.logout() {
        tracing::debug!(error = %e, "IMAP logout failed");
    }
    Ok(messages)
}

// ── Message parsing ─────────────────────────────────────────────────

/// Turn a raw RFC 822 message into an [`InboxMessage`].
pub fn parse_inbox_message(seq: u32, raw: &[u8]) -> InboxMessage {
    let fallback_id = format!("seq-{seq}");
    let Some(parsed) = MessageParser::default().parse(raw) else {
        return InboxMessage {
            id: fallback_id,
            sender: UNKNOWN_SENDER.to_string(),
            snippet: String::new(),
        };
    };

    let snippet = normalize_whitespace(&extract_text(&parsed));
    InboxMessage {
        id: parsed
            .message_id()
            .map(|s| s.to_string())
            .unwrap_or(fallback_id),
        sender: extract_sender(&parsed),
        snippet: truncate_chars(&snippet, MAX_TEXT_CHARS).to_string(),
    }
}

fn extract_sender(parsed: &mail_parser::Message) -> String {
    let Some(addr) = parsed.from().and_then(|a| a.first()) else {
        return UNKNOWN_SENDER.to_string();
    };
    match (addr.name(), addr.address()) {
        (Some(name), Some(email)) if !name.is_empty() => format!("{name} <{email}>"),
        (_, Some(email)) => email.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => UNKNOWN_SENDER.to_string(),
    }
}

/// Plain-text body. mail-parser renders HTML-only messages to text here too.
fn extract_text(parsed: &mail_parser::Message) -> String {
    parsed
        .body_text(0)
        .map(|text| text.into_owned())
        .unwrap_or_default()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
