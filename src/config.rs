//! Configuration types, built from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default number of inbox messages inspected per scan.
pub const DEFAULT_SCAN_LIMIT: usize = 10;

/// Google's OAuth2 token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Maximum number of recent inbox messages fetched by `/scan-inbox`.
    pub scan_limit: usize,
    pub model: ModelConfig,
    pub mail: MailConfig,
}

/// Locations of the pretrained classifier artifacts.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    pub vectorizer_path: PathBuf,
}

/// Mailbox connection settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub from_address: String,
    pub auth: MailAuthConfig,
}

/// How the service authenticates against the mail provider.
#[derive(Debug, Clone)]
pub enum MailAuthConfig {
    /// Static app password (IMAP `LOGIN`, SMTP `PLAIN`/`LOGIN`).
    Password(SecretString),
    /// OAuth2 bearer tokens (`XOAUTH2`), refreshed from a file-backed cache.
    OAuth2(OAuthConfig),
}

/// OAuth2 refresh settings.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub token_path: PathBuf,
    pub client_id: String,
    pub client_secret: SecretString,
    pub token_url: String,
}

impl ServerConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = parse_or(&get, "SPAM_SCANNER_BIND", "127.0.0.1:5000".parse().ok())?;

        let scan_limit: usize =
            parse_or(&get, "SPAM_SCANNER_SCAN_LIMIT", Some(DEFAULT_SCAN_LIMIT))?;
        if scan_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SPAM_SCANNER_SCAN_LIMIT".into(),
                message: "must be at least 1".into(),
            });
        }

        let model = ModelConfig {
            model_path: get("SPAM_SCANNER_MODEL_PATH")
                .unwrap_or_else(|| "spam_model.json".into())
                .into(),
            vectorizer_path: get("SPAM_SCANNER_VECTORIZER_PATH")
                .unwrap_or_else(|| "vectorizer.json".into())
                .into(),
        };

        let username = get("MAIL_USERNAME").ok_or_else(|| ConfigError::MissingRequired {
            key: "MAIL_USERNAME".into(),
            hint: "Set it to the mailbox account that is scanned and sends reports.".into(),
        })?;
        let from_address = get("MAIL_FROM_ADDRESS").unwrap_or_else(|| username.clone());

        let auth = match get("MAIL_AUTH").as_deref().unwrap_or("oauth2") {
            "password" => {
                let password = get("MAIL_PASSWORD").ok_or_else(|| ConfigError::MissingRequired {
                    key: "MAIL_PASSWORD".into(),
                    hint: "Required when MAIL_AUTH=password.".into(),
                })?;
                MailAuthConfig::Password(SecretString::from(password))
            }
            "oauth2" => {
                let required = |key: &str| {
                    get(key).ok_or_else(|| ConfigError::MissingRequired {
                        key: key.into(),
                        hint: "Required when MAIL_AUTH=oauth2.".into(),
                    })
                };
                MailAuthConfig::OAuth2(OAuthConfig {
                    token_path: get("MAIL_OAUTH_TOKEN_PATH")
                        .unwrap_or_else(|| "token.json".into())
                        .into(),
                    client_id: required("MAIL_OAUTH_CLIENT_ID")?,
                    client_secret: SecretString::from(required("MAIL_OAUTH_CLIENT_SECRET")?),
                    token_url: get("MAIL_OAUTH_TOKEN_URL")
                        .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
                })
            }
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "MAIL_AUTH".into(),
                    message: format!("expected 'password' or 'oauth2', got '{other}'"),
                });
            }
        };

        let mail = MailConfig {
            imap_host: get("MAIL_IMAP_HOST").unwrap_or_else(|| "imap.gmail.com".into()),
            imap_port: parse_or(&get, "MAIL_IMAP_PORT", Some(993))?,
            smtp_host: get("MAIL_SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".into()),
            smtp_port: parse_or(&get, "MAIL_SMTP_PORT", Some(465))?,
            username,
            from_address,
            auth,
        };

        Ok(Self {
            bind_addr,
            scan_limit,
            model,
            mail,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: Option<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => default.ok_or_else(|| ConfigError::MissingRequired {
            key: key.to_string(),
            hint: String::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_with_password_auth() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("MAIL_USERNAME", "scanner@example.com"),
            ("MAIL_AUTH", "password"),
            ("MAIL_PASSWORD", "app-pass"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:5000");
        assert_eq!(config.scan_limit, 10);
        assert_eq!(config.model.model_path, PathBuf::from("spam_model.json"));
        assert_eq!(config.model.vectorizer_path, PathBuf::from("vectorizer.json"));
        assert_eq!(config.mail.imap_host, "imap.gmail.com");
        assert_eq!(config.mail.imap_port, 993);
        assert_eq!(config.mail.smtp_port, 465);
        assert_eq!(config.mail.from_address, "scanner@example.com");
        match config.mail.auth {
            MailAuthConfig::Password(p) => assert_eq!(p.expose_secret(), "app-pass"),
            other => panic!("expected password auth, got {other:?}"),
        }
    }

    #[test]
    fn oauth_is_default_auth_mode() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("MAIL_USERNAME", "scanner@example.com"),
            ("MAIL_OAUTH_CLIENT_ID", "client"),
            ("MAIL_OAUTH_CLIENT_SECRET", "secret"),
        ]))
        .unwrap();

        match config.mail.auth {
            MailAuthConfig::OAuth2(oauth) => {
                assert_eq!(oauth.token_path, PathBuf::from("token.json"));
                assert_eq!(oauth.token_url, DEFAULT_TOKEN_URL);
                assert_eq!(oauth.client_id, "client");
            }
            other => panic!("expected oauth2, got {other:?}"),
        }
    }

    #[test]
    fn missing_username_is_reported() {
        let err = ServerConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "MAIL_USERNAME"));
    }

    #[test]
    fn oauth_requires_client_credentials() {
        let err = ServerConfig::from_lookup(lookup(&[("MAIL_USERNAME", "a@b.com")])).unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "MAIL_OAUTH_CLIENT_ID")
        );
    }

    #[test]
    fn unknown_auth_mode_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[
            ("MAIL_USERNAME", "a@b.com"),
            ("MAIL_AUTH", "kerberos"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MAIL_AUTH"));
    }

    #[test]
    fn bad_numbers_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[
            ("MAIL_USERNAME", "a@b.com"),
            ("MAIL_AUTH", "password"),
            ("MAIL_PASSWORD", "x"),
            ("MAIL_IMAP_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MAIL_IMAP_PORT"));

        let err = ServerConfig::from_lookup(lookup(&[
            ("MAIL_USERNAME", "a@b.com"),
            ("MAIL_AUTH", "password"),
            ("MAIL_PASSWORD", "x"),
            ("SPAM_SCANNER_SCAN_LIMIT", "0"),
        ]))
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "SPAM_SCANNER_SCAN_LIMIT")
        );
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("MAIL_USERNAME", "a@b.com"),
            ("MAIL_AUTH", "password"),
            ("MAIL_PASSWORD", "x"),
            ("MAIL_SMTP_HOST", "   "),
            ("MAIL_FROM_ADDRESS", "reports@b.com"),
        ]))
        .unwrap();
        assert_eq!(config.mail.smtp_host, "smtp.gmail.com");
        assert_eq!(config.mail.from_address, "reports@b.com");
    }
}
