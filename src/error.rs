//! Error types for the spam scanner.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Classifier artifact errors. Any of these at boot keeps the process from starting.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model unavailable: cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Model unavailable: cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Model unavailable: {0}")]
    Invalid(String),
}

/// OAuth credential store / refresh errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("No stored credentials at {path}; authorize the mailbox first")]
    Missing { path: String },

    #[error("Credential store error: {0}")]
    Store(String),

    #[error("Stored credentials have no refresh token and the access token expired")]
    NotRefreshable,

    #[error("Token refresh failed: {0}")]
    Refresh(String),
}

/// Mail provider errors. Display is the provider's own message, unwrapped.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("{reason}")]
    Send { recipient: String, reason: String },

    #[error("{reason}")]
    Fetch { reason: String },

    #[error(transparent)]
    Auth(#[from] CredentialError),
}

/// Missing user input. Display strings are what the HTTP client sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Email and message text required")]
    MissingEmailOrText,

    #[error("Email address required")]
    MissingEmail,

    #[error("Invalid request body")]
    MalformedBody,
}

/// Errors surfaced by the request pipelines.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

impl ScanError {
    /// Whether the failure was caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ScanError::Validation(_))
    }
}
