use std::path::PathBuf;

use crate::auth::scopes::Scope;

/// Failure categories surfaced at the CLI boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("client configuration not found at {}. Run 'gmailctl setup' for instructions", .0.display())]
    ConfigurationMissing(PathBuf),

    #[error("invalid scope '{0}'. Choose from: readonly, modify, full")]
    InvalidScope(String),

    #[error(
        "cached token was issued for scope '{token}' but the configured scope is '{configured}'. \
         Run 'gmailctl auth' to re-authorize"
    )]
    ScopeMismatch { token: Scope, configured: Scope },

    #[error("not authenticated. Run 'gmailctl auth' first")]
    NotAuthenticated,

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("authorization timed out after {0} seconds")]
    AuthorizationTimedOut(u64),

    #[error("invalid email address: {0}")]
    InvalidRecipient(String),

    #[error("Gmail API error: {0}")]
    RemoteApi(String),

    #[error("local I/O error: {0}")]
    LocalIo(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable name used in the JSON error object.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ConfigurationMissing(_) => "configuration_missing",
            Error::InvalidScope(_) => "invalid_scope",
            Error::ScopeMismatch { .. } => "scope_mismatch",
            Error::NotAuthenticated => "not_authenticated",
            Error::AuthorizationDenied(_) => "authorization_denied",
            Error::AuthorizationTimedOut(_) => "authorization_timed_out",
            Error::InvalidRecipient(_) => "invalid_recipient",
            Error::RemoteApi(_) => "remote_api_error",
            Error::LocalIo(_) => "local_io_error",
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::RemoteApi(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::LocalIo(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}
