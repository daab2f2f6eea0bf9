//! Unified error types for the offline agent.
//!
//! Every variant renders as `CODE: message` so hosts can forward the code
//! verbatim to the foreground.

use tokio_rusqlite::rusqlite;

/// Unified error types for the offline agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL list).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored headers could not be encoded or decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// Network failure: connection refused, DNS, reset, offline.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// HTTP error response where a 200 was required.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// A required app-shell or precache resource could not be fetched.
    #[error("INSTALL_FAILED: {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    /// Operation is not valid in the agent's current lifecycle state.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),
}

impl Error {
    /// The `CODE` part of the rendered message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Database(_) | Error::MigrationFailed(_) | Error::CorruptEntry(_) => "CACHE_ERROR",
            Error::Network(_) => "NETWORK_ERROR",
            Error::FetchTimeout(_) => "FETCH_TIMEOUT",
            Error::FetchTooLarge(_) => "FETCH_TOO_LARGE",
            Error::HttpError(_) => "HTTP_ERROR",
            Error::InstallFailed { .. } => "INSTALL_FAILED",
            Error::InvalidState(_) => "INVALID_STATE",
        }
    }

    /// Whether the failure came from the network side of a fetch.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::FetchTimeout(_) | Error::FetchTooLarge(_) | Error::HttpError(_)
        )
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptEntry(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CorruptEntry("abc123".to_string());
        assert!(err.to_string().contains("CACHE_ERROR"));
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn test_install_failed_display() {
        let err = Error::InstallFailed { url: "/index.html".into(), reason: "status 404".into() };
        assert_eq!(err.to_string(), "INSTALL_FAILED: /index.html: status 404");
        assert_eq!(err.code(), "INSTALL_FAILED");
    }

    #[test]
    fn test_code_matches_display_prefix() {
        let errors = [
            Error::Network("offline".into()),
            Error::FetchTimeout("20000ms".into()),
            Error::HttpError("status 500".into()),
            Error::MigrationFailed("bad".into()),
            Error::InvalidState("installing".into()),
        ];
        for err in errors {
            assert!(err.to_string().starts_with(err.code()), "{err}");
        }
    }

    #[test]
    fn test_classification_helpers() {
        assert!(Error::Network("x".into()).is_network());
        assert!(Error::HttpError("status 500".into()).is_network());
        assert!(!Error::InvalidInput("bad method".into()).is_network());
        assert!(!Error::CorruptEntry("x".into()).is_network());
    }
}
