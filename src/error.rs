//! Error facilities

use std::fmt;

/// Core error type for all errors possible from tame-gcs-signer
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Key material for '{source_id}' is unavailable")]
    KeyUnavailable {
        source_id: String,
        #[source]
        source: IoError,
    },
    #[error("Key rejected: {0}")]
    KeyParse(String),
    #[error("An error occurred during signing")]
    Signing,
    #[error("Expiration must be at least 1 second in the future, requested {requested:?}")]
    InvalidExpiration { requested: std::time::Duration },
    #[error("Invalid resource path '{0}'")]
    InvalidResourcePath(String),
    #[error("Canonicalized extension headers must end with a newline")]
    InvalidExtensionHeaders,
    #[error("HTTP method {0} cannot be signed")]
    UnsupportedMethod(http::Method),
    #[error("Unable to stringize header value '{0:?}'")]
    OpaqueHeaderValue(http::header::HeaderValue),
    #[error("Failed to parse url")]
    UrlParse(#[source] url::ParseError),
    #[error("JSON error")]
    Json(#[source] JsonError),
    #[error("Unable to encode url")]
    UrlEncode(#[source] serde_urlencoded::ser::Error),
}

#[derive(Debug, thiserror::Error)]
pub struct IoError(#[source] pub std::io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error {
    /// Wraps an I/O failure from a key source as [`Error::KeyUnavailable`]
    pub fn key_unavailable(source_id: impl Into<String>, err: std::io::Error) -> Self {
        Error::KeyUnavailable {
            source_id: source_id.into(),
            source: IoError(err),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub struct JsonError(#[source] pub serde_json::Error);

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq for JsonError {
    fn eq(&self, other: &Self) -> bool {
        self.0.classify() == other.0.classify()
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(JsonError(e))
    }
}

impl From<serde_urlencoded::ser::Error> for Error {
    fn from(e: serde_urlencoded::ser::Error) -> Self {
        Error::UrlEncode(e)
    }
}

impl From<ring::error::KeyRejected> for Error {
    fn from(re: ring::error::KeyRejected) -> Self {
        Error::KeyParse(format!("{}", re))
    }
}

impl From<ring::error::Unspecified> for Error {
    fn from(_re: ring::error::Unspecified) -> Self {
        Error::Signing
    }
}
