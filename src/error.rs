//! Toolkit error types.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TermiteError>;

/// Errors surfaced by request builders, normalization, and table projection.
///
/// Callers can distinguish a network-level failure (`Transport`) from a
/// lookup the remote rejected (`Rejected`), a response that matched none of
/// the recognized shapes (`Shape`), and a bad column request
/// (`InvalidColumns`) without parsing message text.
#[derive(Debug, Error)]
pub enum TermiteError {
    #[error(
        "Request to {url} failed: {source}\n\
         Check that the service can be accessed via this URL and that any \
         necessary credentials were provided with set_basic_auth()"
    )]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Lookup rejected with HTTP status {0}")]
    Rejected(u16),

    #[error("Unrecognized response shape: missing or mistyped field `{0}`")]
    Shape(String),

    #[error("Invalid column selection: {0:?}")]
    InvalidColumns(Vec<String>),

    #[error("Failed to read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load CA certificate {path}: {source}")]
    Certificate {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to decode response body: {0}")]
    Decode(#[source] reqwest::Error),
}
