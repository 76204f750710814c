//! Error taxonomy for catalog access.

use thiserror::Error;

/// Errors raised while talking to the catalog API or validating a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No search term / tag / id supplied. Local validation, never reaches the API.
    #[error("No {0} provided.")]
    MissingQuery(&'static str),

    /// Non-2xx response.
    #[error("HTTP error! status: {status}, message: {body}")]
    Http { status: u16, body: String },

    /// 2xx response missing the expected collection or pagination fields.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Query of a different kind than the loader's collections were built for.
    #[error("This listing shows {expected} results, not {got}.")]
    QueryMismatch { expected: &'static str, got: &'static str },

    /// Fetch-level failure (connectivity, TLS, timeout).
    #[error("Network error: {0}")]
    Network(String),
}

impl StoreError {
    /// Message suitable for an error panel or inline notice.
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Network(detail) => format!(
                "Network error or CORS issue. Ensure the API server is accessible. Details: {detail}"
            ),
            other => other.to_string(),
        }
    }

    /// Whether another attempt at the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Network(_) => true,
            StoreError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self { StoreError::MalformedResponse(e.to_string()) }
}
