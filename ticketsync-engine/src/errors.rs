use shared::models::ErrorResponse;
use thiserror::Error;

/// Failure reported by a source adapter.
///
/// Kept `Clone` so the last failure can live in the request state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
    #[error("subscription failed: {0}")]
    Subscription(String),
    #[error("stream error {code}: {message}")]
    Stream { code: String, message: String },
}

impl AdapterError {
    /// Builds a rejection from a non-success status and the raw response body.
    pub fn rejected(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorResponse>(body).map_or_else(
            |_| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    "no response body".to_string()
                } else {
                    trimmed.to_string()
                }
            },
            |response| response.to_string(),
        );
        Self::Rejected { status, message }
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for AdapterError {
    fn from(err: url::ParseError) -> Self {
        Self::Endpoint(err.to_string())
    }
}
