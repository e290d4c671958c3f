use thiserror::Error;

/// Failure of a single upstream request, as seen by the typed client and the
/// query cache. Cloneable so one failed fetch can be handed to every caller
/// that was waiting on the same cache key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Inline text shown where the failed data would have been rendered.
    pub fn user_message(&self) -> String {
        format!("Something went wrong: {}", self)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
