use thiserror::Error;

/// Failure classes a provider can hit internally.
///
/// None of these ever cross a provider's public boundary: `search` collapses
/// them to an empty result list and `download` to `None`, after logging.
/// A provider that is merely unconfigured is *disabled*, not failed — the
/// orchestrator skips it without constructing an error at all.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Bad or expired credentials (401/403-class responses, failed login).
    #[error("auth failure: {0}")]
    Auth(String),

    /// Timeout, DNS failure, connection refused, or a non-2xx response.
    #[error("transport failure{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// Response received but not parseable into the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Cache directory not creatable, write failure, etc.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl ProviderError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// True for responses that should invalidate a cached auth token.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::Auth(_) | Self::Transport { status: Some(401 | 403), .. }
        )
    }
}
