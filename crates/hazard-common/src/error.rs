//! Error types for the hazard tile pipeline.

use thiserror::Error;

/// Result type alias using HazardError.
pub type HazardResult<T> = Result<T, HazardError>;

/// Primary error type for hazard tile operations.
///
/// A quiet weather day is not an error: the upstream reporting zero features
/// produces an empty [`crate::HazardSnapshot`].
#[derive(Debug, Error)]
pub enum HazardError {
    // === Client Errors ===
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidInput { param: String, message: String },

    // === Upstream Errors ===
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetchFailed(String),

    #[error("Malformed upstream payload: {0}")]
    UpstreamParse(String),

    // === Rendering Errors ===
    #[error("Rendering failed: {0}")]
    RenderFailure(String),

    // === Cache Errors ===
    #[error("Cache backend unavailable: {0}")]
    CacheBackendUnavailable(String),
}

impl HazardError {
    /// Shorthand for an `InvalidInput` error.
    pub fn invalid(param: impl Into<String>, message: impl Into<String>) -> Self {
        HazardError::InvalidInput {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Whether this error is the caller's fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, HazardError::InvalidInput { .. })
    }

    /// Get the HTTP status code for this error.
    ///
    /// Only invalid input surfaces as a failure; every other error is
    /// recovered at the tile boundary and served as a transparent tile.
    pub fn http_status_code(&self) -> u16 {
        match self {
            HazardError::InvalidInput { .. } => 400,
            _ => 200,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            HazardError::InvalidInput { .. } => "invalid_input",
            HazardError::UpstreamFetchFailed(_) => "upstream_fetch_failed",
            HazardError::UpstreamParse(_) => "upstream_parse",
            HazardError::RenderFailure(_) => "render_failure",
            HazardError::CacheBackendUnavailable(_) => "cache_unavailable",
        }
    }
}

impl From<serde_json::Error> for HazardError {
    fn from(err: serde_json::Error) -> Self {
        HazardError::UpstreamParse(format!("JSON error: {}", err))
    }
}
