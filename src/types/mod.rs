//! Crate-wide error type and result alias.

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Caller supplied something unusable (empty question, bad session id).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A search, scrape, embedding, store or model call failed.
    #[error("{service} call failed: {message}")]
    ExternalCall { service: String, message: String },

    /// Model output could not be coerced into the report schema.
    #[error("Synthesis parse failure: {0}")]
    SynthesisParse(String),

    /// A stage cannot produce usable output (nothing to search, nothing to synthesize from).
    #[error("Stage failed: {0}")]
    StageFailed(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for [`AppError::ExternalCall`].
    pub fn external(service: impl Into<String>, message: impl std::fmt::Display) -> Self {
        AppError::ExternalCall {
            service: service.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_call_display() {
        let err = AppError::external("search", "connection refused");
        assert_eq!(err.to_string(), "search call failed: connection refused");
    }
}
