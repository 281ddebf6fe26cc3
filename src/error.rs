//! Error types for splain.
//!
//! Query text never produces an error: unrecognized fragments degrade into
//! placeholders or the `other` bucket. Errors come from configuration
//! loading, document rendering, and the external engine.

use std::time::Duration;
use thiserror::Error;

/// The main error type for splain operations.
#[derive(Debug, Error)]
pub enum SplainError {
    /// Failed to read or parse a configuration file.
    #[error("Configuration error in {path}: {message}")]
    Config { path: String, message: String },

    /// Rendering the document failed.
    #[error("Render error: {0}")]
    Render(#[from] std::fmt::Error),
}

impl SplainError {
    /// Create a configuration error for the given file.
    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Failure kinds of the external explanation engine.
///
/// Every variant triggers the rule-based fallback in the facade.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No engine is configured, or it reported itself unavailable.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The call did not return within the configured timeout.
    #[error("engine timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The engine answered with nothing.
    #[error("engine returned an empty response")]
    EmptyResponse,

    /// The engine answered, but not with a sectioned document.
    #[error("engine response has no section headings")]
    Unparseable,

    /// The engine ran and reported a failure.
    #[error("engine failed: {0}")]
    Failed(String),

    /// Spawning or talking to the engine process failed.
    #[error("engine I/O: {0}")]
    Io(String),
}

/// Result type alias for splain operations.
pub type SplainResult<T> = Result<T, SplainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SplainError::config("splain.toml", "expected a table");
        assert_eq!(
            err.to_string(),
            "Configuration error in splain.toml: expected a table"
        );
    }

    #[test]
    fn test_engine_error_display() {
        assert_eq!(
            EngineError::Timeout(Duration::from_secs(30)).to_string(),
            "engine timed out after 30000ms"
        );
        assert_eq!(
            EngineError::Timeout(Duration::from_millis(200)).to_string(),
            "engine timed out after 200ms"
        );
        assert_eq!(
            EngineError::Failed("401".into()).to_string(),
            "engine failed: 401"
        );
    }
}
