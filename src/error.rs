use thiserror::Error;

use crate::tools::ToolError;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// True when the caller can fix the request; everything else is the service's fault.
    pub fn is_user_error(&self) -> bool {
        matches!(self, RelayError::Validation(_))
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RelayError::Protocol(err.to_string())
        } else {
            RelayError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Protocol(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Failures while running a model-requested function. These are rendered as text
/// and handed back to the model, never returned to the caller.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid arguments for '{function}': {message}")]
    InvalidArguments { function: String, message: String },

    #[error("Missing required parameter(s) for '{function}': {}", .missing.join(", "))]
    MissingParameters {
        function: String,
        missing: Vec<&'static str>,
    },

    #[error("Function call failed: {0}")]
    Failed(#[from] ToolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_is_protocol() {
        let err: RelayError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, RelayError::Protocol(_)));
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_request_build_error_is_transport() {
        let err: RelayError = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err()
            .into();
        assert!(matches!(err, RelayError::Transport(_)));
    }
}
