use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for Scout. Every variant is fatal to a run.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("research failed: {0}")]
    Research(#[source] LlmError),
    #[error("answer synthesis failed: {0}")]
    Synthesis(String),
}

impl ScoutError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }

    /// Whether the error belongs to the configuration family.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::MissingSecret(_) | Self::ConfigIo { .. }
        )
    }
}

/// Failure of a single tool call.
///
/// These never abort a run: the research agent writes them into the
/// transcript so the model can react on its next turn.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ToolError {
    #[error("network error: {0}")]
    Network(String),
    #[error("provider error{}: {message}", http_suffix(.status))]
    Provider {
        status: Option<u16>,
        message: String,
    },
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("could not extract content: {0}")]
    Parse(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("file {path} is {size} bytes, limit is {limit}")]
    TooLarge { path: String, size: u64, limit: u64 },
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

impl ToolError {
    /// Short machine-readable tag, used in transcripts and traces.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Network(_) => "network_error",
            ToolError::Provider { .. } => "provider_error",
            ToolError::Fetch(_) => "fetch_error",
            ToolError::Parse(_) => "parse_error",
            ToolError::NotFound(_) => "not_found",
            ToolError::TooLarge { .. } => "too_large",
            ToolError::InvalidArguments(_) => "invalid_arguments",
            ToolError::UnknownTool(_) => "unknown_tool",
        }
    }
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" (HTTP {code})")).unwrap_or_default()
}

/// Errors at the language-model boundary.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to model provider failed: {0}")]
    Network(String),
    #[error("model provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn is_auth(&self) -> bool {
        matches!(self, LlmError::Provider { status, .. } if *status == 401 || *status == 403)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_round_trips_through_json() {
        let err = ToolError::TooLarge {
            path: "data/big.csv".into(),
            size: 4_000_000,
            limit: 1_048_576,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "too_large");
        let back: ToolError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn provider_error_mentions_status_when_known() {
        let with_status = ToolError::Provider {
            status: Some(429),
            message: "rate limited".into(),
        };
        assert_eq!(with_status.to_string(), "provider error (HTTP 429): rate limited");

        let without = ToolError::Provider {
            status: None,
            message: "search is not configured".into(),
        };
        assert_eq!(without.to_string(), "provider error: search is not configured");
    }

    #[test]
    fn configuration_family_is_detected() {
        assert!(ScoutError::MissingSecret("OPENAI_API_KEY".into()).is_configuration());
        assert!(!ScoutError::Synthesis("empty".into()).is_configuration());
    }

    #[test]
    fn auth_failures_are_flagged() {
        let err = LlmError::Provider {
            status: 401,
            body: "invalid key".into(),
        };
        assert!(err.is_auth());
        assert!(!LlmError::Network("reset".into()).is_auth());
    }
}
