use serde::{Deserialize, Serialize};

pub mod health;

pub use health::HealthStatus;

/// Placeholder reported as `output` when a successful run printed nothing.
pub const NO_OUTPUT_PLACEHOLDER: &str = "(no output)";

/// Body of `POST /execute`.
///
/// `note_id` is the caller's correlation id. It is only ever logged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecuteRequest {
    pub script: String,
    #[serde(default, rename = "noteId", alias = "correlationId")]
    pub note_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "executionTime")]
    pub execution_time_ms: u64,
}

impl ExecutionResult {
    /// Successful run. Empty stdout is replaced by [`NO_OUTPUT_PLACEHOLDER`].
    pub fn succeeded(stdout: &str, execution_time_ms: u64) -> Self {
        let trimmed = stdout.trim();
        let output = if trimmed.is_empty() {
            NO_OUTPUT_PLACEHOLDER.to_string()
        } else {
            trimmed.to_string()
        };
        Self {
            success: true,
            output: Some(output),
            error: None,
            execution_time_ms,
        }
    }

    /// Failed run that may still have produced stdout worth reporting.
    pub fn failed(
        stdout: Option<&str>,
        error: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        let output = stdout
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Self {
            success: false,
            output,
            error: Some(error.into()),
            execution_time_ms,
        }
    }

    /// Rejection produced before any process exists.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self::failed(None, error, 0)
    }
}
