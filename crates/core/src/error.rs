//! Error taxonomy shared by every stage of a render.
//!
//! Each variant maps onto one stable, machine-readable [`ErrorCode`]
//! that callers surface verbatim in the canonical error payload.

use serde::Serialize;

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    InvalidVideoSize,
    ResourceNotFound,
    JobFailed,
    Timeout,
    ToolUnavailable,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidVideoSize => "INVALID_VIDEO_SIZE",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::JobFailed => "JOB_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::ToolUnavailable => "TOOL_UNAVAILABLE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Bad or incompatible option combination. Never retried.
    #[error("{0}")]
    Validation(String),

    /// Dimension or aspect mismatch. `hint` carries a corrected `WxH`.
    #[error("{message}")]
    InvalidVideoSize {
        message: String,
        hint: Option<String>,
        details: Option<serde_json::Value>,
    },

    #[error("Reference file not found: {0}")]
    ResourceNotFound(String),

    /// The remote service rejected or failed the job.
    #[error("Generation job failed: {0}")]
    JobFailed(String),

    /// No settlement within the deadline. The job may still have run remotely.
    #[error("Generation job {correlation_id} did not settle within {timeout_secs}s")]
    Timeout {
        correlation_id: String,
        timeout_secs: u64,
    },

    #[error("Required tool is unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::InvalidVideoSize { .. } => ErrorCode::InvalidVideoSize,
            Self::ResourceNotFound(_) => ErrorCode::ResourceNotFound,
            Self::JobFailed(_) => ErrorCode::JobFailed,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::ToolUnavailable(_) => ErrorCode::ToolUnavailable,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Actionable corrected parameter value, when one exists.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::InvalidVideoSize { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            Self::InvalidVideoSize { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}

/* --------------------------------------------------------------------------
Canonical error payload
-------------------------------------------------------------------------- */

/// `{success: false, errorCode, error, hint?, errorDetails?}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub success: bool,
    pub error_code: ErrorCode,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<serde_json::Value>,
}

impl From<&CoreError> for ErrorPayload {
    fn from(err: &CoreError) -> Self {
        Self {
            success: false,
            error_code: err.code(),
            error: err.to_string(),
            hint: err.hint().map(str::to_string),
            error_details: err.details().cloned(),
        }
    }
}
