//! Error types for task dispatch.
//!
//! Every failure a dispatch can hit is a [`TaskError`]. The dispatcher turns
//! each one into an `{error}` body using [`TaskError::user_message`], and the
//! HTTP layer picks a status with [`TaskError::http_status`].

use axum::http::StatusCode;
use thiserror::Error;

use crate::llm::{LlmError, LlmErrorKind};
use crate::schema::{describe_violations, Violation};

/// Failure of a single task dispatch.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// Caller input did not satisfy the task's input schema.
    #[error("invalid input: {}", describe_violations(.violations))]
    Validation { violations: Vec<Violation> },

    /// No task is registered under this name.
    #[error("unknown task: {name}")]
    UnknownTask { name: String },

    /// The model host could not be reached or refused the request.
    #[error("model request failed: {0}")]
    Transport(#[from] LlmError),

    /// The model returned JSON that does not match the output schema.
    #[error("model output violated schema: {}", describe_violations(.violations))]
    SchemaViolation { violations: Vec<Violation> },

    /// The model returned nothing usable and the task has no fallback.
    #[error("model returned no output for task {task}")]
    GenerationFailed { task: String },
}

impl TaskError {
    /// Short machine-readable tag, used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            TaskError::Validation { .. } => "validation",
            TaskError::UnknownTask { .. } => "unknown_task",
            TaskError::Transport(_) => "transport",
            TaskError::SchemaViolation { .. } => "schema_violation",
            TaskError::GenerationFailed { .. } => "generation_failed",
        }
    }

    /// Message shown to the caller, ending with what to try next.
    pub fn user_message(&self) -> String {
        match self {
            TaskError::Validation { violations } => format!(
                "Invalid input: {}. Please correct the listed fields and try again.",
                describe_violations(violations)
            ),
            TaskError::UnknownTask { name } => format!(
                "Unknown task '{}'. Please choose one of the available tasks.",
                name
            ),
            TaskError::Transport(err) => match err.kind {
                LlmErrorKind::Timeout => {
                    "The AI service took too long to respond. Please try again in a moment."
                        .to_string()
                }
                LlmErrorKind::RateLimited => {
                    "The AI service is busy right now. Please wait a minute and try again."
                        .to_string()
                }
                _ => "The AI service is currently unavailable. Please try again later."
                    .to_string(),
            },
            TaskError::SchemaViolation { .. } => {
                "The AI returned a response in an unexpected format. Please try again.".to_string()
            }
            TaskError::GenerationFailed { .. } => {
                "The AI was unable to generate a response. Please try again, adding more detail if you can."
                    .to_string()
            }
        }
    }

    /// HTTP status for this failure.
    pub fn http_status(&self) -> StatusCode {
        match self {
            TaskError::Validation { .. } => StatusCode::BAD_REQUEST,
            TaskError::UnknownTask { .. } => StatusCode::NOT_FOUND,
            TaskError::Transport(_)
            | TaskError::SchemaViolation { .. }
            | TaskError::GenerationFailed { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ViolationKind;
    use std::time::Duration;

    fn missing(path: &str) -> Violation {
        Violation {
            path: path.to_string(),
            kind: ViolationKind::Missing,
        }
    }

    #[test]
    fn validation_message_names_every_field() {
        let err = TaskError::Validation {
            violations: vec![missing("caseDetails"), missing("jurisdiction")],
        };
        let message = err.user_message();
        assert!(message.contains("caseDetails is required"));
        assert!(message.contains("jurisdiction is required"));
        assert_eq!(err.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_task_is_not_found() {
        let err = TaskError::UnknownTask {
            name: "draft_motion".to_string(),
        };
        assert!(err.user_message().contains("draft_motion"));
        assert_eq!(err.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "unknown_task");
    }

    #[test]
    fn transport_errors_convert_and_map_to_bad_gateway() {
        let err: TaskError = LlmError::timeout(Duration::from_secs(30)).into();
        assert_eq!(err.http_status(), StatusCode::BAD_GATEWAY);
        assert!(err.user_message().contains("took too long"));

        let err: TaskError = LlmError::rate_limited("slow down".to_string(), None).into();
        assert!(err.user_message().contains("busy"));
    }

    #[test]
    fn upstream_details_stay_out_of_user_message() {
        let err: TaskError = LlmError::client_error(401, "invalid key sk-123".to_string()).into();
        assert!(!err.user_message().contains("sk-123"));
        assert!(err.to_string().contains("HTTP 401"));
    }

    #[test]
    fn generation_failures_are_bad_gateway() {
        let err = TaskError::GenerationFailed {
            task: "summarize_case".to_string(),
        };
        assert_eq!(err.http_status(), StatusCode::BAD_GATEWAY);
        let err = TaskError::SchemaViolation {
            violations: vec![missing("summary")],
        };
        assert_eq!(err.http_status(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().contains("summary is required"));
    }
}
