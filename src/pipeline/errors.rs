use serde::Serialize;
use thiserror::Error;

use super::state::PipelineState;

pub type PipelineResult<T = ()> = Result<T, PipelineError>;

/// Broad failure categories, stable for callers that route on them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidTransition,
    PreconditionFailure,
    ValidationOutstanding,
    RetryExhausted,
    Internal,
}

/// Errors returned by pipeline operations.
///
/// None of these leave the machine in an invalid state; `InvalidTransition`
/// and `Internal` additionally mean the machine diverted to `ErrorHandling`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },

    #[error("Understanding must be confirmed before building")]
    ConfirmationRequired,

    #[error("Missing credentials: {}", .missing.join(", "))]
    MissingCredentials { missing: Vec<String> },

    #[error("{operation} is not allowed in state {actual} (expected one of {})", format_states(.expected))]
    WrongStage {
        operation: &'static str,
        expected: Vec<PipelineState>,
        actual: PipelineState,
    },

    #[error("{field} must not be empty")]
    EmptyInput { field: &'static str },

    #[error("Blueprint has no nodes")]
    EmptyBlueprint,

    #[error("{count} validation error(s) outstanding")]
    ValidationOutstanding { count: usize },

    #[error("Build retries exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            PipelineError::ConfirmationRequired
            | PipelineError::MissingCredentials { .. }
            | PipelineError::WrongStage { .. }
            | PipelineError::EmptyInput { .. }
            | PipelineError::EmptyBlueprint => ErrorKind::PreconditionFailure,
            PipelineError::ValidationOutstanding { .. } => ErrorKind::ValidationOutstanding,
            PipelineError::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            PipelineError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// The caller should route the user back to the understanding step
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, PipelineError::ConfirmationRequired)
    }

    /// The caller is expected to divert the machine with `transition_to_error`
    pub fn should_transition_to_error(&self) -> bool {
        matches!(self, PipelineError::RetryExhausted { .. })
    }

    pub fn missing_credentials(&self) -> Option<&[String]> {
        match self {
            PipelineError::MissingCredentials { missing } => Some(missing),
            _ => None,
        }
    }

    pub(crate) fn wrong_stage(
        operation: &'static str,
        expected: &[PipelineState],
        actual: PipelineState,
    ) -> Self {
        PipelineError::WrongStage {
            operation,
            expected: expected.to_vec(),
            actual,
        }
    }
}

fn format_states(states: &[PipelineState]) -> String {
    states
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
