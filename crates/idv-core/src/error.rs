//! # Error Taxonomy
//!
//! Every failure inside a run is a [`VerificationError`]. Errors never leave
//! the engine as errors: [`VerificationError::into_outcome`] is the single
//! point where they become a terminal [`StepOutcome`].

use thiserror::Error;

use crate::outcome::{RetryStep, StepOutcome};

/// Message delivered when polling exhausts its attempts.
pub const TIMED_OUT: &str = "timed out";

/// Message delivered for a backend status outside the expected vocabulary.
pub const UNEXPECTED_RESPONSE: &str = "unexpected server response";

/// Errors raised while driving a verification run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerificationError {
    /// The exchange never produced a usable 2xx response.
    #[error("{message}")]
    Transport {
        /// Human-readable transport failure.
        message: String,
    },

    /// The response could not be interpreted (malformed JSON, missing
    /// session id, unexpected status).
    #[error("{message}")]
    Protocol {
        /// Human-readable description.
        message: String,
    },

    /// The backend reported a failure status.
    #[error("{message}")]
    Backend {
        /// Backend status word.
        status: String,
        /// Backend error code, `-1` when absent.
        code: i64,
        /// Formatted message.
        message: String,
        /// Where to resume, from the backend code table.
        retry_step: RetryStep,
    },

    /// The backend finished but the result did not pass classification.
    #[error("{message}")]
    VerificationFailed {
        /// Human-readable reason.
        message: String,
        /// Where to resume.
        retry_step: RetryStep,
    },

    /// Polling exhausted its attempts.
    #[error("timed out after {attempts} attempts")]
    Timeout {
        /// Attempts made.
        attempts: u32,
    },
}

impl VerificationError {
    /// Shorthand for [`VerificationError::Protocol`].
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Shorthand for [`VerificationError::Transport`].
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Convert into the terminal outcome delivered to listeners.
    pub fn into_outcome(self) -> StepOutcome {
        match self {
            Self::Transport { message } => StepOutcome::abort(message),
            Self::Protocol { message } => StepOutcome::failure(message),
            Self::Backend {
                message,
                retry_step,
                ..
            }
            | Self::VerificationFailed {
                message,
                retry_step,
            } => StepOutcome::retryable(message, retry_step),
            Self::Timeout { .. } => StepOutcome::failure(TIMED_OUT),
        }
    }
}

/// Payload validation errors, raised before any request is issued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// No image was supplied at all.
    #[error("no image supplied")]
    Empty,

    /// An image was supplied with zero bytes.
    #[error("{0} image is empty")]
    EmptyImage(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_abort() {
        let outcome = VerificationError::transport("connection refused").into_outcome();
        assert_eq!(outcome, StepOutcome::abort("connection refused"));
        assert_eq!(outcome.retry_step(), RetryStep::Abort);
    }

    #[test]
    fn protocol_errors_are_fatal() {
        let outcome = VerificationError::protocol("missing session id").into_outcome();
        assert_eq!(outcome, StepOutcome::failure("missing session id"));
    }

    #[test]
    fn backend_error_with_retry_step_is_retryable() {
        let outcome = VerificationError::Backend {
            status: "Failure".into(),
            code: 4601,
            message: "Status: Failure\nCode: 4601\nblurred".into(),
            retry_step: RetryStep::RetryDocumentScan,
        }
        .into_outcome();
        assert_eq!(outcome.retry_step(), RetryStep::RetryDocumentScan);
    }

    #[test]
    fn backend_error_without_retry_step_is_fatal() {
        let outcome = VerificationError::Backend {
            status: "Failure".into(),
            code: 9999,
            message: "boom".into(),
            retry_step: RetryStep::None,
        }
        .into_outcome();
        assert_eq!(outcome, StepOutcome::failure("boom"));
    }

    #[test]
    fn timeout_uses_fixed_message() {
        let err = VerificationError::Timeout { attempts: 30 };
        assert_eq!(err.to_string(), "timed out after 30 attempts");
        assert_eq!(err.into_outcome(), StepOutcome::failure(TIMED_OUT));
    }

    #[test]
    fn payload_error_messages() {
        assert_eq!(PayloadError::Empty.to_string(), "no image supplied");
        assert_eq!(
            PayloadError::EmptyImage("selfie").to_string(),
            "selfie image is empty"
        );
    }
}
