//! # Step Outcomes
//!
//! Exactly one [`StepOutcome`] is produced per backend response. The
//! engine feeds `Continue` outcomes back into its own loop; every other
//! variant is terminal and is delivered to at most one listener.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::result::VerificationResult;

/// A position in the backend workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Create the backend session with the document images.
    Submit,
    /// Advance the session to document verification.
    VerifyDocument,
    /// Submit the selfie for face match or liveness.
    VerifySelfie,
    /// Poll the session resource until it finishes.
    Poll,
    /// Suspend the run until a selfie-only resubmission arrives.
    AwaitSelfie,
}

impl Step {
    /// Whether this step addresses an already created session.
    pub fn needs_session(self) -> bool {
        !matches!(self, Self::Submit)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submit => "submit",
            Self::VerifyDocument => "verify_document",
            Self::VerifySelfie => "verify_selfie",
            Self::Poll => "poll",
            Self::AwaitSelfie => "await_selfie",
        };
        f.write_str(name)
    }
}

/// Where the user should resume after a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStep {
    /// The failure is final.
    #[default]
    None,
    /// Capture the document again.
    RetryDocumentScan,
    /// Capture the selfie again.
    RetrySelfieScan,
    /// Abandon the whole flow.
    Abort,
}

impl fmt::Display for RetryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::RetryDocumentScan => "retry_document_scan",
            Self::RetrySelfieScan => "retry_selfie_scan",
            Self::Abort => "abort",
        };
        f.write_str(name)
    }
}

/// Inbound step selector for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStep {
    /// New session, full submission.
    #[default]
    Document,
    /// Selfie-only resubmission on the retained session.
    Selfie,
    /// Drop the retained session, then behave as `Document`.
    Restart,
}

/// The engine's decision after one backend response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Proceed to the given step.
    Continue {
        /// Next step to run.
        next: Step,
    },
    /// The backend produced a conclusive result.
    Success {
        /// The parsed result.
        result: VerificationResult,
    },
    /// The flow failed and cannot be resumed.
    Failure {
        /// Human-readable reason.
        message: String,
    },
    /// The flow failed and can be resumed at `retry_step`.
    RetryableFailure {
        /// Human-readable reason.
        message: String,
        /// Where to resume.
        retry_step: RetryStep,
    },
    /// The whole flow must be abandoned.
    AbortableFailure {
        /// Human-readable reason.
        message: String,
    },
}

impl StepOutcome {
    /// `Continue(next)`.
    pub fn next(step: Step) -> Self {
        Self::Continue { next: step }
    }

    /// `Success(result)`.
    pub fn success(result: VerificationResult) -> Self {
        Self::Success { result }
    }

    /// `Failure(message)`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    /// A failure resumable at `retry_step`. `RetryStep::None` collapses to
    /// `Failure` and `RetryStep::Abort` to `AbortableFailure`.
    pub fn retryable(message: impl Into<String>, retry_step: RetryStep) -> Self {
        let message = message.into();
        match retry_step {
            RetryStep::None => Self::Failure { message },
            RetryStep::Abort => Self::AbortableFailure { message },
            retry_step => Self::RetryableFailure {
                message,
                retry_step,
            },
        }
    }

    /// `AbortableFailure(message)`.
    pub fn abort(message: impl Into<String>) -> Self {
        Self::AbortableFailure {
            message: message.into(),
        }
    }

    /// The retry step implied by this outcome.
    pub fn retry_step(&self) -> RetryStep {
        match self {
            Self::RetryableFailure { retry_step, .. } => *retry_step,
            Self::AbortableFailure { .. } => RetryStep::Abort,
            _ => RetryStep::None,
        }
    }

    /// Every variant except `Continue` ends the run.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Continue { .. })
    }

    /// Whether this is one of the three failure variants.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failure { .. } | Self::RetryableFailure { .. } | Self::AbortableFailure { .. }
        )
    }

    /// The failure message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Failure { message }
            | Self::RetryableFailure { message, .. }
            | Self::AbortableFailure { message } => Some(message),
            _ => None,
        }
    }

    /// The result carried by `Success`.
    pub fn result(&self) -> Option<&VerificationResult> {
        match self {
            Self::Success { result } => Some(result),
            _ => None,
        }
    }

    /// The step carried by `Continue`.
    pub fn continue_step(&self) -> Option<Step> {
        match self {
            Self::Continue { next } => Some(*next),
            _ => None,
        }
    }
}

/// Progress report emitted before each step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    /// The step about to run.
    pub step: Step,
    /// Poll attempt number, 1-based. Always 1 outside polling.
    pub attempt: u32,
    /// Partial result received so far, if any.
    pub partial: Option<VerificationResult>,
}

impl Progress {
    /// Progress for `step` with no partial result.
    pub fn at(step: Step, attempt: u32) -> Self {
        Self {
            step,
            attempt,
            partial: None,
        }
    }
}
