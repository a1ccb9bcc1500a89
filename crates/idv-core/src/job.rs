//! Job lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::outcome::StepOutcome;

/// State of the single job slot.
///
/// Within one run the state only moves forward:
/// `Idle → Sending → (WaitingForSecondStep →) terminal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// No run has started.
    #[default]
    Idle,
    /// A run is in flight.
    Sending,
    /// The document phase is done; a selfie-only resubmission is expected.
    WaitingForSecondStep,
    /// The run ended with a result.
    Succeeded,
    /// The run failed with no retry step.
    Failed,
    /// The run failed and can be resumed.
    FailedRetry,
    /// The run failed and the flow must be abandoned.
    FailedAbort,
}

impl JobState {
    /// Whether the run that owns the slot has ended.
    ///
    /// `WaitingForSecondStep` ends the run but not the flow; it is not
    /// terminal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::FailedRetry | Self::FailedAbort
        )
    }

    /// The terminal state for a terminal outcome; `None` for `Continue`.
    pub fn for_outcome(outcome: &StepOutcome) -> Option<Self> {
        match outcome {
            StepOutcome::Continue { .. } => None,
            StepOutcome::Success { .. } => Some(Self::Succeeded),
            StepOutcome::Failure { .. } => Some(Self::Failed),
            StepOutcome::RetryableFailure { .. } => Some(Self::FailedRetry),
            StepOutcome::AbortableFailure { .. } => Some(Self::FailedAbort),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::WaitingForSecondStep => "waiting_for_second_step",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::FailedRetry => "failed_retry",
            Self::FailedAbort => "failed_abort",
        };
        f.write_str(name)
    }
}
