//! # Job Tracker
//!
//! A single job slot holding the state of the most recently started run.
//!
//! [`JobTracker::start`] moves the slot to `Sending` before it returns and
//! runs the verification on a background task. Starting a run does not
//! cancel the previous one: its requests continue, but every write and
//! callback it makes afterwards is recognised as stale by its run id and
//! discarded. The slot lock is never held across an `.await`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use idv_core::{JobState, Progress, RetryStep, Step, StepOutcome, VerificationResult};

use crate::client::{VerificationClient, VerificationRequest};

/// Identifier of one started run. Later runs have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RunId(u64);

impl RunId {
    /// The raw run number.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Point-in-time copy of the job slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    /// Run that last wrote the slot; 0 before any run.
    pub run_id: u64,
    /// Slot state.
    pub state: JobState,
    /// Final result, or the partial result while waiting for a selfie.
    pub result: Option<VerificationResult>,
    /// Failure message of the last terminal outcome.
    pub error: Option<String>,
    /// Capture to repeat after a retryable failure.
    pub retry_step: RetryStep,
    /// Time of the last write.
    pub updated_at: DateTime<Utc>,
}

impl JobSnapshot {
    fn idle() -> Self {
        Self::fresh(0, JobState::Idle)
    }

    fn fresh(run_id: u64, state: JobState) -> Self {
        Self {
            run_id,
            state,
            result: None,
            error: None,
            retry_step: RetryStep::None,
            updated_at: Utc::now(),
        }
    }
}

/// Tracks the most recently started verification run.
#[derive(Debug)]
pub struct JobTracker {
    client: Arc<VerificationClient>,
    slot: Arc<RwLock<JobSnapshot>>,
    current: Arc<AtomicU64>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl JobTracker {
    /// An idle tracker running verifications through `client`.
    pub fn new(client: Arc<VerificationClient>) -> Self {
        Self {
            client,
            slot: Arc::new(RwLock::new(JobSnapshot::idle())),
            current: Arc::new(AtomicU64::new(0)),
            cancel: Mutex::new(None),
        }
    }

    /// The client runs are started on.
    pub fn client(&self) -> &Arc<VerificationClient> {
        &self.client
    }

    /// Start a run. The slot is `Sending` when this returns, and the run
    /// already owns the client's retained session over every earlier run.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, request: VerificationRequest) -> RunId {
        let token = CancellationToken::new();
        let (run, claim) = {
            let mut slot = self.slot.write();
            let run = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            let claim = self.client.claim_run();
            *slot = JobSnapshot::fresh(run, JobState::Sending);
            *self.cancel.lock() = Some(token.clone());
            (run, claim)
        };
        tracing::info!(run, entry = ?request.entry, "verification run started");

        let client = self.client.clone();
        let slot = self.slot.clone();
        let current = self.current.clone();
        tokio::spawn(async move {
            let is_current = |id: u64| current.load(Ordering::SeqCst) == id;

            let on_progress = |progress: Progress| {
                let suspended = progress.step == Step::AwaitSelfie;
                if suspended {
                    let mut snapshot = slot.write();
                    if !is_current(run) || token.is_cancelled() {
                        return;
                    }
                    snapshot.state = JobState::WaitingForSecondStep;
                    snapshot.result = progress.partial.clone();
                    snapshot.updated_at = Utc::now();
                    client.dispatcher().deliver_progress(progress);
                } else {
                    let _snapshot = slot.read();
                    if !is_current(run) || token.is_cancelled() {
                        return;
                    }
                    client.dispatcher().deliver_progress(progress);
                }
            };

            let outcome = client
                .run_claimed(claim, &request, &token, &on_progress)
                .await;

            let Some(outcome) = outcome else {
                tracing::debug!(run, "run cancelled");
                return;
            };
            let mut snapshot = slot.write();
            if !is_current(run) || token.is_cancelled() {
                tracing::debug!(run, "discarding outcome of superseded run");
                return;
            }
            let Some(state) = JobState::for_outcome(&outcome) else {
                // Suspended; the slot was updated when the suspension was reported.
                return;
            };
            snapshot.state = state;
            snapshot.result = outcome.result().cloned();
            snapshot.error = outcome.message().map(str::to_string);
            snapshot.retry_step = outcome.retry_step();
            snapshot.updated_at = Utc::now();
            tracing::info!(run, %state, "verification run completed");
            client.dispatcher().deliver(outcome);
        });

        RunId(run)
    }

    /// Cancel the current run. A run still `Sending` returns to `Idle`; no
    /// further outcome from it is recorded or delivered.
    pub fn cancel(&self) {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        let mut snapshot = self.slot.write();
        if snapshot.state == JobState::Sending {
            snapshot.state = JobState::Idle;
            snapshot.updated_at = Utc::now();
        }
        tracing::info!(run = snapshot.run_id, "verification run cancelled");
    }

    /// Id of the most recently started run.
    pub fn current_run(&self) -> Option<RunId> {
        match self.current.load(Ordering::SeqCst) {
            0 => None,
            run => Some(RunId(run)),
        }
    }

    /// Current slot state.
    pub fn state(&self) -> JobState {
        self.slot.read().state
    }

    /// Final result, or the partial result while waiting for a selfie.
    pub fn result(&self) -> Option<VerificationResult> {
        self.slot.read().result.clone()
    }

    /// Failure message of the current run, if it failed.
    pub fn error(&self) -> Option<String> {
        self.slot.read().error.clone()
    }

    /// Capture the user should repeat, if any.
    pub fn retry_step(&self) -> RetryStep {
        self.slot.read().retry_step
    }

    /// Copy of the whole slot.
    pub fn snapshot(&self) -> JobSnapshot {
        self.slot.read().clone()
    }
}
