//! # Protocol Engine
//!
//! Drives one verification run through the backend workflow:
//!
//! ```text
//! two-phase:  Submit ─▶ VerifyDocument ─┬─▶ (Finished) classify
//!                                       ├─▶ VerifySelfie ─┬─▶ (Finished) classify
//!                                       │                 └─▶ Poll ─▶ classify
//!                                       └─▶ AwaitSelfie (suspend)
//!
//! polling:    Submit ─▶ Poll ─┬─▶ (Finished) classify
//!                             ├─▶ VerifySelfie ─▶ Poll ─▶ classify
//!                             └─▶ AwaitSelfie (suspend)
//! ```
//!
//! Each step performs one exchange and yields exactly one [`StepOutcome`].
//! Errors are converted to outcomes at the step boundary by
//! [`VerificationError::into_outcome`]. Steps run strictly in sequence; a
//! `Poll` step is handed to the [`RetryScheduler`].

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use idv_core::{
    Progress, RetryStep, Step, StepOutcome, VerificationError, VerificationPayload,
};

use crate::classify::{backend_failure, classify_result, retry_step_for_code};
use crate::scheduler::{PollReport, RetryScheduler};
use crate::session::{Session, SessionError};
use crate::transport::{Method, Transport, TransportRequest};
use crate::variant::{BackendStatus, ProtocolVariant, VariantKind};
use crate::wire::{self, ResponseEnvelope};

const CONFIGURATION_ERROR: &str = "Configuration error.";
const NO_SESSION_ID: &str = "Failed to get valid session id.";
const NO_RESULT: &str = "The server response contains no result.";
const NO_SELFIE: &str = "No selfie supplied.";

/// Progress callback. Called from the task running the engine.
pub type ProgressSink<'a> = &'a (dyn Fn(Progress) + Send + Sync);

impl From<SessionError> for VerificationError {
    fn from(e: SessionError) -> Self {
        VerificationError::protocol(e.to_string())
    }
}

/// The verification state machine, parameterized by a [`ProtocolVariant`].
pub struct ProtocolEngine {
    transport: Arc<dyn Transport>,
    variant: ProtocolVariant,
    retry_delay: Duration,
    max_attempts: u32,
}

impl std::fmt::Debug for ProtocolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("variant", &self.variant.name())
            .field("retry_delay", &self.retry_delay)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl ProtocolEngine {
    /// Create an engine over `transport`.
    pub fn new(
        transport: Arc<dyn Transport>,
        variant: ProtocolVariant,
        retry_delay: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            transport,
            variant,
            retry_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    /// The configured variant.
    pub fn variant(&self) -> &ProtocolVariant {
        &self.variant
    }

    /// Run from `start` until a terminal outcome, a suspension
    /// (`Continue(AwaitSelfie)`), or cancellation (`None`).
    ///
    /// A progress report is emitted before each step. After cancellation no
    /// further outcome or progress is produced.
    pub async fn run(
        &self,
        start: Step,
        session: &mut Session,
        payload: &VerificationPayload,
        cancel: &CancellationToken,
        on_progress: ProgressSink<'_>,
    ) -> Option<StepOutcome> {
        let mut step = start;
        let mut selfie_sent = false;

        loop {
            if cancel.is_cancelled() {
                tracing::debug!(%step, "run cancelled");
                return None;
            }
            tracing::debug!(%step, session_id = ?session.session_id(), "running step");

            let outcome = if step == Step::Poll {
                let selfie_pending = payload.has_selfie() && !selfie_sent;
                let report = self
                    .poll(session, payload, selfie_pending, cancel, on_progress)
                    .await;
                session.set_try_count(report.attempts);
                report.outcome?
            } else {
                on_progress(Progress::at(step, 1));
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return None,
                    result = self.execute(step, session, payload, on_progress) => result,
                };
                if cancel.is_cancelled() {
                    return None;
                }
                if step == Step::VerifySelfie {
                    selfie_sent = true;
                }
                result.unwrap_or_else(VerificationError::into_outcome)
            };

            match outcome {
                StepOutcome::Continue {
                    next: Step::AwaitSelfie,
                } => {
                    tracing::info!(
                        session_id = ?session.session_id(),
                        "document phase complete, waiting for selfie"
                    );
                    return Some(outcome);
                }
                StepOutcome::Continue { next } => {
                    if next == Step::Poll {
                        session.reset_tries();
                    }
                    step = next;
                }
                terminal => {
                    tracing::info!(
                        session_id = ?session.session_id(),
                        retry_step = %terminal.retry_step(),
                        success = !terminal.is_failure(),
                        "verification run finished"
                    );
                    return Some(terminal);
                }
            }
        }
    }

    async fn execute(
        &self,
        step: Step,
        session: &mut Session,
        payload: &VerificationPayload,
        on_progress: ProgressSink<'_>,
    ) -> Result<StepOutcome, VerificationError> {
        match step {
            Step::Submit => self.submit(session, payload).await,
            Step::VerifyDocument => self.verify_document(session, payload, on_progress).await,
            Step::VerifySelfie => self.verify_selfie(session, payload).await,
            Step::Poll | Step::AwaitSelfie => Err(VerificationError::protocol(format!(
                "step {step} is not a request step"
            ))),
        }
    }

    async fn exchange(&self, request: TransportRequest) -> Result<ResponseEnvelope, VerificationError> {
        let body = self
            .transport
            .send(request)
            .await
            .map_err(|e| VerificationError::transport(e.to_string()))?;
        ResponseEnvelope::parse(&body)
    }

    fn status(&self, envelope: &ResponseEnvelope) -> BackendStatus {
        self.variant.statuses.classify(envelope.status())
    }

    fn failure(&self, envelope: &ResponseEnvelope, default_retry: RetryStep) -> VerificationError {
        backend_failure(envelope, self.variant.apply_code_table, default_retry)
    }

    fn scenario(&self, payload: &VerificationPayload) -> &str {
        self.variant.scenarios.for_face(payload.expects_face())
    }

    /// A finished session carrying a code from the table still asks for a
    /// new capture, whatever its result holds.
    fn finish(&self, envelope: &ResponseEnvelope) -> Result<StepOutcome, VerificationError> {
        if self.variant.apply_code_table
            && retry_step_for_code(envelope.result_code()) != RetryStep::None
        {
            return Err(self.failure(envelope, RetryStep::None));
        }
        let result = envelope
            .verification_result()?
            .ok_or_else(|| VerificationError::protocol(NO_RESULT))?;
        Ok(classify_result(result))
    }

    fn suspend(&self, envelope: &ResponseEnvelope, on_progress: ProgressSink<'_>) -> StepOutcome {
        on_progress(Progress {
            step: Step::AwaitSelfie,
            attempt: 1,
            partial: envelope.verification_result().ok().flatten(),
        });
        StepOutcome::next(Step::AwaitSelfie)
    }

    async fn submit(
        &self,
        session: &mut Session,
        payload: &VerificationPayload,
    ) -> Result<StepOutcome, VerificationError> {
        let url = session.url_for(Step::Submit)?;
        let body = wire::submit_body(&self.variant, payload)?;
        let envelope = self
            .exchange(TransportRequest::new(Method::POST, url).with_body(body).first_step())
            .await?;

        match self.status(&envelope) {
            BackendStatus::Error => return Err(VerificationError::protocol(CONFIGURATION_ERROR)),
            BackendStatus::Failure => return Err(self.failure(&envelope, RetryStep::None)),
            _ => {}
        }

        let id = envelope
            .session_id()
            .ok_or_else(|| VerificationError::protocol(NO_SESSION_ID))?;
        session.attach(id);

        Ok(StepOutcome::next(match self.variant.kind {
            VariantKind::TwoPhasePatch => Step::VerifyDocument,
            VariantKind::SubmitAndPoll => Step::Poll,
        }))
    }

    async fn verify_document(
        &self,
        session: &mut Session,
        payload: &VerificationPayload,
        on_progress: ProgressSink<'_>,
    ) -> Result<StepOutcome, VerificationError> {
        let url = session.url_for(Step::VerifyDocument)?;
        let body = wire::advance_body(self.scenario(payload))?;
        let envelope = self
            .exchange(TransportRequest::new(Method::PATCH, url).with_body(body))
            .await?;

        match self.status(&envelope) {
            BackendStatus::Waiting if payload.has_selfie() => {
                Ok(StepOutcome::next(Step::VerifySelfie))
            }
            BackendStatus::Waiting if payload.is_selfie_deferred() => {
                Ok(self.suspend(&envelope, on_progress))
            }
            BackendStatus::Finished if !payload.has_selfie() => self.finish(&envelope),
            _ => Err(self.failure(&envelope, RetryStep::None)),
        }
    }

    async fn verify_selfie(
        &self,
        session: &mut Session,
        payload: &VerificationPayload,
    ) -> Result<StepOutcome, VerificationError> {
        let selfie = payload
            .selfie()
            .ok_or_else(|| VerificationError::protocol(NO_SELFIE))?;
        let url = session.url_for(Step::VerifySelfie)?;
        let body = wire::selfie_body(self.variant.scenarios.for_face(true), selfie)?;
        let envelope = self
            .exchange(TransportRequest::new(Method::PATCH, url).with_body(body))
            .await?;
        let status = self.status(&envelope);

        match self.variant.kind {
            VariantKind::TwoPhasePatch => match status {
                BackendStatus::Finished => self.finish(&envelope),
                // Liveness is evaluated asynchronously on the session resource.
                BackendStatus::Running => Ok(StepOutcome::next(Step::Poll)),
                _ => Err(self.failure(&envelope, RetryStep::None)),
            },
            VariantKind::SubmitAndPoll => match status {
                BackendStatus::Failure => Err(self.failure(&envelope, RetryStep::RetrySelfieScan)),
                BackendStatus::Error => Ok(StepOutcome::abort(CONFIGURATION_ERROR)),
                _ => Ok(StepOutcome::next(Step::Poll)),
            },
        }
    }

    async fn poll(
        &self,
        session: &Session,
        payload: &VerificationPayload,
        selfie_pending: bool,
        cancel: &CancellationToken,
        on_progress: ProgressSink<'_>,
    ) -> PollReport {
        let url = match session.url_for(Step::Poll) {
            Ok(url) => url,
            Err(e) => {
                return PollReport {
                    outcome: Some(VerificationError::from(e).into_outcome()),
                    attempts: 0,
                }
            }
        };
        let scheduler = RetryScheduler::new(self.retry_delay, self.max_attempts, cancel.clone());

        scheduler
            .poll(move |attempt| {
                on_progress(Progress::at(Step::Poll, attempt));
                let request = TransportRequest::new(Method::GET, url.clone());
                async move {
                    self.poll_once(request, payload, selfie_pending, on_progress)
                        .await
                        .unwrap_or_else(VerificationError::into_outcome)
                }
            })
            .await
    }

    async fn poll_once(
        &self,
        request: TransportRequest,
        payload: &VerificationPayload,
        selfie_pending: bool,
        on_progress: ProgressSink<'_>,
    ) -> Result<StepOutcome, VerificationError> {
        let envelope = self.exchange(request).await?;
        match self.status(&envelope) {
            BackendStatus::Running => Ok(StepOutcome::next(Step::Poll)),
            BackendStatus::Finished => self.finish(&envelope),
            BackendStatus::Failure => Err(self.failure(&envelope, RetryStep::None)),
            BackendStatus::Waiting if selfie_pending => Ok(StepOutcome::next(Step::VerifySelfie)),
            BackendStatus::Waiting if payload.is_selfie_deferred() => {
                Ok(self.suspend(&envelope, on_progress))
            }
            other => {
                tracing::warn!(status = ?other, "unexpected status while polling");
                Err(VerificationError::protocol(idv_core::error::UNEXPECTED_RESPONSE))
            }
        }
    }
}
