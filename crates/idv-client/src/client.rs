//! Verification client: one engine, one dispatcher, and the session retained
//! for a selfie-only resubmission.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use idv_core::{EntryStep, Progress, Step, StepOutcome, VerificationPayload};

use crate::config::{ConfigError, IdvConfig};
use crate::dispatcher::{ResultDispatcher, Subscription, VerificationListener};
use crate::engine::{ProgressSink, ProtocolEngine};
use crate::session::Session;
use crate::transport::{HttpTransport, Transport, TransportError};
use crate::variant::ProtocolVariant;

const NO_SESSION_TO_RESUME: &str = "No verification session to resume.";

/// Errors from building a [`VerificationClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Invalid or missing configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP transport: {0}")]
    Transport(#[from] TransportError),
}

/// A payload and where the run should start.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// Images to send.
    pub payload: VerificationPayload,
    /// Step the run enters at.
    pub entry: EntryStep,
}

impl VerificationRequest {
    /// A request entering at `entry`.
    pub fn new(payload: VerificationPayload, entry: EntryStep) -> Self {
        Self { payload, entry }
    }

    /// Start a new session with the document images.
    pub fn document(payload: VerificationPayload) -> Self {
        Self::new(payload, EntryStep::Document)
    }

    /// Send a selfie to the session left waiting by the previous run.
    pub fn selfie(payload: VerificationPayload) -> Self {
        Self::new(payload, EntryStep::Selfie)
    }

    /// Drop any retained session and start over.
    pub fn restart(payload: VerificationPayload) -> Self {
        Self::new(payload, EntryStep::Restart)
    }
}

/// Client for the verification backend.
///
/// Runs verifications through the [`ProtocolEngine`] and reports them to
/// the subscribed [`VerificationListener`]. The session of the most recent
/// run is kept so that a deferred selfie can resume it. Runs are ordered by
/// the claim taken when they are requested, not by when their task first
/// runs.
pub struct VerificationClient {
    engine: ProtocolEngine,
    dispatcher: ResultDispatcher,
    base_url: String,
    retained: Mutex<Option<Session>>,
    latest_run: AtomicU64,
}

impl std::fmt::Debug for VerificationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationClient")
            .field("engine", &self.engine)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl VerificationClient {
    /// Create a client talking HTTP to the configured backend.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &IdvConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over any [`Transport`].
    pub fn with_transport(config: &IdvConfig, transport: Arc<dyn Transport>) -> Self {
        tracing::debug!(
            base_url = %config.base_url,
            variant = %config.variant,
            max_attempts = config.max_attempts,
            "creating verification client"
        );
        Self {
            engine: ProtocolEngine::new(
                transport,
                config.variant.clone(),
                config.retry_delay,
                config.max_attempts,
            ),
            dispatcher: ResultDispatcher::new(),
            base_url: config.base_url.as_str().to_string(),
            retained: Mutex::new(None),
            latest_run: AtomicU64::new(0),
        }
    }

    /// The backend variant this client speaks.
    pub fn variant(&self) -> &ProtocolVariant {
        self.engine.variant()
    }

    /// The dispatcher delivering to the subscribed listener.
    pub fn dispatcher(&self) -> &ResultDispatcher {
        &self.dispatcher
    }

    /// Make `listener` the active listener. See [`ResultDispatcher::subscribe`].
    pub fn subscribe(&self, listener: Arc<dyn VerificationListener>) -> Subscription {
        self.dispatcher.subscribe(listener)
    }

    /// See [`ResultDispatcher::unsubscribe`].
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.dispatcher.unsubscribe(subscription)
    }

    /// Session id retained for a selfie resubmission.
    pub fn retained_session_id(&self) -> Option<String> {
        self.retained
            .lock()
            .as_ref()
            .and_then(|s| s.session_id().map(str::to_string))
    }

    /// Run `request` and report progress to `on_progress` only.
    ///
    /// Returns the final outcome: a terminal one, `Continue(AwaitSelfie)`
    /// when the run suspended, or `None` when cancelled. Nothing is sent to
    /// the dispatcher.
    pub async fn run_with_progress(
        &self,
        request: &VerificationRequest,
        cancel: &CancellationToken,
        on_progress: ProgressSink<'_>,
    ) -> Option<StepOutcome> {
        let run = self.claim_run();
        self.run_claimed(run, request, cancel, on_progress).await
    }

    /// Take the next run number. Only the session of the highest claimed
    /// run is retained.
    pub(crate) fn claim_run(&self) -> u64 {
        self.latest_run.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Run `request` under a claim taken earlier with [`Self::claim_run`].
    pub(crate) async fn run_claimed(
        &self,
        run: u64,
        request: &VerificationRequest,
        cancel: &CancellationToken,
        on_progress: ProgressSink<'_>,
    ) -> Option<StepOutcome> {
        if let Err(e) = request.payload.validate() {
            tracing::warn!(error = %e, "rejecting verification payload");
            return Some(StepOutcome::failure(e.to_string()));
        }

        let (start, mut session) = match request.entry {
            EntryStep::Document | EntryStep::Restart => {
                if request.entry == EntryStep::Restart {
                    let mut retained = self.retained.lock();
                    if self.latest_run.load(Ordering::SeqCst) == run {
                        *retained = None;
                    }
                }
                let session = Session::new(self.base_url.clone(), self.variant().paths.clone());
                (Step::Submit, session)
            }
            EntryStep::Selfie => {
                let resumed = self.retained.lock().clone();
                match resumed.filter(Session::is_attached) {
                    Some(session) => (Step::VerifySelfie, session),
                    None => {
                        tracing::warn!("selfie submitted without a waiting session");
                        return Some(StepOutcome::failure(NO_SESSION_TO_RESUME));
                    }
                }
            }
        };

        let outcome = self
            .engine
            .run(start, &mut session, &request.payload, cancel, on_progress)
            .await;

        if session.is_attached() {
            let mut retained = self.retained.lock();
            if self.latest_run.load(Ordering::SeqCst) == run {
                *retained = Some(session);
            } else {
                tracing::debug!(run, "not retaining session of superseded run");
            }
        }
        outcome
    }

    /// Run `request`, reporting progress and the terminal outcome to the
    /// subscribed listener.
    pub async fn verify(
        &self,
        request: &VerificationRequest,
        cancel: &CancellationToken,
    ) -> Option<StepOutcome> {
        let forward = |progress: Progress| self.dispatcher.deliver_progress(progress);
        let outcome = self.run_with_progress(request, cancel, &forward).await;
        if let Some(terminal) = outcome.as_ref().filter(|o| o.is_terminal()) {
            self.dispatcher.deliver(terminal.clone());
        }
        outcome
    }
}
