//! # Result Dispatcher
//!
//! Delivers progress and terminal outcomes to a single subscribed listener.
//!
//! Every callback runs on one dispatch task, in the order events were
//! delivered. Events delivered while nobody is subscribed are dropped.
//! Replacing the listener takes effect for the next callback; the
//! [`Subscription`] returned by [`ResultDispatcher::subscribe`] can only
//! detach the listener it attached.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tokio::sync::{mpsc, oneshot};

use idv_core::{Progress, RetryStep, StepOutcome, VerificationResult};

/// Receiver of verification events.
///
/// Callbacks are invoked on the dispatch task and should return quickly.
pub trait VerificationListener: Send + Sync {
    /// A step is about to run, or the run suspended waiting for a selfie.
    fn on_progress(&self, _progress: &Progress) {}

    /// The verification completed.
    fn on_success(&self, result: &VerificationResult);

    /// The verification failed with nothing the user can retry.
    fn on_failure(&self, message: &str);

    /// The verification failed; repeating `retry_step` may succeed.
    fn on_failure_retry(&self, message: &str, retry_step: RetryStep);

    /// The verification failed and the flow should be abandoned.
    fn on_failure_abort(&self, message: &str);
}

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
}

type Slot = ReentrantMutex<RefCell<Option<(u64, Arc<dyn VerificationListener>)>>>;

enum Delivery {
    Progress(Progress),
    Outcome(StepOutcome),
    Barrier(oneshot::Sender<()>),
}

/// Single-listener event dispatcher.
pub struct ResultDispatcher {
    tx: mpsc::UnboundedSender<Delivery>,
    active: Arc<Slot>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ResultDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.active.lock();
        let active = guard.borrow().as_ref().map(|(id, _)| *id);
        f.debug_struct("ResultDispatcher")
            .field("active_subscription", &active)
            .finish_non_exhaustive()
    }
}

impl ResultDispatcher {
    /// Create a dispatcher and spawn its dispatch task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let active: Arc<Slot> = Arc::new(ReentrantMutex::new(RefCell::new(None)));
        tokio::spawn(dispatch_loop(rx, active.clone()));
        Self {
            tx,
            active,
            next_id: AtomicU64::new(1),
        }
    }

    /// Make `listener` the active listener, replacing any previous one.
    pub fn subscribe(&self, listener: Arc<dyn VerificationListener>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = self.active.lock();
        let replaced = guard.borrow_mut().replace((id, listener)).is_some();
        tracing::debug!(subscription = id, replaced, "listener subscribed");
        Subscription { id }
    }

    /// Detach the listener attached by `subscription`.
    ///
    /// Returns `false`, leaving the active listener in place, when
    /// `subscription` has already been replaced.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let guard = self.active.lock();
        let mut slot = guard.borrow_mut();
        let is_active = slot
            .as_ref()
            .is_some_and(|(id, _)| *id == subscription.id);
        if is_active {
            *slot = None;
            tracing::debug!(subscription = subscription.id, "listener unsubscribed");
        }
        is_active
    }

    /// Whether a listener is subscribed.
    pub fn has_listener(&self) -> bool {
        self.active.lock().borrow().is_some()
    }

    /// Queue a progress report.
    pub fn deliver_progress(&self, progress: Progress) {
        self.send(Delivery::Progress(progress));
    }

    /// Queue an outcome. `Continue` outcomes are not reported to listeners.
    pub fn deliver(&self, outcome: StepOutcome) {
        self.send(Delivery::Outcome(outcome));
    }

    /// Wait until every event queued before this call has been handled.
    pub async fn flushed(&self) {
        let (done, wait) = oneshot::channel();
        self.send(Delivery::Barrier(done));
        let _ = wait.await;
    }

    fn send(&self, delivery: Delivery) {
        if self.tx.send(delivery).is_err() {
            tracing::warn!("dispatch task has stopped; event dropped");
        }
    }
}

impl Default for ResultDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

async fn dispatch_loop(mut rx: mpsc::UnboundedReceiver<Delivery>, active: Arc<Slot>) {
    while let Some(delivery) = rx.recv().await {
        match delivery {
            Delivery::Barrier(done) => {
                let _ = done.send(());
            }
            Delivery::Progress(progress) => {
                with_listener(&active, |listener| listener.on_progress(&progress));
            }
            Delivery::Outcome(outcome) => {
                with_listener(&active, |listener| notify(listener, &outcome));
            }
        }
    }
}

// The lock stays held during the callback so that `unsubscribe` from another
// thread waits for it. A callback may itself (un)subscribe: the lock is
// reentrant and the slot borrow has ended.
fn with_listener(active: &Slot, f: impl FnOnce(&dyn VerificationListener)) {
    let guard = active.lock();
    let listener = guard.borrow().as_ref().map(|(_, l)| l.clone());
    match listener {
        Some(listener) => f(listener.as_ref()),
        None => tracing::debug!("no listener subscribed; event dropped"),
    }
}

fn notify(listener: &dyn VerificationListener, outcome: &StepOutcome) {
    match outcome {
        StepOutcome::Success { result } => listener.on_success(result),
        StepOutcome::Failure { message } => listener.on_failure(message),
        StepOutcome::RetryableFailure {
            message,
            retry_step,
        } => listener.on_failure_retry(message, *retry_step),
        StepOutcome::AbortableFailure { message } => listener.on_failure_abort(message),
        StepOutcome::Continue { next } => {
            tracing::debug!(%next, "continue outcome is not reported");
        }
    }
}
