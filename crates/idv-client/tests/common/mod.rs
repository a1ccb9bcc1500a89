//! Shared fixtures: an in-memory scripted transport, a recording listener,
//! and canned backend responses.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Notify;

use idv_client::idv_core::{Progress, RetryStep, Step, VerificationResult};
use idv_client::transport::Method;
use idv_client::{
    IdvConfig, ProtocolVariant, Transport, TransportError, TransportRequest, VerificationClient,
    VerificationListener,
};

// ── Scripted transport ───────────────────────────────────────────────

/// One canned reply.
pub enum Reply {
    Body(Value),
    /// Held until the gate is notified.
    Gated(Arc<Notify>, Value),
    Error(TransportError),
}

/// Replays replies in order and records every request.
///
/// When the script runs out, `fallback` is replayed forever if set;
/// otherwise the transport reports a connection failure.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<Value>,
    calls: Mutex<Vec<(Method, String)>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn bodies(bodies: Vec<Value>) -> Self {
        Self::new(bodies.into_iter().map(Reply::Body).collect())
    }

    pub fn with_fallback(mut self, body: Value) -> Self {
        self.fallback = Some(body);
        self
    }

    pub fn calls(&self) -> Vec<(Method, String)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<String, TransportError> {
        self.calls.lock().push((request.method, request.url));
        let next = self.replies.lock().pop_front();
        match next {
            Some(Reply::Body(body)) => Ok(body.to_string()),
            Some(Reply::Gated(gate, body)) => {
                gate.notified().await;
                Ok(body.to_string())
            }
            Some(Reply::Error(e)) => Err(e),
            None => match &self.fallback {
                Some(body) => Ok(body.to_string()),
                None => Err(TransportError::Connect {
                    message: "script exhausted".into(),
                }),
            },
        }
    }
}

pub const BASE_URL: &str = "http://idv.test/verifications";

/// Config for a scripted client, polling every 2s.
pub fn scripted_config(variant: ProtocolVariant, max_attempts: u32) -> IdvConfig {
    IdvConfig::local_mock(BASE_URL, variant)
        .unwrap()
        .with_polling(max_attempts, Duration::from_secs(2))
}

pub fn scripted_client(
    variant: ProtocolVariant,
    max_attempts: u32,
    transport: Arc<ScriptedTransport>,
) -> Arc<VerificationClient> {
    Arc::new(VerificationClient::with_transport(
        &scripted_config(variant, max_attempts),
        transport,
    ))
}

// ── Recording listener ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Progress(Step),
    Success(Option<String>),
    Failure(String),
    Retry(String, RetryStep),
    Abort(String),
}

impl Event {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::Progress(_))
    }
}

#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn terminal_events(&self) -> Vec<Event> {
        self.events().into_iter().filter(Event::is_terminal).collect()
    }
}

impl VerificationListener for Recorder {
    fn on_progress(&self, progress: &Progress) {
        self.events.lock().push(Event::Progress(progress.step));
    }

    fn on_success(&self, result: &VerificationResult) {
        let verdict = result
            .document
            .as_ref()
            .map(|document| document.verdict().to_string());
        self.events.lock().push(Event::Success(verdict));
    }

    fn on_failure(&self, message: &str) {
        self.events.lock().push(Event::Failure(message.to_string()));
    }

    fn on_failure_retry(&self, message: &str, retry_step: RetryStep) {
        self.events
            .lock()
            .push(Event::Retry(message.to_string(), retry_step));
    }

    fn on_failure_abort(&self, message: &str) {
        self.events.lock().push(Event::Abort(message.to_string()));
    }
}

// ── Canned responses ─────────────────────────────────────────────────

pub fn document_result(verdict: &str) -> Value {
    json!({
        "code": 0,
        "message": "[req-1] OK",
        "object": {
            "document": {
                "verificationResults": {
                    "result": verdict,
                    "firstName": "JANE",
                    "surname": "DOE"
                }
            }
        }
    })
}

pub fn face_mismatch_result() -> Value {
    json!({
        "code": 0,
        "object": {
            "document": { "verificationResults": { "result": "Passed" } },
            "face": { "result": "FACE_NOT_MATCH", "score": 0.12 }
        }
    })
}

pub fn running(id: &str) -> Value {
    json!({ "id": id, "status": "Running" })
}

pub fn waiting(id: &str, result: Value) -> Value {
    json!({ "id": id, "status": "Waiting", "state": { "result": result } })
}

pub fn finished(id: &str, result: Value) -> Value {
    json!({ "id": id, "status": "Finished", "state": { "result": result } })
}

pub fn failure(id: &str, status: &str, code: i64, message: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "state": { "result": { "code": code, "message": message } }
    })
}

/// Yield to the runtime until `condition` holds, advancing paused time.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached");
}
