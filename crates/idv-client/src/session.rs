//! Backend session: base URL, session id, and poll try counter.

use idv_core::Step;

use crate::variant::StepPaths;

/// URL building failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The step needs a session id and none is attached yet.
    #[error("no session id attached; cannot build URL for step {0}")]
    NotAttached(Step),
    /// The step has no endpoint of its own.
    #[error("step {0} has no endpoint")]
    NoEndpoint(Step),
}

/// One backend verification session.
///
/// The session id is set at most once; every request after the first is
/// addressed relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    base_url: String,
    paths: StepPaths,
    session_id: Option<String>,
    try_count: u32,
}

impl Session {
    /// A fresh, unattached session. `try_count` starts at 1.
    pub fn new(base_url: impl Into<String>, paths: StepPaths) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            paths,
            session_id: None,
            try_count: 1,
        }
    }

    /// Attach the backend session id.
    ///
    /// Returns `true` when the id was stored. A second call is a no-op that
    /// returns `false`; a *different* id is logged and ignored.
    pub fn attach(&mut self, session_id: impl Into<String>) -> bool {
        let session_id = session_id.into();
        match &self.session_id {
            None => {
                tracing::debug!(session_id = %session_id, "session attached");
                self.session_id = Some(session_id);
                true
            }
            Some(existing) if *existing == session_id => false,
            Some(existing) => {
                tracing::error!(
                    attached = %existing,
                    ignored = %session_id,
                    "attempted to re-attach session with a different id"
                );
                false
            }
        }
    }

    /// The attached session id.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether a session id is attached.
    pub fn is_attached(&self) -> bool {
        self.session_id.is_some()
    }

    /// URL for `step`.
    ///
    /// `Submit` targets the base URL; every other step targets
    /// `<base>/<id><suffix>`.
    pub fn url_for(&self, step: Step) -> Result<String, SessionError> {
        let suffix = match step {
            Step::Submit => return Ok(self.base_url.clone()),
            Step::VerifyDocument => &self.paths.document,
            Step::VerifySelfie => &self.paths.selfie,
            Step::Poll => &self.paths.poll,
            Step::AwaitSelfie => return Err(SessionError::NoEndpoint(step)),
        };
        let id = self
            .session_id
            .as_deref()
            .ok_or(SessionError::NotAttached(step))?;
        Ok(format!("{}/{}{}", self.base_url, id, suffix))
    }

    /// Current poll try count.
    pub fn try_count(&self) -> u32 {
        self.try_count
    }

    /// Record the number of poll attempts made.
    pub fn set_try_count(&mut self, try_count: u32) {
        self.try_count = try_count.max(1);
    }

    /// Reset the try count to 1 before a new polling phase.
    pub fn reset_tries(&mut self) {
        self.try_count = 1;
    }
}
