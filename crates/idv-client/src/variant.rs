//! # Protocol Variants
//!
//! The verification backend is deployed in two shapes that share one
//! engine. Everything that differs between them is data held here:
//!
//! | | two-phase PATCH | submit + poll |
//! |---|---|---|
//! | Document step | `PATCH {id}/state/steps/verifyResults` | (none, polled) |
//! | Selfie step | `PATCH {id}/state/steps/faceMatch` | `PATCH {id}/state/steps/enhancedLiveness` |
//! | Poll | `GET {id}` | `GET {id}` |
//! | Failure status | `Failed` | `Failure` |
//! | Image layout | `input.frontWhiteImage` | `input.document.front` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The two backend workflow shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantKind {
    /// Create, then advance the session step by step with PATCH.
    TwoPhasePatch,
    /// Create with all document images, then poll.
    SubmitAndPoll,
}

/// URL suffixes appended to `<base>/<session id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPaths {
    /// Document verification step.
    pub document: String,
    /// Selfie (face match or liveness) step.
    pub selfie: String,
    /// Session resource polled for the final result.
    pub poll: String,
}

/// Backend status, after matching against the variant's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    /// A step is waiting for more input.
    Waiting,
    /// The workflow is complete.
    Finished,
    /// The workflow is still processing.
    Running,
    /// The workflow failed on the submitted data.
    Failure,
    /// The workflow could not run (scenario or tenant misconfigured).
    Error,
    /// Anything else, verbatim.
    Other(String),
}

/// The status words one backend variant uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusVocabulary {
    /// Word for [`BackendStatus::Waiting`].
    pub waiting: String,
    /// Word for [`BackendStatus::Finished`].
    pub finished: String,
    /// Word for [`BackendStatus::Running`].
    pub running: String,
    /// Word for [`BackendStatus::Failure`].
    pub failure: String,
    /// Word for [`BackendStatus::Error`].
    pub error: String,
}

impl StatusVocabulary {
    fn with_failure_word(failure: &str) -> Self {
        Self {
            waiting: "Waiting".into(),
            finished: "Finished".into(),
            running: "Running".into(),
            failure: failure.into(),
            error: "Error".into(),
        }
    }

    /// Match a raw status, ignoring ASCII case.
    pub fn classify(&self, raw: &str) -> BackendStatus {
        let pairs = [
            (&self.waiting, BackendStatus::Waiting),
            (&self.finished, BackendStatus::Finished),
            (&self.running, BackendStatus::Running),
            (&self.failure, BackendStatus::Failure),
            (&self.error, BackendStatus::Error),
        ];
        pairs
            .into_iter()
            .find(|(word, _)| word.eq_ignore_ascii_case(raw))
            .map(|(_, status)| status)
            .unwrap_or_else(|| BackendStatus::Other(raw.to_string()))
    }
}

/// Scenario names sent as `name` in request bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenarios {
    /// Document-only scenario.
    pub document: String,
    /// Document plus face scenario.
    pub face: String,
}

impl Scenarios {
    /// The scenario for a run, depending on whether a face check is expected.
    pub fn for_face(&self, expects_face: bool) -> &str {
        if expects_face {
            &self.face
        } else {
            &self.document
        }
    }
}

/// Complete description of one backend variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolVariant {
    /// Workflow shape.
    pub kind: VariantKind,
    /// Step URL suffixes.
    pub paths: StepPaths,
    /// Status vocabulary.
    pub statuses: StatusVocabulary,
    /// Scenario names.
    pub scenarios: Scenarios,
    /// Whether backend error codes are mapped to retry steps.
    pub apply_code_table: bool,
}

impl ProtocolVariant {
    /// The two-phase PATCH backend.
    pub fn two_phase() -> Self {
        Self {
            kind: VariantKind::TwoPhasePatch,
            paths: StepPaths {
                document: "/state/steps/verifyResults".into(),
                selfie: "/state/steps/faceMatch".into(),
                poll: String::new(),
            },
            statuses: StatusVocabulary::with_failure_word("Failed"),
            scenarios: Scenarios {
                document: "Connect_Verify_Document".into(),
                face: "Connect_Verify_Document_Face_Passive_Liveness".into(),
            },
            apply_code_table: true,
        }
    }

    /// The single-submission polling backend.
    pub fn polling() -> Self {
        Self {
            kind: VariantKind::SubmitAndPoll,
            paths: StepPaths {
                document: String::new(),
                selfie: "/state/steps/enhancedLiveness".into(),
                poll: String::new(),
            },
            statuses: StatusVocabulary::with_failure_word("Failure"),
            scenarios: Scenarios {
                document: "Verify_Document".into(),
                face: "Verify_Document_Face_Enhanced_Liveness".into(),
            },
            apply_code_table: true,
        }
    }

    /// Short name used in configuration and logs.
    pub fn name(&self) -> &'static str {
        match self.kind {
            VariantKind::TwoPhasePatch => "two-phase",
            VariantKind::SubmitAndPoll => "polling",
        }
    }
}

impl Default for ProtocolVariant {
    fn default() -> Self {
        Self::polling()
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognized variant name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown protocol variant {0:?} (expected \"two-phase\" or \"polling\")")]
pub struct UnknownVariant(pub String);

impl FromStr for ProtocolVariant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two-phase" | "two_phase" | "patch" => Ok(Self::two_phase()),
            "polling" | "poll" => Ok(Self::polling()),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}
