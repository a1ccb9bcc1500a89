#![deny(missing_docs)]

//! # idv-core — Domain Types for Identity Verification Sessions
//!
//! This crate defines the types shared by every other crate in the
//! workspace. It performs no I/O and has no internal crate dependencies —
//! only `serde`, `serde_json`, `thiserror`, and `base64`.
//!
//! ## Contents
//!
//! - [`VerificationPayload`]: the captured images handed over by a capture
//!   collaborator. Immutable once submitted.
//! - [`VerificationResult`]: the parsed backend result (document, face,
//!   and liveness sub-results).
//! - [`StepOutcome`], [`Step`], [`RetryStep`]: what the protocol engine
//!   decides after each backend response.
//! - [`JobState`]: the lifecycle of the single job slot.
//! - [`VerificationError`]: the error taxonomy, with the single conversion
//!   point [`VerificationError::into_outcome`].

pub mod error;
pub mod job;
pub mod outcome;
pub mod payload;
pub mod result;

#[cfg(test)]
mod proptests;

pub use error::{PayloadError, VerificationError};
pub use job::JobState;
pub use outcome::{EntryStep, Progress, RetryStep, Step, StepOutcome};
pub use payload::VerificationPayload;
pub use result::{
    DocumentAlert, DocumentDetails, DocumentResult, FaceResult, FailedCheck, LivenessResult,
    Verdict, VerificationResult,
};
