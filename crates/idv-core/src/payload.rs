//! # Verification Payload
//!
//! Raw image bytes produced by the capture collaborators. The payload is
//! built once, validated, and then shared read-only by the engine for the
//! whole run (behind an `Arc` on the client side).

use std::fmt;

use crate::error::PayloadError;

/// Captured images for one verification attempt.
///
/// At least one image must be present. `selfie_deferred` marks a payload
/// whose scenario includes a face check while the selfie itself will be
/// submitted later through a selfie-only resubmission.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct VerificationPayload {
    document_front: Option<Vec<u8>>,
    document_back: Option<Vec<u8>>,
    selfie: Option<Vec<u8>>,
    selfie_deferred: bool,
}

impl VerificationPayload {
    /// Start an empty payload. Add images with the `with_*` builders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the document front image.
    pub fn with_document_front(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.document_front = Some(bytes.into());
        self
    }

    /// Builder: set the document back image.
    pub fn with_document_back(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.document_back = Some(bytes.into());
        self
    }

    /// Builder: set the selfie image.
    pub fn with_selfie(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.selfie = Some(bytes.into());
        self
    }

    /// Builder: declare that a selfie will follow in a later submission.
    ///
    /// Ignored when a selfie is already present.
    pub fn expect_selfie_later(mut self) -> Self {
        self.selfie_deferred = true;
        self
    }

    /// Check that at least one image is present.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.document_front.is_none() && self.document_back.is_none() && self.selfie.is_none() {
            return Err(PayloadError::Empty);
        }
        for (name, image) in [
            ("document front", &self.document_front),
            ("document back", &self.document_back),
            ("selfie", &self.selfie),
        ] {
            if image.as_ref().is_some_and(|bytes| bytes.is_empty()) {
                return Err(PayloadError::EmptyImage(name));
            }
        }
        Ok(())
    }

    /// Document front image, if captured.
    pub fn document_front(&self) -> Option<&[u8]> {
        self.document_front.as_deref()
    }

    /// Document back image, if captured.
    pub fn document_back(&self) -> Option<&[u8]> {
        self.document_back.as_deref()
    }

    /// Selfie image, if captured.
    pub fn selfie(&self) -> Option<&[u8]> {
        self.selfie.as_deref()
    }

    /// Whether a selfie is part of this submission.
    pub fn has_selfie(&self) -> bool {
        self.selfie.is_some()
    }

    /// Whether the selfie was declared but not yet captured.
    pub fn is_selfie_deferred(&self) -> bool {
        self.selfie_deferred && self.selfie.is_none()
    }

    /// Whether the backend scenario must include a face check.
    pub fn expects_face(&self) -> bool {
        self.selfie.is_some() || self.selfie_deferred
    }

    /// Whether any document side is present.
    pub fn has_document(&self) -> bool {
        self.document_front.is_some() || self.document_back.is_some()
    }
}

// Image bytes are biometric data and are never printed.
impl fmt::Debug for VerificationPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationPayload")
            .field("document_front", &self.document_front.as_ref().map(Vec::len))
            .field("document_back", &self.document_back.as_ref().map(Vec::len))
            .field("selfie", &self.selfie.as_ref().map(Vec::len))
            .field("selfie_deferred", &self.selfie_deferred)
            .finish()
    }
}
