//! # Verification Result Model
//!
//! Typed view of the backend's `state.result` object. Both observed backend
//! variants are covered by one model:
//!
//! | Variant | Verdict location |
//! |---------|------------------|
//! | two-phase PATCH | `object.document.verificationResults.result` |
//! | submit + poll | `object.document.result` |
//!
//! Every field is optional on the wire. Missing fields deserialize to
//! `None`/empty rather than failing, because the backend omits sub-results
//! that were not part of the scenario.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Face result value the backend reports when the selfie does not match
/// the document portrait.
pub const FACE_NOT_MATCH: &str = "FACE_NOT_MATCH";

/// Alternate spelling used by the liveness scenarios.
pub const MATCH_NEGATIVE: &str = "MATCH_NEGATIVE";

/// Code reported when the backend omits `code`.
const CODE_ABSENT: i64 = -1;

// -- Verdict ------------------------------------------------------------------

/// Overall document verdict.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// All document checks passed.
    Passed,
    /// Some checks need human attention.
    Attention,
    /// The document failed verification.
    Failed,
    /// The backend could not recognize the document.
    Unknown,
    /// Any other value, kept verbatim. Empty when the verdict is absent.
    Other(String),
}

impl Verdict {
    /// Parse a backend verdict string, ignoring ASCII case.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("passed") {
            Self::Passed
        } else if raw.eq_ignore_ascii_case("attention") {
            Self::Attention
        } else if raw.eq_ignore_ascii_case("failed") {
            Self::Failed
        } else if raw.eq_ignore_ascii_case("unknown") {
            Self::Unknown
        } else {
            Self::Other(raw.to_string())
        }
    }

    /// Whether this verdict is one of the three terminal verdicts that are
    /// delivered to the consumer as a result.
    pub fn is_conclusive(&self) -> bool {
        matches!(self, Self::Passed | Self::Attention | Self::Failed)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("Passed"),
            Self::Attention => f.write_str("Attention"),
            Self::Failed => f.write_str("Failed"),
            Self::Unknown => f.write_str("Unknown"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

// -- Sub-results ----------------------------------------------------------------

/// A single document check that did not pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedCheck {
    /// Check category (e.g. "Visual", "MRZ").
    #[serde(default)]
    pub category: Option<String>,
    /// Check name.
    #[serde(default)]
    pub name: Option<String>,
    /// Check type.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Score obtained.
    #[serde(default)]
    pub score: Option<f64>,
    /// Score required to pass.
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Alert raised by the two-phase backend's document verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAlert {
    /// Alert name.
    #[serde(default)]
    pub name: Option<String>,
    /// Alert outcome.
    #[serde(default)]
    pub result: Option<String>,
}

/// Detailed verification block (`verificationResults`) of the two-phase
/// backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetails {
    /// Document verdict.
    #[serde(default)]
    pub result: Option<String>,
    /// Holder first name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Holder middle name.
    #[serde(default)]
    pub middle_name: Option<String>,
    /// Holder surname.
    #[serde(default)]
    pub surname: Option<String>,
    /// Holder gender.
    #[serde(default)]
    pub gender: Option<String>,
    /// Holder nationality.
    #[serde(default)]
    pub nationality: Option<String>,
    /// Document expiration date as reported.
    #[serde(default)]
    pub expiration_date: Option<String>,
    /// Holder birth date as reported.
    #[serde(default)]
    pub birth_date: Option<String>,
    /// Document number.
    #[serde(default)]
    pub document_number: Option<String>,
    /// Document type.
    #[serde(default)]
    pub document_type: Option<String>,
    /// Number of checks performed.
    #[serde(default)]
    pub total_verifications_done: Option<u32>,
    /// Alerts raised.
    #[serde(default)]
    pub alerts: Vec<DocumentAlert>,
}

/// Document sub-result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResult {
    /// Verdict reported by the polling backend.
    #[serde(default)]
    pub result: Option<String>,
    /// Detail block reported by the two-phase backend.
    #[serde(default)]
    pub verification_results: Option<DocumentDetails>,
    /// Holder first name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Holder surname.
    #[serde(default)]
    pub surname: Option<String>,
    /// Holder birth date as reported.
    #[serde(default)]
    pub birth_date: Option<String>,
    /// Document expiry date as reported.
    #[serde(default)]
    pub expiry_date: Option<String>,
    /// Document type.
    #[serde(default)]
    pub document_type: Option<String>,
    /// Document number.
    #[serde(default)]
    pub document_number: Option<String>,
    /// Holder gender.
    #[serde(default)]
    pub gender: Option<String>,
    /// Holder nationality.
    #[serde(default)]
    pub nationality: Option<String>,
    /// Portrait cropped from the document, base64 encoded.
    #[serde(default)]
    pub portrait: Option<String>,
    /// Number of checks performed.
    #[serde(default)]
    pub total_verifications: Option<u32>,
    /// Checks that did not pass.
    #[serde(default)]
    pub failed_verifications: Vec<FailedCheck>,
}

impl DocumentResult {
    /// The document verdict, wherever the backend variant put it.
    ///
    /// An absent verdict parses as `Verdict::Other("")`.
    pub fn verdict(&self) -> Verdict {
        let raw = self
            .verification_results
            .as_ref()
            .and_then(|details| details.result.as_deref())
            .or(self.result.as_deref())
            .unwrap_or_default();
        Verdict::parse(raw)
    }

    /// Holder first name from either layout.
    pub fn holder_first_name(&self) -> Option<&str> {
        self.verification_results
            .as_ref()
            .and_then(|d| d.first_name.as_deref())
            .or(self.first_name.as_deref())
    }

    /// Holder surname from either layout.
    pub fn holder_surname(&self) -> Option<&str> {
        self.verification_results
            .as_ref()
            .and_then(|d| d.surname.as_deref())
            .or(self.surname.as_deref())
    }

    /// Decoded portrait bytes. `None` when absent or not valid base64.
    pub fn portrait_image(&self) -> Option<Vec<u8>> {
        self.portrait
            .as_deref()
            .and_then(|encoded| STANDARD.decode(encoded).ok())
    }
}

fn unknown_face_result() -> String {
    "Unknown".to_string()
}

/// Face-match sub-result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceResult {
    /// Match outcome. Defaults to `"Unknown"` when absent.
    #[serde(default = "unknown_face_result")]
    pub result: String,
    /// Match score.
    #[serde(default)]
    pub score: Option<f64>,
    /// Face image used for matching, base64 encoded.
    #[serde(default)]
    pub image: Option<String>,
}

impl FaceResult {
    /// Whether the backend reported that the selfie does not match.
    pub fn is_mismatch(&self) -> bool {
        self.result.eq_ignore_ascii_case(FACE_NOT_MATCH)
            || self.result.eq_ignore_ascii_case(MATCH_NEGATIVE)
    }
}

/// Liveness sub-result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessResult {
    /// Assessment such as `"Live"`, `"NotLive"`, or `"PoorQuality"`.
    #[serde(default)]
    pub assessment: Option<String>,
    /// Liveness score.
    #[serde(default)]
    pub score: Option<f64>,
    /// Processing error reported by the liveness engine.
    #[serde(default)]
    pub error: Option<String>,
}

// -- VerificationResult -----------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawObject {
    #[serde(default)]
    document: Option<DocumentResult>,
    #[serde(default)]
    face: Option<FaceResult>,
    #[serde(default, alias = "liveness")]
    liveness_result: Option<LivenessResult>,
}

#[derive(Deserialize)]
struct RawVerificationResult {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    object: Option<RawObject>,
}

/// Parsed `state.result` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawVerificationResult")]
pub struct VerificationResult {
    /// Backend result code; `-1` when absent.
    pub code: i64,
    /// Backend message.
    pub message: Option<String>,
    /// Backend result type.
    pub kind: Option<String>,
    /// Document sub-result.
    pub document: Option<DocumentResult>,
    /// Face-match sub-result, present for face scenarios.
    pub face: Option<FaceResult>,
    /// Liveness sub-result, present for liveness scenarios.
    pub liveness: Option<LivenessResult>,
}

impl From<RawVerificationResult> for VerificationResult {
    fn from(raw: RawVerificationResult) -> Self {
        let (document, face, liveness) = match raw.object {
            Some(object) => (object.document, object.face, object.liveness_result),
            None => (None, None, None),
        };
        Self {
            code: raw.code.unwrap_or(CODE_ABSENT),
            message: raw.message,
            kind: raw.kind,
            document,
            face,
            liveness,
        }
    }
}

impl VerificationResult {
    /// Parse from the `state.result` JSON value.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        <Self as Deserialize>::deserialize(value)
    }

    /// The document verdict, or `None` without a document sub-result.
    pub fn verdict(&self) -> Option<Verdict> {
        self.document.as_ref().map(DocumentResult::verdict)
    }

    /// Backend message without the leading `"[<request id>] "` tag.
    pub fn message_readable(&self) -> Option<&str> {
        self.message.as_deref().map(strip_request_tag)
    }
}

/// Strip a leading `"[...] "` request tag from a backend message.
///
/// `"[5eb47d75-...] Internal service error"` becomes
/// `"Internal service error"`. Messages without the tag are returned as-is.
pub fn strip_request_tag(message: &str) -> &str {
    match message.find("] ") {
        Some(index) => &message[index + 2..],
        None => message,
    }
}
