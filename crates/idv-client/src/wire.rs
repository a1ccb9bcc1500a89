//! # Wire Format
//!
//! Request bodies and the response envelope.
//!
//! Requests are `{name, input}` where `name` is the scenario and `input`
//! carries base64 images. Step advancement sends `{name}` alone. Every
//! response is an envelope `{id, status, state: {result}}`; `state.result`
//! only appears once a step has produced something.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use idv_core::{VerificationError, VerificationPayload, VerificationResult};

use crate::variant::{ProtocolVariant, VariantKind};

const CAPTURE_METHOD: &str = "SDK";

// Single-sided documents are declared as passports in the TD3 format.
const SINGLE_SIDED_TYPE: &str = "Passport";
const SINGLE_SIDED_SIZE: &str = "TD3";

// -- Request bodies ---------------------------------------------------------

#[derive(Debug, Serialize)]
struct Envelope<'a, I: Serialize> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<I>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WhiteImageInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    front_white_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    back_white_image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum DocumentImage {
    Flat(String),
    Nested { white: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    front: Option<DocumentImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    back: Option<DocumentImage>,
    capture_method: &'static str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct DocumentSubmission {
    document: DocumentInput,
}

#[derive(Debug, Serialize)]
struct FaceInput {
    face: String,
}

fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn to_value(body: impl Serialize) -> Result<serde_json::Value, VerificationError> {
    serde_json::to_value(body)
        .map_err(|e| VerificationError::protocol(format!("failed to encode request: {e}")))
}

/// Body of the session-creating request.
pub fn submit_body(
    variant: &ProtocolVariant,
    payload: &VerificationPayload,
) -> Result<serde_json::Value, VerificationError> {
    let name = variant.scenarios.for_face(payload.expects_face());
    match variant.kind {
        VariantKind::TwoPhasePatch => to_value(Envelope {
            name,
            input: Some(WhiteImageInput {
                front_white_image: payload.document_front().map(encode),
                back_white_image: payload.document_back().map(encode),
            }),
        }),
        VariantKind::SubmitAndPoll => {
            // Face scenarios take nested `{white}` images.
            let image = |bytes: &[u8]| {
                if payload.expects_face() {
                    DocumentImage::Nested {
                        white: encode(bytes),
                    }
                } else {
                    DocumentImage::Flat(encode(bytes))
                }
            };
            let single_sided = payload.document_back().is_none();
            to_value(Envelope {
                name,
                input: Some(DocumentSubmission {
                    document: DocumentInput {
                        front: payload.document_front().map(image),
                        back: payload.document_back().map(image),
                        capture_method: CAPTURE_METHOD,
                        kind: single_sided.then_some(SINGLE_SIDED_TYPE),
                        size: single_sided.then_some(SINGLE_SIDED_SIZE),
                    },
                }),
            })
        }
    }
}

/// Body that advances a session to its next step.
pub fn advance_body(scenario: &str) -> Result<serde_json::Value, VerificationError> {
    to_value(Envelope::<'_, ()> {
        name: scenario,
        input: None,
    })
}

/// Body of the selfie step.
pub fn selfie_body(scenario: &str, selfie: &[u8]) -> Result<serde_json::Value, VerificationError> {
    to_value(Envelope {
        name: scenario,
        input: Some(FaceInput {
            face: encode(selfie),
        }),
    })
}

// -- Response envelope --------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct RawState {
    #[serde(default)]
    result: Option<serde_json::Value>,
}

/// A parsed backend response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseEnvelope {
    /// Session id.
    #[serde(default)]
    pub id: Option<String>,
    /// Workflow status word.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "state_result")]
    #[serde(rename = "state")]
    result: Option<serde_json::Value>,
}

fn state_result<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let state = Option::<RawState>::deserialize(deserializer)?;
    Ok(state.and_then(|s| s.result))
}

impl ResponseEnvelope {
    /// Parse a response body. Malformed JSON is a protocol error carrying the
    /// parser's message.
    pub fn parse(body: &str) -> Result<Self, VerificationError> {
        serde_json::from_str(body).map_err(|e| VerificationError::protocol(e.to_string()))
    }

    /// The session id, if present and non-empty.
    pub fn session_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// The status word, or `""` when absent.
    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or_default()
    }

    /// `state.result.code`, `-1` when absent.
    pub fn result_code(&self) -> i64 {
        self.result
            .as_ref()
            .and_then(|r| r.get("code"))
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(-1)
    }

    /// `state.result.message`.
    pub fn result_message(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|r| r.get("message"))
            .and_then(serde_json::Value::as_str)
    }

    /// Whether `state.result` is present.
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// Parse `state.result`. `Ok(None)` when the envelope carries none.
    pub fn verification_result(&self) -> Result<Option<VerificationResult>, VerificationError> {
        self.result
            .as_ref()
            .map(VerificationResult::from_value)
            .transpose()
            .map_err(|e| VerificationError::protocol(e.to_string()))
    }
}
