//! # Result Classification
//!
//! Two decisions shared by both variants:
//!
//! - [`classify_result`]: what a finished session's result means for the
//!   user (success, or which capture to repeat).
//! - [`backend_failure`]: how a failure status is reported, using the
//!   backend code table.
//!
//! ## Backend Code Table
//!
//! | Codes | Meaning | Retry step |
//! |-------|---------|------------|
//! | 4600–4604 | document image quality | `RetryDocumentScan` |
//! | 5301 | document not recognized | `RetryDocumentScan` |
//! | 4610–4612 | face match failed | `RetrySelfieScan` |
//! | 5321 | passive liveness failed | `RetrySelfieScan` |
//! | 5331–5333 | enhanced liveness failed | `RetrySelfieScan` |

use idv_core::result::strip_request_tag;
use idv_core::{RetryStep, StepOutcome, Verdict, VerificationError, VerificationResult};

use crate::wire::ResponseEnvelope;

const NO_DOCUMENT: &str = "The server response contains no document result.";
const DOCUMENT_NOT_RECOGNIZED: &str = "The document was not recognized. Please scan it again.";
const FACE_MISMATCH: &str = "The selfie does not match the document portrait.";
const VERIFICATION_INCONCLUSIVE: &str = "The verification did not produce a result.";

/// Classify a finished session's result.
pub fn classify_result(result: VerificationResult) -> StepOutcome {
    let Some(document) = result.document.as_ref() else {
        return StepOutcome::failure(NO_DOCUMENT);
    };
    let verdict = document.verdict();
    let readable = result.message_readable().filter(|m| !m.is_empty());

    if verdict == Verdict::Unknown {
        return VerificationError::VerificationFailed {
            message: readable.unwrap_or(DOCUMENT_NOT_RECOGNIZED).to_string(),
            retry_step: RetryStep::RetryDocumentScan,
        }
        .into_outcome();
    }
    if result.face.as_ref().is_some_and(|face| face.is_mismatch()) {
        return VerificationError::VerificationFailed {
            message: FACE_MISMATCH.to_string(),
            retry_step: RetryStep::RetrySelfieScan,
        }
        .into_outcome();
    }
    if !verdict.is_conclusive() {
        tracing::debug!(%verdict, "inconclusive document verdict");
        return StepOutcome::failure(readable.unwrap_or(VERIFICATION_INCONCLUSIVE));
    }
    StepOutcome::success(result)
}

/// Retry step for a backend error code.
pub fn retry_step_for_code(code: i64) -> RetryStep {
    match code {
        4600..=4604 | 5301 => RetryStep::RetryDocumentScan,
        4610..=4612 | 5321 | 5331..=5333 => RetryStep::RetrySelfieScan,
        _ => RetryStep::None,
    }
}

/// Readable text for a backend code, falling back to the backend message.
pub fn code_message(code: i64, backend_message: Option<&str>) -> String {
    let known = match code {
        4600..=4604 => Some("The document image quality is too low. Please scan it again."),
        5301 => Some(DOCUMENT_NOT_RECOGNIZED),
        4610..=4612 => Some(FACE_MISMATCH),
        5332 => Some("The selfie could not be processed. Please take it again."),
        _ => None,
    };
    match (known, backend_message) {
        (Some(text), _) => text.to_string(),
        (None, Some(message)) if !message.is_empty() => strip_request_tag(message).to_string(),
        (None, _) => format!("Verification failed with code {code}."),
    }
}

/// Message for a failed passive-liveness check, from its assessment.
fn liveness_message(result: Option<&VerificationResult>) -> Option<String> {
    let liveness = result?.liveness.as_ref()?;
    match liveness.assessment.as_deref() {
        Some("NotLive") => Some("The selfie did not pass the liveness check.".to_string()),
        Some("PoorQuality") => Some("The selfie quality is too low. Please take it again.".to_string()),
        _ => liveness.error.clone(),
    }
}

/// Build the error for a failure status in `envelope`.
///
/// With the code table enabled, codes it names produce a retryable error
/// with a short message. A face sub-result reporting a mismatch retries
/// the selfie. Anything else is reported as
/// `"Status: <status>\nCode: <code>\n<message>"` with `default_retry`.
pub fn backend_failure(
    envelope: &ResponseEnvelope,
    apply_code_table: bool,
    default_retry: RetryStep,
) -> VerificationError {
    let status = envelope.status().to_string();
    let code = envelope.result_code();
    let backend_message = envelope.result_message();
    let parsed = envelope.verification_result().ok().flatten();

    let table_step = if apply_code_table {
        retry_step_for_code(code)
    } else {
        RetryStep::None
    };

    if table_step != RetryStep::None {
        let message = match code {
            5321 => liveness_message(parsed.as_ref())
                .unwrap_or_else(|| code_message(code, backend_message)),
            _ => code_message(code, backend_message),
        };
        return VerificationError::Backend {
            status,
            code,
            message,
            retry_step: table_step,
        };
    }

    let face_mismatch = parsed
        .as_ref()
        .and_then(|r| r.face.as_ref())
        .is_some_and(|face| face.is_mismatch());
    let retry_step = if face_mismatch {
        RetryStep::RetrySelfieScan
    } else {
        default_retry
    };

    VerificationError::Backend {
        message: format!(
            "Status: {status}\nCode: {code}\n{}",
            code_message(code, backend_message)
        ),
        status,
        code,
        retry_step,
    }
}
