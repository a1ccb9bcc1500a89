//! Contract tests for the submit-and-poll backend variant.
//!
//! ## Endpoints Tested
//!
//! | Step | Method | Path | Test |
//! |------|--------|------|------|
//! | Submit | POST | `/verifications` | all |
//! | Poll | GET | `/verifications/{id}` | all but `submit_*` |
//! | VerifySelfie | PATCH | `/verifications/{id}/state/steps/enhancedLiveness` | `deferred_selfie_*` |

mod common;

use std::time::Duration;

use common::*;
use idv_client::idv_core::{RetryStep, StepOutcome, Step, VerificationPayload};
use idv_client::{IdvConfig, ProtocolVariant, VerificationClient, VerificationRequest};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> IdvConfig {
    IdvConfig::local_mock(
        &format!("{}/verifications", server.uri()),
        ProtocolVariant::polling(),
    )
    .unwrap()
}

fn test_client(server: &MockServer) -> VerificationClient {
    VerificationClient::new(&test_config(server)).unwrap()
}

fn passport() -> VerificationRequest {
    VerificationRequest::document(VerificationPayload::new().with_document_front(b"front".to_vec()))
}

async fn mount_submit(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/verifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_poll(server: &MockServer, id: &str, body: serde_json::Value, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(format!("/verifications/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));
    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

// ── Submit ───────────────────────────────────────────────────────────

#[tokio::test]
async fn submit_declares_single_sided_passport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verifications"))
        .and(body_partial_json(json!({
            "name": "Verify_Document",
            "input": {
                "document": {
                    "front": "ZnJvbnQ=",
                    "captureMethod": "SDK",
                    "type": "Passport",
                    "size": "TD3"
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(running("p-1")))
        .expect(1)
        .mount(&server)
        .await;
    mount_poll(&server, "p-1", finished("p-1", document_result("Passed")), None).await;

    let outcome = test_client(&server)
        .verify(&passport(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, StepOutcome::Success { .. }));
}

#[tokio::test]
async fn submit_failure_status_reports_status_and_code() {
    let server = MockServer::start().await;
    mount_submit(&server, failure("p-2", "Failure", 7001, "[r-9] Internal error")).await;

    let outcome = test_client(&server)
        .verify(&passport(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        StepOutcome::failure("Status: Failure\nCode: 7001\nInternal error")
    );
}

// ── Polling ──────────────────────────────────────────────────────────

#[tokio::test]
async fn running_then_passed_is_success() {
    let server = MockServer::start().await;
    mount_submit(&server, running("p-3")).await;
    mount_poll(&server, "p-3", running("p-3"), Some(2)).await;
    mount_poll(&server, "p-3", finished("p-3", document_result("Passed")), None).await;

    let outcome = test_client(&server)
        .verify(&passport(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, StepOutcome::Success { .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn unknown_verdict_retries_document_scan() {
    let server = MockServer::start().await;
    mount_submit(&server, running("p-4")).await;
    mount_poll(&server, "p-4", finished("p-4", document_result("Unknown")), None).await;

    let outcome = test_client(&server)
        .verify(&passport(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.retry_step(), RetryStep::RetryDocumentScan);
}

#[tokio::test]
async fn image_quality_code_retries_document_scan() {
    let server = MockServer::start().await;
    mount_submit(&server, running("p-5")).await;
    mount_poll(&server, "p-5", failure("p-5", "Failure", 4602, "[r] blurred"), None).await;

    let outcome = test_client(&server)
        .verify(&passport(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.retry_step(), RetryStep::RetryDocumentScan);
    assert!(!outcome.message().unwrap().contains("[r]"));
}

#[tokio::test]
async fn finished_with_image_quality_code_retries_document_scan() {
    let server = MockServer::start().await;
    mount_submit(&server, running("p-11")).await;
    mount_poll(&server, "p-11", running("p-11"), Some(1)).await;
    mount_poll(&server, "p-11", failure("p-11", "Finished", 4602, "[r] blurred"), None).await;

    let outcome = test_client(&server)
        .verify(&passport(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, StepOutcome::RetryableFailure { .. }));
    assert_eq!(outcome.retry_step(), RetryStep::RetryDocumentScan);
    assert!(!outcome.message().unwrap().contains("[r]"));
}

#[tokio::test]
async fn attempt_ceiling_times_out() {
    let server = MockServer::start().await;
    mount_submit(&server, running("p-6")).await;
    Mock::given(method("GET"))
        .and(path("/verifications/p-6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(running("p-6")))
        .expect(3)
        .mount(&server)
        .await;

    let config = test_config(&server).with_polling(3, Duration::from_millis(5));
    let outcome = VerificationClient::new(&config)
        .unwrap()
        .verify(&passport(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, StepOutcome::failure("timed out"));
}

#[tokio::test]
async fn malformed_poll_response_is_failure() {
    let server = MockServer::start().await;
    mount_submit(&server, running("p-7")).await;
    Mock::given(method("GET"))
        .and(path("/verifications/p-7"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"status\":"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = test_client(&server)
        .verify(&passport(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, StepOutcome::Failure { .. }));
}

#[tokio::test]
async fn vanished_session_aborts() {
    let server = MockServer::start().await;
    mount_submit(&server, running("p-8")).await;
    Mock::given(method("GET"))
        .and(path("/verifications/p-8"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let outcome = test_client(&server)
        .verify(&passport(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        StepOutcome::abort("The verification session is no longer available.")
    );
}

// ── Deferred selfie ──────────────────────────────────────────────────

#[tokio::test]
async fn deferred_selfie_suspends_then_resumes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verifications"))
        .and(body_partial_json(json!({
            "name": "Verify_Document_Face_Enhanced_Liveness",
            "input": { "document": { "front": { "white": "ZnJvbnQ=" } } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(running("p-9")))
        .expect(1)
        .mount(&server)
        .await;
    mount_poll(&server, "p-9", waiting("p-9", document_result("Passed")), Some(1)).await;
    Mock::given(method("PATCH"))
        .and(path("/verifications/p-9/state/steps/enhancedLiveness"))
        .and(body_partial_json(json!({
            "name": "Verify_Document_Face_Enhanced_Liveness",
            "input": { "face": "c2VsZmll" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(running("p-9")))
        .expect(1)
        .mount(&server)
        .await;
    mount_poll(&server, "p-9", finished("p-9", document_result("Passed")), None).await;

    let client = test_client(&server);
    let cancel = CancellationToken::new();

    let document = VerificationRequest::document(
        VerificationPayload::new()
            .with_document_front(b"front".to_vec())
            .expect_selfie_later(),
    );
    let suspended = client.verify(&document, &cancel).await.unwrap();
    assert_eq!(suspended, StepOutcome::next(Step::AwaitSelfie));
    assert_eq!(client.retained_session_id().as_deref(), Some("p-9"));

    let selfie =
        VerificationRequest::selfie(VerificationPayload::new().with_selfie(b"selfie".to_vec()));
    let outcome = client.verify(&selfie, &cancel).await.unwrap();
    assert!(matches!(outcome, StepOutcome::Success { .. }));
}

#[tokio::test]
async fn selfie_liveness_failure_retries_selfie() {
    let server = MockServer::start().await;
    mount_submit(&server, running("p-10")).await;
    mount_poll(&server, "p-10", waiting("p-10", document_result("Passed")), None).await;
    Mock::given(method("PATCH"))
        .and(path("/verifications/p-10/state/steps/enhancedLiveness"))
        .respond_with(ResponseTemplate::new(200).set_body_json(failure(
            "p-10",
            "Failure",
            5333,
            "[r] liveness failed",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let request = VerificationRequest::document(
        VerificationPayload::new()
            .with_document_front(b"front".to_vec())
            .with_selfie(b"selfie".to_vec()),
    );
    let outcome = test_client(&server)
        .verify(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.retry_step(), RetryStep::RetrySelfieScan);
}
