//! # Verify Subcommand
//!
//! Loads the capture images, runs a verification against the configured
//! backend, and prints the outcome.
//!
//! With `--defer-selfie` the document is submitted first and the selfie is
//! sent to the waiting session in a second run, the way a capture flow that
//! takes the selfie after the document scan would.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use idv_client::{
    IdvConfig, ProtocolVariant, VerificationClient, VerificationListener, VerificationRequest,
};
use idv_core::{Progress, RetryStep, Step, StepOutcome, VerificationPayload, VerificationResult};

use crate::load_image;

/// Arguments for the `idv verify` subcommand.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Front side of the document.
    #[arg(long, value_name = "FILE")]
    pub front: PathBuf,

    /// Back side of the document. Omit for single-sided documents.
    #[arg(long, value_name = "FILE")]
    pub back: Option<PathBuf>,

    /// Selfie for face matching and liveness.
    #[arg(long, value_name = "FILE")]
    pub selfie: Option<PathBuf>,

    /// Submit the document first and send the selfie once the backend asks.
    #[arg(long, requires = "selfie")]
    pub defer_selfie: bool,

    /// Backend variant (`two-phase` or `polling`). Overrides `IDV_VARIANT`.
    #[arg(long)]
    pub variant: Option<ProtocolVariant>,

    /// Print the outcome as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Logs progress and outcomes as they are dispatched.
struct ProgressLog;

impl VerificationListener for ProgressLog {
    fn on_progress(&self, progress: &Progress) {
        match progress.step {
            Step::Poll => tracing::info!(attempt = progress.attempt, "waiting for result"),
            Step::AwaitSelfie => tracing::info!("document accepted, sending selfie"),
            step => tracing::info!(%step, "running step"),
        }
    }

    fn on_success(&self, result: &VerificationResult) {
        tracing::info!(verdict = ?result.verdict(), "verification completed");
    }

    fn on_failure(&self, message: &str) {
        tracing::warn!(reason = message, "verification failed");
    }

    fn on_failure_retry(&self, message: &str, retry_step: RetryStep) {
        tracing::warn!(reason = message, %retry_step, "verification failed, capture can be retried");
    }

    fn on_failure_abort(&self, message: &str) {
        tracing::error!(reason = message, "verification aborted");
    }
}

/// Execute the verify subcommand.
///
/// Returns the process exit code: 0 on success, 2 when a capture can be
/// retried, 1 otherwise.
pub async fn run_verify(args: &VerifyArgs, mut config: IdvConfig) -> Result<u8> {
    if let Some(variant) = &args.variant {
        config.variant = variant.clone();
    }
    let (first, second) = build_requests(args)?;

    let client = VerificationClient::new(&config).context("failed to create verification client")?;
    client.subscribe(Arc::new(ProgressLog));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling verification");
            on_interrupt.cancel();
        }
    });

    let mut outcome = client.verify(&first, &cancel).await;
    let suspended = matches!(
        outcome,
        Some(StepOutcome::Continue {
            next: Step::AwaitSelfie
        })
    );
    if let (true, Some(second)) = (suspended, &second) {
        outcome = client.verify(second, &cancel).await;
    }
    client.dispatcher().flushed().await;

    let Some(outcome) = outcome else {
        eprintln!("Verification cancelled.");
        return Ok(1);
    };

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&outcome).context("failed to serialize outcome")?;
        println!("{rendered}");
    } else {
        println!("{}", summarize(&outcome));
    }
    Ok(exit_code(&outcome))
}

/// Build the request to run first and, with `--defer-selfie`, the selfie
/// resubmission that follows it.
pub fn build_requests(
    args: &VerifyArgs,
) -> Result<(VerificationRequest, Option<VerificationRequest>)> {
    let mut payload = VerificationPayload::new().with_document_front(load_image(&args.front)?);
    if let Some(back) = &args.back {
        payload = payload.with_document_back(load_image(back)?);
    }
    let selfie = args.selfie.as_deref().map(load_image).transpose()?;

    match selfie {
        Some(selfie) if args.defer_selfie => Ok((
            VerificationRequest::document(payload.expect_selfie_later()),
            Some(VerificationRequest::selfie(
                VerificationPayload::new().with_selfie(selfie),
            )),
        )),
        Some(selfie) => Ok((
            VerificationRequest::document(payload.with_selfie(selfie)),
            None,
        )),
        None => Ok((VerificationRequest::document(payload), None)),
    }
}

/// Process exit code for an outcome.
pub fn exit_code(outcome: &StepOutcome) -> u8 {
    match outcome {
        StepOutcome::Success { .. } => 0,
        StepOutcome::RetryableFailure { .. } => 2,
        _ => 1,
    }
}

/// One-paragraph human summary of an outcome.
pub fn summarize(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Success { result } => {
            let mut lines = vec![format!(
                "Verification completed: {}",
                result
                    .verdict()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "no verdict".to_string())
            )];
            if let Some(document) = &result.document {
                let name = [document.holder_first_name(), document.holder_surname()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                if !name.is_empty() {
                    lines.push(format!("Holder: {name}"));
                }
            }
            if let Some(face) = &result.face {
                lines.push(format!("Face match: {}", face.result));
            }
            lines.join("\n")
        }
        StepOutcome::Failure { message } => format!("Verification failed: {message}"),
        StepOutcome::RetryableFailure {
            message,
            retry_step,
        } => {
            let capture = match retry_step {
                RetryStep::RetrySelfieScan => "Retake the selfie.",
                _ => "Scan the document again.",
            };
            format!("Verification failed: {message}\n{capture}")
        }
        StepOutcome::AbortableFailure { message } => format!("Verification aborted: {message}"),
        StepOutcome::Continue { next } => format!("Verification paused at step {next}."),
    }
}
