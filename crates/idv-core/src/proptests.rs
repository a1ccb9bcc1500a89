//! Property-based tests for the domain types.

use proptest::prelude::*;

use crate::outcome::{RetryStep, StepOutcome};
use crate::payload::VerificationPayload;
use crate::result::{strip_request_tag, Verdict};

fn any_retry_step() -> impl Strategy<Value = RetryStep> {
    prop_oneof![
        Just(RetryStep::None),
        Just(RetryStep::RetryDocumentScan),
        Just(RetryStep::RetrySelfieScan),
        Just(RetryStep::Abort),
    ]
}

proptest! {
    /// Verdict words are recognized whatever their case.
    #[test]
    fn verdict_words_ignore_case(
        word in prop::sample::select(vec!["passed", "attention", "failed", "unknown"]),
        mask in prop::collection::vec(any::<bool>(), 9)
    ) {
        let mixed: String = word
            .chars()
            .zip(mask.iter().cycle())
            .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
            .collect();
        prop_assert!(!matches!(Verdict::parse(&mixed), Verdict::Other(_)));
    }

    /// A tagged message always yields the text after the tag.
    #[test]
    fn request_tag_is_removed(id in "[0-9a-f-]{1,36}", text in "[A-Za-z ]{0,40}") {
        let tagged = format!("[{id}] {text}");
        prop_assert_eq!(strip_request_tag(&tagged), text.as_str());
    }

    /// Any combination of non-empty images validates.
    #[test]
    fn non_empty_images_validate(
        front in prop::option::of(prop::collection::vec(any::<u8>(), 1..64)),
        back in prop::option::of(prop::collection::vec(any::<u8>(), 1..64)),
        selfie in prop::collection::vec(any::<u8>(), 1..64)
    ) {
        let mut payload = VerificationPayload::new().with_selfie(selfie);
        if let Some(front) = front {
            payload = payload.with_document_front(front);
        }
        if let Some(back) = back {
            payload = payload.with_document_back(back);
        }
        prop_assert!(payload.validate().is_ok());
    }

    /// The retry step reported by an outcome is the one it was built with.
    #[test]
    fn retryable_outcome_reports_its_step(step in any_retry_step(), message in ".{0,20}") {
        let outcome = StepOutcome::retryable(message, step);
        prop_assert_eq!(outcome.retry_step(), step);
        prop_assert!(outcome.is_failure());
    }
}
