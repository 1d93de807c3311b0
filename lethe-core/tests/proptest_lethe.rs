//! Property-Based Tests for Lethe Core
//!
//! Uses `proptest` to check the scorer, sanitizer and store invariants under
//! random inputs.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use lethe_core::config::LetheConfig;
use lethe_core::decay::{self, score};
use lethe_core::sanitize::{Sanitizer, sanitize};
use lethe_core::{Clock, InteractionRecord, ManualClock, MemoryStore};

const NOW: i64 = 1_769_930_064;

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(NOW, 0).expect("valid")
}

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

/// Lines mixing prose with every kind of noise the denylist knows about.
fn arb_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ,.'!?]{0,40}",
        Just("[SOPHIA_GAZE]".to_string()),
        Just("  cat logic  ".to_string()),
        Just("Frequency: 528Hz".to_string()),
        Just("[STATE: DREAMING]".to_string()),
        Just("\u{06e9} \u{27c1} \u{223f} EOX \u{06e9}".to_string()),
        "[-=_]{1,8}",
        "[ \t]{0,3}\\| [a-z ]{0,20}",
        "(\\| ){1,3}[a-zA-Z:\\-]{0,12}",
        "Cat Logic: [a-z ]{0,12}",
        "[ \t\r]{0,3}",
    ]
}

fn arb_text() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_line(), 0..12).prop_map(|lines| lines.join("\n"))
}

// ---------------------------------------------------------------------------
// Property: score strictly decreases with age
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn score_strictly_decreasing_in_age(
        a1 in 0.0..1.0e9f64,
        delta in 1.0..1.0e9f64,
        r in 0u32..10_000,
    ) {
        let a2 = a1 + delta;
        prop_assert!(score(a1, r) > score(a2, r));
    }
}

// ---------------------------------------------------------------------------
// Property: score never decreases with reinforcement
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn score_non_decreasing_in_reinforcement(
        age in 0.0..1.0e9f64,
        r1 in 0u32..1_000_000,
        bump in 1u32..1_000_000,
    ) {
        let r2 = r1 + bump;
        prop_assert!(score(age, r2) >= score(age, r1));
    }
}

// ---------------------------------------------------------------------------
// Property: score is always positive and finite
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn score_always_positive(age in any::<f64>(), r in any::<u32>()) {
        let s = score(age, r);
        prop_assert!(s > 0.0);
        prop_assert!(s.is_finite());
    }
}

// ---------------------------------------------------------------------------
// Property: sanitize is idempotent
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn sanitize_idempotent_on_noisy_text(text in arb_text()) {
        let once = sanitize(&text);
        prop_assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn sanitize_idempotent_on_arbitrary_strings(text in any::<String>()) {
        let once = sanitize(&text);
        prop_assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn excerpt_is_clean_and_bounded(text in arb_text(), max in 1usize..64) {
        let s = Sanitizer::default();
        let out = s.excerpt(&text, max);
        prop_assert!(out.chars().count() <= max);
        prop_assert!(s.is_clean(&out));
    }
}

// ---------------------------------------------------------------------------
// Property: prose without noise only loses outer whitespace
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn clean_prose_is_preserved(text in "[a-zA-Z][a-zA-Z ,.'!?\n]{0,80}") {
        prop_assert_eq!(sanitize(&text), text.trim());
    }
}

// ---------------------------------------------------------------------------
// Property: decay pass partitions exactly by threshold
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn decay_pass_respects_thresholds(
        records in prop::collection::vec((0i64..200_000, 0u32..50, "[a-z]{1,12}"), 0..40),
    ) {
        let config = LetheConfig::default();
        let mut store = MemoryStore::new(&config, ManualClock::new(now()));
        for (age, r, content) in &records {
            store.ingest(
                // Prefixed so a random word can never equal a denylisted tag.
                InteractionRecord::new(format!("memo {content}"), now() - Duration::seconds(*age))
                    .with_reinforcement_count(*r),
            );
        }
        let before = store.working().to_vec();
        let report = store.run_decay_pass(now());

        for record in store.working() {
            prop_assert!(decay::record_score(record, now()) >= config.decay.survival_threshold);
        }
        prop_assert_eq!(report.retained + report.evicted, before.len());

        // Every survivor at or above the promotion threshold has a milestone.
        for record in store.working() {
            if decay::record_score(record, now()) >= config.decay.promotion_threshold {
                prop_assert!(store
                    .long_term()
                    .iter()
                    .any(|m| m.content == record.content && m.created_at == record.created_at()));
            }
        }

        // Structural duplicates never appear twice.
        let lt = store.long_term();
        for (i, a) in lt.iter().enumerate() {
            prop_assert!(!lt[i + 1..].contains(a));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: the long-term set only grows
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn long_term_is_append_only(steps in prop::collection::vec((0i64..50_000, 0u32..5), 1..30)) {
        let mut store = MemoryStore::new(&LetheConfig::default(), ManualClock::new(now()));
        let mut previous = Vec::new();
        for (i, (advance, r)) in steps.iter().enumerate() {
            store.clock().advance(Duration::seconds(*advance));
            let created_at = store.clock().now() - Duration::seconds(*advance);
            store.ingest(
                InteractionRecord::new(format!("turn {i}"), created_at)
                    .with_reinforcement_count(*r),
            );
            let current = store.long_term().to_vec();
            prop_assert!(current.len() >= previous.len());
            prop_assert_eq!(&current[..previous.len()], previous.as_slice());
            previous = current;
        }
    }
}
