//! Recency × Reinforcement Decay Model
//!
//! Retention worthiness of a working-set entry is modelled as:
//!   S = (1 / (h + 1)) × (1 + ln(r + 1))
//!
//! Where:
//!   S = score (1.0 for a fresh, never-recalled record)
//!   h = age in hours
//!   r = reinforcement count (retrievals / citations since creation)
//!
//! The recency term falls hyperbolically towards zero but never reaches it;
//! the reinforcement term grows logarithmically without bound. The product is
//! therefore always strictly positive.
//!
//! The two policy thresholds consumed by the store live in
//! [`DecayConfig`](crate::config::DecayConfig), not here.

use chrono::{DateTime, Utc};

use crate::types::InteractionRecord;

/// Seconds per hour, the unit the recency term is expressed in.
pub const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Default eviction threshold: below this a working-set entry is dropped.
pub const SURVIVAL_THRESHOLD: f64 = 0.1;

/// Default promotion threshold: at or above this a survivor is promoted.
pub const PROMOTION_THRESHOLD: f64 = 0.8;

/// Score a record of the given age (seconds) and reinforcement count.
///
/// Negative or NaN ages are treated as zero and infinite ages as
/// `f64::MAX`, so the result is always finite and `> 0`.
#[must_use]
pub fn score(age_seconds: f64, reinforcement_count: u32) -> f64 {
    let age = if age_seconds.is_nan() {
        0.0
    } else {
        age_seconds.clamp(0.0, f64::MAX)
    };
    let age_hours = age / SECONDS_PER_HOUR;

    let recency = 1.0 / (age_hours + 1.0);
    let reinforcement = 1.0 + (f64::from(reinforcement_count) + 1.0).ln();

    recency * reinforcement
}

/// Score a working-set record as of `now`.
#[must_use]
pub fn record_score(record: &InteractionRecord, now: DateTime<Utc>) -> f64 {
    score(record.age_seconds(now), record.reinforcement_count())
}

/// Outcome of scoring one record against the policy thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Below the survival threshold.
    Evict,
    /// Survives, not strong enough to promote.
    Retain,
    /// Survives and qualifies for the long-term set.
    Promote,
}

/// Classify a score: `< survival` evicts, `>= promotion` promotes.
#[must_use]
pub fn classify(score: f64, survival_threshold: f64, promotion_threshold: f64) -> Verdict {
    if score < survival_threshold {
        Verdict::Evict
    } else if score >= promotion_threshold {
        Verdict::Promote
    } else {
        Verdict::Retain
    }
}
