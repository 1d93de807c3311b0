//! Two-tier memory store: the hot working set and the long-term milestone set.
//!
//! ```text
//! ingest ──▶ ┌──────────────┐  decay pass   ┌────────────────┐
//!            │ Working set  │──────────────▶│ Long-term set  │
//!            │ (flesh, hot) │  copy excerpt │ (bone, durable)│
//!            └──────┬───────┘  when strong  └────────────────┘
//!                   │ score < survival
//!                   ▼
//!                forgotten
//! ```
//!
//! Promotion copies; the source stays in the working set until it decays
//! on its own. The long-term set only grows.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::{DecayConfig, LetheConfig};
use crate::decay::{self, Verdict};
use crate::sanitize::Sanitizer;
use crate::types::{InteractionRecord, MilestoneRecord, UserMetadata};

/// Summary of one decay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromotionReport {
    /// Entries still in the working set after the pass.
    pub retained: usize,
    /// Entries dropped for scoring below the survival threshold.
    pub evicted: usize,
    /// New milestones appended to the long-term set.
    pub promoted: usize,
}

impl PromotionReport {
    /// Whether anything reached the long-term set, i.e. whether a flush is
    /// worth doing.
    #[must_use]
    pub fn promoted_any(&self) -> bool {
        self.promoted > 0
    }
}

/// Owner of both tiers plus the user metadata that travels with them.
///
/// Not thread-safe; callers serialize access (single owner or external lock).
#[derive(Debug)]
pub struct MemoryStore<C = SystemClock> {
    working: Vec<InteractionRecord>,
    long_term: Vec<MilestoneRecord>,
    user_metadata: UserMetadata,
    config: DecayConfig,
    sanitizer: Sanitizer,
    clock: C,
}

impl MemoryStore<SystemClock> {
    /// Store with default policy on the wall clock.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(&LetheConfig::default(), SystemClock)
    }
}

impl<C: Clock> MemoryStore<C> {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: &LetheConfig, clock: C) -> Self {
        Self {
            working: Vec::new(),
            long_term: Vec::new(),
            user_metadata: UserMetadata::new(),
            config: config.decay.clone(),
            sanitizer: Sanitizer::new(&config.sanitizer),
            clock,
        }
    }

    /// Rehydrate the durable parts of a previous session.
    #[must_use]
    pub fn with_state(
        mut self,
        user_metadata: UserMetadata,
        long_term: Vec<MilestoneRecord>,
    ) -> Self {
        self.user_metadata = user_metadata;
        self.long_term = long_term;
        self
    }

    /// Append a record and immediately run a decay pass at the clock's now.
    ///
    /// Duplicate content is accepted; duplicates only collapse at promotion.
    pub fn ingest(&mut self, record: InteractionRecord) -> PromotionReport {
        self.working.push(record);
        self.run_decay_pass(self.clock.now())
    }

    /// Score every working-set entry as of `now`, evict the weak and copy the
    /// strong into the long-term set.
    pub fn run_decay_pass(&mut self, now: DateTime<Utc>) -> PromotionReport {
        let mut report = PromotionReport::default();
        if self.working.is_empty() {
            return report;
        }

        let DecayConfig {
            survival_threshold,
            promotion_threshold,
            milestone_max_chars,
        } = self.config;
        let sanitizer = &self.sanitizer;
        let long_term = &mut self.long_term;

        self.working.retain(|record| {
            let score = decay::record_score(record, now);
            match decay::classify(score, survival_threshold, promotion_threshold) {
                Verdict::Evict => {
                    report.evicted += 1;
                    false
                }
                Verdict::Retain => true,
                Verdict::Promote => {
                    if promote(long_term, sanitizer, milestone_max_chars, record) {
                        report.promoted += 1;
                    }
                    true
                }
            }
        });
        report.retained = self.working.len();

        debug!(
            retained = report.retained,
            evicted = report.evicted,
            promoted = report.promoted,
            long_term = self.long_term.len(),
            "Decay pass complete"
        );
        report
    }

    /// Bump the reinforcement count of every working-set entry matching
    /// `predicate`. Returns how many were reinforced.
    pub fn reinforce<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&InteractionRecord) -> bool,
    {
        let mut hits = 0;
        for record in self.working.iter_mut().filter(|r| predicate(r)) {
            record.reinforce();
            hits += 1;
        }
        hits
    }

    /// The hot tier, in ingestion order.
    #[must_use]
    pub fn working(&self) -> &[InteractionRecord] {
        &self.working
    }

    /// The durable tier, in promotion order.
    #[must_use]
    pub fn long_term(&self) -> &[MilestoneRecord] {
        &self.long_term
    }

    /// User metadata carried through save/load.
    #[must_use]
    pub fn user_metadata(&self) -> &UserMetadata {
        &self.user_metadata
    }

    /// Mutable access to the user metadata.
    pub fn user_metadata_mut(&mut self) -> &mut UserMetadata {
        &mut self.user_metadata
    }

    /// The clock driving [`Self::ingest`].
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The sanitizer used for promotion.
    #[must_use]
    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Active decay policy.
    #[must_use]
    pub fn config(&self) -> &DecayConfig {
        &self.config
    }
}

/// Build the milestone for `record` and append it unless an equal one exists.
fn promote(
    long_term: &mut Vec<MilestoneRecord>,
    sanitizer: &Sanitizer,
    max_chars: usize,
    record: &InteractionRecord,
) -> bool {
    let milestone = MilestoneRecord::new(
        sanitizer.excerpt(&record.content, max_chars),
        record.metadata.clone(),
        record.created_at(),
    );
    if long_term.contains(&milestone) {
        return false;
    }
    long_term.push(milestone);
    true
}
