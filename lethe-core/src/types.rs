//! Core record types: the hot [`InteractionRecord`] and the durable
//! [`MilestoneRecord`].

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Sub-second digits the on-disk timestamp keeps.
const WIRE_SUBSEC_DIGITS: u16 = 6;

/// Drop precision the snapshot file cannot carry, so a saved and reloaded
/// milestone compares equal to the one held in memory.
fn to_wire_precision(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(WIRE_SUBSEC_DIGITS)
}

/// Free-form string tags attached to a record (provenance, speaker, ...).
pub type Metadata = BTreeMap<String, String>;

/// Opaque per-user blob carried through save/load untouched.
pub type UserMetadata = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Working-set record
// ---------------------------------------------------------------------------

/// A single interaction held in the working set.
///
/// `created_at` is fixed at construction, truncated to whole microseconds,
/// and has no setter.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionRecord {
    /// Raw text payload.
    pub content: String,
    /// Free-form tags.
    pub metadata: Metadata,
    created_at: DateTime<Utc>,
    reinforcement_count: u32,
}

impl InteractionRecord {
    /// Create a record ingested at `created_at` with no reinforcement.
    #[must_use]
    pub fn new(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
            created_at: to_wire_precision(created_at),
            reinforcement_count: 0,
        }
    }

    /// Attach a metadata tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Replace all metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Start from a known reinforcement count (e.g. when replaying history).
    #[must_use]
    pub fn with_reinforcement_count(mut self, count: u32) -> Self {
        self.reinforcement_count = count;
        self
    }

    /// When this record was ingested.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// How many times this record was retrieved or cited after creation.
    #[must_use]
    pub fn reinforcement_count(&self) -> u32 {
        self.reinforcement_count
    }

    /// Record one more retrieval. Saturates at `u32::MAX`.
    pub fn reinforce(&mut self) {
        self.reinforcement_count = self.reinforcement_count.saturating_add(1);
    }

    /// Seconds elapsed between creation and `now`, clamped at zero.
    #[must_use]
    pub fn age_seconds(&self, now: DateTime<Utc>) -> f64 {
        let Some(micros) = (now - self.created_at).num_microseconds() else {
            // Overflowed i64 micros: hundreds of millennia either way.
            return if now > self.created_at { f64::MAX } else { 0.0 };
        };
        (micros as f64 / 1_000_000.0).max(0.0)
    }
}

// ---------------------------------------------------------------------------
// Long-term record
// ---------------------------------------------------------------------------

/// A promoted, sanitized excerpt of an interaction.
///
/// Equality is structural over all three fields; there is no identifier, so
/// two interactions whose excerpts, tags and timestamps coincide collapse
/// into one milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneRecord {
    /// Sanitized, length-bounded excerpt.
    pub content: String,
    /// Tags copied from the source interaction.
    #[serde(default)]
    pub metadata: Metadata,
    /// Creation time copied from the source interaction.
    #[serde(with = "epoch_seconds")]
    pub created_at: DateTime<Utc>,
}

impl MilestoneRecord {
    /// Build a milestone from an already-sanitized excerpt. `created_at` is
    /// truncated to whole microseconds.
    #[must_use]
    pub fn new(content: impl Into<String>, metadata: Metadata, created_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            metadata,
            created_at: to_wire_precision(created_at),
        }
    }
}

// ---------------------------------------------------------------------------
// On-disk timestamp encoding
// ---------------------------------------------------------------------------

/// Serde adapter: `DateTime<Utc>` <-> floating-point seconds since the epoch.
///
/// Precision is kept to the microsecond.
pub mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    /// Convert an instant to epoch seconds.
    #[must_use]
    pub fn to_f64(instant: &DateTime<Utc>) -> f64 {
        instant.timestamp_micros() as f64 / 1_000_000.0
    }

    /// Convert epoch seconds back to an instant, if representable.
    #[must_use]
    pub fn from_f64(secs: f64) -> Option<DateTime<Utc>> {
        if !secs.is_finite() {
            return None;
        }
        let micros = (secs * 1_000_000.0).round();
        if micros < i64::MIN as f64 || micros > i64::MAX as f64 {
            return None;
        }
        DateTime::from_timestamp_micros(micros as i64)
    }

    /// Serialize as `f64` seconds.
    ///
    /// # Errors
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(instant: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(to_f64(instant))
    }

    /// Deserialize from `f64` seconds.
    ///
    /// # Errors
    /// Fails when the number is not finite or out of chrono's range.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(d)?;
        from_f64(secs).ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
    }

    /// Same encoding for an optional field.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

        /// Serialize `Some` as `f64` seconds and `None` as null.
        ///
        /// # Errors
        /// Propagates serializer errors.
        pub fn serialize<S: Serializer>(
            instant: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match instant {
                Some(t) => s.serialize_some(&super::to_f64(t)),
                None => s.serialize_none(),
            }
        }

        /// Deserialize an optional `f64` seconds value.
        ///
        /// # Errors
        /// Fails when a present number is not finite or out of range.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<f64>::deserialize(d)? {
                Some(secs) => super::from_f64(secs)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}"))),
                None => Ok(None),
            }
        }
    }
}
