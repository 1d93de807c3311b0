//! The metabolize loop: ingest, decay, promote, flush.
//!
//! [`Lethe`] ties a [`MemoryStore`] to a [`PersistenceGateway`]. Opening it
//! rehydrates the long-term set from disk; every ingested interaction runs a
//! decay pass, and a pass that promotes something triggers a save when
//! `autosave_on_promotion` is on.

use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::LetheConfig;
use crate::error::Result;
use crate::persistence::{PersistenceGateway, Snapshot};
use crate::store::{MemoryStore, PromotionReport};
use crate::types::{InteractionRecord, UserMetadata};

/// A memory store bound to its snapshot file.
#[derive(Debug)]
pub struct Lethe<C = SystemClock> {
    store: MemoryStore<C>,
    gateway: PersistenceGateway,
    autosave: bool,
}

impl Lethe<SystemClock> {
    /// Open with the wall clock.
    ///
    /// # Errors
    /// See [`Lethe::open`].
    pub fn open_default(config: &LetheConfig) -> Result<Self> {
        Self::open(config, SystemClock)
    }
}

impl<C: Clock> Lethe<C> {
    /// Load the configured snapshot (missing file → empty) and build the store.
    ///
    /// # Errors
    ///
    /// Returns `LetheError::Config` for an invalid policy,
    /// `LetheError::MalformedPersistedState` if the snapshot does not parse
    /// (use [`Lethe::fresh`] to start over instead), or `LetheError::Io`.
    pub fn open(config: &LetheConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let gateway = PersistenceGateway::from_config(config);
        let snapshot = gateway.load()?;

        info!(
            path = %gateway.path().display(),
            milestones = snapshot.milestones.len(),
            "Lethe engine opened"
        );

        let store = MemoryStore::new(config, clock)
            .with_state(snapshot.user_metadata, snapshot.milestones);
        Ok(Self {
            store,
            gateway,
            autosave: config.persistence.autosave_on_promotion,
        })
    }

    /// Build an empty engine without reading the snapshot file. The next
    /// flush overwrites whatever is there.
    ///
    /// # Errors
    /// Returns `LetheError::Config` for an invalid policy.
    pub fn fresh(config: &LetheConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: MemoryStore::new(config, clock),
            gateway: PersistenceGateway::from_config(config),
            autosave: config.persistence.autosave_on_promotion,
        })
    }

    /// Ingest one interaction and run a decay pass. Flushes if something was
    /// promoted and autosave is enabled.
    ///
    /// # Errors
    ///
    /// Returns the flush error. The in-memory state already reflects the
    /// ingest and the pass; the caller may retry [`Self::flush`] or carry on
    /// in memory.
    pub fn metabolize(&mut self, record: InteractionRecord) -> Result<PromotionReport> {
        let report = self.store.ingest(record);
        if report.promoted_any() && self.autosave {
            if let Err(e) = self.flush() {
                warn!(error = %e, "Autosave after promotion failed");
                return Err(e);
            }
        }
        Ok(report)
    }

    /// Mark matching working-set entries as recalled once more.
    pub fn reinforce<F>(&mut self, predicate: F) -> usize
    where
        F: FnMut(&InteractionRecord) -> bool,
    {
        self.store.reinforce(predicate)
    }

    /// Save user metadata and the long-term set now.
    ///
    /// # Errors
    /// See [`PersistenceGateway::save`].
    pub fn flush(&self) -> Result<()> {
        self.gateway.save_at(
            self.store.user_metadata(),
            self.store.long_term(),
            self.store.clock().now(),
        )
    }

    /// Save on tokio's blocking pool.
    ///
    /// # Errors
    /// See [`PersistenceGateway::save_async`].
    pub async fn flush_async(&self) -> Result<()> {
        self.gateway.save_async(self.snapshot()).await
    }

    /// Owned copy of the durable state, stamped with the clock's now.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            user_metadata: self.store.user_metadata().clone(),
            milestones: self.store.long_term().to_vec(),
            last_active_timestamp: Some(self.store.clock().now()),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &MemoryStore<C> {
        &self.store
    }

    /// Mutable access to the underlying store.
    pub fn store_mut(&mut self) -> &mut MemoryStore<C> {
        &mut self.store
    }

    /// Mutable access to the user metadata.
    pub fn user_metadata_mut(&mut self) -> &mut UserMetadata {
        self.store.user_metadata_mut()
    }

    /// The persistence gateway.
    #[must_use]
    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::LetheError;
    use chrono::Duration;

    const T0: i64 = 1_769_929_781;

    fn config_in(dir: &std::path::Path) -> LetheConfig {
        let mut config = LetheConfig::default();
        config.persistence.path = dir.join("ossuary").join("breadcrumbs.json");
        config
    }

    #[test]
    fn promotion_triggers_autosave() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        let mut lethe = Lethe::open(&config, ManualClock::at_epoch_seconds(T0)).expect("open");

        let now = lethe.store().clock().now();
        let report = lethe
            .metabolize(InteractionRecord::new("First light over the taiga.", now))
            .expect("metabolize");

        assert!(report.promoted_any());
        let on_disk = lethe.gateway().load().expect("load");
        assert_eq!(on_disk.milestones.len(), 1);
        assert_eq!(on_disk.last_active_timestamp, Some(now));
    }

    #[test]
    fn no_promotion_means_no_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        let mut lethe = Lethe::open(&config, ManualClock::at_epoch_seconds(T0)).expect("open");

        let two_hours_ago = lethe.store().clock().now() - Duration::hours(2);
        let report = lethe
            .metabolize(InteractionRecord::new("meh", two_hours_ago))
            .expect("metabolize");

        assert!(!report.promoted_any());
        assert!(!config.persistence.path.exists());
    }

    #[test]
    fn autosave_can_be_disabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_in(dir.path());
        config.persistence.autosave_on_promotion = false;
        let mut lethe = Lethe::open(&config, ManualClock::at_epoch_seconds(T0)).expect("open");

        let now = lethe.store().clock().now();
        lethe.metabolize(InteractionRecord::new("kept in memory", now)).expect("metabolize");
        assert!(!config.persistence.path.exists());

        lethe.flush().expect("flush");
        assert!(config.persistence.path.exists());
    }

    #[test]
    fn reopen_rehydrates_long_term_and_user_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        {
            let mut lethe = Lethe::open(&config, ManualClock::at_epoch_seconds(T0)).expect("open");
            lethe
                .user_metadata_mut()
                .insert("vibe".to_string(), "calm".to_string());
            let now = lethe.store().clock().now();
            lethe.metabolize(InteractionRecord::new("remember me", now)).expect("metabolize");
        }

        let lethe = Lethe::open(&config, ManualClock::at_epoch_seconds(T0 + 60)).expect("reopen");
        assert!(lethe.store().working().is_empty());
        assert_eq!(lethe.store().long_term().len(), 1);
        assert_eq!(lethe.store().long_term()[0].content, "remember me");
        assert_eq!(
            lethe.store().user_metadata().get("vibe").map(String::as_str),
            Some("calm")
        );
    }

    #[test]
    fn malformed_snapshot_blocks_open_but_not_fresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        std::fs::create_dir_all(config.persistence.path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&config.persistence.path, "{ not json").expect("write");

        let err = Lethe::open(&config, ManualClock::at_epoch_seconds(T0)).expect_err("should fail");
        assert!(matches!(err, LetheError::MalformedPersistedState { .. }));

        let lethe = Lethe::fresh(&config, ManualClock::at_epoch_seconds(T0)).expect("fresh");
        assert!(lethe.store().long_term().is_empty());
    }

    #[test]
    fn failed_autosave_keeps_memory_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").expect("write");
        let mut config = LetheConfig::default();
        config.persistence.path = blocker.join("breadcrumbs.json");

        let mut lethe = Lethe::open(&config, ManualClock::at_epoch_seconds(T0)).expect("open");
        let now = lethe.store().clock().now();
        let err = lethe
            .metabolize(InteractionRecord::new("precious", now))
            .expect_err("should fail");

        assert!(matches!(err, LetheError::Io { .. }));
        assert_eq!(lethe.store().working().len(), 1);
        assert_eq!(lethe.store().long_term().len(), 1);
    }

    #[test]
    fn store_mut_reaches_the_decay_pass() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut lethe = Lethe::fresh(&config_in(dir.path()), ManualClock::at_epoch_seconds(T0))
            .expect("fresh");
        let now = lethe.store().clock().now();
        lethe.metabolize(InteractionRecord::new("short-lived", now)).expect("metabolize");

        lethe.store().clock().advance(Duration::hours(10));
        let later = lethe.store().clock().now();
        let report = lethe.store_mut().run_decay_pass(later);

        assert_eq!(report.evicted, 1);
        assert!(lethe.store().working().is_empty());
        assert_eq!(lethe.store().long_term().len(), 1);
    }

    #[test]
    fn snapshot_is_stamped_with_clock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let lethe = Lethe::fresh(&config_in(dir.path()), ManualClock::at_epoch_seconds(T0))
            .expect("fresh");
        let snap = lethe.snapshot();
        assert_eq!(snap.last_active_timestamp.map(|t| t.timestamp()), Some(T0));
        assert!(snap.is_empty());
    }

    #[tokio::test]
    async fn flush_async_writes_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        let mut lethe = Lethe::fresh(&config, ManualClock::at_epoch_seconds(T0)).expect("fresh");
        lethe
            .user_metadata_mut()
            .insert("name".to_string(), "Test".to_string());

        lethe.flush_async().await.expect("flush");
        let loaded = lethe.gateway().load().expect("load");
        assert_eq!(loaded.user_metadata.get("name").map(String::as_str), Some("Test"));
    }
}
