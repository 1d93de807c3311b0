//! File persistence for the long-term set ("breadcrumbs").
//!
//! A snapshot is a single UTF-8 JSON document, rewritten in full on every
//! save:
//!
//! ```json
//! {
//!   "userMetadata": { "name": "..." },
//!   "milestones": [
//!     { "content": "...", "metadata": { "source": "chat" }, "createdAt": 1769929781.25 }
//!   ],
//!   "lastActiveTimestamp": 1769930064.5
//! }
//! ```
//!
//! - Writes go to a temporary file in the target directory which is then
//!   renamed over the target, so readers see the old or the new document and
//!   never a torn one. The temporary file is removed on every error path.
//! - Milestone content is sanitized again on the way out. Saved output never
//!   contains denylisted lines, whoever built the milestones.
//! - A missing file loads as an empty snapshot; an unparseable one is an error.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::LetheConfig;
use crate::error::{LetheError, Result};
use crate::sanitize::Sanitizer;
use crate::types::{MilestoneRecord, UserMetadata, epoch_seconds};

/// Everything that survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Opaque user blob.
    #[serde(default)]
    pub user_metadata: UserMetadata,
    /// The long-term set.
    pub milestones: Vec<MilestoneRecord>,
    /// When the snapshot was written. `None` for a snapshot not yet saved.
    #[serde(default, with = "epoch_seconds::option")]
    pub last_active_timestamp: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Whether there is nothing to restore.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user_metadata.is_empty() && self.milestones.is_empty()
    }
}

/// Borrowed form written to disk.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotDoc<'a> {
    user_metadata: &'a UserMetadata,
    milestones: &'a [MilestoneRecord],
    #[serde(with = "epoch_seconds")]
    last_active_timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PersistenceGateway
// ---------------------------------------------------------------------------

/// Reads and writes [`Snapshot`]s at a fixed path.
///
/// # Usage
///
/// ```no_run
/// # use lethe_core::persistence::PersistenceGateway;
/// let gateway = PersistenceGateway::new("logs/ossuary/breadcrumbs.json");
/// let snapshot = gateway.load()?;
/// gateway.save(&snapshot.user_metadata, &snapshot.milestones)?;
/// # Ok::<(), lethe_core::error::LetheError>(())
/// ```
#[derive(Clone)]
pub struct PersistenceGateway {
    path: PathBuf,
    pretty: bool,
    sanitizer: Sanitizer,
}

impl std::fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("path", &self.path)
            .field("pretty", &self.pretty)
            .finish_non_exhaustive()
    }
}

impl PersistenceGateway {
    /// Gateway for `path` with the default denylist and indented output.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pretty: true,
            sanitizer: Sanitizer::default(),
        }
    }

    /// Gateway for the configured path, denylist and formatting.
    #[must_use]
    pub fn from_config(config: &LetheConfig) -> Self {
        Self {
            path: config.persistence.path.clone(),
            pretty: config.persistence.pretty,
            sanitizer: Sanitizer::new(&config.sanitizer),
        }
    }

    /// Target file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------

    /// Write `user_metadata` and `milestones`, stamped with the current time,
    /// replacing whatever was at the path.
    ///
    /// # Errors
    ///
    /// Returns [`LetheError::Io`] if the directory or file cannot be written,
    /// or [`LetheError::Serialization`] if encoding fails.
    pub fn save(
        &self,
        user_metadata: &UserMetadata,
        milestones: &[MilestoneRecord],
    ) -> Result<()> {
        self.save_at(user_metadata, milestones, Utc::now())
    }

    /// [`Self::save`] with an explicit `lastActiveTimestamp`.
    ///
    /// # Errors
    ///
    /// See [`Self::save`].
    pub fn save_at(
        &self,
        user_metadata: &UserMetadata,
        milestones: &[MilestoneRecord],
        last_active: DateTime<Utc>,
    ) -> Result<()> {
        let start = Instant::now();

        let mut scrubbed = 0usize;
        let clean: Vec<MilestoneRecord> = milestones
            .iter()
            .map(|m| {
                let content = self.sanitizer.sanitize(&m.content);
                if content != m.content {
                    scrubbed += 1;
                }
                MilestoneRecord { content, ..m.clone() }
            })
            .collect();
        if scrubbed > 0 {
            warn!(
                path = %self.path.display(),
                scrubbed,
                "Milestones carried unsanitized content at save time"
            );
        }

        let doc = SnapshotDoc {
            user_metadata,
            milestones: &clean,
            last_active_timestamp: last_active,
        };
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&doc)
        } else {
            serde_json::to_vec(&doc)
        }
        .map_err(|e| LetheError::Serialization(e.to_string()))?;

        self.write_atomic(&bytes)?;

        debug!(
            path = %self.path.display(),
            milestones = clean.len(),
            bytes = bytes.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved snapshot"
        );
        Ok(())
    }

    /// Save an owned snapshot on tokio's blocking pool.
    ///
    /// A snapshot without `last_active_timestamp` is stamped when written.
    ///
    /// # Errors
    ///
    /// See [`Self::save`]; additionally [`LetheError::TaskJoin`] if the
    /// blocking task panics or is cancelled.
    pub async fn save_async(&self, snapshot: Snapshot) -> Result<()> {
        let gateway = self.clone();
        tokio::task::spawn_blocking(move || {
            let last_active = snapshot.last_active_timestamp.unwrap_or_else(Utc::now);
            gateway.save_at(&snapshot.user_metadata, &snapshot.milestones, last_active)
        })
        .await
        .map_err(|e| LetheError::TaskJoin(e.to_string()))?
    }

    fn write_atomic(&self, bytes: &[u8]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| LetheError::io(dir, e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| LetheError::io(dir, e))?;
        tmp.write_all(bytes)
            .map_err(|e| LetheError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| LetheError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| LetheError::io(&self.path, e.error))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------

    /// Read the snapshot. A missing file yields [`Snapshot::default`].
    ///
    /// # Errors
    ///
    /// Returns [`LetheError::MalformedPersistedState`] if the file exists but
    /// does not parse, or [`LetheError::Io`] if it cannot be read.
    pub fn load(&self) -> Result<Snapshot> {
        let start = Instant::now();

        let Some(snapshot) = self.read_existing()? else {
            debug!(path = %self.path.display(), "No snapshot on disk; starting fresh");
            return Ok(Snapshot::default());
        };

        debug!(
            path = %self.path.display(),
            milestones = snapshot.milestones.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded snapshot"
        );
        Ok(snapshot)
    }

    fn read_existing(&self) -> Result<Option<Snapshot>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LetheError::io(&self.path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| LetheError::MalformedPersistedState {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Re-sanitize the milestones of an existing file in place, e.g. after the
    /// denylist grew. Returns how many milestones changed; the file is only
    /// rewritten when that is non-zero. A missing file is a no-op.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`] and [`Self::save`].
    pub fn purge(&self) -> Result<usize> {
        let Some(snapshot) = self.read_existing()? else {
            return Ok(0);
        };

        let changed = snapshot
            .milestones
            .iter()
            .filter(|m| !self.sanitizer.is_clean(&m.content))
            .count();
        if changed == 0 {
            return Ok(0);
        }

        let last_active = snapshot.last_active_timestamp.unwrap_or_else(Utc::now);
        self.save_at(&snapshot.user_metadata, &snapshot.milestones, last_active)?;
        info!(path = %self.path.display(), changed, "Purged snapshot");
        Ok(changed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
