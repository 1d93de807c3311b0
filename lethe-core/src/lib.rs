//! # Lethe Core Library
//!
//! A two-tier memory that forgets.
//!
//! Interactions land in a hot **working set** where they rot unless they are
//! recalled. Every ingestion runs a **decay pass** that scores each entry by
//! recency and reinforcement:
//!
//! - below the survival threshold: forgotten;
//! - at or above the promotion threshold: a sanitized excerpt is copied into
//!   the durable **long-term set** (the original keeps decaying in place).
//!
//! The long-term set and a small user-metadata blob are written to a single
//! JSON document with an atomic replace, and reloaded on startup.
//!
//! ```no_run
//! use lethe_core::{InteractionRecord, Lethe, LetheConfig};
//!
//! let mut lethe = Lethe::open_default(&LetheConfig::default())?;
//! let record = InteractionRecord::new("We named the fox Ember.", chrono::Utc::now());
//! let report = lethe.metabolize(record)?;
//! assert!(report.promoted_any());
//! # Ok::<(), lethe_core::LetheError>(())
//! ```

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod decay;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod sanitize;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LetheConfig;
pub use engine::Lethe;
pub use error::LetheError;
pub use persistence::{PersistenceGateway, Snapshot};
pub use sanitize::{Sanitizer, sanitize};
pub use store::{MemoryStore, PromotionReport};
pub use types::*;
