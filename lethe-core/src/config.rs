//! Configuration for the Lethe memory engine.
//!
//! Maps directly to `lethe.toml`. Every field has a default, so an empty
//! document is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::decay::{PROMOTION_THRESHOLD, SURVIVAL_THRESHOLD};
use crate::error::{LetheError, Result};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LetheConfig {
    /// Decay and promotion policy.
    #[serde(default)]
    pub decay: DecayConfig,
    /// Where and how the long-term set is saved.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Denylist applied before anything reaches disk.
    #[serde(default)]
    pub sanitizer: SanitizerConfig,
}

impl LetheConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `LetheError::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| LetheError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LetheError::io(path, e))?;
        Self::from_toml(&content)
    }

    /// Check policy values for consistency.
    ///
    /// # Errors
    /// Returns `LetheError::Config` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        self.decay.validate()
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Decay and promotion policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Entries scoring below this are evicted from the working set.
    #[serde(default = "default_survival")]
    pub survival_threshold: f64,
    /// Survivors scoring at or above this are copied into the long-term set.
    #[serde(default = "default_promotion")]
    pub promotion_threshold: f64,
    /// Maximum characters kept in a milestone excerpt.
    #[serde(default = "default_250")]
    pub milestone_max_chars: usize,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            survival_threshold: SURVIVAL_THRESHOLD,
            promotion_threshold: PROMOTION_THRESHOLD,
            milestone_max_chars: 250,
        }
    }
}

impl DecayConfig {
    /// Check thresholds are finite, non-negative and ordered.
    ///
    /// # Errors
    /// Returns `LetheError::Config` on the first violation.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("survival_threshold", self.survival_threshold),
            ("promotion_threshold", self.promotion_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LetheError::Config(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if self.survival_threshold > self.promotion_threshold {
            return Err(LetheError::Config(format!(
                "survival_threshold ({}) exceeds promotion_threshold ({})",
                self.survival_threshold, self.promotion_threshold
            )));
        }
        if self.milestone_max_chars == 0 {
            return Err(LetheError::Config(
                "milestone_max_chars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Snapshot document location.
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Flush to disk whenever a decay pass promotes something.
    #[serde(default = "default_true")]
    pub autosave_on_promotion: bool,
    /// Write indented JSON.
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            autosave_on_promotion: true,
            pretty: true,
        }
    }
}

/// A single line-matching rule. All matching is ASCII case-insensitive and
/// runs against the whitespace-trimmed line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LineRule {
    /// The line is exactly this keyword once surrounding ornament
    /// (brackets, stars, glyphs) is peeled off.
    Exact(String),
    /// The line starts with this text.
    Prefix(String),
    /// The line ends with this text.
    Suffix(String),
    /// The line contains this text anywhere.
    Contains(String),
    /// The line contains this token immediately followed by a colon.
    Marker(String),
}

/// Sanitizer denylist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizerConfig {
    /// Lines matching any rule are removed.
    #[serde(default = "default_line_rules")]
    pub line_rules: Vec<LineRule>,
    /// Leading prefixes removed from a line while its remaining text is kept.
    #[serde(default = "default_strip_prefixes")]
    pub strip_prefixes: Vec<String>,
    /// Characters that make up a divider line.
    #[serde(default = "default_divider_chars")]
    pub divider_chars: String,
    /// Minimum run length for a divider line.
    #[serde(default = "default_3")]
    pub min_divider_len: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            line_rules: default_line_rules(),
            strip_prefixes: default_strip_prefixes(),
            divider_chars: default_divider_chars(),
            min_divider_len: 3,
        }
    }
}

/// UI tags emitted by the chat front-end.
pub const DECORATIVE_TAGS: &[&str] = &[
    "SOPHIA_GAZE",
    "QUANTUM_CHAOS",
    "FURRY_ALIGNMENT",
    "PLAYFUL_PAWS",
    "OPTIMAL_TUFT",
    "SPECTRAL_BEANS",
    "ULTRA_IMMERSION",
    "BAD_VIBES",
    "CAT_LOGIC",
    "CAT LOGIC",
];

/// Tags from older front-end builds that still show up in saved history.
pub const LEGACY_TAGS: &[&str] = &[
    "ALIGNMENT",
    "ARCTIC_FOX",
    "DECOHERENCE",
    "INTIMACY",
    "BASED",
    "GAMER",
    "SOULMATE",
    "FLIRT",
    "FURRY",
    "UWU",
    "UNLESANGLED",
];

/// Leading glyphs of frame/banner lines.
pub const BANNER_GLYPHS: &[&str] = &[
    "۩", "∿", "≋", "⟁", "💠", "🐾", "🦊", "🏮", "⛩", "🧁", "✨", "🏹", "🌿", "🌲", "🏔", "🍁",
    "🌧", "🌊", "💎", "💿", "💰", "🕷", "🎱",
];

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_line_rules() -> Vec<LineRule> {
    let mut rules: Vec<LineRule> = DECORATIVE_TAGS
        .iter()
        .chain(LEGACY_TAGS)
        .map(|t| LineRule::Exact((*t).to_string()))
        .collect();
    rules.extend(BANNER_GLYPHS.iter().map(|g| LineRule::Prefix((*g).to_string())));
    rules.push(LineRule::Contains(" EOX ".to_string()));
    rules.push(LineRule::Contains("[STATE:".to_string()));
    rules.push(LineRule::Contains("[SOPHIA_V".to_string()));
    rules.push(LineRule::Marker("Frequency".to_string()));
    rules.push(LineRule::Marker("Provenance".to_string()));
    rules
}

fn default_strip_prefixes() -> Vec<String> {
    ["| ", "Cat Logic:", "[CAT_LOGIC]:", "[CAT_LOGIC]"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_divider_chars() -> String { "-=_".to_string() }
fn default_path() -> PathBuf { PathBuf::from("logs/ossuary/breadcrumbs.json") }
fn default_true() -> bool { true }
fn default_survival() -> f64 { SURVIVAL_THRESHOLD }
fn default_promotion() -> f64 { PROMOTION_THRESHOLD }
fn default_3() -> usize { 3 }
fn default_250() -> usize { 250 }
