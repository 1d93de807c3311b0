//! Persistent scrubbing of decorative markup.
//!
//! Chat output is littered with UI banners, glyph frames, state markers and
//! divider rules that have no business in long-term memory. [`Sanitizer`]
//! removes them line by line according to a [`SanitizerConfig`] denylist:
//!
//! 1. leading label prefixes (`| `, `Cat Logic:` …) are peeled off, repeatedly;
//! 2. the remaining line is dropped if any [`LineRule`] matches it, or if it is
//!    a divider (a run of divider characters);
//! 3. surviving lines are re-joined and the whole result is trimmed.
//!
//! Every decision is made on the trimmed, prefix-free view of a line and the
//! kept text is exactly that view's source, so running the sanitizer on its
//! own output changes nothing.

use std::sync::LazyLock;

use crate::config::{LineRule, SanitizerConfig};

/// Compiled form of a [`LineRule`], tokens lower-cased once up front.
#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
}

impl Matcher {
    fn compile(rule: &LineRule) -> Option<Self> {
        let m = match rule {
            LineRule::Exact(t) => Self::Exact(peel_ornament(t).to_ascii_lowercase()),
            LineRule::Prefix(t) => Self::Prefix(t.trim().to_ascii_lowercase()),
            LineRule::Suffix(t) => Self::Suffix(t.trim().to_ascii_lowercase()),
            // Contains tokens may carry meaningful spaces (" EOX ").
            LineRule::Contains(t) => Self::Contains(t.to_ascii_lowercase()),
            LineRule::Marker(t) => Self::Contains(format!("{}:", t.trim().to_ascii_lowercase())),
        };
        let token = match &m {
            Self::Exact(t) | Self::Prefix(t) | Self::Suffix(t) | Self::Contains(t) => t,
        };
        // An empty token would match every line.
        (!token.trim().is_empty()).then_some(m)
    }

    /// `lower` is the trimmed line, ASCII-lowercased.
    fn matches(&self, lower: &str) -> bool {
        match self {
            Self::Exact(t) => peel_ornament(lower) == t,
            Self::Prefix(t) => lower.starts_with(t.as_str()),
            Self::Suffix(t) => lower.ends_with(t.as_str()),
            Self::Contains(t) => lower.contains(t.as_str()),
        }
    }
}

/// Strip brackets, stars, glyphs and other non-alphanumerics around a tag.
fn peel_ornament(s: &str) -> &str {
    s.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Deterministic, idempotent line scrubber.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    matchers: Vec<Matcher>,
    /// Lower-cased, longest first so `[cat_logic]:` wins over `[cat_logic]`.
    strip_prefixes: Vec<String>,
    divider_chars: Vec<char>,
    min_divider_len: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(&SanitizerConfig::default())
    }
}

impl Sanitizer {
    /// Compile a denylist. Empty tokens are ignored.
    #[must_use]
    pub fn new(config: &SanitizerConfig) -> Self {
        let matchers = config.line_rules.iter().filter_map(Matcher::compile).collect();

        let mut strip_prefixes: Vec<String> = config
            .strip_prefixes
            .iter()
            .map(|p| p.trim_start().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        strip_prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));

        Self {
            matchers,
            strip_prefixes,
            divider_chars: config.divider_chars.chars().collect(),
            min_divider_len: config.min_divider_len.max(1),
        }
    }

    /// Remove decorative markup from `text`. Never fails; empty in, empty out.
    #[must_use]
    pub fn sanitize(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let kept: Vec<&str> = text
            .split('\n')
            .map(|line| self.strip_prefixes(line))
            .filter(|line| !self.should_drop(line.trim()))
            .collect();

        kept.join("\n").trim().to_string()
    }

    /// Whether `text` is already a fixed point of [`Self::sanitize`].
    #[must_use]
    pub fn is_clean(&self, text: &str) -> bool {
        self.sanitize(text) == text
    }

    /// Sanitize, cut to at most `max_chars` characters, and sanitize again so
    /// a line split by the cut cannot leave debris behind.
    #[must_use]
    pub fn excerpt(&self, text: &str, max_chars: usize) -> String {
        let clean = self.sanitize(text);
        match clean.char_indices().nth(max_chars) {
            Some((cut, _)) => self.sanitize(&clean[..cut]),
            None => clean,
        }
    }

    fn strip_prefixes<'a>(&self, mut line: &'a str) -> &'a str {
        loop {
            let view = line.trim_start();
            let hit = self.strip_prefixes.iter().find(|p| {
                view.get(..p.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(p))
            });
            match hit {
                Some(p) => line = &view[p.len()..],
                None => return line,
            }
        }
    }

    fn should_drop(&self, trimmed: &str) -> bool {
        if trimmed.is_empty() {
            return false;
        }
        if self.is_divider(trimmed) {
            return true;
        }
        let lower = trimmed.to_ascii_lowercase();
        self.matchers.iter().any(|m| m.matches(&lower))
    }

    fn is_divider(&self, trimmed: &str) -> bool {
        trimmed.chars().count() >= self.min_divider_len
            && trimmed.chars().all(|c| self.divider_chars.contains(&c))
    }
}

static DEFAULT_SANITIZER: LazyLock<Sanitizer> = LazyLock::new(Sanitizer::default);

/// Sanitize with the built-in denylist.
#[must_use]
pub fn sanitize(text: &str) -> String {
    DEFAULT_SANITIZER.sanitize(text)
}
