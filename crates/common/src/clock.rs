//! Timestamp utilities for staleness bookkeeping.
//!
//! Every persisted timestamp is ISO 8601, UTC, whole seconds, with a `Z`
//! suffix (`2024-03-01T12:00:00Z`). This module provides:
//! - Parsing and formatting of that representation
//! - Filesystem modify times at the same precision
//! - The per-recording batch clock used to stamp rebuilt outputs

use std::path::Path;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// A persisted modify timestamp.
pub type Timestamp = DateTime<Utc>;

/// Parse a stored timestamp. Empty or unparsable values are treated as unset.
///
/// Accepts both `Z` and explicit `+00:00` offsets; non-UTC offsets are
/// converted to UTC.
pub fn parse_timestamp(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format a timestamp as ISO 8601 with second precision and a `Z` suffix.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.trunc_subsecs(0).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Modify time of a file, truncated to whole seconds. `None` if unreadable.
pub fn file_modified(path: &Path) -> Option<Timestamp> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified).trunc_subsecs(0))
}

/// Current time at stored precision.
pub fn now_truncated() -> Timestamp {
    Utc::now().trunc_subsecs(0)
}

/// Whether `candidate` is strictly newer than `reference`.
///
/// An unset candidate is never newer; an unset reference means "never
/// rendered" and every set candidate counts as newer.
pub fn is_newer(candidate: Option<Timestamp>, reference: Option<Timestamp>) -> bool {
    match (candidate, reference) {
        (Some(c), Some(r)) => c > r,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// One timestamp per recording run.
///
/// All outputs rebuilt for a recording share the same stamp so that later
/// "is anything newer than this" comparisons do not depend on how long the
/// individual rebuilds took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchClock {
    stamp: Timestamp,
}

impl BatchClock {
    /// Capture the current time.
    pub fn start() -> Self {
        Self {
            stamp: now_truncated(),
        }
    }

    /// A clock pinned to a known instant (tests, replays).
    pub fn fixed(stamp: Timestamp) -> Self {
        Self {
            stamp: stamp.trunc_subsecs(0),
        }
    }

    /// The batch timestamp.
    pub fn stamp(&self) -> Timestamp {
        self.stamp
    }
}
