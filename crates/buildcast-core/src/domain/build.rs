//! Build identifiers and the "latest" alias.
//!
//! A build identifier is the name of a catalog directory and encodes the
//! time the build was produced: `dd.MM.yyyy.HHmm`. Each of the four groups
//! only has to contain at least one digit, so `1.2.2024.900` is accepted
//! and means 1 February 2024, 09:00.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::{BuildcastError, Result};

/// Alias resolved by the server to the newest build in the catalog.
pub const LATEST_ALIAS: &str = "latest";

fn build_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)\.(\d+)\.(\d+)$").expect("build number pattern compiles")
    })
}

/// A syntactically valid build identifier.
///
/// The original text is kept verbatim so that a resolved identifier always
/// names an existing catalog entry, even when it is written with leading
/// zeros (`01.01.2024.0900`) or without them (`1.1.2024.900`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BuildIdentifier {
    raw: String,
    day: u32,
    month: u32,
    year: u32,
    hour_minute: u32,
}

impl BuildIdentifier {
    /// Parse `text`, failing with `InvalidBuildNumber` if it does not have
    /// the four-numeric-groups shape.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || BuildcastError::InvalidBuildNumber(text.to_string());
        let caps = build_number_pattern().captures(text).ok_or_else(invalid)?;

        let group = |i: usize| -> Result<u32> {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .ok_or_else(invalid)
        };

        Ok(Self {
            raw: text.to_string(),
            day: group(1)?,
            month: group(2)?,
            year: group(3)?,
            hour_minute: group(4)?,
        })
    }

    /// Whether `text` is a valid build identifier.
    pub fn is_valid(text: &str) -> bool {
        Self::parse(text).is_ok()
    }

    /// The identifier exactly as it was written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// `(year, month, day, hour, minute)`, the chronological sort key.
    pub fn timestamp(&self) -> (u32, u32, u32, u32, u32) {
        (
            self.year,
            self.month,
            self.day,
            self.hour_minute / 100,
            self.hour_minute % 100,
        )
    }

    /// Compare two identifiers as calendar timestamps.
    ///
    /// Identifiers written differently but naming the same minute compare
    /// `Equal`.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.timestamp().cmp(&other.timestamp())
    }
}

impl fmt::Display for BuildIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for BuildIdentifier {
    type Err = BuildcastError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BuildIdentifier {
    type Error = BuildcastError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<BuildIdentifier> for String {
    fn from(id: BuildIdentifier) -> Self {
        id.raw
    }
}

/// Pick the newest valid identifier among `candidates`.
///
/// Invalid names are skipped. On a timestamp tie the candidate seen first
/// wins. Fails with `NoBuildsFound` when no candidate is valid.
pub fn resolve_latest<I, S>(candidates: I) -> Result<BuildIdentifier>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut newest: Option<BuildIdentifier> = None;
    for candidate in candidates {
        let Ok(id) = BuildIdentifier::parse(candidate.as_ref()) else {
            continue;
        };
        match &newest {
            Some(current) if id.compare(current) != Ordering::Greater => {}
            _ => newest = Some(id),
        }
    }
    newest.ok_or(BuildcastError::NoBuildsFound)
}

/// What an install or lookup is aimed at: a concrete build or the alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildTarget {
    Latest,
    Exact(BuildIdentifier),
}

impl BuildTarget {
    /// Parse `"latest"` or a build identifier.
    pub fn parse(text: &str) -> Result<Self> {
        if text == LATEST_ALIAS {
            Ok(BuildTarget::Latest)
        } else {
            BuildIdentifier::parse(text).map(BuildTarget::Exact)
        }
    }

    /// Wire form: `"latest"` or the identifier text.
    pub fn as_str(&self) -> &str {
        match self {
            BuildTarget::Latest => LATEST_ALIAS,
            BuildTarget::Exact(id) => id.as_str(),
        }
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
