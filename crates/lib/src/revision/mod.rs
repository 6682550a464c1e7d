//! Revision dating.
//!
//! Turns a version-control revision into the two pieces a build id needs:
//! the UTC calendar date of the commit and a fixed-length short hash.
//!
//! The commit timestamp is always read with its original offset and
//! normalized to UTC *before* the date is taken. Truncating the local date
//! instead gives the wrong day for commits made late in the evening west of
//! Greenwich (or early in the morning east of it).

pub mod git;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::SHORT_HASH_LEN;

pub use git::GitRepository;

/// Errors that can occur while resolving a revision.
#[derive(Debug, Error)]
pub enum RevisionError {
  /// Failed to open the repository containing the source tree.
  #[error("failed to open repository at '{path}': {message}")]
  Open { path: String, message: String },

  /// The revision could not be resolved to a commit.
  #[error("revision '{rev}' not found in repository")]
  NotFound { rev: String },

  /// The commit exists but its metadata could not be read.
  #[error("failed to read metadata of revision '{rev}': {message}")]
  Metadata { rev: String, message: String },

  /// The commit timestamp could not be normalized to a UTC date.
  #[error("cannot normalize timestamp '{timestamp}' of revision '{rev}' to a UTC date: {message}")]
  DateNormalization {
    rev: String,
    timestamp: String,
    message: String,
  },

  /// The reported hash is shorter than the abbreviation length.
  #[error("hash '{hash}' of revision '{rev}' is too short to abbreviate")]
  ShortHash { rev: String, hash: String },
}

/// Raw commit metadata as reported by a [`RevisionSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionMetadata {
  /// Full hexadecimal commit hash.
  pub hash: String,
  /// Committer timestamp in strict ISO-8601 form, original offset preserved
  /// (e.g. `2024-03-01T23:30:00-05:00`).
  pub timestamp: String,
}

/// Something that can look up commit metadata for a revision reference.
pub trait RevisionSource {
  fn query_revision(&self, rev: &str) -> Result<RevisionMetadata, RevisionError>;
}

/// A UTC calendar date, rendered as `YYYYMMDD`.
///
/// Ordering is chronological, which for the zero-padded rendering is the
/// same as numeric ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "DateField", into = "String")]
pub struct RevisionDate(NaiveDate);

/// A `YYYYMMDD` value that is not a real calendar date.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid revision date '{0}', expected YYYYMMDD")]
pub struct InvalidDate(pub String);

impl RevisionDate {
  /// Wrap a calendar date.
  pub fn new(date: NaiveDate) -> Self {
    Self(date)
  }

  /// Normalize an ISO-8601 timestamp to UTC and keep only the date.
  pub fn from_timestamp(timestamp: &str) -> Result<Self, chrono::ParseError> {
    let parsed = DateTime::parse_from_rfc3339(timestamp)?;
    Ok(Self(parsed.with_timezone(&Utc).date_naive()))
  }

  pub fn date(&self) -> NaiveDate {
    self.0
  }
}

impl FromStr for RevisionDate {
  type Err = InvalidDate;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
      return Err(InvalidDate(s.to_string()));
    }
    NaiveDate::parse_from_str(s, "%Y%m%d")
      .map(Self)
      .map_err(|_| InvalidDate(s.to_string()))
  }
}

impl fmt::Display for RevisionDate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.format("%Y%m%d"))
  }
}

impl From<RevisionDate> for String {
  fn from(date: RevisionDate) -> Self {
    date.to_string()
  }
}

/// Descriptor dates show up both as `"20240115"` and as `20240115`.
#[derive(Deserialize)]
#[serde(untagged)]
enum DateField {
  Text(String),
  Number(u64),
}

impl TryFrom<DateField> for RevisionDate {
  type Error = InvalidDate;

  fn try_from(field: DateField) -> Result<Self, Self::Error> {
    match field {
      DateField::Text(text) => text.parse(),
      DateField::Number(number) => number.to_string().parse(),
    }
  }
}

/// Revision hash and date of the source tree the pipeline runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRevisionInfo {
  /// Abbreviated hash, [`SHORT_HASH_LEN`] characters.
  pub revision: String,
  pub date: RevisionDate,
}

impl HostRevisionInfo {
  /// Resolve both halves with a single metadata lookup.
  pub fn resolve(source: &dyn RevisionSource, rev: &str) -> Result<Self, RevisionError> {
    let metadata = source.query_revision(rev)?;
    let info = Self {
      revision: abbreviate(rev, &metadata.hash)?,
      date: normalize_date(rev, &metadata.timestamp)?,
    };
    debug!(rev, revision = %info.revision, date = %info.date, "resolved host revision");
    Ok(info)
  }
}

/// Resolve a revision to the UTC date of its commit.
pub fn resolve_revision_date(source: &dyn RevisionSource, rev: &str) -> Result<RevisionDate, RevisionError> {
  let metadata = source.query_revision(rev)?;
  normalize_date(rev, &metadata.timestamp)
}

/// Resolve a revision to its [`SHORT_HASH_LEN`]-character abbreviated hash.
pub fn resolve_short_hash(source: &dyn RevisionSource, rev: &str) -> Result<String, RevisionError> {
  let metadata = source.query_revision(rev)?;
  abbreviate(rev, &metadata.hash)
}

fn normalize_date(rev: &str, timestamp: &str) -> Result<RevisionDate, RevisionError> {
  RevisionDate::from_timestamp(timestamp).map_err(|e| RevisionError::DateNormalization {
    rev: rev.to_string(),
    timestamp: timestamp.to_string(),
    message: e.to_string(),
  })
}

fn abbreviate(rev: &str, hash: &str) -> Result<String, RevisionError> {
  hash
    .get(..SHORT_HASH_LEN)
    .map(str::to_string)
    .ok_or_else(|| RevisionError::ShortHash {
      rev: rev.to_string(),
      hash: hash.to_string(),
    })
}
