//! Git-backed [`RevisionSource`].

use std::path::Path;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use tracing::debug;

use super::{RevisionError, RevisionMetadata, RevisionSource};

/// The git repository enclosing a source tree.
pub struct GitRepository {
  repo: gix::Repository,
}

impl GitRepository {
  /// Discover the repository containing `path`, walking up parent directories.
  pub fn discover(path: &Path) -> Result<Self, RevisionError> {
    let repo = gix::discover(path).map_err(|e| RevisionError::Open {
      path: path.display().to_string(),
      message: e.to_string(),
    })?;
    debug!(path = %path.display(), git_dir = %repo.git_dir().display(), "opened repository");
    Ok(Self { repo })
  }
}

impl RevisionSource for GitRepository {
  fn query_revision(&self, rev: &str) -> Result<RevisionMetadata, RevisionError> {
    let not_found = || RevisionError::NotFound { rev: rev.to_string() };

    let id = self.repo.rev_parse_single(rev).map_err(|_| not_found())?;
    let commit = id
      .object()
      .map_err(|_| not_found())?
      .peel_to_commit()
      .map_err(|_| not_found())?;

    let time = commit.time().map_err(|e| RevisionError::Metadata {
      rev: rev.to_string(),
      message: e.to_string(),
    })?;
    let timestamp = iso_strict(time.seconds, time.offset).ok_or_else(|| RevisionError::Metadata {
      rev: rev.to_string(),
      message: format!("commit time {} {:+} is out of range", time.seconds, time.offset),
    })?;

    Ok(RevisionMetadata {
      hash: commit.id.to_string(),
      timestamp,
    })
  }
}

/// Render a git commit time the way `git show --date=iso-strict` does.
fn iso_strict(seconds: i64, offset: i32) -> Option<String> {
  let offset = FixedOffset::east_opt(offset)?;
  let utc = DateTime::from_timestamp(seconds, 0)?;
  Some(utc.with_timezone(&offset).to_rfc3339_opts(SecondsFormat::Secs, false))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::revision::{HostRevisionInfo, resolve_revision_date, resolve_short_hash};
  use crate::util::testutil::{git_commit, git_init, git_output};
  use tempfile::TempDir;

  #[test]
  fn iso_strict_keeps_the_commit_offset() {
    // 2024-03-02T04:30:00Z
    assert_eq!(
      iso_strict(1_709_353_800, -5 * 3600).as_deref(),
      Some("2024-03-01T23:30:00-05:00")
    );
    assert_eq!(iso_strict(1_709_353_800, 0).as_deref(), Some("2024-03-02T04:30:00+00:00"));
  }

  #[test]
  fn non_utc_commit_resolves_to_utc_date() {
    let temp = TempDir::new().unwrap();
    git_init(temp.path());
    git_commit(temp.path(), "late evening in New York", "2024-03-01T23:30:00-05:00");

    let repo = GitRepository::discover(temp.path()).unwrap();
    let metadata = repo.query_revision("HEAD").unwrap();
    assert_eq!(metadata.timestamp, "2024-03-01T23:30:00-05:00");

    let date = resolve_revision_date(&repo, "HEAD").unwrap();
    assert_eq!(date.to_string(), "20240302");
  }

  #[test]
  fn short_hash_matches_git() {
    let temp = TempDir::new().unwrap();
    git_init(temp.path());
    git_commit(temp.path(), "first", "2024-01-01T10:00:00+00:00");

    let repo = GitRepository::discover(temp.path()).unwrap();
    let full = git_output(temp.path(), &["rev-parse", "HEAD"]);
    let short = resolve_short_hash(&repo, "HEAD").unwrap();

    assert_eq!(short.len(), 12);
    assert!(full.starts_with(&short));
  }

  #[test]
  fn resolves_older_revisions_by_reference() {
    let temp = TempDir::new().unwrap();
    git_init(temp.path());
    git_commit(temp.path(), "first", "2023-12-31T20:00:00-08:00");
    git_commit(temp.path(), "second", "2024-02-10T09:00:00+01:00");

    let repo = GitRepository::discover(temp.path()).unwrap();
    assert_eq!(resolve_revision_date(&repo, "HEAD~1").unwrap().to_string(), "20240101");

    let head = HostRevisionInfo::resolve(&repo, "HEAD").unwrap();
    assert_eq!(head.date.to_string(), "20240210");
  }

  #[test]
  fn discovers_repository_from_subdirectory() {
    let temp = TempDir::new().unwrap();
    git_init(temp.path());
    git_commit(temp.path(), "first", "2024-01-01T10:00:00+00:00");
    let nested = temp.path().join("deps").join("v8");
    std::fs::create_dir_all(&nested).unwrap();

    let repo = GitRepository::discover(&nested).unwrap();
    assert!(repo.query_revision("HEAD").is_ok());
  }

  #[test]
  fn unknown_revision_is_not_found() {
    let temp = TempDir::new().unwrap();
    git_init(temp.path());
    git_commit(temp.path(), "first", "2024-01-01T10:00:00+00:00");

    let repo = GitRepository::discover(temp.path()).unwrap();
    assert!(matches!(
      repo.query_revision("no-such-branch"),
      Err(RevisionError::NotFound { .. })
    ));
  }

  #[test]
  fn missing_repository_fails_to_open() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("does-not-exist");
    assert!(matches!(
      GitRepository::discover(&missing),
      Err(RevisionError::Open { .. })
    ));
  }
}
