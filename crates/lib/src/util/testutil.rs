//! Test utilities for driverstamp-lib.
//!
//! Helpers for building driver archives in memory, in-memory stand-ins for
//! the pipeline's collaborators, and throwaway git repositories with
//! controlled commit dates.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::Path;
use std::process::Command;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::artifact::{FetchError, Fetcher};
use crate::backend::{BuildBackend, CommandSpec, ExitOutcome};
use crate::revision::{RevisionError, RevisionMetadata, RevisionSource};

/// Build a gzip-compressed tarball containing the given `(path, contents)` entries.
pub fn tgz(entries: &[(&str, &[u8])]) -> Vec<u8> {
  let encoder = GzEncoder::new(Vec::new(), Compression::default());
  let mut builder = tar::Builder::new(encoder);

  for (path, contents) in entries {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, *contents).unwrap();
  }

  let mut encoder = builder.into_inner().unwrap();
  encoder.flush().unwrap();
  encoder.finish().unwrap()
}

/// A driver descriptor as shipped next to the payload.
pub fn descriptor(revision: &str, date: &str) -> Vec<u8> {
  format!(r#"{{"revision": "{}", "date": "{}"}}"#, revision, date).into_bytes()
}

fn git_cmd(dir: &Path) -> Command {
  let mut cmd = Command::new("git");
  cmd
    .current_dir(dir)
    .env("GIT_CONFIG_NOSYSTEM", "1")
    .env("GIT_CONFIG_GLOBAL", "/dev/null")
    .env("GIT_AUTHOR_NAME", "driverstamp")
    .env("GIT_AUTHOR_EMAIL", "driverstamp@example.com")
    .env("GIT_COMMITTER_NAME", "driverstamp")
    .env("GIT_COMMITTER_EMAIL", "driverstamp@example.com");
  cmd
}

/// Initialize an empty git repository in `dir`.
pub fn git_init(dir: &Path) {
  let status = git_cmd(dir).args(["init", "-q"]).status().unwrap();
  assert!(status.success(), "git init failed");
}

/// Create an empty commit with the given ISO-8601 committer date.
pub fn git_commit(dir: &Path, message: &str, date: &str) {
  let status = git_cmd(dir)
    .args(["commit", "-q", "--allow-empty", "--no-gpg-sign", "-m", message])
    .env("GIT_AUTHOR_DATE", date)
    .env("GIT_COMMITTER_DATE", date)
    .status()
    .unwrap();
  assert!(status.success(), "git commit failed");
}

/// Run git and return its trimmed stdout.
pub fn git_output(dir: &Path, args: &[&str]) -> String {
  let output = git_cmd(dir).args(args).output().unwrap();
  assert!(output.status.success(), "git {:?} failed", args);
  String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Serves one archive for every URL and records what was requested.
pub struct StaticFetcher {
  archive: Vec<u8>,
  pub requested: RefCell<Vec<String>>,
}

impl StaticFetcher {
  pub fn new(archive: Vec<u8>) -> Self {
    Self {
      archive,
      requested: RefCell::new(Vec::new()),
    }
  }
}

impl Fetcher for StaticFetcher {
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    self.requested.borrow_mut().push(url.to_string());
    Ok(self.archive.clone())
  }
}

/// Fails every fetch with the given HTTP status.
pub struct FailingFetcher(pub u16);

impl Fetcher for FailingFetcher {
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    Err(FetchError::Status {
      url: url.to_string(),
      status: self.0,
    })
  }
}

/// Answers revision lookups from a fixed table.
#[derive(Default)]
pub struct FixedRevisions(HashMap<String, RevisionMetadata>);

impl FixedRevisions {
  pub fn with(mut self, rev: &str, hash: &str, timestamp: &str) -> Self {
    self.0.insert(
      rev.to_string(),
      RevisionMetadata {
        hash: hash.to_string(),
        timestamp: timestamp.to_string(),
      },
    );
    self
  }
}

impl RevisionSource for FixedRevisions {
  fn query_revision(&self, rev: &str) -> Result<RevisionMetadata, RevisionError> {
    self
      .0
      .get(rev)
      .cloned()
      .ok_or_else(|| RevisionError::NotFound { rev: rev.to_string() })
  }
}

/// Records every command and answers with scripted outcomes, then success.
#[derive(Default)]
pub struct ScriptedBackend {
  outcomes: RefCell<VecDeque<ExitOutcome>>,
  pub invoked: RefCell<Vec<CommandSpec>>,
}

impl ScriptedBackend {
  pub fn with_outcomes(outcomes: &[ExitOutcome]) -> Self {
    Self {
      outcomes: RefCell::new(outcomes.iter().copied().collect()),
      invoked: RefCell::default(),
    }
  }
}

impl BuildBackend for ScriptedBackend {
  fn invoke(&self, command: &CommandSpec) -> std::io::Result<ExitOutcome> {
    self.invoked.borrow_mut().push(command.clone());
    Ok(self.outcomes.borrow_mut().pop_front().unwrap_or(ExitOutcome::Exited(0)))
  }
}
