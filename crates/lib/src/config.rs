//! Pipeline configuration.
//!
//! A [`PipelineConfig`] starts from the source root and its defaults, then
//! picks up the environment:
//!
//! | variable               | effect                                         |
//! |------------------------|------------------------------------------------|
//! | `DRIVER_REVISION`      | fetch this driver build instead of the latest  |
//! | `CONFIGURE_NODE`       | any non-empty value runs `./configure` first   |
//! | `DRIVERSTAMP_BASE_URL` | download base URL                              |
//! | `DRIVERSTAMP_JOBS`     | build parallelism instead of the core count    |
//!
//! Empty values count as unset.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::consts::{
  DEFAULT_BASE_URL, EMBEDDED_SOURCE_PATH, ENV_BASE_URL, ENV_CONFIGURE_NODE, ENV_DRIVER_REVISION, ENV_JOBS,
};

/// Errors in the pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("source root '{path}' is not accessible: {source}")]
  SourceRoot {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("{var} must be a positive integer, got '{value}'")]
  InvalidJobs { var: &'static str, value: String },
}

/// Everything one pipeline run needs to know up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
  /// Root of the runtime checkout; also the git repository queried for the host revision.
  pub source_root: PathBuf,
  /// Generated source file.
  pub output_path: PathBuf,
  /// Directory the scratch directory for staging the driver is created in.
  pub work_dir: PathBuf,
  pub revision_override: Option<String>,
  pub configure: bool,
  pub base_url: String,
  pub jobs: Option<NonZeroUsize>,
  /// Stop after writing the generated source.
  pub skip_build: bool,
}

impl PipelineConfig {
  /// Defaults for a source root, without consulting the environment.
  pub fn new(source_root: &Path) -> Self {
    Self {
      source_root: source_root.to_path_buf(),
      output_path: source_root.join(EMBEDDED_SOURCE_PATH),
      work_dir: source_root.to_path_buf(),
      revision_override: None,
      configure: false,
      base_url: DEFAULT_BASE_URL.to_string(),
      jobs: None,
      skip_build: false,
    }
  }

  /// Defaults for `source_root` after resolving it to an absolute path.
  pub fn for_source_root(source_root: &Path) -> Result<Self, ConfigError> {
    let root = dunce::canonicalize(source_root).map_err(|source| ConfigError::SourceRoot {
      path: source_root.to_path_buf(),
      source,
    })?;
    Ok(Self::new(&root))
  }

  /// Apply the environment variables listed in the module docs.
  pub fn with_env(mut self) -> Result<Self, ConfigError> {
    if let Some(rev) = env_value(ENV_DRIVER_REVISION) {
      self.revision_override = Some(rev);
    }
    if env_value(ENV_CONFIGURE_NODE).is_some() {
      self.configure = true;
    }
    if let Some(url) = env_value(ENV_BASE_URL) {
      self.base_url = url;
    }
    if let Some(jobs) = env_value(ENV_JOBS) {
      self.jobs = Some(parse_jobs(ENV_JOBS, &jobs)?);
    }
    Ok(self)
  }
}

/// Parse a job count, rejecting zero and non-numbers.
pub fn parse_jobs(var: &'static str, value: &str) -> Result<NonZeroUsize, ConfigError> {
  value.trim().parse().map_err(|_| ConfigError::InvalidJobs {
    var,
    value: value.to_string(),
  })
}

fn env_value(var: &str) -> Option<String> {
  std::env::var(var).ok().filter(|v| !v.is_empty())
}
