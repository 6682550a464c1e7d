//! Build trigger.
//!
//! Runs the runtime's own build once the driver has been embedded: an
//! optional `./configure`, then `make -j{N} -C out BUILDTYPE=Release` in the
//! source root. The make invocation carries `RECORD_REPLAY_DONT_RECORD=1` so
//! the freshly built runtime does not record itself when the build executes
//! it.

pub mod process;

use std::num::NonZeroUsize;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::consts::ENV_DONT_RECORD;

pub use process::{BuildBackend, CommandSpec, EnvOverlay, ExitOutcome, ProcessBackend};

/// Errors that can occur while running the build.
#[derive(Debug, Error)]
pub enum BuildError {
  /// The command could not be started at all.
  #[error("failed to spawn `{command}`: {source}")]
  Spawn {
    command: String,
    #[source]
    source: std::io::Error,
  },

  /// The command ran and exited unsuccessfully.
  #[error("`{command}` failed with exit code {}", display_code(.code))]
  Failed { command: String, code: Option<i32> },
}

fn display_code(code: &Option<i32>) -> String {
  code.map_or_else(|| "none (terminated)".to_string(), |c| c.to_string())
}

/// Number of parallel jobs handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parallelism(NonZeroUsize);

impl Parallelism {
  pub fn new(jobs: NonZeroUsize) -> Self {
    Self(jobs)
  }

  /// The explicit override if there is one, otherwise the host's logical core count.
  pub fn resolve(jobs: Option<NonZeroUsize>) -> Self {
    match jobs {
      Some(jobs) => Self(jobs),
      None => Self::detect(),
    }
  }

  /// Logical core count of the host.
  pub fn detect() -> Self {
    match std::thread::available_parallelism() {
      Ok(n) => Self(n),
      Err(e) => {
        warn!(error = %e, "cannot determine core count, building with one job");
        Self(NonZeroUsize::MIN)
      }
    }
  }

  pub fn get(&self) -> usize {
    self.0.get()
  }
}

/// What to build and how.
#[derive(Debug, Clone)]
pub struct BuildRequest {
  pub source_root: PathBuf,
  pub parallelism: Parallelism,
  /// Run `./configure` before building.
  pub configure: bool,
}

/// Overlay applied to the make invocation.
pub fn build_env() -> EnvOverlay {
  EnvOverlay::new().with(ENV_DONT_RECORD, "1")
}

/// Commands [`run_build`] executes for `request`, in order.
pub fn build_commands(request: &BuildRequest) -> Vec<CommandSpec> {
  let root = request.source_root.as_path();
  let mut commands = Vec::with_capacity(2);

  if request.configure {
    commands.push(CommandSpec::new(root.join("configure"), root));
  }

  commands.push(
    CommandSpec::new("make", root)
      .arg(format!("-j{}", request.parallelism.get()))
      .arg("-C")
      .arg("out")
      .arg("BUILDTYPE=Release")
      .env(build_env()),
  );

  commands
}

/// Run the build, stopping at the first command that fails.
pub fn run_build(backend: &dyn BuildBackend, request: &BuildRequest) -> Result<(), BuildError> {
  for command in build_commands(request) {
    run_checked(backend, &command)?;
  }
  Ok(())
}

/// Run one command, logging its command line before it starts.
pub fn run_checked(backend: &dyn BuildBackend, command: &CommandSpec) -> Result<(), BuildError> {
  let command_line = command.to_string();
  info!(cmd = %command_line, cwd = %command.cwd.display(), "running");

  let outcome = backend.invoke(command).map_err(|source| BuildError::Spawn {
    command: command_line.clone(),
    source,
  })?;

  if !outcome.success() {
    return Err(BuildError::Failed {
      command: command_line,
      code: outcome.code(),
    });
  }
  Ok(())
}
