//! Command descriptions and the process-spawning backend.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// Environment variables layered over the inherited environment of one
/// spawned command.
///
/// The overlay is applied to the child only; the parent environment is never
/// touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay(BTreeMap<String, String>);

impl EnvOverlay {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns a copy of this overlay with `key` set to `value`.
  pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.0.insert(key.into(), value.into());
    self
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.0.get(key).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// A command to run: program, arguments, working directory, env overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
  pub program: PathBuf,
  pub args: Vec<String>,
  pub cwd: PathBuf,
  pub env: EnvOverlay,
}

impl CommandSpec {
  pub fn new(program: impl Into<PathBuf>, cwd: &Path) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: cwd.to_path_buf(),
      env: EnvOverlay::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn env(mut self, env: EnvOverlay) -> Self {
    self.env = env;
    self
  }
}

/// Renders as the command line an operator would type to reproduce it.
impl fmt::Display for CommandSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program.display())?;
    for arg in &self.args {
      write!(f, " {}", arg)?;
    }
    Ok(())
  }
}

/// How a backend command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
  Exited(i32),
  /// Terminated without an exit code (e.g. killed by a signal).
  Terminated,
}

impl ExitOutcome {
  pub fn success(&self) -> bool {
    matches!(self, Self::Exited(0))
  }

  pub fn code(&self) -> Option<i32> {
    match self {
      Self::Exited(code) => Some(*code),
      Self::Terminated => None,
    }
  }
}

/// Runs backend commands.
pub trait BuildBackend {
  fn invoke(&self, command: &CommandSpec) -> std::io::Result<ExitOutcome>;
}

/// Spawns commands as child processes with inherited stdio and waits for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessBackend;

impl BuildBackend for ProcessBackend {
  fn invoke(&self, command: &CommandSpec) -> std::io::Result<ExitOutcome> {
    debug!(cwd = %command.cwd.display(), env = ?command.env, "spawning process");

    let status = Command::new(&command.program)
      .args(&command.args)
      .current_dir(&command.cwd)
      .envs(command.env.iter())
      .status()?;

    Ok(match status.code() {
      Some(code) => ExitOutcome::Exited(code),
      None => ExitOutcome::Terminated,
    })
  }
}
