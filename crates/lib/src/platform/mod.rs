//! Host platform resolution.
//!
//! The pipeline resolves the platform once with [`resolve_platform`] and
//! threads the resulting [`PlatformTag`] through every later stage.

use std::fmt;

use thiserror::Error;

/// Errors raised while mapping the host to a platform tag.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
  /// The host operating system has no driver builds.
  #[error("platform {os} not supported")]
  Unsupported { os: String },
}

/// Canonical platform tag used in archive names and build ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformTag {
  MacOs,
  Linux,
  /// Declared for naming purposes only; never produced by [`resolve_platform`].
  Windows,
}

impl PlatformTag {
  /// Map an OS identifier (as reported by `std::env::consts::OS`) to a tag.
  ///
  /// Only `macos` and `linux` resolve. Everything else, windows included,
  /// is rejected rather than mapped to a default.
  pub fn from_os(os: &str) -> Result<Self, PlatformError> {
    match os {
      "macos" => Ok(Self::MacOs),
      "linux" => Ok(Self::Linux),
      other => Err(PlatformError::Unsupported { os: other.to_string() }),
    }
  }

  /// Returns the identifier used in archive names and build ids
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::MacOs => "macOS",
      Self::Linux => "linux",
      Self::Windows => "windows",
    }
  }

  /// Shared-library extension of the driver payload on this platform
  pub fn payload_extension(&self) -> &'static str {
    match self {
      Self::MacOs | Self::Linux => "so",
      Self::Windows => "dll",
    }
  }
}

impl fmt::Display for PlatformTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Returns the raw operating system identifier of the running host
pub fn os_name() -> &'static str {
  std::env::consts::OS
}

/// Resolve the platform tag of the running host.
pub fn resolve_platform() -> Result<PlatformTag, PlatformError> {
  PlatformTag::from_os(os_name())
}
