//! Build identifier composition.
//!
//! A build id has the form
//!
//! ```text
//! {platform}-node-{date}-{host revision}-{driver revision}
//! ```
//!
//! where `date` is the later of the host and driver revision dates, so a new
//! commit on either side produces a new id. Composition is a pure function of
//! its inputs: rerunning against the same checkout and the same driver build
//! yields the same id byte for byte.
//!
//! Other runtimes and the backend compute the same id independently; the
//! format must stay in sync with them.

use std::fmt;

use serde::Serialize;

use crate::artifact::ArtifactMetadata;
use crate::platform::PlatformTag;
use crate::revision::{HostRevisionInfo, RevisionDate};

/// Identifier embedded into the runtime and used to key its builds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BuildId(String);

impl BuildId {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for BuildId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Compose the build id for a runtime checkout and the driver embedded in it.
pub fn compose_build_id(platform: PlatformTag, host: &HostRevisionInfo, artifact: &ArtifactMetadata) -> BuildId {
  let date = newest(host.date, artifact.date);
  BuildId(format!(
    "{}-node-{}-{}-{}",
    platform, date, host.revision, artifact.revision
  ))
}

/// Host date on ties; the two render identically then anyway.
fn newest(host: RevisionDate, artifact: RevisionDate) -> RevisionDate {
  if host >= artifact { host } else { artifact }
}
