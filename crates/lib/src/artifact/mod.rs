//! Driver fetch-and-stage.
//!
//! Downloads the platform's driver archive, unpacks it into a scratch
//! directory under the working directory, reads the payload and its
//! descriptor, and removes the scratch directory again. Only the in-memory
//! payload and the parsed [`ArtifactMetadata`] survive the stage.
//!
//! # File names
//!
//! | file       | name                                                  |
//! |------------|-------------------------------------------------------|
//! | archive    | `{platform}-recordreplay.tgz`                         |
//! | download   | `{platform}-recordreplay-{rev}.tgz` with an override  |
//! | payload    | `{platform}-recordreplay.so`                          |
//! | descriptor | `{platform}-recordreplay.json`                        |

pub mod archive;
pub mod fetch;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::{ARTIFACT_STEM, SCRATCH_PREFIX};
use crate::platform::{PlatformError, PlatformTag};
use crate::revision::RevisionDate;
use crate::util::hash::{ContentHash, hash_bytes};

pub use archive::ArchiveError;
pub use fetch::{FetchError, Fetcher, FileFetcher, HttpFetcher, fetcher_for};

/// Errors that can occur while staging the driver.
#[derive(Debug, Error)]
pub enum StageError {
  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  Archive(#[from] ArchiveError),

  /// Creating, writing to, or removing the scratch directory failed.
  #[error("failed to {action} '{path}': {source}")]
  Io {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Revision and date the driver build was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
  pub revision: String,
  pub date: RevisionDate,
}

/// File names involved in staging the driver for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
  /// Local name of the downloaded archive.
  pub archive: String,
  /// Remote name requested from the server.
  pub download: String,
  pub payload: String,
  pub descriptor: String,
}

impl ArtifactNames {
  /// Names for `platform`, requesting a pinned build when `revision_override` is set.
  ///
  /// The extracted payload keeps the unpinned name whichever build was
  /// requested; the descriptor inside the archive says which revision it
  /// actually is.
  pub fn new(platform: PlatformTag, revision_override: Option<&str>) -> Result<Self, PlatformError> {
    let extension = match platform {
      PlatformTag::MacOs | PlatformTag::Linux => platform.payload_extension(),
      PlatformTag::Windows => {
        return Err(PlatformError::Unsupported {
          os: platform.as_str().to_string(),
        });
      }
    };

    let base = format!("{}-{}", platform, ARTIFACT_STEM);
    let download = match revision_override {
      Some(rev) => format!("{}-{}.tgz", base, rev),
      None => format!("{}.tgz", base),
    };

    Ok(Self {
      archive: format!("{}.tgz", base),
      download,
      payload: format!("{}.{}", base, extension),
      descriptor: format!("{}.json", base),
    })
  }

  /// Full download URL under `base_url`.
  pub fn url(&self, base_url: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), self.download)
  }
}

/// Where and from where to stage the driver.
#[derive(Debug, Clone)]
pub struct StageOptions {
  pub base_url: String,
  /// Directory the scratch directory is created in.
  pub work_dir: PathBuf,
}

/// The driver, held in memory after staging.
#[derive(Debug, Clone)]
pub struct StagedArtifact {
  pub payload: Vec<u8>,
  pub metadata: ArtifactMetadata,
  /// URL the archive was fetched from.
  pub url: String,
  pub digest: ContentHash,
}

/// Fetch, unpack, and read the driver for `platform`.
///
/// The archive is written to and unpacked in a fresh scratch directory under
/// the working directory, and only files extracted from this archive are
/// read back. Files already present in the working directory are never
/// read, overwritten, or removed.
pub fn stage_artifact(
  fetcher: &dyn Fetcher,
  platform: PlatformTag,
  revision_override: Option<&str>,
  options: &StageOptions,
) -> Result<StagedArtifact, StageError> {
  let names = ArtifactNames::new(platform, revision_override)?;
  let url = names.url(&options.base_url);

  info!(url = %url, archive = %names.archive, "fetching driver");
  let bytes = fetcher.fetch(&url)?;

  // Removed on drop.
  let scratch = tempfile::Builder::new()
    .prefix(SCRATCH_PREFIX)
    .tempdir_in(&options.work_dir)
    .map_err(|source| StageError::Io {
      action: "create scratch directory in",
      path: options.work_dir.clone(),
      source,
    })?;
  debug!(path = %scratch.path().display(), "created scratch directory");

  let archive_path = scratch.path().join(&names.archive);
  std::fs::write(&archive_path, &bytes).map_err(|source| StageError::Io {
    action: "write",
    path: archive_path.clone(),
    source,
  })?;

  let unpacked = archive::unpack_tar_gz(&archive_path, scratch.path())?;
  let payload = read_extracted(&unpacked, &scratch.path().join(&names.payload), &names.payload)?;
  let descriptor_path = scratch.path().join(&names.descriptor);
  let descriptor = read_extracted(&unpacked, &descriptor_path, &names.descriptor)?;
  let metadata: ArtifactMetadata =
    serde_json::from_slice(&descriptor).map_err(|source| ArchiveError::Descriptor {
      path: descriptor_path.clone(),
      source,
    })?;

  let scratch_path = scratch.path().to_path_buf();
  scratch.close().map_err(|source| StageError::Io {
    action: "remove",
    path: scratch_path,
    source,
  })?;

  let digest = hash_bytes(&payload);
  info!(
    revision = %metadata.revision,
    date = %metadata.date,
    size = payload.len(),
    sha256 = %digest,
    "staged driver"
  );

  Ok(StagedArtifact {
    payload,
    metadata,
    url,
    digest,
  })
}

/// Read `path` only if this archive actually extracted it.
fn read_extracted(unpacked: &[PathBuf], path: &Path, name: &str) -> Result<Vec<u8>, ArchiveError> {
  if !unpacked.iter().any(|p| p == path) {
    return Err(ArchiveError::MissingFile(name.to_string()));
  }
  std::fs::read(path).map_err(|source| ArchiveError::Read {
    path: path.to_path_buf(),
    source,
  })
}
