//! Driver archive extraction.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while unpacking or reading the staged archive contents.
#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("failed to unpack '{path}': {source}")]
  Unpack {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("'{0}' missing from driver archive")]
  MissingFile(String),

  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("malformed driver descriptor '{path}': {source}")]
  Descriptor {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Unpack a `.tgz` archive into `dest`.
///
/// Entries are extracted as-is (no component stripping). Entries that would
/// land outside `dest` are skipped. Returns the paths of the regular files
/// that were written so the caller can remove them afterwards.
pub fn unpack_tar_gz(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
  let unpack_err = |source: std::io::Error| ArchiveError::Unpack {
    path: archive_path.to_path_buf(),
    source,
  };

  let file = File::open(archive_path).map_err(unpack_err)?;
  let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
  let mut unpacked = Vec::new();

  for entry in archive.entries().map_err(unpack_err)? {
    let mut entry = entry.map_err(unpack_err)?;
    let rel_path = entry.path().map_err(unpack_err)?.into_owned();
    let is_file = entry.header().entry_type().is_file();

    if !entry.unpack_in(dest).map_err(unpack_err)? {
      warn!(path = %rel_path.display(), "skipping archive entry outside the destination");
      continue;
    }

    if is_file {
      debug!(path = %rel_path.display(), "unpacked");
      unpacked.push(dest.join(rel_path));
    }
  }

  Ok(unpacked)
}
