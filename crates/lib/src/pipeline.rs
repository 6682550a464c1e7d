//! End-to-end pipeline.
//!
//! Stages run strictly in order and the first failure aborts the run:
//!
//! 1. resolve the host platform
//! 2. fetch and stage the driver
//! 3. date the host checkout at `HEAD`
//! 4. compose the build id
//! 5. write the embedded source
//! 6. build the runtime (unless skipped)
//!
//! Each stage only sees the outputs of the stages before it. The
//! collaborators that touch the outside world (network, git, child
//! processes) are passed in as trait objects so the whole run can be driven
//! against in-memory stand-ins.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::artifact::{ArtifactMetadata, FetchError, Fetcher, StageError, StageOptions, fetcher_for, stage_artifact};
use crate::backend::{BuildBackend, BuildError, BuildRequest, Parallelism, ProcessBackend, run_build};
use crate::build_id::{BuildId, compose_build_id};
use crate::config::PipelineConfig;
use crate::consts::HOST_REVISION;
use crate::embed::{EmbedError, EmbeddedSource, write_embedded_source};
use crate::platform::{PlatformError, PlatformTag, resolve_platform};
use crate::revision::{GitRepository, HostRevisionInfo, RevisionError, RevisionSource};
use crate::util::hash::ContentHash;

/// Errors that abort a pipeline run, tagged by the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error("failed to set up downloads: {0}")]
  Fetcher(#[from] FetchError),

  #[error("failed to stage driver: {0}")]
  Stage(#[from] StageError),

  #[error("failed to date host revision: {0}")]
  Revision(#[from] RevisionError),

  #[error(transparent)]
  Embed(#[from] EmbedError),

  #[error("build failed: {0}")]
  Build(#[from] BuildError),
}

/// The outside world as seen by one pipeline run.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
  pub fetcher: &'a dyn Fetcher,
  pub revisions: &'a dyn RevisionSource,
  pub backend: &'a dyn BuildBackend,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
  pub platform: String,
  pub build_id: BuildId,
  pub host: HostRevisionInfo,
  pub driver: ArtifactMetadata,
  pub driver_url: String,
  pub payload_size: usize,
  pub payload_sha256: ContentHash,
  pub output_path: PathBuf,
  /// Job count the build ran with; `None` when the build was skipped.
  pub jobs: Option<usize>,
}

impl PipelineReport {
  pub fn built(&self) -> bool {
    self.jobs.is_some()
  }
}

/// Run every stage for `platform` against the given collaborators.
pub fn run_pipeline(
  config: &PipelineConfig,
  platform: PlatformTag,
  deps: Collaborators<'_>,
) -> Result<PipelineReport, PipelineError> {
  info!(%platform, source_root = %config.source_root.display(), "starting pipeline");

  let options = StageOptions {
    base_url: config.base_url.clone(),
    work_dir: config.work_dir.clone(),
  };
  let staged = stage_artifact(deps.fetcher, platform, config.revision_override.as_deref(), &options)?;

  let host = HostRevisionInfo::resolve(deps.revisions, HOST_REVISION)?;
  let build_id = compose_build_id(platform, &host, &staged.metadata);
  info!(build_id = %build_id, "composed build id");

  let source = EmbeddedSource::new(&staged.payload, &build_id);
  write_embedded_source(&config.output_path, &source.render())?;

  let jobs = if config.skip_build {
    info!("skipping build");
    None
  } else {
    let request = BuildRequest {
      source_root: config.source_root.clone(),
      parallelism: Parallelism::resolve(config.jobs),
      configure: config.configure,
    };
    run_build(deps.backend, &request)?;
    Some(request.parallelism.get())
  };

  Ok(PipelineReport {
    platform: platform.to_string(),
    payload_size: source.payload_len(),
    build_id,
    host,
    driver: staged.metadata,
    driver_url: staged.url,
    payload_sha256: staged.digest,
    output_path: config.output_path.clone(),
    jobs,
  })
}

/// Run the pipeline on this host with the real network, git, and build tools.
pub fn run(config: &PipelineConfig) -> Result<PipelineReport, PipelineError> {
  let platform = resolve_platform()?;
  let fetcher = fetcher_for(&config.base_url)?;
  let repo = GitRepository::discover(&config.source_root)?;
  let backend = ProcessBackend;

  run_pipeline(
    config,
    platform,
    Collaborators {
      fetcher: fetcher.as_ref(),
      revisions: &repo,
      backend: &backend,
    },
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::ExitOutcome;
  use crate::embed::decode_octal_literal;
  use crate::util::testutil::{FailingFetcher, FixedRevisions, ScriptedBackend, StaticFetcher, descriptor, tgz};
  use std::num::NonZeroUsize;
  use tempfile::TempDir;

  const PAYLOAD: &[u8] = b"\x7fELF\x00\x01driver\xff";

  struct Fixture {
    _temp: TempDir,
    config: PipelineConfig,
    fetcher: StaticFetcher,
    revisions: FixedRevisions,
    backend: ScriptedBackend,
  }

  impl Fixture {
    fn new(host_timestamp: &str, driver_date: &str) -> Self {
      let temp = TempDir::new().unwrap();
      std::fs::create_dir(temp.path().join("src")).unwrap();

      let mut config = PipelineConfig::new(temp.path());
      config.base_url = "https://downloads.example.com".to_string();
      config.jobs = NonZeroUsize::new(4);

      let archive = tgz(&[
        ("linux-recordreplay.so", PAYLOAD),
        ("linux-recordreplay.json", &descriptor("f00dcafe", driver_date)),
      ]);

      Self {
        _temp: temp,
        config,
        fetcher: StaticFetcher::new(archive),
        revisions: FixedRevisions::default().with(
          "HEAD",
          "1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f9a0b",
          host_timestamp,
        ),
        backend: ScriptedBackend::default(),
      }
    }

    fn deps(&self) -> Collaborators<'_> {
      Collaborators {
        fetcher: &self.fetcher,
        revisions: &self.revisions,
        backend: &self.backend,
      }
    }

    fn run(&self) -> Result<PipelineReport, PipelineError> {
      run_pipeline(&self.config, PlatformTag::Linux, self.deps())
    }

    fn output(&self) -> String {
      std::fs::read_to_string(&self.config.output_path).unwrap()
    }
  }

  #[test]
  fn full_run_embeds_driver_and_builds() {
    let fixture = Fixture::new("2024-01-10T08:00:00+00:00", "20240115");
    let report = fixture.run().unwrap();

    assert_eq!(report.build_id.as_str(), "linux-node-20240115-1a2b3c4d5e6f-f00dcafe");
    assert_eq!(report.payload_size, PAYLOAD.len());
    assert_eq!(report.jobs, Some(4));
    assert!(report.built());
    assert_eq!(
      fixture.fetcher.requested.borrow().as_slice(),
      ["https://downloads.example.com/linux-recordreplay.tgz"]
    );

    let output = fixture.output();
    assert!(output.contains("char gBuildId[] = \"linux-node-20240115-1a2b3c4d5e6f-f00dcafe\";"));
    assert!(output.contains(&format!("int gRecordReplayDriverSize = {};", PAYLOAD.len())));

    let literal = output
      .split("gRecordReplayDriver[] = \"")
      .nth(1)
      .and_then(|rest| rest.split('"').next())
      .unwrap();
    assert_eq!(decode_octal_literal(literal).unwrap(), PAYLOAD);

    let invoked = fixture.backend.invoked.borrow();
    assert_eq!(invoked.len(), 1);
    assert_eq!(invoked[0].to_string(), "make -j4 -C out BUILDTYPE=Release");
  }

  #[test]
  fn later_host_date_wins_after_utc_normalization() {
    // 23:30 at UTC-5 is already the next day in UTC.
    let fixture = Fixture::new("2024-03-01T23:30:00-05:00", "20240115");
    let report = fixture.run().unwrap();
    assert_eq!(report.build_id.as_str(), "linux-node-20240302-1a2b3c4d5e6f-f00dcafe");
  }

  #[test]
  fn reruns_are_byte_identical() {
    let fixture = Fixture::new("2024-01-10T08:00:00+00:00", "20240115");
    fixture.run().unwrap();
    let first = fixture.output();
    fixture.run().unwrap();
    assert_eq!(fixture.output(), first);
  }

  #[test]
  fn work_dir_holds_no_intermediates_afterwards() {
    let fixture = Fixture::new("2024-01-10T08:00:00+00:00", "20240115");
    fixture.run().unwrap();

    let mut leftovers: Vec<String> = std::fs::read_dir(&fixture.config.work_dir)
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
      .collect();
    leftovers.sort();
    assert_eq!(leftovers, ["src"]);
  }

  #[test]
  fn revision_override_selects_pinned_archive() {
    let mut fixture = Fixture::new("2024-01-10T08:00:00+00:00", "20240115");
    fixture.config.revision_override = Some("f00dcafe".to_string());
    fixture.run().unwrap();
    assert_eq!(
      fixture.fetcher.requested.borrow().as_slice(),
      ["https://downloads.example.com/linux-recordreplay-f00dcafe.tgz"]
    );
  }

  #[test]
  fn skip_build_stops_after_embedding() {
    let mut fixture = Fixture::new("2024-01-10T08:00:00+00:00", "20240115");
    fixture.config.skip_build = true;
    let report = fixture.run().unwrap();

    assert!(!report.built());
    assert!(fixture.backend.invoked.borrow().is_empty());
    assert!(fixture.config.output_path.exists());
  }

  #[test]
  fn configure_runs_before_make() {
    let mut fixture = Fixture::new("2024-01-10T08:00:00+00:00", "20240115");
    fixture.config.configure = true;
    fixture.run().unwrap();

    let invoked = fixture.backend.invoked.borrow();
    assert_eq!(invoked.len(), 2);
    assert!(invoked[0].program.ends_with("configure"));
  }

  #[test]
  fn build_failure_aborts_with_exit_code() {
    let fixture = Fixture {
      backend: ScriptedBackend::with_outcomes(&[ExitOutcome::Exited(2)]),
      ..Fixture::new("2024-01-10T08:00:00+00:00", "20240115")
    };
    let err = fixture.run().unwrap_err();
    assert!(matches!(err, PipelineError::Build(BuildError::Failed { code: Some(2), .. })));
    // The source is already written when the build starts.
    assert!(fixture.config.output_path.exists());
  }

  #[test]
  fn fetch_failure_stops_before_anything_is_written() {
    let fixture = Fixture::new("2024-01-10T08:00:00+00:00", "20240115");
    let deps = Collaborators {
      fetcher: &FailingFetcher(404),
      ..fixture.deps()
    };
    let err = run_pipeline(&fixture.config, PlatformTag::Linux, deps).unwrap_err();

    assert!(matches!(err, PipelineError::Stage(StageError::Fetch(FetchError::Status { status: 404, .. }))));
    assert!(!fixture.config.output_path.exists());
    assert!(fixture.backend.invoked.borrow().is_empty());
  }

  #[test]
  fn missing_host_revision_stops_before_embedding() {
    let fixture = Fixture::new("2024-01-10T08:00:00+00:00", "20240115");
    let empty = FixedRevisions::default();
    let deps = Collaborators {
      revisions: &empty,
      ..fixture.deps()
    };
    let err = run_pipeline(&fixture.config, PlatformTag::Linux, deps).unwrap_err();

    assert!(matches!(err, PipelineError::Revision(RevisionError::NotFound { .. })));
    assert!(!fixture.config.output_path.exists());
  }

  #[test]
  fn missing_output_directory_is_an_embed_error() {
    let mut fixture = Fixture::new("2024-01-10T08:00:00+00:00", "20240115");
    fixture.config.output_path = fixture.config.source_root.join("missing").join("driver.cc");
    let err = fixture.run().unwrap_err();
    assert!(matches!(err, PipelineError::Embed(EmbedError::Write { .. })));
    assert!(fixture.backend.invoked.borrow().is_empty());
  }
}
