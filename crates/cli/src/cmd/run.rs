//! Run command implementation.
//!
//! Builds the pipeline configuration from defaults, the environment, and the
//! command line (in increasing precedence), then runs every stage.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use tracing::debug;

use driverstamp_lib::config::PipelineConfig;
use driverstamp_lib::pipeline::{self, PipelineReport};

use crate::output::{format_bytes, format_duration, print_error, print_json, print_stat, print_success};

#[derive(Debug, Args)]
pub struct RunArgs {
  /// Root of the runtime checkout
  #[arg(long, default_value = ".")]
  pub source_root: PathBuf,

  /// Embed this driver build instead of the latest (overrides DRIVER_REVISION)
  #[arg(long)]
  pub revision: Option<String>,

  /// Run ./configure before building (same as setting CONFIGURE_NODE)
  #[arg(long)]
  pub configure: bool,

  /// Parallel build jobs (defaults to the number of logical cores)
  #[arg(short, long)]
  pub jobs: Option<NonZeroUsize>,

  /// Download base URL; file:// URLs read from the local filesystem
  #[arg(long)]
  pub base_url: Option<String>,

  /// Stop after writing the generated source
  #[arg(long)]
  pub skip_build: bool,

  /// Output the run report as JSON
  #[arg(long)]
  pub json: bool,
}

impl RunArgs {
  fn to_config(&self) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::for_source_root(&self.source_root)?.with_env()?;

    if let Some(rev) = &self.revision {
      config.revision_override = Some(rev.clone());
    }
    if self.configure {
      config.configure = true;
    }
    if let Some(jobs) = self.jobs {
      config.jobs = Some(jobs);
    }
    if let Some(url) = &self.base_url {
      config.base_url = url.clone();
    }
    config.skip_build |= self.skip_build;

    debug!(?config, "resolved configuration");
    Ok(config)
  }
}

pub fn cmd_run(args: &RunArgs) -> Result<()> {
  let config = match args.to_config() {
    Ok(config) => config,
    Err(e) => {
      print_error(&format!("Invalid configuration: {:#}", e));
      return Err(e);
    }
  };

  let start = Instant::now();
  let report = match pipeline::run(&config) {
    Ok(report) => report,
    Err(e) => {
      print_error(&format!("Run failed: {}", e));
      return Err(e.into());
    }
  };
  let elapsed = start.elapsed();

  if args.json {
    print_json(&report)?;
  } else {
    print_report(&report);
    println!();
    if report.built() {
      print_success(&format!("Build complete in {}", format_duration(elapsed)));
    } else {
      print_success(&format!("Driver embedded in {} (build skipped)", format_duration(elapsed)));
    }
  }

  Ok(())
}

fn print_report(report: &PipelineReport) {
  print_stat("Build id", report.build_id.as_str());
  print_stat("Platform", &report.platform);
  print_stat(
    "Host",
    &format!("{} ({})", report.host.revision, report.host.date),
  );
  print_stat(
    "Driver",
    &format!("{} ({})", report.driver.revision, report.driver.date),
  );
  print_stat(
    "Payload",
    &format!("{} sha256:{}", format_bytes(report.payload_size as u64), report.payload_sha256),
  );
  print_stat("Source", &report.output_path.display().to_string());
  if let Some(jobs) = report.jobs {
    print_stat("Jobs", &jobs.to_string());
  }
}
