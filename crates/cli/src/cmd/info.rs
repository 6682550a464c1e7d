//! Info command implementation.
//!
//! Reports what a run would use without fetching or building anything.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use driverstamp_lib::artifact::ArtifactNames;
use driverstamp_lib::config::PipelineConfig;
use driverstamp_lib::consts::HOST_REVISION;
use driverstamp_lib::platform::{os_name, resolve_platform};
use driverstamp_lib::revision::{GitRepository, HostRevisionInfo};

use crate::output::{print_error, print_info, print_json, print_stat, print_warning};

#[derive(Debug, Serialize)]
struct InfoReport {
  os: &'static str,
  platform: Option<String>,
  driver_url: Option<String>,
  source_root: String,
  output_path: String,
  host: Option<HostRevisionInfo>,
  revision_override: Option<String>,
  configure: bool,
  jobs: Option<usize>,
}

pub fn cmd_info(source_root: &Path, json: bool) -> Result<()> {
  let config = match PipelineConfig::for_source_root(source_root).and_then(PipelineConfig::with_env) {
    Ok(config) => config,
    Err(e) => {
      print_error(&format!("Invalid configuration: {}", e));
      return Err(e.into());
    }
  };

  let platform = resolve_platform().ok();
  let driver_url = platform
    .and_then(|p| ArtifactNames::new(p, config.revision_override.as_deref()).ok())
    .map(|names| names.url(&config.base_url));
  let host = GitRepository::discover(&config.source_root)
    .and_then(|repo| HostRevisionInfo::resolve(&repo, HOST_REVISION));

  if json {
    return print_json(&InfoReport {
      os: os_name(),
      platform: platform.map(|p| p.to_string()),
      driver_url,
      source_root: config.source_root.display().to_string(),
      output_path: config.output_path.display().to_string(),
      host: host.ok(),
      revision_override: config.revision_override,
      configure: config.configure,
      jobs: config.jobs.map(|j| j.get()),
    });
  }

  print_info(&format!("driverstamp v{}", env!("CARGO_PKG_VERSION")));
  println!();
  match platform {
    Some(platform) => print_stat("Platform", platform.as_str()),
    None => print_warning(&format!("platform {} not supported", os_name())),
  }
  if let Some(url) = &driver_url {
    print_stat("Driver", url);
  }
  print_stat("Source", &config.source_root.display().to_string());
  print_stat("Output", &config.output_path.display().to_string());
  match &host {
    Ok(host) => print_stat("Host", &format!("{} ({})", host.revision, host.date)),
    Err(e) => print_warning(&format!("host revision unavailable: {}", e)),
  }
  print_stat("Configure", if config.configure { "yes" } else { "no" });
  if let Some(jobs) = config.jobs {
    print_stat("Jobs", &jobs.to_string());
  }

  Ok(())
}
