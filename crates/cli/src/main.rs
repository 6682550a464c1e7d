mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::RunArgs;

/// driverstamp - embed the record/replay driver into a runtime checkout and build it
#[derive(Parser)]
#[command(name = "driverstamp")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Fetch the driver, embed it, and build the runtime
  Run(RunArgs),

  /// Show the platform, host revision, and effective configuration
  Info {
    /// Root of the runtime checkout
    #[arg(long, default_value = ".")]
    source_root: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match cli.command {
    Commands::Run(args) => cmd::cmd_run(&args),
    Commands::Info { source_root, json } => cmd::cmd_info(&source_root, json),
  }
}

/// Logs go to stderr so `--json` output on stdout stays machine-readable.
fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}
