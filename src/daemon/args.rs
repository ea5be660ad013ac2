use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
pub struct DaemonArgs {
  /// Stay in the foreground instead of detaching.
  #[arg(long)]
  pub force: bool,
  #[arg(long)]
  pub dir: Option<PathBuf>,
  /// Name prefix of record files. Defaults to the current user name.
  #[arg(long = "base-name")]
  pub base_name: Option<String>,
  /// Size threshold in bytes after which a record file is rotated.
  #[arg(long = "rotate-size")]
  pub rotate_size: Option<u64>,
  /// Poll interval in seconds.
  #[arg(long = "poll-interval")]
  pub poll_interval: Option<u64>,
  /// This option is for debugging purposes only.
  #[arg(long = "log-console")]
  pub log_console: bool,
  #[arg(long = "log-filter")]
  pub log: Option<LevelFilter>
}
