// ABOUTME: Command-line arguments for the threadbridge binary.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "threadbridge",
    version,
    about = "Answer Slack threads with codex exec over Socket Mode"
)]
pub struct Cli {
    /// Path to the local config file, merged over ~/.codex/config.toml
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}
