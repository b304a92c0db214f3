use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::data::LogLevel;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Keeps a local copy of a remote directory tree in sync")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(long, short, global = true, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    /// Directory holding tree-sync.yaml
    #[clap(long, short, global = true, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Apply a recorded line-delimited stream and print the final tree
    Replay { file: PathBuf },
    /// Follow a live producer, printing the tree after every change
    Follow {
        /// Producer address, overrides the config file
        #[clap(long, short)]
        endpoint: Option<String>,
        /// Consecutive failed connections tolerated before giving up
        #[clap(long, default_value_t = 5)]
        retries: u32,
        #[clap(long, default_value_t = 1000)]
        retry_delay_ms: u64,
    },
    /// Validate the configured watch roots
    WatchCheck,
}
