use crate::model::gamemode::Gamemode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Clone)]
#[command(
    display_name = "pp processor",
    author = "osu!",
    long_about = "Computes per-score and per-user performance points from the score history"
)]
pub struct Args {
    /// Gamemode this invocation processes
    #[arg(short, long, env = "PP_MODE", value_enum, default_value = "standard")]
    pub mode: Gamemode,

    /// Path to the configuration file
    #[arg(short, long, env = "PP_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "RUST_LOG",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"],
        help = "Sets the logging verbosity"
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Polls for new scores and newly ranked beatmaps, recomputing affected users
    #[command(name = "monitor_new_scores")]
    MonitorNewScores,

    /// Recomputes every user, resuming from the stored checkpoint
    #[command(name = "process_all_users")]
    ProcessAllUsers {
        /// Starts over from user id 0 instead of the checkpoint
        #[arg(long, action = clap::ArgAction::SetTrue)]
        reprocess: bool,

        /// Number of parallel workers
        #[arg(long, default_value_t = 1)]
        threads: u32
    },

    /// Recomputes the given users only and prints a summary
    #[command(name = "process_users")]
    ProcessUsers {
        /// User ids to process
        #[arg(required = true)]
        users: Vec<String>
    }
}
