use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(
    name = "pictoh",
    version,
    about = "Offline cache agent for the Pict'Oh picture board",
    long_about = "Drives the Pict'Oh offline agent from the command line.\n\
                  \n\
                  Runs the first-launch warm-up that pre-downloads the picture library\n\
                  and TTS models, fetches single resources through the agent's cache\n\
                  strategies, and inspects or cleans the cache store."
)]
pub struct CliArgs {
    /// TOML configuration file (overrides PICTOH_CONFIG_FILE)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Cache database path (overrides the configured db_path)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pre-download pictures and TTS models into the caches
    WarmUp {
        /// File listing picture URLs or picture names, one per line
        #[arg(long)]
        pictures: Option<PathBuf>,

        /// File listing TTS model URLs, one per line
        #[arg(long)]
        tts: Option<PathBuf>,

        /// Run even if first-launch warm-up already completed
        #[arg(long)]
        force: bool,
    },

    /// Fetch one URL through the agent
    Fetch {
        /// Absolute URL or path relative to the configured origin
        url: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
    },

    /// List cache containers and their entry counts
    Caches,

    /// Remove expired entries from the image caches
    Purge,

    /// Delete caches left behind by previous versions
    Gc,
}
