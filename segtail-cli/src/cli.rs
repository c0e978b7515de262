use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "segtail",
    version,
    about = "Follow a growing remote segment directory as a local HLS playlist"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "SEGTAIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream a remote directory into a local playlist until interrupted
    Play {
        #[command(flatten)]
        source: SourceArgs,

        /// Seconds between two remote listings
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Maximum number of discovered segments waiting for transfer
        #[arg(long)]
        queue_capacity: Option<usize>,

        /// Transfer attempts per segment
        #[arg(long)]
        retries: Option<u32>,
    },

    /// Write a playlist of the segments currently present and exit
    Snapshot {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print the effective configuration
    Config,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SourceArgs {
    /// Local playlist file to create
    #[arg(short, long)]
    pub output: PathBuf,

    /// Remote directory to follow
    #[arg(short, long, requires = "allocation", conflicts_with = "share_token")]
    pub remote_path: Option<String>,

    /// Allocation holding the remote directory
    #[arg(short, long)]
    pub allocation: Option<String>,

    /// Share token granting access to a remote directory
    #[arg(short = 't', long, required_unless_present = "remote_path")]
    pub share_token: Option<String>,

    /// Directory to list under the share token
    #[arg(long, requires = "share_token")]
    pub lookup_key: Option<String>,

    /// Root directory of the storage backend
    #[arg(long, env = "SEGTAIL_STORAGE_ROOT")]
    pub storage_root: Option<PathBuf>,

    /// Playlist target duration in seconds
    #[arg(short = 'd', long)]
    pub target_duration: Option<u64>,
}
