use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediascout")]
#[command(author, version, about = "Discover whether media resources contain usable audio or video")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover the streams of one or more media resources, one after another
    Discover {
        /// Files, URIs, dvd://device[@title] or v4l2://device
        #[arg(required = true)]
        locators: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Seconds of data the buffering stage holds before it stops
        /// waiting for other streams
        #[arg(long, value_name = "SECS")]
        max_interleave: Option<f64>,

        /// Give up on a resource after this many milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Wait for all endpoints before failing on an unrecognized stream
        #[arg(long)]
        defer_unrecognized: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Display version information
    Version,
}
