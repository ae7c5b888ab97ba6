use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ffplan")]
#[command(about = "Hardware-aware ffmpeg encoding planner", long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect CPU, GPU generation, render node and available encoders
    ProbeHw {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show codec, bit depth, resolution, duration, bitrate and HDR of a file
    Inspect {
        /// Path to the video file
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Run pre-flight checks on one or more files
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Scan a directory and report the planned decision for each video file
    Scan {
        /// Directory to scan (defaults to current directory)
        directory: Option<PathBuf>,

        /// Write outputs here instead of next to each input
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Output container for derived paths
        #[arg(long, default_value = "mkv")]
        container: String,
    },

    /// Plan one job and print the ffmpeg command without running it
    Plan {
        input: PathBuf,
        output: PathBuf,

        /// Keep this container regardless of the output extension
        #[arg(long)]
        container: Option<String>,

        /// Print the full outcome (decision, log, warnings) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read ffmpeg stderr on stdin and print progress percentages
    Progress {
        /// Source duration in seconds (0 reads it from ffmpeg's Duration header)
        #[arg(long, default_value_t = 0.0)]
        duration: f64,
    },

    /// Show config status and location, or create default config if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}
