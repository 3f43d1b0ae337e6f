//! notecast CLI: mix chart audio and encode chart videos with ffmpeg.
//!
//! Usage:
//!   notecast mix --hits LIST --volumes LIST     Mix hit sounds over the main track
//!   notecast render --fps F --bitrate B         Encode a numbered frame sequence
//!   notecast stream --frames DIR ...            Pipe frame images into a live encode
//!   notecast check                              Check the encoder installation

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use notecast_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "notecast",
    about = "Render rhythm-game charts to audio and video with ffmpeg",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the per-user notecast config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mix hit sounds over the main track and compress the result
    Mix {
        /// Workspace directory (defaults to the configured one)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Hit list: offset,clip,offset,clip,... (offsets in seconds)
        #[arg(long, required_unless_present = "hits_file", conflicts_with = "hits_file")]
        hits: Option<String>,

        /// Read the hit list from a file instead
        #[arg(long)]
        hits_file: Option<PathBuf>,

        /// Per-slot volume percentages, comma-separated
        #[arg(long)]
        volumes: Option<String>,
    },

    /// Encode the workspace frame sequence with the mixed track
    Render {
        /// Workspace directory (defaults to the configured one)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Frame rate of the image sequence
        #[arg(long, default_value = "60")]
        fps: f64,

        /// Video bitrate in kilobits, e.g. 8000 or 8000k
        #[arg(long, default_value = "8000k")]
        bitrate: String,

        /// Print render events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Stream frame files into a running encoder
    Stream {
        /// Workspace directory (defaults to the configured one)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Directory of frame images (or .txt files holding data URLs)
        #[arg(long)]
        frames: PathBuf,

        /// Frame width
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Frame height
        #[arg(long, default_value = "1080")]
        height: u32,

        /// Frame rate
        #[arg(long, default_value = "60")]
        fps: f64,

        /// Video bitrate in kilobits
        #[arg(long, default_value = "8000k")]
        bitrate: String,

        /// Output file name inside the workspace
        #[arg(short, long, default_value = "stream.mp4")]
        output: String,
    },

    /// Check that the encoder can be found and started
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };
    config.validate()?;

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    notecast_common::logging::init_logging(&config.logging);

    let ctx = commands::Context::new(config);

    match cli.command {
        Commands::Mix {
            workspace,
            hits,
            hits_file,
            volumes,
        } => commands::mix::run(&ctx, workspace, hits, hits_file, volumes).await,
        Commands::Render {
            workspace,
            fps,
            bitrate,
            json,
        } => commands::render::run(&ctx, workspace, fps, bitrate, json).await,
        Commands::Stream {
            workspace,
            frames,
            width,
            height,
            fps,
            bitrate,
            output,
        } => commands::stream::run(&ctx, workspace, frames, width, height, fps, bitrate, output).await,
        Commands::Check => commands::check::run(&ctx).await,
    }
}
