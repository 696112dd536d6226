//! b50reel CLI: score cards, clip rendering, and highlight-reel assembly.
//!
//! Usage:
//!   b50reel check                      Check external tools
//!   b50reel score-cards <RECORDS>      Render score card images
//!   b50reel render <VIDEO_CONFIG>      Render every clip of a video
//!   b50reel assemble <DIR>             Join rendered clips into one video
//!   b50reel full <VIDEO_CONFIG>        Render and assemble in one go
//!   b50reel preview <VIDEO_CONFIG>     Write a still preview of one entry
//!   b50reel export-clip <VIDEO_CONFIG> Export one clip with a timestamped name

use std::path::PathBuf;

use b50reel_common::config::AppConfig;
use clap::{Parser, Subcommand};

mod commands;

use commands::VideoArgs;

#[derive(Parser)]
#[command(
    name = "b50reel",
    about = "Render rhythm-game best-score highlight reels",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: $XDG_CONFIG_HOME/b50reel/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that ffmpeg, ffprobe and ffmpeg-concat can be started
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a score card PNG for every record
    ScoreCards {
        /// JSON array of score records
        records: PathBuf,

        /// Style configuration
        #[arg(long)]
        style: PathBuf,

        /// Directory for `<clip_id>.png`
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Render every clip of a video configuration
    Render {
        /// Video configuration (`{intro, main, ending}`)
        video_config: PathBuf,

        /// Style configuration
        #[arg(long)]
        style: PathBuf,

        /// Directory for rendered clips
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Save kind: best, ap or custom
        #[arg(long, default_value = "best")]
        save_kind: String,

        /// Re-render clips that already exist
        #[arg(long)]
        force: bool,

        /// Render clips with transition overlap
        #[arg(long)]
        transition: bool,

        /// Transition duration in seconds
        #[arg(long)]
        trans_time: Option<f64>,

        /// Clips rendered concurrently
        #[arg(long)]
        workers: Option<usize>,

        #[command(flatten)]
        video: VideoArgs,
    },

    /// Join the clips listed in a render manifest
    Assemble {
        /// Directory holding rendered clips and render_manifest.json
        dir: PathBuf,

        /// Assembly strategy: xfade, direct or morph
        #[arg(long, default_value = "xfade")]
        strategy: String,

        /// Transition name for the morph strategy
        #[arg(long, default_value = "fade")]
        transition: String,

        /// Transition duration in seconds (default: the rendered overlap)
        #[arg(long)]
        trans_time: Option<f64>,

        /// Fade every clip in and out (direct strategy)
        #[arg(long)]
        fade: bool,

        /// Output file (default: <DIR>/assembled.mp4)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Render every clip and assemble `<username>_B50.mp4`
    Full {
        /// Video configuration (`{intro, main, ending}`)
        video_config: PathBuf,

        /// Style configuration
        #[arg(long)]
        style: PathBuf,

        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Player name used for the output file
        #[arg(long)]
        username: String,

        /// Save kind: best, ap or custom
        #[arg(long, default_value = "best")]
        save_kind: String,

        /// Re-render clips that already exist
        #[arg(long)]
        force: bool,

        /// Join clips without crossfades
        #[arg(long)]
        no_transition: bool,

        /// Transition duration in seconds
        #[arg(long)]
        trans_time: Option<f64>,

        /// Clips rendered concurrently
        #[arg(long)]
        workers: Option<usize>,

        #[command(flatten)]
        video: VideoArgs,
    },

    /// Write a PNG preview of one clip or page
    Preview {
        /// Video configuration (`{intro, main, ending}`)
        video_config: PathBuf,

        /// Style configuration
        #[arg(long)]
        style: PathBuf,

        /// Main clip id
        #[arg(long, conflicts_with_all = ["intro", "ending"])]
        clip: Option<String>,

        /// Intro page index
        #[arg(long, conflicts_with = "ending")]
        intro: Option<usize>,

        /// Ending page index
        #[arg(long)]
        ending: Option<usize>,

        /// Output PNG
        #[arg(short, long)]
        out: PathBuf,

        #[command(flatten)]
        video: VideoArgs,
    },

    /// Render one main clip to `<clip_id>_<timestamp>.mp4`
    ExportClip {
        /// Video configuration (`{intro, main, ending}`)
        video_config: PathBuf,

        /// Style configuration
        #[arg(long)]
        style: PathBuf,

        /// Main clip id
        #[arg(long)]
        clip: String,

        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        video: VideoArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    b50reel_common::logging::init_logging(&logging);

    if let Some(path) = cli.config.as_ref().filter(|p| !p.exists()) {
        tracing::warn!(path = %path.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Check { json } => commands::check::run(&config, json),
        Commands::ScoreCards {
            records,
            style,
            out,
        } => commands::score_cards::run(records, style, out),
        Commands::Render {
            video_config,
            style,
            out,
            save_kind,
            force,
            transition,
            trans_time,
            workers,
            video,
        } => commands::render::run(
            &config,
            commands::render::RenderOptions {
                video_config,
                style,
                out,
                save_kind,
                force,
                transition,
                trans_time,
                workers,
                video,
            },
        ),
        Commands::Assemble {
            dir,
            strategy,
            transition,
            trans_time,
            fade,
            output,
        } => commands::assemble::run(&config, dir, strategy, transition, trans_time, fade, output),
        Commands::Full {
            video_config,
            style,
            out,
            username,
            save_kind,
            force,
            no_transition,
            trans_time,
            workers,
            video,
        } => {
            commands::full::run(
                &config,
                commands::full::FullOptions {
                    video_config,
                    style,
                    out,
                    username,
                    save_kind,
                    force,
                    transition: !no_transition,
                    trans_time,
                    workers,
                    video,
                },
            )
            .await
        }
        Commands::Preview {
            video_config,
            style,
            clip,
            intro,
            ending,
            out,
            video,
        } => commands::preview::run(&config, video_config, style, clip, intro, ending, out, video),
        Commands::ExportClip {
            video_config,
            style,
            clip,
            out,
            video,
        } => commands::export_clip::run(&config, video_config, style, clip, out, video),
    }
}
