pub mod assemble;
pub mod check;
pub mod export_clip;
pub mod full;
pub mod preview;
pub mod render;
pub mod score_cards;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use b50reel_common::clock::format_mmss;
use b50reel_common::config::AppConfig;
use b50reel_project_model::{RenderSettings, Resolution, StyleConfig, VideoConfig};
use b50reel_render_engine::{BatchSummary, EventSink, FfmpegTools, PipelineEvent};

/// Encoder overrides; unset values come from the config file.
#[derive(Debug, Clone, clap::Args)]
pub struct VideoArgs {
    /// Output width
    #[arg(long)]
    pub width: Option<u32>,

    /// Output height
    #[arg(long)]
    pub height: Option<u32>,

    /// Video bitrate in kbps
    #[arg(long)]
    pub bitrate: Option<u32>,

    /// Output frame rate
    #[arg(long)]
    pub fps: Option<u32>,
}

impl VideoArgs {
    pub fn settings(&self, config: &AppConfig) -> anyhow::Result<RenderSettings> {
        let defaults = &config.video;
        let resolution = Resolution::new(
            self.width.unwrap_or(defaults.width),
            self.height.unwrap_or(defaults.height),
        )?;
        Ok(RenderSettings::new(
            resolution,
            self.bitrate.unwrap_or(defaults.bitrate_kbps),
            self.fps.unwrap_or(defaults.fps),
        )?)
    }
}

pub fn tools(config: &AppConfig) -> FfmpegTools {
    FfmpegTools::from_config(&config.tools)
}

/// Load a style file and warn about assets that do not exist.
pub fn load_style(path: &Path) -> anyhow::Result<StyleConfig> {
    let style = StyleConfig::load(path)
        .map_err(|e| anyhow::anyhow!("Failed to load style config: {e}"))?;
    for missing in style.missing_assets() {
        tracing::warn!(path = %missing.display(), "Style asset does not exist");
    }
    Ok(style)
}

pub fn load_video_config(path: &Path) -> anyhow::Result<VideoConfig> {
    VideoConfig::load(path).map_err(|e| anyhow::anyhow!("Failed to load video config: {e}"))
}

/// `dir`, or the configured output root.
pub fn output_dir(config: &AppConfig, dir: Option<PathBuf>) -> PathBuf {
    dir.unwrap_or_else(|| config.output_root.clone())
}

/// Progress line printer for batch and full renders.
pub fn progress_sink() -> EventSink {
    Arc::new(|event: PipelineEvent| match event {
        PipelineEvent::ClipStarted {
            index,
            total,
            clip_id,
        } => {
            println!("  [{}/{}] {}", index + 1, total, clip_id);
        }
        PipelineEvent::ClipProgress { fraction, .. } => {
            print!("\r    {:.1}%  ", fraction * 100.0);
            let _ = std::io::stdout().flush();
        }
        PipelineEvent::ClipFinished {
            status,
            elapsed_secs,
            eta_secs,
            ..
        } => {
            println!(
                "\r    {status} (elapsed {}, ETA {})",
                format_mmss(elapsed_secs),
                format_mmss(eta_secs)
            );
        }
        PipelineEvent::Assembling { strategy, clips } => {
            println!("  Assembling {clips} clips with {strategy}...");
        }
        PipelineEvent::AssemblyProgress { fraction } => {
            print!("\r    {:.1}%  ", fraction * 100.0);
            let _ = std::io::stdout().flush();
        }
        PipelineEvent::Complete { output } => {
            println!("\r  Done: {}", output.display());
        }
        PipelineEvent::Failed { message } => {
            println!("\r  Failed: {message}");
        }
    })
}

pub fn print_summary(summary: &BatchSummary) {
    println!();
    println!("{:<24} {:<8} INFO", "CLIP", "STATUS");
    for entry in &summary.entries {
        println!(
            "{:<24} {:<8} {}",
            entry.clip_id, entry.result.status, entry.result.info
        );
    }
    println!(
        "\n{} rendered, {} skipped, {} failed in {}",
        summary.count(b50reel_render_engine::OperationStatus::Success),
        summary.count(b50reel_render_engine::OperationStatus::Skipped),
        summary.count(b50reel_render_engine::OperationStatus::Error),
        format_mmss(summary.elapsed_secs)
    );
}
