//! Batch-render every clip of a video configuration.

use std::path::PathBuf;

use b50reel_common::config::AppConfig;
use b50reel_project_model::{RenderJob, SaveKind, TransitionSettings};
use b50reel_render_engine::{render_all, BatchOptions, ClipRenderer};

use super::VideoArgs;

pub struct RenderOptions {
    pub video_config: PathBuf,
    pub style: PathBuf,
    pub out: Option<PathBuf>,
    pub save_kind: String,
    pub force: bool,
    pub transition: bool,
    pub trans_time: Option<f64>,
    pub workers: Option<usize>,
    pub video: VideoArgs,
}

pub fn run(config: &AppConfig, opts: RenderOptions) -> anyhow::Result<()> {
    let video_config = super::load_video_config(&opts.video_config)?;
    let style = super::load_style(&opts.style)?;
    let save_kind: SaveKind = opts.save_kind.parse()?;
    let settings = opts.video.settings(config)?;
    let transition = TransitionSettings::new(
        opts.transition,
        opts.trans_time.unwrap_or(config.video.trans_time),
    )?;
    let job = RenderJob::from_video_config(&video_config, save_kind, settings, transition)?;
    let out = super::output_dir(config, opts.out);

    let tools = super::tools(config);
    tools.require_core()?;

    println!(
        "Rendering {} clips at {} ({} kbps) into {}",
        job.entries.len(),
        settings.resolution,
        settings.bitrate_kbps,
        out.display()
    );

    let renderer = ClipRenderer::new(&tools, &style, settings);
    let options = BatchOptions {
        force: opts.force,
        transition,
        workers: opts.workers.unwrap_or(config.video.workers),
    };
    let sink = super::progress_sink();
    let summary = render_all(&renderer, &job.entries, &out, &options, Some(&sink), None)?;

    super::print_summary(&summary);
    if let Some(manifest) = &summary.manifest_path {
        println!("Manifest: {}", manifest.display());
    }
    if !summary.is_complete() {
        anyhow::bail!("some clips failed:\n{}", summary.failure_report());
    }
    Ok(())
}
