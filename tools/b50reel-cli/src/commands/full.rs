//! Render every clip and assemble the final video.

use std::path::PathBuf;

use b50reel_common::config::AppConfig;
use b50reel_project_model::{RenderJob, SaveKind, TransitionSettings};
use b50reel_render_engine::{render_complete_video, CancelToken, FullVideoRequest};

use super::VideoArgs;

pub struct FullOptions {
    pub video_config: PathBuf,
    pub style: PathBuf,
    pub out: Option<PathBuf>,
    pub username: String,
    pub save_kind: String,
    pub force: bool,
    /// Transitions allowed on the command line.
    pub transition: bool,
    pub trans_time: Option<f64>,
    pub workers: Option<usize>,
    pub video: VideoArgs,
}

pub async fn run(config: &AppConfig, opts: FullOptions) -> anyhow::Result<()> {
    let video_config = super::load_video_config(&opts.video_config)?;
    let style = super::load_style(&opts.style)?;
    let save_kind: SaveKind = opts.save_kind.parse()?;
    let settings = opts.video.settings(config)?;
    let transition = TransitionSettings::new(
        opts.transition && config.video.trans_enable,
        opts.trans_time.unwrap_or(config.video.trans_time),
    )?;
    let job = RenderJob::from_video_config(&video_config, save_kind, settings, transition)?;
    let out = super::output_dir(config, opts.out);

    println!(
        "Rendering {} for {} ({} clips, {}, transitions {})",
        out.display(),
        opts.username,
        job.entries.len(),
        settings.resolution,
        if transition.enabled { "on" } else { "off" }
    );
    let expected = job.expected_duration();
    println!(
        "  Expected length: {}",
        b50reel_common::clock::format_mmss(expected)
    );

    let request = FullVideoRequest {
        username: opts.username,
        job,
        style,
        tools: super::tools(config),
        output_dir: out,
        force: opts.force,
        workers: opts.workers.unwrap_or(config.video.workers),
        only_generate_clips: config.video.only_generate_clips,
    };

    let cancel = CancelToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current clip");
            ctrl_c.cancel();
        }
    });

    let report = render_complete_video(request, Some(super::progress_sink()), Some(cancel)).await?;
    super::print_summary(&report.batch);

    let result = report.result();
    println!("{}: {}", result.status, result.info);
    if !result.is_ok() {
        anyhow::bail!("full video render failed");
    }
    Ok(())
}
