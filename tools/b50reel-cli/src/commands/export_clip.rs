//! Export a single main clip under a timestamped name.

use std::path::PathBuf;

use b50reel_common::config::AppConfig;
use b50reel_render_engine::render_clip_preview;

use super::VideoArgs;

pub fn run(
    config: &AppConfig,
    video_config: PathBuf,
    style: PathBuf,
    clip: String,
    out: Option<PathBuf>,
    video: VideoArgs,
) -> anyhow::Result<()> {
    let video_config = super::load_video_config(&video_config)?;
    let style = super::load_style(&style)?;
    let settings = video.settings(config)?;
    let clip = video_config
        .find_main(&clip)
        .ok_or_else(|| anyhow::anyhow!("no main clip with id '{clip}'"))?;
    let out = super::output_dir(config, out);

    let tools = super::tools(config);
    tools.require_core()?;

    println!("Exporting {} to {}", clip.id, out.display());
    let outcome = render_clip_preview(&tools, clip, &style, &out, settings);
    println!("{}: {}", outcome.result.status, outcome.result.info);
    if !outcome.result.is_ok() {
        anyhow::bail!("export failed");
    }
    Ok(())
}
