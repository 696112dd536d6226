//! Still preview of one clip or page.

use std::path::PathBuf;

use b50reel_common::config::AppConfig;
use b50reel_render_engine::{write_preview, ClipRenderer, PreviewTarget};

use super::VideoArgs;

#[allow(clippy::too_many_arguments)]
pub fn run(
    config: &AppConfig,
    video_config: PathBuf,
    style: PathBuf,
    clip: Option<String>,
    intro: Option<usize>,
    ending: Option<usize>,
    out: PathBuf,
    video: VideoArgs,
) -> anyhow::Result<()> {
    let target = match (clip, intro, ending) {
        (Some(id), _, _) => PreviewTarget::Clip(id),
        (None, Some(i), _) => PreviewTarget::Intro(i),
        (None, None, Some(i)) => PreviewTarget::Ending(i),
        (None, None, None) => anyhow::bail!("pass one of --clip, --intro or --ending"),
    };

    let video_config = super::load_video_config(&video_config)?;
    let style = super::load_style(&style)?;
    let settings = video.settings(config)?;
    let tools = super::tools(config);
    tools.require_core()?;

    let entry = target.resolve(&video_config)?;
    let renderer = ClipRenderer::new(&tools, &style, settings);
    let path = write_preview(&renderer, &entry, &out)?;
    println!("Preview written: {}", path.display());
    Ok(())
}
