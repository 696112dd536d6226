//! Still previews.
//!
//! A preview is frame 0 of the clip as it would be encoded: the same plan,
//! decoder settings and scene are used, so the PNG matches the render.

use std::path::{Path, PathBuf};

use b50reel_common::error::{ReelError, ReelResult};
use b50reel_project_model::{ClipEntry, VideoConfig};
use image::RgbaImage;

use crate::clip::ClipRenderer;
use crate::ffmpeg::FrameReader;

/// Which entry of a video configuration to preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewTarget {
    /// Main clip by id.
    Clip(String),
    /// Intro page by position.
    Intro(usize),
    /// Ending page by position.
    Ending(usize),
}

impl PreviewTarget {
    /// Find the entry this target names.
    pub fn resolve(&self, config: &VideoConfig) -> ReelResult<ClipEntry> {
        let found = match self {
            PreviewTarget::Clip(id) => config.find_main(id).cloned().map(ClipEntry::Main),
            PreviewTarget::Intro(i) => config.intro.get(*i).cloned().map(ClipEntry::Intro),
            PreviewTarget::Ending(i) => config.ending.get(*i).cloned().map(ClipEntry::Ending),
        };
        found.ok_or_else(|| ReelError::config(format!("no entry for preview target {self:?}")))
    }
}

/// Composite frame 0 of `entry`.
pub fn render_preview_frame(renderer: &ClipRenderer<'_>, entry: &ClipEntry) -> ReelResult<RgbaImage> {
    let plan = renderer.plan(entry, 0.0)?;
    let mut reader = FrameReader::spawn(renderer.tools(), &plan.decode)?;
    let frame = match reader.next_frame() {
        Ok(frame) => frame,
        Err(e) => {
            let _ = reader.finish();
            return Err(e);
        }
    };
    // The decoder is stopped early on purpose.
    let _ = reader.finish();

    let frame = frame.ok_or_else(|| {
        ReelError::invalid_asset(&plan.decode.input, "decoder produced no frames")
    })?;
    Ok(plan.scene.render_frame(Some(&frame), 0.0))
}

/// Render the preview of `entry` as a PNG at `path`.
pub fn write_preview(
    renderer: &ClipRenderer<'_>,
    entry: &ClipEntry,
    path: &Path,
) -> ReelResult<PathBuf> {
    let frame = render_preview_frame(renderer, entry)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    frame
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| ReelError::invalid_asset(path, format!("failed to write preview: {e}")))?;
    tracing::info!(clip_id = entry.id(), path = %path.display(), "Preview written");
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use b50reel_project_model::{MainClipConfig, PageConfig};

    fn config() -> VideoConfig {
        VideoConfig {
            intro: vec![PageConfig {
                id: "intro_1".to_string(),
                duration: 3.0,
                text: "hello".to_string(),
            }],
            main: vec![MainClipConfig {
                id: "clip_1".to_string(),
                clip_name: "Clip_1".to_string(),
                achievement_title: String::new(),
                song_id: 1,
                level_index: 3,
                chart_type: "DX".to_string(),
                main_image: PathBuf::from("clip_1.png"),
                video: PathBuf::from("clip_1_source.mp4"),
                start: 0.0,
                end: 5.0,
                text: String::new(),
            }],
            ending: vec![],
        }
    }

    #[test]
    fn test_preview_target_resolves_entries() {
        let config = config();
        let clip = PreviewTarget::Clip("clip_1".to_string()).resolve(&config).unwrap();
        assert_eq!(clip.id(), "clip_1");
        let intro = PreviewTarget::Intro(0).resolve(&config).unwrap();
        assert_eq!(intro.id(), "intro_1");
    }

    #[test]
    fn test_unknown_target_is_config_error() {
        let err = PreviewTarget::Ending(0).resolve(&config()).unwrap_err();
        assert!(matches!(err, ReelError::Config { .. }));
        assert!(PreviewTarget::Clip("nope".to_string()).resolve(&config()).is_err());
    }
}
