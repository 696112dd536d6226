//! Per-clip rendering.
//!
//! A clip is rendered by streaming: an ffmpeg decoder emits letterboxed RGBA
//! frames of the scene's video window, each frame is composited in-process,
//! and an ffmpeg encoder muxes the result with audio into
//! `<clip_id>.part.mp4`. The part file is renamed to its final name only
//! after the encoder exits cleanly.

use std::path::{Path, PathBuf};

use b50reel_common::clock::timestamp_suffix;
use b50reel_common::error::{ReelError, ReelResult};
use b50reel_project_model::{
    ClipEntry, MainClipConfig, PageConfig, RenderSettings, StyleConfig, WindowFit,
};

use crate::compositor::ClipScene;
use crate::ffmpeg::{
    probe_media, AudioSource, DecodeSpec, EncodeSpec, FfmpegTools, FrameReader, FrameWriter,
};
use crate::outcome::OperationResult;
use crate::text::FontCache;

/// Fade applied to looping page music at both ends.
const PAGE_AUDIO_FADE_SECS: f64 = 1.0;

/// A clip with every input resolved and validated.
#[derive(Debug, Clone)]
pub struct ClipPlan {
    pub clip_id: String,
    pub scene: ClipScene,
    pub decode: DecodeSpec,
    pub audio: AudioSource,
    /// Length of the encoded clip, including any transition overlap.
    pub duration_secs: f64,
}

impl ClipPlan {
    pub fn total_frames(&self, fps: u32) -> u64 {
        ((self.duration_secs * fps as f64).round() as u64).max(1)
    }
}

/// Result of rendering one clip entry.
#[derive(Debug, Clone)]
pub struct ClipRenderOutcome {
    pub clip_id: String,
    pub result: OperationResult,
    pub output: PathBuf,
    /// Duration of the file on disk, when known.
    pub duration_secs: Option<f64>,
}

/// Renders clip entries with shared tools, style and encoder settings.
#[derive(Debug, Clone)]
pub struct ClipRenderer<'a> {
    tools: &'a FfmpegTools,
    style: &'a StyleConfig,
    settings: RenderSettings,
    fonts: FontCache,
}

impl<'a> ClipRenderer<'a> {
    pub fn new(tools: &'a FfmpegTools, style: &'a StyleConfig, settings: RenderSettings) -> Self {
        Self {
            tools,
            style,
            settings,
            fonts: FontCache::new(),
        }
    }

    /// Share an existing font cache.
    pub fn with_fonts(mut self, fonts: FontCache) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn tools(&self) -> &FfmpegTools {
        self.tools
    }

    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    /// Resolve sources, fit the time window and build the scene.
    ///
    /// `overlap` extra seconds are added for transitions.
    pub fn plan(&self, entry: &ClipEntry, overlap: f64) -> ReelResult<ClipPlan> {
        match entry {
            ClipEntry::Main(clip) => self.plan_main(clip, overlap),
            ClipEntry::Intro(page) | ClipEntry::Ending(page) => self.plan_page(page, overlap),
        }
    }

    fn plan_main(&self, clip: &MainClipConfig, overlap: f64) -> ReelResult<ClipPlan> {
        let info = probe_media(self.tools, &clip.video)?;

        let window = match clip.window().clamp_to(info.duration_secs) {
            WindowFit::Fitted {
                window,
                adjustments,
            } => {
                for note in &adjustments {
                    tracing::warn!(clip_id = %clip.id, "Time window adjusted: {note}");
                }
                window
            }
            WindowFit::OutOfRange {
                start,
                source_duration,
            } => {
                return Err(ReelError::time_window(format!(
                    "{}: start {start:.3}s is not before the end of {} ({source_duration:.3}s)",
                    clip.id,
                    clip.video.display()
                )));
            }
        };
        let window = if overlap > 0.0 {
            window.extend_for_overlap(overlap, info.duration_secs)
        } else {
            window
        };

        let scene = ClipScene::main(clip, self.style, self.settings.resolution, &self.fonts)?;
        let video = scene.video_window();
        let audio = if info.has_audio {
            AudioSource::Clip {
                path: clip.video.clone(),
                start_secs: window.start,
            }
        } else {
            AudioSource::Silence
        };

        Ok(ClipPlan {
            clip_id: clip.id.clone(),
            decode: DecodeSpec {
                input: clip.video.clone(),
                start_secs: window.start,
                duration_secs: window.duration(),
                width: video.width,
                height: video.height,
                fps: self.settings.fps,
                loop_input: false,
            },
            scene,
            audio,
            duration_secs: window.duration(),
        })
    }

    fn plan_page(&self, page: &PageConfig, overlap: f64) -> ReelResult<ClipPlan> {
        if !(page.duration.is_finite() && page.duration > 0.0) {
            return Err(ReelError::time_window(format!(
                "{}: page duration {} must be positive",
                page.id, page.duration
            )));
        }
        let background = &self.style.asset_paths.intro_video_bg;
        probe_media(self.tools, background)?;

        let audio = match &self.style.asset_paths.intro_bgm {
            Some(bgm) if bgm.exists() => AudioSource::Loop {
                path: bgm.clone(),
                fade_secs: PAGE_AUDIO_FADE_SECS,
            },
            Some(bgm) => return Err(ReelError::missing(bgm)),
            None => AudioSource::Silence,
        };

        let scene = ClipScene::page(page, self.style, self.settings.resolution, &self.fonts)?;
        let video = scene.video_window();
        let duration_secs = page.duration + overlap.max(0.0);

        Ok(ClipPlan {
            clip_id: page.id.clone(),
            decode: DecodeSpec {
                input: background.clone(),
                start_secs: 0.0,
                duration_secs,
                width: video.width,
                height: video.height,
                fps: self.settings.fps,
                loop_input: true,
            },
            scene,
            audio,
            duration_secs,
        })
    }

    /// Render `entry` to `<output_dir>/<clip_id>.mp4`.
    ///
    /// An existing output is left untouched and reported as skipped unless
    /// `force` is set.
    pub fn render_entry(
        &self,
        entry: &ClipEntry,
        output_dir: &Path,
        force: bool,
        overlap: f64,
        on_progress: Option<&dyn Fn(f64)>,
    ) -> ClipRenderOutcome {
        let output = output_dir.join(entry.output_file_name());
        let clip_id = entry.id().to_string();

        if output.exists() && !force {
            tracing::info!(clip_id = %clip_id, path = %output.display(), "Clip already rendered, skipping");
            let duration_secs = probe_media(self.tools, &output)
                .ok()
                .map(|info| info.duration_secs);
            return ClipRenderOutcome {
                result: OperationResult::skipped(format!(
                    "{clip_id}: already rendered at {}",
                    output.display()
                )),
                clip_id,
                output,
                duration_secs,
            };
        }

        self.render_to(entry, &output, overlap, on_progress)
    }

    /// Render `entry` to an exact output path, overwriting it.
    pub fn render_to(
        &self,
        entry: &ClipEntry,
        output: &Path,
        overlap: f64,
        on_progress: Option<&dyn Fn(f64)>,
    ) -> ClipRenderOutcome {
        let clip_id = entry.id().to_string();
        let started = std::time::Instant::now();
        let rendered = self
            .plan(entry, overlap)
            .and_then(|plan| self.encode_plan(&plan, output, on_progress).map(|()| plan));

        match rendered {
            Ok(plan) => {
                tracing::info!(
                    clip_id = %clip_id,
                    duration_secs = plan.duration_secs,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    path = %output.display(),
                    "Clip rendered"
                );
                ClipRenderOutcome {
                    result: OperationResult::success(format!(
                        "{clip_id}: rendered {:.2}s to {}",
                        plan.duration_secs,
                        output.display()
                    )),
                    clip_id,
                    output: output.to_path_buf(),
                    duration_secs: Some(plan.duration_secs),
                }
            }
            Err(e) => {
                tracing::error!(clip_id = %clip_id, error = %e, "Clip render failed");
                ClipRenderOutcome {
                    result: OperationResult::from_error(&clip_id, &e),
                    clip_id,
                    output: output.to_path_buf(),
                    duration_secs: None,
                }
            }
        }
    }

    /// Encode a plan into `output` through a `.part` file in the same directory.
    pub fn encode_plan(
        &self,
        plan: &ClipPlan,
        output: &Path,
        on_progress: Option<&dyn Fn(f64)>,
    ) -> ReelResult<()> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let part = part_path(output);
        if part.exists() {
            std::fs::remove_file(&part)?;
        }

        if let Err(e) = self.stream_frames(plan, &part, on_progress) {
            let _ = std::fs::remove_file(&part);
            return Err(e);
        }
        if let Err(e) = std::fs::rename(&part, output) {
            let _ = std::fs::remove_file(&part);
            return Err(e.into());
        }
        Ok(())
    }

    fn stream_frames(
        &self,
        plan: &ClipPlan,
        part: &Path,
        on_progress: Option<&dyn Fn(f64)>,
    ) -> ReelResult<()> {
        let fps = self.settings.fps;
        let resolution = self.settings.resolution;
        let total_frames = plan.total_frames(fps);
        let encode = EncodeSpec {
            output: part.to_path_buf(),
            width: resolution.width,
            height: resolution.height,
            fps,
            bitrate_kbps: self.settings.bitrate_kbps,
            duration_secs: total_frames as f64 / fps as f64,
            audio: plan.audio.clone(),
        };

        let mut reader = FrameReader::spawn(self.tools, &plan.decode)?;
        let mut writer = match FrameWriter::spawn(self.tools, &encode) {
            Ok(writer) => writer,
            Err(e) => {
                let _ = reader.finish();
                return Err(e);
            }
        };

        let pumped = (|| -> ReelResult<u64> {
            let mut last = None;
            let mut decoded = 0u64;
            let report_every = u64::from(fps).max(1);
            for index in 0..total_frames {
                if let Some(frame) = reader.next_frame()? {
                    last = Some(frame);
                    decoded += 1;
                } else if last.is_none() {
                    return Err(ReelError::invalid_asset(
                        &plan.decode.input,
                        "decoder produced no frames",
                    ));
                }
                let t = index as f64 / fps as f64;
                writer.write_frame(plan.scene.render_frame(last.as_ref(), t))?;

                if let Some(cb) = on_progress {
                    if (index + 1) % report_every == 0 || index + 1 == total_frames {
                        cb((index + 1) as f64 / total_frames as f64);
                    }
                }
            }
            Ok(decoded)
        })();

        match pumped {
            Ok(decoded) => {
                if decoded < total_frames {
                    tracing::debug!(
                        clip_id = %plan.clip_id,
                        decoded,
                        total_frames,
                        "Source ended early, held last frame"
                    );
                }
                if let Err(e) = reader.finish() {
                    writer.abort();
                    return Err(e);
                }
                writer.finish()
            }
            Err(e) => {
                writer.abort();
                let _ = reader.finish();
                Err(e)
            }
        }
    }
}

/// `<dir>/<stem>.part.mp4` next to `output`.
pub fn part_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string());
    output.with_file_name(format!("{stem}.part.mp4"))
}

/// `<clip_id>_<YYYYmmdd_HHMMSS>.mp4`.
pub fn timestamped_file_name(clip_id: &str) -> String {
    format!("{clip_id}_{}.mp4", timestamp_suffix())
}

/// Render one main clip to `<output_dir>/<clip_id>.mp4`.
pub fn render_clip(
    tools: &FfmpegTools,
    clip: &MainClipConfig,
    style: &StyleConfig,
    output_dir: &Path,
    settings: RenderSettings,
    force: bool,
) -> OperationResult {
    ClipRenderer::new(tools, style, settings)
        .render_entry(&ClipEntry::Main(clip.clone()), output_dir, force, 0.0, None)
        .result
}

/// Render one main clip to a uniquely timestamped file in `output_dir`.
pub fn render_clip_preview(
    tools: &FfmpegTools,
    clip: &MainClipConfig,
    style: &StyleConfig,
    output_dir: &Path,
    settings: RenderSettings,
) -> ClipRenderOutcome {
    let output = output_dir.join(timestamped_file_name(&clip.id));
    ClipRenderer::new(tools, style, settings).render_to(
        &ClipEntry::Main(clip.clone()),
        &output,
        0.0,
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use b50reel_project_model::{AssetPaths, Resolution, StyleOptions, TextStyle};

    fn style(dir: &Path) -> StyleConfig {
        StyleConfig {
            asset_paths: AssetPaths {
                intro_video_bg: dir.join("intro.mp4"),
                intro_text_bg: dir.join("panel.png"),
                content_bg: dir.join("content.png"),
                intro_bgm: None,
                ui_font: dir.join("ui.ttf"),
                comment_font: dir.join("comment.ttf"),
                score_card_bg: dir.join("card.png"),
            },
            options: StyleOptions::default(),
            intro_text_style: TextStyle::intro_default(),
            content_text_style: TextStyle::content_default(),
        }
    }

    fn settings() -> RenderSettings {
        RenderSettings::new(Resolution::new(640, 360).unwrap(), 2000, 30).unwrap()
    }

    fn clip(dir: &Path) -> MainClipConfig {
        MainClipConfig {
            id: "clip_9".to_string(),
            clip_name: "Clip_9".to_string(),
            achievement_title: String::new(),
            song_id: 0,
            level_index: 0,
            chart_type: "DX".to_string(),
            main_image: dir.join("card.png"),
            video: dir.join("missing_source.mp4"),
            start: 0.0,
            end: 5.0,
            text: String::new(),
        }
    }

    #[test]
    fn test_part_path_sits_next_to_output() {
        let part = part_path(Path::new("/out/clips/clip_3.mp4"));
        assert_eq!(part, PathBuf::from("/out/clips/clip_3.part.mp4"));
    }

    #[test]
    fn test_timestamped_name_shape() {
        let name = timestamped_file_name("clip_3");
        assert!(name.starts_with("clip_3_"));
        assert!(name.ends_with(".mp4"));
        assert_eq!(name.len(), "clip_3_".len() + 15 + ".mp4".len());
    }

    #[test]
    fn test_existing_output_is_skipped_without_force() {
        let dir = std::env::temp_dir().join(format!("b50reel_clip_skip_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let output = dir.join("clip_9.mp4");
        std::fs::write(&output, b"existing").unwrap();

        let style = style(&dir);
        let tools = FfmpegTools::default();
        let result = render_clip(&tools, &clip(&dir), &style, &dir, settings(), false);

        assert_eq!(result.status, crate::outcome::OperationStatus::Skipped);
        assert_eq!(std::fs::read(&output).unwrap(), b"existing");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_source_is_error_naming_path() {
        let dir = std::env::temp_dir().join(format!("b50reel_clip_missing_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let style = style(&dir);
        let tools = FfmpegTools::default();
        let result = render_clip(&tools, &clip(&dir), &style, &dir, settings(), true);

        assert_eq!(result.status, crate::outcome::OperationStatus::Error);
        assert!(result.info.contains("clip_9"));
        assert!(result.info.contains("missing_source.mp4"));
        assert!(!dir.join("clip_9.mp4").exists());
        assert!(!dir.join("clip_9.part.mp4").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_page_with_nonpositive_duration_is_rejected() {
        let dir = std::env::temp_dir();
        let style = style(&dir);
        let tools = FfmpegTools::default();
        let renderer = ClipRenderer::new(&tools, &style, settings());
        let page = ClipEntry::Intro(PageConfig {
            id: "intro_1".to_string(),
            duration: 0.0,
            text: String::new(),
        });
        let err = renderer.plan(&page, 0.0).unwrap_err();
        assert!(matches!(err, ReelError::InvalidTimeWindow { .. }));
    }
}
