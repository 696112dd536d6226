//! Full-video pipeline: render every clip, then assemble.
//!
//! ```text
//! Pending -> Rendering(clip i) -> {Skipped|Rendered|Failed}(clip i) -> ...
//!         -> Assembling -> {Complete|Failed}
//! ```
//!
//! Assembly only starts when every clip has a usable file. Nothing is
//! retried automatically.

use std::path::{Path, PathBuf};

use b50reel_common::error::{ReelError, ReelResult};
use b50reel_project_model::{RenderJob, StyleConfig};

use crate::assemble::{assemble, AssemblyClip, AssemblyRequest, AssemblyStrategy, DirectConcat, XfadeStrategy};
use crate::batch::{render_all, BatchOptions, BatchSummary, CancelToken, EventSink, PipelineEvent};
use crate::clip::ClipRenderer;
use crate::ffmpeg::{probe_media, FfmpegTools};
use crate::outcome::OperationResult;

/// Inputs for [`render_complete_video`].
#[derive(Debug, Clone)]
pub struct FullVideoRequest {
    /// Names the final file, `<username>_B50.mp4`.
    pub username: String,
    pub job: RenderJob,
    pub style: StyleConfig,
    pub tools: FfmpegTools,
    pub output_dir: PathBuf,
    pub force: bool,
    pub workers: usize,
    /// Stop after the clips are rendered.
    pub only_generate_clips: bool,
}

#[derive(Debug, Clone)]
pub struct FullVideoReport {
    pub batch: BatchSummary,
    /// Absent when assembly was not attempted.
    pub assembly: Option<OperationResult>,
    pub output: Option<PathBuf>,
}

impl FullVideoReport {
    /// Overall result of the run.
    pub fn result(&self) -> OperationResult {
        if let Some(assembly) = &self.assembly {
            return assembly.clone();
        }
        if self.batch.cancelled {
            return OperationResult::skipped("render cancelled before assembly");
        }
        if !self.batch.is_complete() {
            return OperationResult::error(self.batch.failure_report());
        }
        OperationResult::success(format!("rendered {} clips", self.batch.entries.len()))
    }
}

/// `<output_dir>/<username>_B50.mp4`, with path separators in the name replaced.
pub fn final_output_path(output_dir: &Path, username: &str) -> PathBuf {
    let stem: String = username
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    let stem = if stem.is_empty() { "user".to_string() } else { stem };
    output_dir.join(format!("{stem}_B50.mp4"))
}

/// Join used when transitions are off: a short fade at every clip boundary.
pub const PLAIN_JOIN: DirectConcat = DirectConcat { fade: true };

/// Strategy used after a batch: crossfades when transitions are on,
/// [`PLAIN_JOIN`] otherwise.
pub fn default_strategy(job: &RenderJob) -> Box<dyn AssemblyStrategy> {
    if job.transition.enabled {
        Box::new(XfadeStrategy)
    } else {
        Box::new(PLAIN_JOIN)
    }
}

fn assembly_clips(tools: &FfmpegTools, summary: &BatchSummary) -> ReelResult<Vec<AssemblyClip>> {
    summary
        .entries
        .iter()
        .map(|entry| {
            let duration_secs = match entry.duration_secs {
                Some(d) => d,
                None => probe_media(tools, &entry.output)
                    .map_err(|e| ReelError::assembly(format!("{}: {e}", entry.clip_id)))?
                    .duration_secs,
            };
            Ok(AssemblyClip {
                clip_id: entry.clip_id.clone(),
                path: entry.output.clone(),
                duration_secs,
            })
        })
        .collect()
}

/// Blocking body of [`render_complete_video`].
pub fn render_complete_video_blocking(
    request: &FullVideoRequest,
    events: Option<&EventSink>,
    cancel: Option<&CancelToken>,
) -> ReelResult<FullVideoReport> {
    request.job.validate().map_err(|e| ReelError::config(e.to_string()))?;
    request.tools.require_core()?;

    let emit = |event: PipelineEvent| {
        if let Some(sink) = events {
            sink(event);
        }
    };

    let renderer = ClipRenderer::new(&request.tools, &request.style, request.job.settings);
    let options = BatchOptions {
        force: request.force,
        transition: request.job.transition,
        workers: request.workers,
    };
    let batch = render_all(
        &renderer,
        &request.job.entries,
        &request.output_dir,
        &options,
        events,
        cancel,
    )?;

    if batch.cancelled || request.only_generate_clips {
        return Ok(FullVideoReport {
            batch,
            assembly: None,
            output: None,
        });
    }

    if !batch.is_complete() {
        let failed: Vec<&str> = batch.failed().iter().map(|e| e.clip_id.as_str()).collect();
        let message = format!("not assembling, clips failed: {}", failed.join(", "));
        tracing::error!(failed = ?failed, "Batch incomplete, skipping assembly");
        emit(PipelineEvent::Failed {
            message: message.clone(),
        });
        return Ok(FullVideoReport {
            assembly: Some(OperationResult::error(message)),
            batch,
            output: None,
        });
    }

    let strategy = default_strategy(&request.job);
    emit(PipelineEvent::Assembling {
        strategy: strategy.name().to_string(),
        clips: batch.entries.len(),
    });

    let output = final_output_path(&request.output_dir, &request.username);
    let assembled = assembly_clips(&request.tools, &batch).and_then(|clips| {
        let assembly = AssemblyRequest {
            clips,
            output: output.clone(),
            settings: request.job.settings,
            trans_time: request.job.transition.duration,
        };
        let on_progress = |fraction: f64| emit(PipelineEvent::AssemblyProgress { fraction });
        assemble(&request.tools, strategy.as_ref(), &assembly, Some(&on_progress))
    });

    match assembled {
        Ok(path) => {
            emit(PipelineEvent::Complete {
                output: path.clone(),
            });
            Ok(FullVideoReport {
                assembly: Some(OperationResult::success(format!(
                    "video written to {}",
                    path.display()
                ))),
                batch,
                output: Some(path),
            })
        }
        Err(e) => {
            tracing::error!(error = %e, "Assembly failed");
            emit(PipelineEvent::Failed {
                message: e.to_string(),
            });
            Ok(FullVideoReport {
                assembly: Some(OperationResult::from_error(strategy.name(), &e)),
                batch,
                output: None,
            })
        }
    }
}

/// Render every clip of the job and assemble `<username>_B50.mp4`.
///
/// Runs on a blocking task; clip rendering drives ffmpeg subprocesses.
pub async fn render_complete_video(
    request: FullVideoRequest,
    events: Option<EventSink>,
    cancel: Option<CancelToken>,
) -> ReelResult<FullVideoReport> {
    tracing::info!(
        username = %request.username,
        clips = request.job.entries.len(),
        output_dir = %request.output_dir.display(),
        "Starting full video render"
    );
    tokio::task::spawn_blocking(move || {
        render_complete_video_blocking(&request, events.as_ref(), cancel.as_ref())
    })
    .await
    .map_err(|e| ReelError::Other(anyhow::anyhow!("render task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use b50reel_project_model::{
        ClipEntry, PageConfig, RenderSettings, Resolution, TransitionSettings,
    };

    fn job(enabled: bool) -> RenderJob {
        RenderJob {
            entries: vec![ClipEntry::Intro(PageConfig {
                id: "intro_1".to_string(),
                duration: 3.0,
                text: String::new(),
            })],
            settings: RenderSettings::new(Resolution::new(1280, 720).unwrap(), 4000, 30).unwrap(),
            transition: TransitionSettings::new(enabled, 1.0).unwrap(),
        }
    }

    #[test]
    fn test_final_output_path_names_user() {
        let dir = Path::new("/videos");
        assert_eq!(
            final_output_path(dir, "player"),
            PathBuf::from("/videos/player_B50.mp4")
        );
        assert_eq!(
            final_output_path(dir, "a/b"),
            PathBuf::from("/videos/a_b_B50.mp4")
        );
        assert_eq!(final_output_path(dir, "  "), PathBuf::from("/videos/user_B50.mp4"));
    }

    #[test]
    fn test_default_strategy_follows_transition_toggle() {
        assert_eq!(default_strategy(&job(true)).name(), "xfade");
        assert_eq!(default_strategy(&job(false)).name(), "direct");
        assert!(PLAIN_JOIN.fade);
    }

    #[test]
    fn test_cancelled_report_is_skipped() {
        let report = FullVideoReport {
            batch: BatchSummary {
                entries: vec![],
                elapsed_secs: 0.0,
                cancelled: true,
                manifest_path: None,
            },
            assembly: None,
            output: None,
        };
        assert_eq!(
            report.result().status,
            crate::outcome::OperationStatus::Skipped
        );
    }
}
