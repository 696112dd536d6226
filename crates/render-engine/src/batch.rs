//! Batch clip orchestration.
//!
//! Renders every entry of a job, in order by default or on a small worker
//! pool, and never stops at the first failure. The summary and manifest
//! always list every clip in job order.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use b50reel_common::clock::RenderClock;
use b50reel_common::error::{ReelError, ReelResult};
use b50reel_project_model::{ClipEntry, ClipKind, TransitionSettings};
use rayon::prelude::*;

use crate::clip::ClipRenderer;
use crate::manifest::{ManifestEntry, RenderManifest, MANIFEST_VERSION};
use crate::outcome::{OperationResult, OperationStatus};

/// Progress notifications for a batch or a full render.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    ClipStarted {
        index: usize,
        total: usize,
        clip_id: String,
    },
    ClipProgress {
        index: usize,
        total: usize,
        clip_id: String,
        fraction: f64,
    },
    ClipFinished {
        index: usize,
        total: usize,
        clip_id: String,
        status: OperationStatus,
        elapsed_secs: f64,
        eta_secs: f64,
    },
    Assembling {
        strategy: String,
        clips: usize,
    },
    AssemblyProgress {
        fraction: f64,
    },
    Complete {
        output: PathBuf,
    },
    Failed {
        message: String,
    },
}

/// Receiver for [`PipelineEvent`]s.
pub type EventSink = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Cooperative cancellation, checked before each clip starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Re-render clips whose output already exists.
    pub force: bool,

    /// When enabled every clip is rendered `duration` seconds longer.
    pub transition: TransitionSettings,

    /// Clips rendered concurrently (1 = sequential).
    pub workers: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            force: false,
            transition: TransitionSettings::disabled(),
            workers: 1,
        }
    }
}

/// Final state of one clip in a batch.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub clip_id: String,
    pub kind: ClipKind,
    pub result: OperationResult,
    pub output: PathBuf,
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// Every clip, in job order.
    pub entries: Vec<BatchEntry>,
    pub elapsed_secs: f64,
    pub cancelled: bool,
    pub manifest_path: Option<PathBuf>,
}

impl BatchSummary {
    pub fn count(&self, status: OperationStatus) -> usize {
        self.entries
            .iter()
            .filter(|e| e.result.status == status)
            .count()
    }

    pub fn failed(&self) -> Vec<&BatchEntry> {
        self.entries
            .iter()
            .filter(|e| e.result.status == OperationStatus::Error)
            .collect()
    }

    /// Every clip has a usable file on disk.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.entries.iter().all(|e| e.result.is_ok())
    }

    /// `clip_id: info` lines for every failed clip.
    pub fn failure_report(&self) -> String {
        self.failed()
            .iter()
            .map(|e| e.result.info.clone())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Render every entry into `output_dir`.
///
/// Failures are recorded per clip; the only errors returned are failing to
/// create `output_dir` or to start the worker pool.
pub fn render_all(
    renderer: &ClipRenderer<'_>,
    entries: &[ClipEntry],
    output_dir: &Path,
    options: &BatchOptions,
    events: Option<&EventSink>,
    cancel: Option<&CancelToken>,
) -> ReelResult<BatchSummary> {
    std::fs::create_dir_all(output_dir)?;

    let total = entries.len();
    let overlap = options.transition.overlap();
    let workers = options.workers.clamp(1, total.max(1));
    let clock = RenderClock::start();
    let finished = AtomicUsize::new(0);

    tracing::info!(
        clips = total,
        workers,
        overlap,
        force = options.force,
        output_dir = %output_dir.display(),
        "Starting clip batch"
    );

    let emit = |event: PipelineEvent| {
        if let Some(sink) = events {
            sink(event);
        }
    };

    let run_one = |index: usize| -> BatchEntry {
        let entry = &entries[index];
        let clip_id = entry.id().to_string();

        if cancel.is_some_and(CancelToken::is_cancelled) {
            tracing::info!(index, total, clip_id = %clip_id, "Batch cancelled, skipping clip");
            return BatchEntry {
                result: OperationResult::skipped(format!("{clip_id}: cancelled")),
                kind: entry.kind(),
                output: output_dir.join(entry.output_file_name()),
                duration_secs: None,
                clip_id,
            };
        }

        tracing::info!(index = index + 1, total, clip_id = %clip_id, "Rendering clip");
        emit(PipelineEvent::ClipStarted {
            index,
            total,
            clip_id: clip_id.clone(),
        });

        let on_progress = |fraction: f64| {
            emit(PipelineEvent::ClipProgress {
                index,
                total,
                clip_id: clip_id.clone(),
                fraction,
            })
        };
        let outcome = renderer.render_entry(
            entry,
            output_dir,
            options.force,
            overlap,
            Some(&on_progress),
        );

        let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
        emit(PipelineEvent::ClipFinished {
            index,
            total,
            clip_id: clip_id.clone(),
            status: outcome.result.status,
            elapsed_secs: clock.elapsed_secs(),
            eta_secs: clock.eta_secs(done, total),
        });

        BatchEntry {
            clip_id,
            kind: entry.kind(),
            result: outcome.result,
            output: outcome.output,
            duration_secs: outcome.duration_secs,
        }
    };

    let results: Vec<BatchEntry> = if workers == 1 {
        (0..total).map(run_one).collect()
    } else {
        build_pool(workers)?.install(|| (0..total).into_par_iter().map(run_one).collect())
    };

    let mut summary = BatchSummary {
        entries: results,
        elapsed_secs: clock.elapsed_secs(),
        cancelled: cancel.is_some_and(CancelToken::is_cancelled),
        manifest_path: None,
    };

    let manifest = build_manifest(&summary, renderer, overlap);
    match manifest.save(output_dir) {
        Ok(path) => summary.manifest_path = Some(path),
        Err(e) => tracing::warn!(error = %e, "Failed to write render manifest"),
    }

    tracing::info!(
        success = summary.count(OperationStatus::Success),
        skipped = summary.count(OperationStatus::Skipped),
        failed = summary.count(OperationStatus::Error),
        elapsed_secs = summary.elapsed_secs,
        "Clip batch finished"
    );
    Ok(summary)
}

fn build_pool(workers: usize) -> ReelResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("b50reel-render-{i}"))
        .build()
        .map_err(|e| ReelError::Other(anyhow::anyhow!("failed to build render worker pool: {e}")))
}

fn build_manifest(summary: &BatchSummary, renderer: &ClipRenderer<'_>, overlap: f64) -> RenderManifest {
    RenderManifest {
        version: MANIFEST_VERSION,
        created_at: chrono::Utc::now().to_rfc3339(),
        settings: renderer.settings(),
        transition_overlap: overlap,
        clips: summary
            .entries
            .iter()
            .map(|e| ManifestEntry {
                clip_id: e.clip_id.clone(),
                kind: e.kind,
                status: e.result.status,
                file: e
                    .output
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                duration_secs: e.duration_secs,
                info: e.result.info.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffmpeg::FfmpegTools;
    use std::sync::Mutex;
    use b50reel_project_model::{
        AssetPaths, MainClipConfig, RenderSettings, Resolution, StyleConfig, StyleOptions,
        TextStyle,
    };

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

    fn main_entry(dir: &Path, id: &str) -> ClipEntry {
        ClipEntry::Main(MainClipConfig {
            id: id.to_string(),
            clip_name: id.to_string(),
            achievement_title: String::new(),
            song_id: 0,
            level_index: 3,
            chart_type: "DX".to_string(),
            main_image: dir.join(format!("{id}.png")),
            video: dir.join(format!("{id}_source.mp4")),
            start: 0.0,
            end: 5.0,
            text: String::new(),
        })
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("b50reel_batch_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn settings() -> RenderSettings {
        RenderSettings::new(Resolution::new(640, 360).unwrap(), 2000, 30).unwrap()
    }

    #[test]
    fn test_batch_continues_past_failures_and_keeps_order() {
        let dir = temp_dir("order");
        // Pre-existing outputs are skipped; the missing source fails.
        std::fs::write(dir.join("a.mp4"), b"a").unwrap();
        std::fs::write(dir.join("c.mp4"), b"c").unwrap();
        let entries = vec![
            main_entry(&dir, "a"),
            main_entry(&dir, "b"),
            main_entry(&dir, "c"),
        ];
        let style = style(&dir);
        let tools = FfmpegTools::default();
        let renderer = ClipRenderer::new(&tools, &style, settings());

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = Arc::clone(&events);
        let sink: EventSink = Arc::new(move |e: PipelineEvent| sink_events.lock().unwrap().push(e));

        let summary =
            render_all(&renderer, &entries, &dir, &BatchOptions::default(), Some(&sink), None)
                .unwrap();

        let ids: Vec<&str> = summary.entries.iter().map(|e| e.clip_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(summary.entries[0].result.status, OperationStatus::Skipped);
        assert_eq!(summary.entries[1].result.status, OperationStatus::Error);
        assert_eq!(summary.entries[2].result.status, OperationStatus::Skipped);
        assert!(!summary.is_complete());
        assert!(summary.failure_report().contains("b_source.mp4"));

        let manifest = RenderManifest::load(&dir).unwrap();
        assert_eq!(manifest.clips.len(), 3);
        assert_eq!(manifest.failed().count(), 1);

        let finished = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, PipelineEvent::ClipFinished { .. }))
            .count();
        assert_eq!(finished, 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_cancelled_batch_skips_remaining_clips() {
        let dir = temp_dir("cancel");
        let entries = vec![main_entry(&dir, "a"), main_entry(&dir, "b")];
        let style = style(&dir);
        let tools = FfmpegTools::default();
        let renderer = ClipRenderer::new(&tools, &style, settings());
        let cancel = CancelToken::new();
        cancel.cancel();

        let summary = render_all(
            &renderer,
            &entries,
            &dir,
            &BatchOptions::default(),
            None,
            Some(&cancel),
        )
        .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.count(OperationStatus::Skipped), 2);
        assert!(summary.entries[1].result.info.contains("cancelled"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_worker_pool_preserves_job_order() {
        let dir = temp_dir("workers");
        let ids = ["c1", "c2", "c3", "c4", "c5"];
        let entries: Vec<ClipEntry> = ids.iter().map(|id| main_entry(&dir, id)).collect();
        let style = style(&dir);
        let tools = FfmpegTools::default();
        let renderer = ClipRenderer::new(&tools, &style, settings());
        let options = BatchOptions {
            workers: 3,
            ..BatchOptions::default()
        };

        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        let sink: EventSink = Arc::new(move |e: PipelineEvent| {
            if matches!(e, PipelineEvent::ClipFinished { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let summary = render_all(&renderer, &entries, &dir, &options, Some(&sink), None).unwrap();
        let got: Vec<&str> = summary.entries.iter().map(|e| e.clip_id.as_str()).collect();
        assert_eq!(got, ids);
        assert_eq!(summary.count(OperationStatus::Error), 5);
        assert_eq!(finished.load(Ordering::SeqCst), 5);

        let manifest = RenderManifest::load(&dir).unwrap();
        let listed: Vec<&str> = manifest.clips.iter().map(|c| c.clip_id.as_str()).collect();
        assert_eq!(listed, ids);
        std::fs::remove_dir_all(&dir).ok();
    }
}
