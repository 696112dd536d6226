//! Final video assembly.
//!
//! Rendered clips are joined in job order by one of three strategies:
//!
//! - [`XfadeStrategy`]: a single encode chaining `xfade`/`acrossfade` at every
//!   boundary. Clips should have been rendered with the transition overlap.
//! - [`DirectConcat`]: concat-demuxer stream copy, optionally after
//!   re-encoding each clip with a fade in and out.
//! - [`MorphTransition`]: boundary clips produced by the external
//!   `ffmpeg-concat` tool, joined with trimmed clip bodies.
//!
//! Every intermediate lives in a [`ScratchDir`] next to the output, and the
//! final file is renamed into place only once it is complete.

use std::path::{Path, PathBuf};
use std::process::Command;

use b50reel_common::error::{ReelError, ReelResult};
use b50reel_project_model::RenderSettings;

use crate::ffmpeg::{
    base_args, codec_args, command_exists, probe_media, run_ffmpeg, FfmpegTools, AUDIO_SAMPLE_RATE,
};
use crate::manifest::RenderManifest;
use crate::outcome::OperationResult;

/// Transition used when none is requested.
pub const DEFAULT_TRANS_TIME: f64 = 1.5;

/// Transitions understood by `ffmpeg-concat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionName {
    #[default]
    Fade,
    CircleOpen,
    CrossWarp,
    DirectionalWarp,
    DirectionalWipe,
    CrossZoom,
    Dreamy,
    SquaresWire,
}

impl TransitionName {
    pub const ALL: [TransitionName; 8] = [
        TransitionName::Fade,
        TransitionName::CircleOpen,
        TransitionName::CrossWarp,
        TransitionName::DirectionalWarp,
        TransitionName::DirectionalWipe,
        TransitionName::CrossZoom,
        TransitionName::Dreamy,
        TransitionName::SquaresWire,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransitionName::Fade => "fade",
            TransitionName::CircleOpen => "circleOpen",
            TransitionName::CrossWarp => "crossWarp",
            TransitionName::DirectionalWarp => "directionalWarp",
            TransitionName::DirectionalWipe => "directionalWipe",
            TransitionName::CrossZoom => "crossZoom",
            TransitionName::Dreamy => "dreamy",
            TransitionName::SquaresWire => "squaresWire",
        }
    }
}

impl std::fmt::Display for TransitionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransitionName {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
                ReelError::config(format!(
                    "unknown transition '{wanted}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

/// Strategy selector used by the CLI and the full-video pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Xfade,
    Direct,
    Morph,
}

impl std::str::FromStr for StrategyKind {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xfade" => Ok(StrategyKind::Xfade),
            "direct" | "quick" => Ok(StrategyKind::Direct),
            "morph" | "ffmpeg-concat" => Ok(StrategyKind::Morph),
            other => Err(ReelError::config(format!(
                "unknown assembly strategy '{other}' (expected xfade, direct or morph)"
            ))),
        }
    }
}

/// One rendered clip to be joined.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyClip {
    pub clip_id: String,
    pub path: PathBuf,
    pub duration_secs: f64,
}

#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    /// Clips in final order.
    pub clips: Vec<AssemblyClip>,
    pub output: PathBuf,
    pub settings: RenderSettings,
    /// Boundary length in seconds; direct concatenation fades for half of it.
    pub trans_time: f64,
}

impl AssemblyRequest {
    fn check_inputs(&self) -> ReelResult<()> {
        if self.clips.is_empty() {
            return Err(ReelError::assembly("no clips to assemble"));
        }
        for clip in &self.clips {
            if !clip.path.exists() {
                return Err(ReelError::assembly(format!(
                    "missing rendered clip {}: {}",
                    clip.clip_id,
                    clip.path.display()
                )));
            }
            if !(clip.duration_secs.is_finite() && clip.duration_secs > 0.0) {
                return Err(ReelError::assembly(format!(
                    "clip {} has no usable duration",
                    clip.clip_id
                )));
            }
        }
        Ok(())
    }

    fn durations(&self) -> Vec<f64> {
        self.clips.iter().map(|c| c.duration_secs).collect()
    }
}

/// A way of joining rendered clips into one file.
pub trait AssemblyStrategy: Send + Sync {
    /// Strategy name for logs and results.
    fn name(&self) -> &str;

    /// Programs this strategy runs.
    fn required_tools<'t>(&self, tools: &'t FfmpegTools) -> Vec<&'t Path>;

    /// Check whether every required program can be started.
    fn is_available(&self, tools: &FfmpegTools) -> bool {
        self.required_tools(tools).into_iter().all(command_exists)
    }

    /// Join `request.clips` (at least two) into `target`.
    fn assemble(
        &self,
        tools: &FfmpegTools,
        request: &AssemblyRequest,
        scratch: &ScratchDir,
        target: &Path,
        on_progress: Option<&dyn Fn(f64)>,
    ) -> ReelResult<()>;
}

/// Build the strategy for `kind`.
pub fn strategy_for(kind: StrategyKind, transition: TransitionName, fade: bool) -> Box<dyn AssemblyStrategy> {
    match kind {
        StrategyKind::Xfade => Box::new(XfadeStrategy),
        StrategyKind::Direct => Box::new(DirectConcat { fade }),
        StrategyKind::Morph => Box::new(MorphTransition { transition }),
    }
}

/// Temporary directory removed when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create a uniquely named hidden directory inside `parent`.
    pub fn create_in(parent: &Path) -> ReelResult<Self> {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let path = parent.join(format!(".b50reel_assemble_{}_{stamp}", std::process::id()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory");
            }
        }
    }
}

/// Join clips and move the result to `request.output`.
pub fn assemble(
    tools: &FfmpegTools,
    strategy: &dyn AssemblyStrategy,
    request: &AssemblyRequest,
    on_progress: Option<&dyn Fn(f64)>,
) -> ReelResult<PathBuf> {
    request.check_inputs()?;

    let parent = request
        .output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&parent)?;

    let scratch = ScratchDir::create_in(&parent)?;
    let target = scratch.file("assembled.mp4");

    tracing::info!(
        strategy = strategy.name(),
        clips = request.clips.len(),
        trans_time = request.trans_time,
        output = %request.output.display(),
        "Assembling video"
    );

    if request.clips.len() == 1 {
        std::fs::copy(&request.clips[0].path, &target)?;
    } else {
        if let Some(missing) = strategy
            .required_tools(tools)
            .into_iter()
            .find(|tool| !command_exists(tool))
        {
            return Err(ReelError::tool_unavailable(missing.display().to_string()));
        }
        strategy.assemble(tools, request, &scratch, &target, on_progress)?;
    }

    std::fs::rename(&target, &request.output)?;
    if let Some(cb) = on_progress {
        cb(1.0);
    }
    tracing::info!(output = %request.output.display(), "Video assembled");
    Ok(request.output.clone())
}

/// [`assemble`] reported as a structured result.
pub fn assemble_video(
    tools: &FfmpegTools,
    strategy: &dyn AssemblyStrategy,
    request: &AssemblyRequest,
    on_progress: Option<&dyn Fn(f64)>,
) -> OperationResult {
    match assemble(tools, strategy, request, on_progress) {
        Ok(path) => OperationResult::success(format!(
            "assembled {} clips with {} into {}",
            request.clips.len(),
            strategy.name(),
            path.display()
        )),
        Err(e) => {
            tracing::error!(strategy = strategy.name(), error = %e, "Assembly failed");
            OperationResult::from_error(strategy.name(), &e)
        }
    }
}

/// Build a request from the render manifest in `clip_dir`.
///
/// Refuses when any clip in the manifest failed. `trans_time` falls back to
/// the overlap the clips were rendered with.
pub fn request_from_manifest(
    tools: &FfmpegTools,
    clip_dir: &Path,
    output: &Path,
    trans_time: Option<f64>,
) -> ReelResult<AssemblyRequest> {
    let manifest = RenderManifest::load(clip_dir)?;
    let failed: Vec<&str> = manifest.failed().map(|c| c.clip_id.as_str()).collect();
    if !failed.is_empty() {
        return Err(ReelError::assembly(format!(
            "clips failed to render: {}",
            failed.join(", ")
        )));
    }

    let mut clips = Vec::with_capacity(manifest.clips.len());
    for entry in &manifest.clips {
        let path = clip_dir.join(&entry.file);
        let duration_secs = match entry.duration_secs {
            Some(d) => d,
            None => probe_media(tools, &path)
                .map_err(|e| ReelError::assembly(format!("{}: {e}", entry.clip_id)))?
                .duration_secs,
        };
        clips.push(AssemblyClip {
            clip_id: entry.clip_id.clone(),
            path,
            duration_secs,
        });
    }

    let trans_time = trans_time.unwrap_or(if manifest.transition_overlap > 0.0 {
        manifest.transition_overlap
    } else {
        DEFAULT_TRANS_TIME
    });

    Ok(AssemblyRequest {
        clips,
        output: output.to_path_buf(),
        settings: manifest.settings,
        trans_time,
    })
}

/// Longest transition every clip can hold at both ends.
pub fn clamp_transition(durations: &[f64], trans_time: f64) -> f64 {
    let shortest = durations.iter().copied().fold(f64::INFINITY, f64::min);
    if !shortest.is_finite() {
        return trans_time.max(0.0);
    }
    let limit = shortest / 2.0;
    if trans_time > limit {
        tracing::warn!(
            requested = trans_time,
            used = limit,
            "Transition longer than half the shortest clip, shortening"
        );
        limit
    } else {
        trans_time.max(0.0)
    }
}

/// Start of each crossfade: `offset_k = sum(dur_0..k) - k * T`.
pub fn xfade_offsets(durations: &[f64], trans_time: f64) -> Vec<f64> {
    let mut offsets = Vec::with_capacity(durations.len().saturating_sub(1));
    let mut elapsed = 0.0;
    for (k, duration) in durations.iter().enumerate().take(durations.len().saturating_sub(1)) {
        elapsed += duration;
        offsets.push(elapsed - (k + 1) as f64 * trans_time);
    }
    offsets
}

/// Length of the joined video when every boundary overlaps by `trans_time`.
pub fn overlapped_duration(durations: &[f64], trans_time: f64) -> f64 {
    let total: f64 = durations.iter().sum();
    total - durations.len().saturating_sub(1) as f64 * trans_time
}

fn normalize_video(settings: &RenderSettings) -> String {
    let (w, h) = (settings.resolution.width, settings.resolution.height);
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={},format=yuv420p,settb=AVTB",
        settings.fps
    )
}

fn normalize_audio() -> String {
    format!("aresample={AUDIO_SAMPLE_RATE},aformat=sample_fmts=fltp:channel_layouts=stereo")
}

/// `filter_complex` chaining every input with `xfade` and `acrossfade`.
///
/// Output pads are `[vout]` and `[aout]`.
pub fn xfade_filter_graph(durations: &[f64], trans_time: f64, settings: &RenderSettings) -> String {
    let mut parts = Vec::new();
    for i in 0..durations.len() {
        parts.push(format!("[{i}:v]{}[v{i}]", normalize_video(settings)));
        parts.push(format!("[{i}:a]{}[a{i}]", normalize_audio()));
    }

    let last = durations.len().saturating_sub(1);
    if last == 0 {
        parts.push("[v0]null[vout]".to_string());
        parts.push("[a0]anull[aout]".to_string());
        return parts.join(";");
    }

    let mut video_in = "v0".to_string();
    let mut audio_in = "a0".to_string();
    for (idx, offset) in xfade_offsets(durations, trans_time).into_iter().enumerate() {
        let k = idx + 1;
        let (video_out, audio_out) = if k == last {
            ("vout".to_string(), "aout".to_string())
        } else {
            (format!("vx{k}"), format!("ax{k}"))
        };
        parts.push(format!(
            "[{video_in}][v{k}]xfade=transition=fade:duration={trans_time:.3}:offset={offset:.3}[{video_out}]"
        ));
        parts.push(format!(
            "[{audio_in}][a{k}]acrossfade=d={trans_time:.3}:c1=tri:c2=tri[{audio_out}]"
        ));
        video_in = video_out;
        audio_in = audio_out;
    }
    parts.join(";")
}

/// Quote a path for a concat-demuxer list.
pub fn escape_concat_path(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

/// Concat-demuxer list with one `file` line per clip.
pub fn concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file {}\n", escape_concat_path(p)))
        .collect()
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Run ffmpeg, reporting failures as assembly errors.
fn run_step(
    tools: &FfmpegTools,
    args: &[String],
    expected_secs: f64,
    on_progress: Option<&dyn Fn(f64)>,
) -> ReelResult<()> {
    run_ffmpeg(tools, args, expected_secs, on_progress).map_err(|e| match e {
        ReelError::Encode { message } => ReelError::assembly(message),
        other => other,
    })
}

/// Map step-local progress into its share of the whole job.
fn step_progress<'p>(
    on_progress: Option<&'p dyn Fn(f64)>,
    step: usize,
    steps: usize,
) -> impl Fn(f64) + 'p {
    move |fraction: f64| {
        if let Some(cb) = on_progress {
            cb((step as f64 + fraction.clamp(0.0, 1.0)) / steps.max(1) as f64);
        }
    }
}

/// Re-encode `[start, start + duration)` of `input`, normalized to the job settings.
fn trim_args(
    input: &Path,
    start_secs: f64,
    duration_secs: f64,
    settings: &RenderSettings,
    extra_video_filter: Option<&str>,
    extra_audio_filter: Option<&str>,
    output: &Path,
) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-ss".to_string(),
        format!("{start_secs:.3}"),
        "-t".to_string(),
        format!("{duration_secs:.3}"),
        "-i".to_string(),
        input.display().to_string(),
    ]);
    let mut video_filter = normalize_video(settings);
    if let Some(extra) = extra_video_filter {
        video_filter.push(',');
        video_filter.push_str(extra);
    }
    let mut audio_filter = normalize_audio();
    if let Some(extra) = extra_audio_filter {
        audio_filter.push(',');
        audio_filter.push_str(extra);
    }
    args.extend(["-vf".to_string(), video_filter, "-af".to_string(), audio_filter]);
    args.extend(codec_args(settings.bitrate_kbps));
    args.push(output.display().to_string());
    args
}

/// One encode pass with `xfade`/`acrossfade` at every boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct XfadeStrategy;

impl AssemblyStrategy for XfadeStrategy {
    fn name(&self) -> &str {
        "xfade"
    }

    fn required_tools<'t>(&self, tools: &'t FfmpegTools) -> Vec<&'t Path> {
        vec![&tools.ffmpeg]
    }

    fn assemble(
        &self,
        tools: &FfmpegTools,
        request: &AssemblyRequest,
        _scratch: &ScratchDir,
        target: &Path,
        on_progress: Option<&dyn Fn(f64)>,
    ) -> ReelResult<()> {
        let durations = request.durations();
        let trans_time = clamp_transition(&durations, request.trans_time);
        let graph = xfade_filter_graph(&durations, trans_time, &request.settings);

        let mut args = base_args();
        for clip in &request.clips {
            args.push("-i".to_string());
            args.push(clip.path.display().to_string());
        }
        args.extend([
            "-filter_complex".to_string(),
            graph,
            "-map".to_string(),
            "[vout]".to_string(),
            "-map".to_string(),
            "[aout]".to_string(),
        ]);
        args.extend(codec_args(request.settings.bitrate_kbps));
        args.push("-f".to_string());
        args.push("mp4".to_string());
        args.push(target.display().to_string());

        run_step(
            tools,
            &args,
            overlapped_duration(&durations, trans_time),
            on_progress,
        )
    }
}

/// Concat-demuxer join, optionally fading every clip in and out first.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectConcat {
    pub fade: bool,
}

impl AssemblyStrategy for DirectConcat {
    fn name(&self) -> &str {
        "direct"
    }

    fn required_tools<'t>(&self, tools: &'t FfmpegTools) -> Vec<&'t Path> {
        vec![&tools.ffmpeg]
    }

    fn assemble(
        &self,
        tools: &FfmpegTools,
        request: &AssemblyRequest,
        scratch: &ScratchDir,
        target: &Path,
        on_progress: Option<&dyn Fn(f64)>,
    ) -> ReelResult<()> {
        let steps = if self.fade { request.clips.len() + 1 } else { 1 };
        let mut inputs = Vec::with_capacity(request.clips.len());

        if self.fade {
            for (i, clip) in request.clips.iter().enumerate() {
                let fade = (request.trans_time / 2.0).min(clip.duration_secs / 2.0).max(0.0);
                let fade_out = (clip.duration_secs - fade).max(0.0);
                let faded = scratch.file(&format!("faded_{i:03}.mp4"));
                let video_fade = format!(
                    "fade=t=in:st=0:d={fade:.3},fade=t=out:st={fade_out:.3}:d={fade:.3}"
                );
                let audio_fade = format!(
                    "afade=t=in:st=0:d={fade:.3},afade=t=out:st={fade_out:.3}:d={fade:.3}"
                );
                tracing::debug!(clip_id = %clip.clip_id, fade, "Applying fade");
                let args = trim_args(
                    &clip.path,
                    0.0,
                    clip.duration_secs,
                    &request.settings,
                    Some(&video_fade),
                    Some(&audio_fade),
                    &faded,
                );
                let progress = step_progress(on_progress, i, steps);
                run_step(tools, &args, clip.duration_secs, Some(&progress))?;
                inputs.push(faded);
            }
        } else {
            inputs.extend(request.clips.iter().map(|c| absolute(&c.path)));
        }

        let list = scratch.file("concat.txt");
        std::fs::write(&list, concat_list(&inputs))?;

        let mut args = base_args();
        args.extend(strings(["-f", "concat", "-safe", "0", "-i"]));
        args.push(list.display().to_string());
        args.extend(strings(["-c", "copy", "-movflags", "+faststart", "-f", "mp4"]));
        args.push(target.display().to_string());

        let total: f64 = request.durations().iter().sum();
        let progress = step_progress(on_progress, steps - 1, steps);
        run_step(tools, &args, total, Some(&progress))
    }
}

/// Piece of a morph-transition timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MorphSegment {
    /// Part of clip `clip` between its boundary transitions.
    Body {
        clip: usize,
        start_secs: f64,
        duration_secs: f64,
    },
    /// Transition from clip `boundary - 1` into clip `boundary`.
    Transition { boundary: usize },
}

/// Timeline of bodies and boundary transitions.
///
/// Bodies shorter than `min_body_secs` are dropped.
pub fn morph_segments(durations: &[f64], trans_time: f64, min_body_secs: f64) -> Vec<MorphSegment> {
    let last = durations.len().saturating_sub(1);
    let mut segments = Vec::new();
    for (i, &duration) in durations.iter().enumerate() {
        if i > 0 {
            segments.push(MorphSegment::Transition { boundary: i });
        }
        let start_secs = if i > 0 { trans_time } else { 0.0 };
        let end_secs = if i < last { duration - trans_time } else { duration };
        let body = end_secs - start_secs;
        if body >= min_body_secs {
            segments.push(MorphSegment::Body {
                clip: i,
                start_secs,
                duration_secs: body,
            });
        }
    }
    segments
}

/// Boundary transitions rendered by `ffmpeg-concat`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MorphTransition {
    pub transition: TransitionName,
}

impl MorphTransition {
    fn render_boundary(
        &self,
        tools: &FfmpegTools,
        request: &AssemblyRequest,
        scratch: &ScratchDir,
        boundary: usize,
        trans_time: f64,
    ) -> ReelResult<PathBuf> {
        let outgoing = &request.clips[boundary - 1];
        let incoming = &request.clips[boundary];
        let settings = &request.settings;

        let tail = scratch.file(&format!("tail_{boundary:03}.mp4"));
        let head = scratch.file(&format!("head_{boundary:03}.mp4"));
        let tail_start = (outgoing.duration_secs - trans_time).max(0.0);
        run_step(
            tools,
            &trim_args(&outgoing.path, tail_start, trans_time, settings, None, None, &tail),
            trans_time,
            None,
        )?;
        run_step(
            tools,
            &trim_args(&incoming.path, 0.0, trans_time, settings, None, None, &head),
            trans_time,
            None,
        )?;

        let video = scratch.file(&format!("morph_{boundary:03}.mp4"));
        let output = Command::new(&tools.ffmpeg_concat)
            .arg("-t")
            .arg(self.transition.as_str())
            .arg("-d")
            .arg(format!("{}", (trans_time * 1000.0).round() as u64))
            .arg("-o")
            .arg(&video)
            .arg(&tail)
            .arg(&head)
            .output()
            .map_err(|e| ReelError::assembly(format!("Failed to start ffmpeg-concat: {e}")))?;
        if !output.status.success() {
            return Err(ReelError::assembly(format!(
                "ffmpeg-concat failed at boundary {boundary} ({} -> {}): {}",
                outgoing.clip_id,
                incoming.clip_id,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // The external tool only renders pictures; the audio is crossfaded here.
        let muxed = scratch.file(&format!("transition_{boundary:03}.mp4"));
        let mut args = base_args();
        args.extend([
            "-i".to_string(),
            video.display().to_string(),
            "-i".to_string(),
            tail.display().to_string(),
            "-i".to_string(),
            head.display().to_string(),
            "-filter_complex".to_string(),
            format!(
                "[0:v]{}[v];[1:a][2:a]acrossfade=d={trans_time:.3}:c1=tri:c2=tri[a]",
                normalize_video(settings)
            ),
            "-map".to_string(),
            "[v]".to_string(),
            "-map".to_string(),
            "[a]".to_string(),
            "-t".to_string(),
            format!("{trans_time:.3}"),
        ]);
        args.extend(codec_args(settings.bitrate_kbps));
        args.push(muxed.display().to_string());
        run_step(tools, &args, trans_time, None)?;
        Ok(muxed)
    }
}

impl AssemblyStrategy for MorphTransition {
    fn name(&self) -> &str {
        "morph"
    }

    fn required_tools<'t>(&self, tools: &'t FfmpegTools) -> Vec<&'t Path> {
        vec![&tools.ffmpeg, &tools.ffmpeg_concat]
    }

    fn assemble(
        &self,
        tools: &FfmpegTools,
        request: &AssemblyRequest,
        scratch: &ScratchDir,
        target: &Path,
        on_progress: Option<&dyn Fn(f64)>,
    ) -> ReelResult<()> {
        let durations = request.durations();
        let trans_time = clamp_transition(&durations, request.trans_time);
        let segments = morph_segments(&durations, trans_time, request.settings.frame_secs());
        let steps = segments.len() + 1;

        let mut pieces = Vec::with_capacity(segments.len());
        for (step, segment) in segments.iter().enumerate() {
            let piece = match *segment {
                MorphSegment::Body {
                    clip,
                    start_secs,
                    duration_secs,
                } => {
                    let source = &request.clips[clip];
                    let body = scratch.file(&format!("body_{clip:03}.mp4"));
                    let progress = step_progress(on_progress, step, steps);
                    run_step(
                        tools,
                        &trim_args(
                            &source.path,
                            start_secs,
                            duration_secs,
                            &request.settings,
                            None,
                            None,
                            &body,
                        ),
                        duration_secs,
                        Some(&progress),
                    )?;
                    body
                }
                MorphSegment::Transition { boundary } => {
                    tracing::info!(
                        boundary,
                        transition = %self.transition,
                        "Rendering morph transition"
                    );
                    self.render_boundary(tools, request, scratch, boundary, trans_time)?
                }
            };
            pieces.push(piece);
        }

        let mut args = base_args();
        let mut graph = String::new();
        for (i, piece) in pieces.iter().enumerate() {
            args.push("-i".to_string());
            args.push(piece.display().to_string());
            graph.push_str(&format!(
                "[{i}:v]{}[v{i}];[{i}:a]{}[a{i}];",
                normalize_video(&request.settings),
                normalize_audio()
            ));
        }
        for i in 0..pieces.len() {
            graph.push_str(&format!("[v{i}][a{i}]"));
        }
        graph.push_str(&format!("concat=n={}:v=1:a=1[vout][aout]", pieces.len()));
        args.extend([
            "-filter_complex".to_string(),
            graph,
            "-map".to_string(),
            "[vout]".to_string(),
            "-map".to_string(),
            "[aout]".to_string(),
        ]);
        args.extend(codec_args(request.settings.bitrate_kbps));
        args.push("-f".to_string());
        args.push("mp4".to_string());
        args.push(target.display().to_string());

        let progress = step_progress(on_progress, steps - 1, steps);
        run_step(
            tools,
            &args,
            overlapped_duration(&durations, trans_time),
            Some(&progress),
        )
    }
}
