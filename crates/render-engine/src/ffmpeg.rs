//! ffmpeg process plumbing.
//!
//! Everything that spawns `ffmpeg`, `ffprobe` or `ffmpeg-concat` lives here:
//! tool discovery, media probing, the raw-frame decoder and encoder used by
//! the clip renderer, and the progress-reporting runner used by assembly.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, SyncSender};
use std::thread::JoinHandle;

use b50reel_common::config::ToolPaths;
use b50reel_common::error::{ReelError, ReelResult};
use image::RgbaImage;
use serde::Deserialize;

/// Frames buffered between the compositor and the encoder process.
const MAX_FRAME_BUFFER: usize = 32;

pub const AUDIO_SAMPLE_RATE: u32 = 44_100;

/// Locations of the external media tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub ffmpeg_concat: PathBuf,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self::from_config(&ToolPaths::default())
    }
}

impl FfmpegTools {
    pub fn from_config(paths: &ToolPaths) -> Self {
        Self {
            ffmpeg: paths.ffmpeg.clone(),
            ffprobe: paths.ffprobe.clone(),
            ffmpeg_concat: paths.ffmpeg_concat.clone(),
        }
    }

    pub fn ffmpeg_available(&self) -> bool {
        command_exists(&self.ffmpeg)
    }

    pub fn ffprobe_available(&self) -> bool {
        command_exists(&self.ffprobe)
    }

    pub fn ffmpeg_concat_available(&self) -> bool {
        command_exists(&self.ffmpeg_concat)
    }

    /// Fail unless both ffmpeg and ffprobe can be started.
    pub fn require_core(&self) -> ReelResult<()> {
        if !self.ffmpeg_available() {
            return Err(ReelError::tool_unavailable(self.ffmpeg.display().to_string()));
        }
        if !self.ffprobe_available() {
            return Err(ReelError::tool_unavailable(
                self.ffprobe.display().to_string(),
            ));
        }
        Ok(())
    }
}

/// Whether `binary` names an executable, either by path or on `PATH`.
pub fn command_exists(binary: &Path) -> bool {
    if binary.components().count() > 1 {
        return binary.is_file();
    }
    Command::new("sh")
        .arg("-c")
        .arg("command -v \"$1\" >/dev/null 2>&1")
        .arg("sh")
        .arg(binary)
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Stream facts needed to plan a render.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -of json` output. Returns `None` without a video stream
/// or a positive duration.
pub fn parse_probe_json(raw: &str) -> Option<MediaInfo> {
    let probe: ProbeOutput = serde_json::from_str(raw).ok()?;
    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))?;
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let parse = |v: &Option<String>| v.as_deref().and_then(|d| d.parse::<f64>().ok());
    let duration_secs = probe
        .format
        .as_ref()
        .and_then(|f| parse(&f.duration))
        .or_else(|| parse(&video.duration))
        .filter(|d| d.is_finite() && *d > 0.0)?;

    let width = video.width.filter(|w| *w > 0)?;
    let height = video.height.filter(|h| *h > 0)?;

    Some(MediaInfo {
        duration_secs,
        width,
        height,
        has_audio,
    })
}

/// Probe a media file with ffprobe.
pub fn probe_media(tools: &FfmpegTools, path: &Path) -> ReelResult<MediaInfo> {
    if !path.exists() {
        return Err(ReelError::missing(path));
    }

    let output = Command::new(&tools.ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration:stream=codec_type,width,height,duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| ReelError::tool_unavailable(format!("{}: {e}", tools.ffprobe.display())))?;

    if !output.status.success() {
        return Err(ReelError::invalid_asset(
            path,
            format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    parse_probe_json(&raw)
        .ok_or_else(|| ReelError::invalid_asset(path, "no decodable video stream"))
}

/// H.264/AAC output arguments shared by every encode.
pub fn codec_args(bitrate_kbps: u32) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-profile:v".to_string(),
        "high".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-b:v".to_string(),
        format!("{}k", bitrate_kbps.max(1000)),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-ar".to_string(),
        AUDIO_SAMPLE_RATE.to_string(),
        "-ac".to_string(),
        "2".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]
}

/// Leading arguments for runs driven by [`run_ffmpeg`].
pub fn base_args() -> Vec<String> {
    [
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostats",
        "-progress",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn spawn_stderr_drain(stderr: std::process::ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || -> String {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    })
}

fn join_stderr(task: Option<JoinHandle<String>>) -> String {
    task.map(|t| {
        t.join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
    })
    .unwrap_or_default()
}

/// Run ffmpeg to completion, reporting progress as a fraction of
/// `expected_duration_secs`. Arguments should start with [`base_args`].
pub fn run_ffmpeg(
    tools: &FfmpegTools,
    args: &[String],
    expected_duration_secs: f64,
    on_progress: Option<&dyn Fn(f64)>,
) -> ReelResult<()> {
    tracing::debug!(args = ?args, "Running ffmpeg");
    let mut child = Command::new(&tools.ffmpeg)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ReelError::encode(format!("Failed to start ffmpeg: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ReelError::encode("Failed to capture ffmpeg stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ReelError::encode("Failed to capture ffmpeg stderr"))?;
    let stderr_task = spawn_stderr_drain(stderr);

    let started = std::time::Instant::now();
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();
    let mut state = ProgressState::default();
    let mut last_advance_secs = 0.0f64;
    let mut last_advance_wall = std::time::Instant::now();
    loop {
        line.clear();
        let bytes = reader
            .read_line(&mut line)
            .map_err(|e| ReelError::encode(format!("Failed reading ffmpeg progress: {e}")))?;
        if bytes == 0 {
            break;
        }
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        state.update(key, value);
        if key != "progress" {
            continue;
        }
        if state.out_time_secs > last_advance_secs + 0.001 {
            last_advance_secs = state.out_time_secs;
            last_advance_wall = std::time::Instant::now();
        }
        if let Some(cb) = on_progress {
            cb(state.fraction(expected_duration_secs));
        }
        if last_advance_wall.elapsed().as_secs() >= 10 {
            tracing::warn!(
                out_time_secs = state.out_time_secs,
                elapsed_secs = started.elapsed().as_secs_f64(),
                "No ffmpeg progress advancement for 10s"
            );
            last_advance_wall = std::time::Instant::now();
        }
    }

    let status = child
        .wait()
        .map_err(|e| ReelError::encode(format!("Failed to wait on ffmpeg: {e}")))?;
    let stderr_output = join_stderr(Some(stderr_task));

    if !status.success() {
        return Err(ReelError::encode(format!(
            "ffmpeg failed (status {status}): {}",
            stderr_output.trim()
        )));
    }
    if let Some(cb) = on_progress {
        cb(1.0);
    }
    Ok(())
}

/// Key/value state accumulated from `-progress` output.
#[derive(Debug, Default)]
pub struct ProgressState {
    pub out_time_secs: f64,
    pub complete: bool,
}

impl ProgressState {
    pub fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both names.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.trim().parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value.trim() == "end";
            }
            _ => {}
        }
    }

    pub fn fraction(&self, expected_duration_secs: f64) -> f64 {
        if self.complete {
            return 1.0;
        }
        if expected_duration_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    }
}

/// What the decoder reads and how it shapes frames.
#[derive(Debug, Clone)]
pub struct DecodeSpec {
    pub input: PathBuf,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Loop the input until `duration_secs` is filled.
    pub loop_input: bool,
}

impl DecodeSpec {
    /// Scale preserving aspect ratio, pad to the exact size, resample.
    pub fn filter(&self) -> String {
        let (w, h) = (self.width, self.height);
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,fps={}",
            self.fps
        )
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-nostdin".to_string(),
        ];
        if self.loop_input {
            args.push("-stream_loop".to_string());
            args.push("-1".to_string());
        }
        if self.start_secs > 0.0 {
            args.push("-ss".to_string());
            args.push(format!("{:.6}", self.start_secs));
        }
        args.push("-i".to_string());
        args.push(self.input.display().to_string());
        args.extend([
            "-t".to_string(),
            format!("{:.6}", self.duration_secs),
            "-an".to_string(),
            "-vf".to_string(),
            self.filter(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "-".to_string(),
        ]);
        args
    }

    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Decoder process emitting raw RGBA frames on stdout.
pub struct FrameReader {
    child: Child,
    stdout: ChildStdout,
    stderr_task: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    eof: bool,
}

impl FrameReader {
    pub fn spawn(tools: &FfmpegTools, spec: &DecodeSpec) -> ReelResult<Self> {
        let args = spec.args();
        tracing::debug!(args = ?args, "Starting ffmpeg decoder");
        let mut child = Command::new(&tools.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ReelError::encode(format!("Failed to start ffmpeg decoder: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelError::encode("Failed to capture decoder stdout"))?;
        let stderr_task = child.stderr.take().map(spawn_stderr_drain);

        Ok(Self {
            child,
            stdout,
            stderr_task,
            width: spec.width,
            height: spec.height,
            eof: false,
        })
    }

    /// Read the next frame. Returns `None` once the stream ends; a trailing
    /// partial frame is discarded.
    pub fn next_frame(&mut self) -> ReelResult<Option<RgbaImage>> {
        if self.eof {
            return Ok(None);
        }
        let len = self.width as usize * self.height as usize * 4;
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled < len {
            self.eof = true;
            return Ok(None);
        }
        Ok(RgbaImage::from_raw(self.width, self.height, buf))
    }

    /// Stop the decoder. A decoder that has not reached the end of its
    /// stream is killed; one that has is checked for a clean exit.
    pub fn finish(mut self) -> ReelResult<()> {
        if !self.eof {
            let _ = self.child.kill();
            let _ = self.child.wait();
            join_stderr(self.stderr_task.take());
            return Ok(());
        }
        let status = self.child.wait()?;
        let stderr_output = join_stderr(self.stderr_task.take());
        if !status.success() {
            return Err(ReelError::encode(format!(
                "ffmpeg decoder failed (status {status}): {}",
                stderr_output.trim()
            )));
        }
        Ok(())
    }
}

/// Audio muxed under an encoded clip.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// The source video's own audio from `start_secs`.
    Clip { path: PathBuf, start_secs: f64 },
    /// A music file looped under the clip with fade in and out.
    Loop { path: PathBuf, fade_secs: f64 },
    /// Generated silence.
    Silence,
}

/// What the encoder produces.
#[derive(Debug, Clone)]
pub struct EncodeSpec {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_kbps: u32,
    pub duration_secs: f64,
    pub audio: AudioSource,
}

impl EncodeSpec {
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend([
            "-s".to_string(),
            format!("{}x{}", self.width, self.height),
            "-r".to_string(),
            self.fps.to_string(),
            "-i".to_string(),
            "-".to_string(),
        ]);

        let duration = format!("{:.6}", self.duration_secs);
        let mut audio_filter = None;
        match &self.audio {
            AudioSource::Clip { path, start_secs } => {
                args.extend([
                    "-ss".to_string(),
                    format!("{start_secs:.6}"),
                    "-i".to_string(),
                    path.display().to_string(),
                ]);
                audio_filter = Some("apad".to_string());
            }
            AudioSource::Loop { path, fade_secs } => {
                args.extend([
                    "-stream_loop".to_string(),
                    "-1".to_string(),
                    "-i".to_string(),
                    path.display().to_string(),
                ]);
                let fade = fade_secs.min(self.duration_secs / 2.0).max(0.0);
                let fade_out_start = (self.duration_secs - fade).max(0.0);
                audio_filter = Some(format!(
                    "afade=t=in:st=0:d={fade:.3},afade=t=out:st={fade_out_start:.3}:d={fade:.3}"
                ));
            }
            AudioSource::Silence => {
                args.extend([
                    "-f".to_string(),
                    "lavfi".to_string(),
                    "-i".to_string(),
                    format!("anullsrc=channel_layout=stereo:sample_rate={AUDIO_SAMPLE_RATE}"),
                ]);
            }
        }

        args.extend([
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
        ]);
        if let Some(filter) = audio_filter {
            args.push("-af".to_string());
            args.push(filter);
        }
        args.push("-t".to_string());
        args.push(duration);
        args.extend(codec_args(self.bitrate_kbps));
        args.push("-f".to_string());
        args.push("mp4".to_string());
        args.push(self.output.display().to_string());
        args
    }
}

/// Encoder process consuming raw RGBA frames on stdin.
///
/// Frames are handed to a writer thread over a bounded channel so
/// compositing the next frame overlaps with encoding the previous one.
/// The encoder stops reading at `-t`; frames queued after that point are
/// discarded and the exit status decides the outcome.
pub struct FrameWriter {
    child: Child,
    sender: Option<SyncSender<Vec<u8>>>,
    writer: Option<JoinHandle<std::io::Result<()>>>,
    stderr_task: Option<JoinHandle<String>>,
    frame_len: usize,
    input_closed: bool,
}

impl FrameWriter {
    pub fn spawn(tools: &FfmpegTools, spec: &EncodeSpec) -> ReelResult<Self> {
        let args = spec.args();
        tracing::debug!(args = ?args, "Starting ffmpeg encoder");
        let mut command = Command::new(&tools.ffmpeg);
        command.args(&args);
        Self::start(command, spec.width as usize * spec.height as usize * 4)
    }

    fn start(mut command: Command, frame_len: usize) -> ReelResult<Self> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ReelError::encode(format!("Failed to start ffmpeg encoder: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::encode("Failed to capture encoder stdin"))?;
        let stderr_task = child.stderr.take().map(spawn_stderr_drain);

        let (sender, receiver) = mpsc::sync_channel::<Vec<u8>>(MAX_FRAME_BUFFER);
        let writer = std::thread::spawn(move || -> std::io::Result<()> {
            for frame in receiver {
                stdin.write_all(&frame)?;
            }
            stdin.flush()
        });

        Ok(Self {
            child,
            sender: Some(sender),
            writer: Some(writer),
            stderr_task,
            frame_len,
            input_closed: false,
        })
    }

    pub fn write_frame(&mut self, frame: RgbaImage) -> ReelResult<()> {
        let raw = frame.into_raw();
        if raw.len() != self.frame_len {
            return Err(ReelError::encode(format!(
                "frame is {} bytes, encoder expects {}",
                raw.len(),
                self.frame_len
            )));
        }
        if self.input_closed {
            return Ok(());
        }
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ReelError::encode("encoder already finished"))?;
        if sender.send(raw).is_ok() {
            return Ok(());
        }

        // The writer thread has exited: either the encoder stopped reading
        // or writing failed for another reason.
        drop(self.sender.take());
        self.input_closed = true;
        match self.join_writer() {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                Err(ReelError::encode(format!("Failed writing frames: {e}")))
            }
            _ => {
                tracing::debug!("Encoder closed its input, discarding remaining frames");
                Ok(())
            }
        }
    }

    /// Close stdin and wait for the encoder to exit cleanly.
    pub fn finish(mut self) -> ReelResult<()> {
        drop(self.sender.take());
        let write_result = self.join_writer();
        let status = self.child.wait()?;
        let stderr_output = join_stderr(self.stderr_task.take());

        if !status.success() {
            return Err(ReelError::encode(format!(
                "ffmpeg encoder failed (status {status}): {}",
                stderr_output.trim()
            )));
        }
        match write_result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::debug!("Encoder finished before reading every queued frame");
                Ok(())
            }
            Err(e) => Err(ReelError::encode(format!("Failed writing frames: {e}"))),
        }
    }

    /// Kill the encoder without waiting for it to finish the file.
    pub fn abort(mut self) {
        drop(self.sender.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = self.join_writer();
        join_stderr(self.stderr_task.take());
    }

    fn join_writer(&mut self) -> std::io::Result<()> {
        match self.writer.take() {
            Some(writer) => writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("encoder writer panicked"))),
            None => Ok(()),
        }
    }
}

/// Decode a single frame at `at_secs`, letterboxed to `width`x`height`.
pub fn extract_frame(
    tools: &FfmpegTools,
    input: &Path,
    at_secs: f64,
    width: u32,
    height: u32,
) -> ReelResult<RgbaImage> {
    let spec = DecodeSpec {
        input: input.to_path_buf(),
        start_secs: at_secs.max(0.0),
        duration_secs: 1.0,
        width,
        height,
        fps: 1,
        loop_input: false,
    };
    let mut reader = FrameReader::spawn(tools, &spec)?;
    let frame = reader.next_frame();
    reader.finish()?;
    frame?.ok_or_else(|| {
        ReelError::invalid_asset(input, format!("no frame decodable at {at_secs:.3}s"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_json_reads_format_duration() {
        let raw = r#"{
            "streams": [
                {"codec_type": "video", "width": 1280, "height": 720},
                {"codec_type": "audio"}
            ],
            "format": {"duration": "120.500000"}
        }"#;
        let info = parse_probe_json(raw).unwrap();
        assert_eq!(info.width, 1280);
        assert!((info.duration_secs - 120.5).abs() < 1e-9);
        assert!(info.has_audio);
    }

    #[test]
    fn test_parse_probe_json_falls_back_to_stream_duration() {
        let raw = r#"{
            "streams": [{"codec_type": "video", "width": 64, "height": 64, "duration": "2.0"}],
            "format": {}
        }"#;
        let info = parse_probe_json(raw).unwrap();
        assert!((info.duration_secs - 2.0).abs() < 1e-9);
        assert!(!info.has_audio);
    }

    #[test]
    fn test_parse_probe_json_rejects_audio_only() {
        let raw = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.0"}}"#;
        assert!(parse_probe_json(raw).is_none());
    }

    #[test]
    fn test_progress_state_parses_microseconds() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "2500000");
        assert!((state.out_time_secs - 2.5).abs() < 1e-9);
        assert!((state.fraction(5.0) - 0.5).abs() < 1e-9);
        state.update("progress", "end");
        assert_eq!(state.fraction(5.0), 1.0);
    }

    #[test]
    fn test_decode_filter_letterboxes_to_exact_size() {
        let spec = DecodeSpec {
            input: PathBuf::from("in.mp4"),
            start_secs: 65.0,
            duration_secs: 5.0,
            width: 1056,
            height: 594,
            fps: 30,
            loop_input: false,
        };
        let filter = spec.filter();
        assert!(filter.contains("force_original_aspect_ratio=decrease"));
        assert!(filter.contains("pad=1056:594"));
        let args = spec.args();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "65.000000");
        assert!(!args.contains(&"-stream_loop".to_string()));
    }

    #[test]
    fn test_encode_args_bound_duration_and_map_audio() {
        let spec = EncodeSpec {
            output: PathBuf::from("out/clip_1.part.mp4"),
            width: 1920,
            height: 1080,
            fps: 60,
            bitrate_kbps: 5000,
            duration_secs: 6.5,
            audio: AudioSource::Loop {
                path: PathBuf::from("bgm.mp3"),
                fade_secs: 1.0,
            },
        };
        let args = spec.args();
        let t = args.iter().rposition(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "6.500000");
        assert!(args.contains(&"-stream_loop".to_string()));
        assert!(args.contains(&"5000k".to_string()));
        assert!(args.iter().any(|a| a.contains("afade=t=out:st=5.500")));
        assert_eq!(args.last().unwrap(), "out/clip_1.part.mp4");
    }

    #[test]
    fn test_silence_uses_lavfi() {
        let spec = EncodeSpec {
            output: PathBuf::from("x.mp4"),
            width: 640,
            height: 360,
            fps: 30,
            bitrate_kbps: 2000,
            duration_secs: 3.0,
            audio: AudioSource::Silence,
        };
        let args = spec.args();
        assert!(args.iter().any(|a| a.starts_with("anullsrc")));
        assert!(!args.contains(&"-af".to_string()));
    }

    fn shell_sink(script: &str) -> FrameWriter {
        let mut command = Command::new("sh");
        command.args(["-c", script]);
        FrameWriter::start(command, 64 * 64 * 4).unwrap()
    }

    fn blank_frame() -> RgbaImage {
        RgbaImage::new(64, 64)
    }

    #[test]
    fn test_writer_tolerates_encoder_stopping_early() {
        // Reads exactly one frame, then exits successfully.
        let mut writer = shell_sink("head -c 16384 >/dev/null");
        for _ in 0..200 {
            writer.write_frame(blank_frame()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_writer_reports_failed_encoder() {
        let mut writer = shell_sink("head -c 16384 >/dev/null; exit 3");
        for _ in 0..200 {
            writer.write_frame(blank_frame()).unwrap();
        }
        let err = writer.finish().unwrap_err();
        assert!(matches!(err, ReelError::Encode { .. }));
    }

    #[test]
    fn test_writer_consumes_every_frame() {
        let mut writer = shell_sink("cat >/dev/null");
        for _ in 0..10 {
            writer.write_frame(blank_frame()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_writer_rejects_wrong_frame_size() {
        let mut writer = shell_sink("cat >/dev/null");
        let err = writer.write_frame(RgbaImage::new(32, 32)).unwrap_err();
        assert!(err.to_string().contains("encoder expects"));
        writer.finish().unwrap();
    }

    #[test]
    fn test_command_exists_for_missing_path() {
        assert!(!command_exists(Path::new("/nonexistent/bin/ffmpeg")));
        assert!(!command_exists(Path::new("b50reel-definitely-not-a-tool")));
    }
}
