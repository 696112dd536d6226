//! Render jobs and their persisted inputs.
//!
//! A [`RenderJob`] is the ordered clip list plus every setting shared by the
//! batch. Its order is the order of segments in the assembled video.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::clip::{ClipEntry, MainClipConfig, PageConfig};

pub const MIN_DIMENSION: u32 = 360;
pub const MAX_DIMENSION: u32 = 4096;
pub const MIN_BITRATE_KBPS: u32 = 1000;
pub const MAX_BITRATE_KBPS: u32 = 10_000;
pub const MIN_TRANS_TIME: f64 = 0.5;
pub const MAX_TRANS_TIME: f64 = 10.0;

/// The persisted `{intro, main, ending}` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default)]
    pub intro: Vec<PageConfig>,

    #[serde(default)]
    pub main: Vec<MainClipConfig>,

    #[serde(default)]
    pub ending: Vec<PageConfig>,
}

impl VideoConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        read_json(path.as_ref())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        write_json(path.as_ref(), self)
    }

    pub fn find_main(&self, id: &str) -> Option<&MainClipConfig> {
        self.main.iter().find(|m| m.id == id)
    }

    /// Ordered clip entries: intro pages, main clips, outro pages.
    ///
    /// Ranked saves render their main clips in reverse, so the best record
    /// closes the video.
    pub fn entries(&self, save_kind: SaveKind) -> Vec<ClipEntry> {
        let mut entries = Vec::with_capacity(self.intro.len() + self.main.len() + self.ending.len());
        entries.extend(self.intro.iter().cloned().map(ClipEntry::Intro));
        if save_kind.is_ranked() {
            entries.extend(self.main.iter().rev().cloned().map(ClipEntry::Main));
        } else {
            entries.extend(self.main.iter().cloned().map(ClipEntry::Main));
        }
        entries.extend(self.ending.iter().cloned().map(ClipEntry::Ending));
        entries
    }
}

/// Kind of save a video is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaveKind {
    #[default]
    Best,
    Ap,
    Custom,
}

impl SaveKind {
    pub fn is_ranked(self) -> bool {
        matches!(self, SaveKind::Best | SaveKind::Ap)
    }
}

impl std::str::FromStr for SaveKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "best" => Ok(SaveKind::Best),
            "ap" => Ok(SaveKind::Ap),
            "custom" => Ok(SaveKind::Custom),
            other => Err(ModelError::Validation {
                message: format!("unknown save kind '{other}'"),
            }),
        }
    }
}

/// Output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Build a validated resolution.
    pub fn new(width: u32, height: u32) -> Result<Self, ModelError> {
        let resolution = Self { width, height };
        resolution.validate()?;
        Ok(resolution)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&value) {
                return Err(ModelError::Validation {
                    message: format!(
                        "{name} {value} outside [{MIN_DIMENSION}, {MAX_DIMENSION}]"
                    ),
                });
            }
            if value % 2 != 0 {
                return Err(ModelError::Validation {
                    message: format!("{name} {value} must be even"),
                });
            }
        }
        Ok(())
    }

    /// Scale a normalized `(x, y, w, h)` region to pixels.
    pub fn scale_region(&self, region: (f64, f64, f64, f64)) -> (u32, u32, u32, u32) {
        let (x, y, w, h) = region;
        let px = |v: f64, total: u32| (v * total as f64).round().max(0.0) as u32;
        (
            px(x, self.width),
            px(y, self.height),
            px(w, self.width).max(1),
            px(h, self.height).max(1),
        )
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Crossfade settings shared by rendering and assembly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionSettings {
    pub enabled: bool,
    /// Seconds of overlap at each boundary.
    pub duration: f64,
}

impl TransitionSettings {
    pub fn new(enabled: bool, duration: f64) -> Result<Self, ModelError> {
        if !(MIN_TRANS_TIME..=MAX_TRANS_TIME).contains(&duration) {
            return Err(ModelError::Validation {
                message: format!(
                    "transition time {duration} outside [{MIN_TRANS_TIME}, {MAX_TRANS_TIME}]"
                ),
            });
        }
        Ok(Self { enabled, duration })
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            duration: 1.5,
        }
    }

    /// Extra seconds each clip is rendered with.
    pub fn overlap(&self) -> f64 {
        if self.enabled {
            self.duration
        } else {
            0.0
        }
    }
}

/// Encoder settings shared by every clip of a job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub resolution: Resolution,
    pub bitrate_kbps: u32,
    pub fps: u32,
}

impl RenderSettings {
    pub fn new(resolution: Resolution, bitrate_kbps: u32, fps: u32) -> Result<Self, ModelError> {
        resolution.validate()?;
        if !(MIN_BITRATE_KBPS..=MAX_BITRATE_KBPS).contains(&bitrate_kbps) {
            return Err(ModelError::Validation {
                message: format!(
                    "bitrate {bitrate_kbps} kbps outside [{MIN_BITRATE_KBPS}, {MAX_BITRATE_KBPS}]"
                ),
            });
        }
        if fps == 0 || fps > 120 {
            return Err(ModelError::Validation {
                message: format!("frame rate {fps} outside [1, 120]"),
            });
        }
        Ok(Self {
            resolution,
            bitrate_kbps,
            fps,
        })
    }

    /// Duration of one frame in seconds.
    pub fn frame_secs(&self) -> f64 {
        1.0 / self.fps as f64
    }
}

/// Everything needed to render and assemble one video.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub entries: Vec<ClipEntry>,
    pub settings: RenderSettings,
    pub transition: TransitionSettings,
}

impl RenderJob {
    pub fn from_video_config(
        config: &VideoConfig,
        save_kind: SaveKind,
        settings: RenderSettings,
        transition: TransitionSettings,
    ) -> Result<Self, ModelError> {
        let job = Self {
            entries: config.entries(save_kind),
            settings,
            transition,
        };
        job.validate()?;
        Ok(job)
    }

    /// Reject empty jobs and duplicate clip ids.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.entries.is_empty() {
            return Err(ModelError::Validation {
                message: "render job has no clips".to_string(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for entry in &self.entries {
            if entry.id().is_empty() {
                return Err(ModelError::Validation {
                    message: "clip with empty id".to_string(),
                });
            }
            if !seen.insert(entry.id()) {
                return Err(ModelError::Validation {
                    message: format!("duplicate clip id '{}'", entry.id()),
                });
            }
        }
        Ok(())
    }

    /// Length of the assembled video when every clip renders nominally.
    pub fn expected_duration(&self) -> f64 {
        let overlap = self.transition.overlap();
        let sum: f64 = self
            .entries
            .iter()
            .map(|e| e.nominal_duration() + overlap)
            .sum();
        let boundaries = self.entries.len().saturating_sub(1) as f64;
        sum - boundaries * overlap
    }
}

/// Errors that can occur when reading or validating model files.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {message}")]
    Validation { message: String },
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let content = std::fs::read_to_string(path).map_err(|e| ModelError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ModelError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ModelError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ModelError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| ModelError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(path, json).map_err(|e| ModelError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn page(id: &str, duration: f64) -> PageConfig {
        PageConfig {
            id: id.to_string(),
            duration,
            text: String::new(),
        }
    }

    fn main_clip(id: &str, start: f64, end: f64) -> MainClipConfig {
        MainClipConfig {
            id: id.to_string(),
            clip_name: id.to_string(),
            achievement_title: String::new(),
            song_id: 0,
            level_index: 3,
            chart_type: "DX".to_string(),
            main_image: PathBuf::from(format!("images/{id}.png")),
            video: PathBuf::from(format!("videos/{id}.mp4")),
            start,
            end,
            text: String::new(),
        }
    }

    fn sample_config() -> VideoConfig {
        VideoConfig {
            intro: vec![page("intro_1", 3.0)],
            main: vec![
                main_clip("clip_1", 0.0, 5.0),
                main_clip("clip_2", 10.0, 14.0),
            ],
            ending: vec![page("ending_1", 2.0)],
        }
    }

    fn settings() -> RenderSettings {
        RenderSettings::new(Resolution::new(1920, 1080).unwrap(), 5000, 60).unwrap()
    }

    #[test]
    fn test_ranked_save_reverses_main_clips() {
        let config = sample_config();
        let ids: Vec<String> = config
            .entries(SaveKind::Best)
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(ids, vec!["intro_1", "clip_2", "clip_1", "ending_1"]);

        let custom: Vec<String> = config
            .entries(SaveKind::Custom)
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(custom, vec!["intro_1", "clip_1", "clip_2", "ending_1"]);
    }

    #[test]
    fn test_resolution_limits() {
        assert!(Resolution::new(1280, 720).is_ok());
        assert!(Resolution::new(1281, 720).is_err());
        assert!(Resolution::new(320, 240).is_err());
        assert!(Resolution::new(8192, 4320).is_err());
    }

    #[test]
    fn test_render_settings_limits() {
        let res = Resolution::new(1280, 720).unwrap();
        assert!(RenderSettings::new(res, 500, 30).is_err());
        assert!(RenderSettings::new(res, 20_000, 30).is_err());
        assert!(RenderSettings::new(res, 4000, 0).is_err());
        assert!(TransitionSettings::new(true, 0.1).is_err());
        assert!(TransitionSettings::new(true, 1.5).is_ok());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut config = sample_config();
        config.main[1].id = "clip_1".to_string();
        let err = RenderJob::from_video_config(
            &config,
            SaveKind::Custom,
            settings(),
            TransitionSettings::disabled(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_expected_duration_accounts_for_overlap() {
        let config = sample_config();
        let flat = RenderJob::from_video_config(
            &config,
            SaveKind::Best,
            settings(),
            TransitionSettings::disabled(),
        )
        .unwrap();
        assert!((flat.expected_duration() - 14.0).abs() < 1e-9);

        let faded = RenderJob::from_video_config(
            &config,
            SaveKind::Best,
            settings(),
            TransitionSettings::new(true, 1.0).unwrap(),
        )
        .unwrap();
        // Each clip gains the overlap and each boundary consumes it again.
        assert!((faded.expected_duration() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_video_config_save_load() {
        let dir = std::env::temp_dir().join("b50reel_test_video_config");
        let path = dir.join("video_config.json");
        let config = sample_config();
        config.save(&path).unwrap();

        let loaded = VideoConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = VideoConfig::load("/nonexistent/b50reel/video_config.json").unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
        assert!(err.to_string().contains("video_config.json"));
    }

    proptest! {
        #[test]
        fn prop_scaled_region_stays_inside_frame(
            x in 0.0f64..0.9,
            y in 0.0f64..0.9,
            w in 0.01f64..0.1,
            h in 0.01f64..0.1,
        ) {
            let res = Resolution::new(1280, 720).unwrap();
            let (px, py, pw, ph) = res.scale_region((x, y, w, h));
            prop_assert!(px + pw <= res.width + 1);
            prop_assert!(py + ph <= res.height + 1);
        }
    }
}
