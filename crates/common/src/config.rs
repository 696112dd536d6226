//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where rendered videos are written when no output is given.
    pub output_root: PathBuf,

    /// Default video render settings.
    pub video: VideoDefaults,

    /// External tool locations.
    #[serde(default)]
    pub tools: ToolPaths,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDefaults {
    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// Video bitrate in kbps.
    pub bitrate_kbps: u32,

    /// Whether transitions are added between clips of a full video.
    pub trans_enable: bool,

    /// Transition duration in seconds.
    pub trans_time: f64,

    /// Stop after rendering clips instead of assembling a full video.
    #[serde(default)]
    pub only_generate_clips: bool,

    /// Number of clips rendered concurrently (1 = strictly sequential).
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Program names or absolute paths for the external media tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    /// The optional `ffmpeg-concat` transition tool.
    pub ffmpeg_concat: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "b50reel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

fn default_workers() -> usize {
    1
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_root: dirs_default_output(),
            video: VideoDefaults::default(),
            tools: ToolPaths::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for VideoDefaults {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 60,
            bitrate_kbps: 5000,
            trans_enable: true,
            trans_time: 1.5,
            only_generate_clips: false,
            workers: default_workers(),
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            ffmpeg_concat: PathBuf::from("ffmpeg-concat"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("b50reel").join("config.json")
}

/// Default output directory.
fn dirs_default_output() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("b50reel").join("videos")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.video.width, 1920);
        assert_eq!(config.video.height, 1080);
        assert_eq!(config.video.bitrate_kbps, 5000);
        assert_eq!(config.video.workers, 1);
        assert_eq!(config.tools.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_legacy_config_without_tools_section() {
        let mut value = serde_json::to_value(AppConfig::default()).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("tools");
        object
            .get_mut("video")
            .and_then(serde_json::Value::as_object_mut)
            .unwrap()
            .remove("workers");

        let parsed: AppConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.tools.ffprobe, PathBuf::from("ffprobe"));
        assert_eq!(parsed.video.workers, 1);
    }

    #[test]
    fn test_load_from_unparseable_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("b50reel_test_bad_config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.video.fps, 60);

        std::fs::remove_file(&path).ok();
    }
}
