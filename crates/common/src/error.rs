//! Error types shared across b50reel crates.

use std::path::PathBuf;

/// Top-level error type for render pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelError {
    #[error("Missing asset: {path}")]
    MissingAsset { path: PathBuf },

    #[error("Invalid asset {path}: {message}")]
    InvalidAsset { path: PathBuf, message: String },

    #[error("Invalid time window: {message}")]
    InvalidTimeWindow { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Assembly error: {message}")]
    Assembly { message: String },

    #[error("Required tool not available: {tool}")]
    ToolUnavailable { tool: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelError.
pub type ReelResult<T> = Result<T, ReelError>;

impl ReelError {
    pub fn missing(path: impl Into<PathBuf>) -> Self {
        Self::MissingAsset { path: path.into() }
    }

    pub fn invalid_asset(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::InvalidAsset {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn time_window(msg: impl Into<String>) -> Self {
        Self::InvalidTimeWindow {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn assembly(msg: impl Into<String>) -> Self {
        Self::Assembly {
            message: msg.into(),
        }
    }

    pub fn tool_unavailable(tool: impl Into<String>) -> Self {
        Self::ToolUnavailable { tool: tool.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_asset_names_path() {
        let err = ReelError::missing("/videos/clip_3.mp4");
        assert_eq!(err.to_string(), "Missing asset: /videos/clip_3.mp4");
    }

    #[test]
    fn test_encode_error_carries_diagnostic() {
        let err = ReelError::encode("ffmpeg exited with status 1");
        assert!(matches!(err, ReelError::Encode { .. }));
        assert!(err.to_string().contains("ffmpeg exited"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ReelError = io.into();
        assert!(matches!(err, ReelError::Io(_)));
    }
}
