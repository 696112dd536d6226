//! Structured results returned at component boundaries.

use serde::{Deserialize, Serialize};

use b50reel_common::ReelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Skipped,
    Error,
}

impl OperationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::Success => "success",
            OperationStatus::Skipped => "skipped",
            OperationStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// `{status, info}` pair reported by every render and assemble call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub status: OperationStatus,
    pub info: String,
}

impl OperationResult {
    pub fn success(info: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Success,
            info: info.into(),
        }
    }

    pub fn skipped(info: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Skipped,
            info: info.into(),
        }
    }

    pub fn error(info: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Error,
            info: info.into(),
        }
    }

    /// Convert an error, prefixing the subject it concerns (usually a clip id).
    pub fn from_error(subject: &str, err: &ReelError) -> Self {
        Self::error(format!("{subject}: {err}"))
    }

    /// Success or skipped.
    pub fn is_ok(&self) -> bool {
        self.status != OperationStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let result = OperationResult::skipped("already rendered");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "skipped");
        assert!(result.is_ok());
    }

    #[test]
    fn test_from_error_names_subject() {
        let err = ReelError::missing("/videos/clip_2.mp4");
        let result = OperationResult::from_error("clip_2", &err);
        assert_eq!(result.status, OperationStatus::Error);
        assert!(result.info.starts_with("clip_2: "));
        assert!(result.info.contains("/videos/clip_2.mp4"));
    }
}
