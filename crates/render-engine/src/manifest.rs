//! Render manifest written next to the rendered clips.
//!
//! The manifest records what the last batch produced, in job order, so the
//! assembler can be run later against the same directory without the
//! original job description.

use std::path::{Path, PathBuf};

use b50reel_common::error::{ReelError, ReelResult};
use b50reel_project_model::{ClipKind, RenderSettings};
use serde::{Deserialize, Serialize};

use crate::outcome::OperationStatus;

pub const MANIFEST_FILE_NAME: &str = "render_manifest.json";
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderManifest {
    pub version: u32,

    /// RFC 3339 time the batch finished.
    pub created_at: String,

    pub settings: RenderSettings,

    /// Extra seconds each clip was rendered with for transitions.
    pub transition_overlap: f64,

    /// One entry per clip, in job order.
    pub clips: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub clip_id: String,
    pub kind: ClipKind,
    pub status: OperationStatus,
    /// File name relative to the manifest directory.
    pub file: String,
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub info: String,
}

impl RenderManifest {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE_NAME)
    }

    pub fn load(dir: &Path) -> ReelResult<Self> {
        let path = Self::path_in(dir);
        if !path.exists() {
            return Err(ReelError::missing(path));
        }
        let content = std::fs::read_to_string(&path)?;
        let manifest: Self = serde_json::from_str(&content)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ReelError::invalid_asset(
                path,
                format!("unsupported manifest version {}", manifest.version),
            ));
        }
        Ok(manifest)
    }

    pub fn save(&self, dir: &Path) -> ReelResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = Self::path_in(dir);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    /// Entries that did not produce a usable file.
    pub fn failed(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.clips
            .iter()
            .filter(|c| c.status == OperationStatus::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use b50reel_project_model::Resolution;

    #[test]
    fn test_manifest_save_load() {
        let dir = std::env::temp_dir().join(format!("b50reel_manifest_{}", std::process::id()));
        let manifest = RenderManifest {
            version: MANIFEST_VERSION,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            settings: RenderSettings::new(Resolution::new(1280, 720).unwrap(), 4000, 30).unwrap(),
            transition_overlap: 1.5,
            clips: vec![ManifestEntry {
                clip_id: "clip_1".to_string(),
                kind: ClipKind::Main,
                status: OperationStatus::Success,
                file: "clip_1.mp4".to_string(),
                duration_secs: Some(6.5),
                info: String::new(),
            }],
        };
        let path = manifest.save(&dir).unwrap();
        assert!(path.ends_with(MANIFEST_FILE_NAME));
        assert_eq!(RenderManifest::load(&dir).unwrap(), manifest);
        assert_eq!(manifest.failed().count(), 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_manifest_names_path() {
        let err = RenderManifest::load(Path::new("/nonexistent/b50reel")).unwrap_err();
        assert!(err.to_string().contains(MANIFEST_FILE_NAME));
    }
}
