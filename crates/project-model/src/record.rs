//! Score records and their display formatting.
//!
//! Records are produced by the score-tracking collaborator; this module only
//! reads them and derives the labels drawn on score cards.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::job::ModelError;

/// Difficulty names indexed by `level_index`.
pub const LEVEL_LABELS: [&str; 5] = ["BASIC", "ADVANCED", "EXPERT", "MASTER", "Re:MASTER"];

/// Badge colours indexed by `level_index` (RGB).
pub const LEVEL_COLORS: [[u8; 3]; 5] = [
    [0x45, 0xC1, 0x24],
    [0xFF, 0xBA, 0x01],
    [0xFF, 0x5A, 0x66],
    [0x9F, 0x51, 0xDC],
    [0xDB, 0xAA, 0xFF],
];

/// One chart result from a player's save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Achievement percentage (0.0 to 101.0).
    pub achievements: f64,

    /// Chart constant.
    pub ds: f64,

    #[serde(rename = "dxScore", default)]
    pub dx_score: u32,

    /// Combo mark (`fc`, `fcp`, `ap`, `app`) or empty.
    #[serde(default)]
    pub fc: String,

    /// Sync mark (`sync`, `fs`, `fsp`, `fsd`, `fsdp`) or empty.
    #[serde(default)]
    pub fs: String,

    /// Displayed level, e.g. `14+`.
    #[serde(default)]
    pub level: String,

    pub level_index: u8,

    #[serde(default)]
    pub level_label: String,

    /// Rating points.
    #[serde(default)]
    pub ra: u32,

    /// Rank mark such as `sssp`.
    #[serde(default)]
    pub rate: String,

    pub song_id: i64,

    pub title: String,

    /// Chart type, `DX` or `SD`.
    #[serde(rename = "type")]
    pub chart_type: String,

    /// Display name, e.g. `Clip_3`.
    pub clip_name: String,

    /// Stable identifier shared with the clip configuration.
    pub clip_id: String,
}

impl ScoreRecord {
    /// Achievement formatted to four decimals with a percent sign.
    pub fn achievement_text(&self) -> String {
        format!("{}%", format_achievement(self.achievements))
    }

    /// Difficulty label, falling back to the index table.
    pub fn difficulty_label(&self) -> &str {
        if !self.level_label.is_empty() {
            return &self.level_label;
        }
        level_label(self.level_index)
    }

    pub fn difficulty_color(&self) -> [u8; 3] {
        level_color(self.level_index)
    }

    pub fn rank_text(&self) -> Option<String> {
        rank_label(&self.rate)
    }

    pub fn combo_text(&self) -> Option<&'static str> {
        combo_label(&self.fc)
    }

    pub fn sync_text(&self) -> Option<&'static str> {
        sync_label(&self.fs)
    }

    /// Whether the achievement looks like it was published with one decimal.
    pub fn looks_masked(&self) -> bool {
        format_achievement(self.achievements).ends_with("000")
    }
}

/// Format an achievement to exactly four decimal places.
pub fn format_achievement(achievements: f64) -> String {
    format!("{:.4}", achievements)
}

pub fn level_label(level_index: u8) -> &'static str {
    LEVEL_LABELS
        .get(level_index as usize)
        .copied()
        .unwrap_or(LEVEL_LABELS[3])
}

pub fn level_color(level_index: u8) -> [u8; 3] {
    LEVEL_COLORS
        .get(level_index as usize)
        .copied()
        .unwrap_or(LEVEL_COLORS[3])
}

/// `sssp` → `SSS+`, `aa` → `AA`. Empty marks have no label.
pub fn rank_label(rate: &str) -> Option<String> {
    let rate = rate.trim();
    if rate.is_empty() {
        return None;
    }
    let upper = rate.to_ascii_uppercase();
    Some(match upper.strip_suffix('P') {
        Some(base) if !base.is_empty() => format!("{base}+"),
        _ => upper,
    })
}

pub fn combo_label(fc: &str) -> Option<&'static str> {
    match fc.trim() {
        "fc" => Some("FC"),
        "fcp" => Some("FC+"),
        "ap" => Some("AP"),
        "app" => Some("AP+"),
        _ => None,
    }
}

pub fn sync_label(fs: &str) -> Option<&'static str> {
    match fs.trim() {
        "sync" => Some("SYNC"),
        "fs" => Some("FS"),
        "fsp" => Some("FS+"),
        "fsd" => Some("FDX"),
        "fsdp" => Some("FDX+"),
        _ => None,
    }
}

/// `Clip_3` → `Clip 3`. Names without an underscore are returned unchanged.
pub fn title_from_clip_name(clip_name: &str) -> String {
    match clip_name.split_once('_') {
        Some((prefix, suffix)) => format!("{prefix} {suffix}"),
        None => clip_name.to_string(),
    }
}

/// Number of records whose achievement looks masked.
pub fn count_masked(records: &[ScoreRecord]) -> usize {
    records.iter().filter(|r| r.looks_masked()).count()
}

/// Warn once when more than three records look masked.
///
/// Returns whether the warning fired.
pub fn warn_if_masked(records: &[ScoreRecord]) -> bool {
    let masked = count_masked(records);
    if masked > 3 {
        tracing::warn!(
            masked,
            total = records.len(),
            "Many achievements end in 000; the score source may only publish one decimal"
        );
        return true;
    }
    false
}

/// Load a list of records from a JSON array file.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<ScoreRecord>, ModelError> {
    crate::job::read_json(path.as_ref())
}
