//! Clip configurations and time windows.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Length given to a window whose end does not follow its start, and the
/// shift applied when a window runs past the end of its source.
pub const DEFAULT_WINDOW_SECS: f64 = 5.0;

/// A `[start, end)` range in seconds of a source video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

/// Result of fitting a requested window to a source.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowFit {
    /// The window fits (possibly after adjustment).
    Fitted {
        window: TimeWindow,
        /// Human-readable notes for every adjustment made.
        adjustments: Vec<String>,
    },
    /// The window starts at or after the end of the source.
    OutOfRange { start: f64, source_duration: f64 },
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Fit the window to a source of `source_duration` seconds.
    ///
    /// * `start < 0` → 0
    /// * `end <= start` → `end = start + 5`
    /// * `start >= source_duration` → out of range
    /// * `end > source_duration` → `end = source_duration`, `start = max(end - 5, 0)`
    pub fn clamp_to(&self, source_duration: f64) -> WindowFit {
        let mut adjustments = Vec::new();
        let mut start = self.start;
        let mut end = self.end;

        if !start.is_finite() || start < 0.0 {
            adjustments.push(format!("start {start} moved to 0"));
            start = 0.0;
        }
        if !end.is_finite() || end <= start {
            let fixed = start + DEFAULT_WINDOW_SECS;
            adjustments.push(format!("end {end} not after start, set to {fixed}"));
            end = fixed;
        }
        if start >= source_duration {
            return WindowFit::OutOfRange {
                start,
                source_duration,
            };
        }
        if end > source_duration {
            let shifted = (source_duration - DEFAULT_WINDOW_SECS).max(0.0);
            adjustments.push(format!(
                "window {start:.3}-{end:.3} exceeds source length {source_duration:.3}, \
                 clamped to {shifted:.3}-{source_duration:.3}"
            ));
            end = source_duration;
            start = shifted;
        }

        WindowFit::Fitted {
            window: TimeWindow { start, end },
            adjustments,
        }
    }

    /// Lengthen the window by `extra` seconds for a transition overlap.
    ///
    /// The end moves forward first. When the source is too short the start
    /// moves backward instead, so the duration grows by `extra` whenever the
    /// source is long enough.
    pub fn extend_for_overlap(&self, extra: f64, source_duration: f64) -> TimeWindow {
        let extra = extra.max(0.0);
        let mut end = self.end + extra;
        let mut start = self.start;
        if end > source_duration {
            let overflow = end - source_duration;
            end = source_duration;
            start = (start - overflow).max(0.0);
        }
        TimeWindow { start, end }
    }
}

/// One main-content segment of the video configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainClipConfig {
    /// Stable identifier used for output naming.
    pub id: String,

    #[serde(default)]
    pub clip_name: String,

    #[serde(default)]
    pub achievement_title: String,

    #[serde(default)]
    pub song_id: i64,

    #[serde(default)]
    pub level_index: u8,

    #[serde(rename = "type", default)]
    pub chart_type: String,

    /// Pre-rendered score card.
    pub main_image: PathBuf,

    /// Source video.
    pub video: PathBuf,

    pub start: f64,

    pub end: f64,

    /// Commentary, possibly empty.
    #[serde(default)]
    pub text: String,
}

impl MainClipConfig {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    /// Derived from the window; never stored.
    pub fn duration(&self) -> f64 {
        self.window().duration()
    }
}

/// An intro or outro page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    pub id: String,

    /// Fixed length in seconds.
    pub duration: f64,

    #[serde(default)]
    pub text: String,
}

/// Where a clip sits in the final video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    Intro,
    Main,
    Ending,
}

/// A single entry of a render job.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipEntry {
    Intro(PageConfig),
    Main(MainClipConfig),
    Ending(PageConfig),
}

impl ClipEntry {
    pub fn id(&self) -> &str {
        match self {
            ClipEntry::Intro(p) | ClipEntry::Ending(p) => &p.id,
            ClipEntry::Main(m) => &m.id,
        }
    }

    pub fn kind(&self) -> ClipKind {
        match self {
            ClipEntry::Intro(_) => ClipKind::Intro,
            ClipEntry::Main(_) => ClipKind::Main,
            ClipEntry::Ending(_) => ClipKind::Ending,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            ClipEntry::Intro(p) | ClipEntry::Ending(p) => &p.text,
            ClipEntry::Main(m) => &m.text,
        }
    }

    /// Duration before any transition overlap is added.
    pub fn nominal_duration(&self) -> f64 {
        match self {
            ClipEntry::Intro(p) | ClipEntry::Ending(p) => p.duration.max(0.0),
            ClipEntry::Main(m) => m.duration(),
        }
    }

    pub fn as_main(&self) -> Option<&MainClipConfig> {
        match self {
            ClipEntry::Main(m) => Some(m),
            _ => None,
        }
    }

    /// Output file name, `<id>.mp4`.
    pub fn output_file_name(&self) -> String {
        format!("{}.mp4", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fitted(fit: WindowFit) -> (TimeWindow, Vec<String>) {
        match fit {
            WindowFit::Fitted {
                window,
                adjustments,
            } => (window, adjustments),
            other => panic!("expected fitted window, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_window_is_untouched() {
        let (w, notes) = fitted(TimeWindow::new(65.0, 70.0).clamp_to(120.0));
        assert_eq!(w, TimeWindow::new(65.0, 70.0));
        assert!(notes.is_empty());
        assert!((w.duration() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_past_end_is_shifted_back() {
        let (w, notes) = fitted(TimeWindow::new(118.0, 125.0).clamp_to(120.0));
        assert_eq!(w, TimeWindow::new(115.0, 120.0));
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn test_negative_start_and_inverted_end() {
        let (w, notes) = fitted(TimeWindow::new(-2.0, -1.0).clamp_to(60.0));
        assert_eq!(w, TimeWindow::new(0.0, 5.0));
        assert_eq!(notes.len(), 2);
    }

    #[test]
    fn test_start_past_source_is_rejected() {
        assert!(matches!(
            TimeWindow::new(130.0, 135.0).clamp_to(120.0),
            WindowFit::OutOfRange { .. }
        ));
    }

    #[test]
    fn test_short_source_clamps_start_to_zero() {
        let (w, _) = fitted(TimeWindow::new(1.0, 10.0).clamp_to(3.0));
        assert_eq!(w, TimeWindow::new(0.0, 3.0));
    }

    #[test]
    fn test_overlap_extension() {
        let w = TimeWindow::new(10.0, 15.0).extend_for_overlap(1.5, 120.0);
        assert_eq!(w, TimeWindow::new(10.0, 16.5));

        let w = TimeWindow::new(115.0, 120.0).extend_for_overlap(1.5, 120.0);
        assert_eq!(w, TimeWindow::new(113.5, 120.0));
    }

    #[test]
    fn test_persisted_duration_key_is_ignored() {
        let clip: MainClipConfig = serde_json::from_value(serde_json::json!({
            "id": "clip_1",
            "clip_name": "Clip_1",
            "achievement_title": "Song",
            "song_id": 1,
            "level_index": 3,
            "type": "SD",
            "main_image": "images/clip_1.png",
            "video": "videos/clip_1.mp4",
            "duration": 99,
            "start": 10,
            "end": 20,
            "text": ""
        }))
        .unwrap();
        assert!((clip.duration() - 10.0).abs() < 1e-9);
        assert!(serde_json::to_value(&clip).unwrap().get("duration").is_none());
    }

    proptest! {
        #[test]
        fn prop_fitted_window_lies_inside_source(
            start in -50.0f64..200.0,
            end in -50.0f64..250.0,
            source in 1.0f64..180.0,
        ) {
            match TimeWindow::new(start, end).clamp_to(source) {
                WindowFit::Fitted { window, .. } => {
                    prop_assert!(window.start >= 0.0);
                    prop_assert!(window.start < window.end);
                    prop_assert!(window.end <= source + 1e-9);
                }
                WindowFit::OutOfRange { start: s, source_duration } => {
                    prop_assert!(s >= source_duration);
                }
            }
        }

        #[test]
        fn prop_overlap_adds_extra_when_source_allows(
            start in 0.0f64..100.0,
            len in 1.0f64..20.0,
            extra in 0.5f64..10.0,
        ) {
            let source = 200.0;
            let w = TimeWindow::new(start, start + len).extend_for_overlap(extra, source);
            prop_assert!((w.duration() - (len + extra)).abs() < 1e-9);
            prop_assert!(w.end <= source);
        }
    }
}
