//! Clock and timing utilities for render jobs.
//!
//! Batch renders run for a long time, so progress reports carry elapsed
//! time and an ETA. Single-clip preview exports are named with a wall-clock
//! suffix so repeated exports never collide.

use std::time::Instant;

/// A monotonic clock anchored at the start of a render job.
#[derive(Debug, Clone)]
pub struct RenderClock {
    /// The instant the job started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,
}

impl RenderClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get seconds elapsed since the job started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at job start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Estimate remaining seconds after `done` of `total` units of work.
    pub fn eta_secs(&self, done: usize, total: usize) -> f64 {
        eta_secs(self.elapsed_secs(), done, total)
    }
}

/// Linear ETA: the average cost of finished units times the remaining count.
pub fn eta_secs(elapsed_secs: f64, done: usize, total: usize) -> f64 {
    if done == 0 || total <= done {
        return 0.0;
    }
    let per_unit = elapsed_secs / done as f64;
    (per_unit * (total - done) as f64).max(0.0)
}

/// Local wall-clock suffix used in exported file names (`YYYYmmdd_HHMMSS`).
pub fn timestamp_suffix() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Format seconds as `MM:SS` (minutes are not wrapped at 60).
pub fn format_mmss(secs: f64) -> String {
    let total = secs.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = RenderClock::start();
        assert!(clock.elapsed_secs() < 1.0);
        assert!(!clock.epoch_wall().is_empty());
    }

    #[test]
    fn test_eta_scales_with_remaining_work() {
        assert!((eta_secs(10.0, 2, 10) - 40.0).abs() < 1e-9);
        assert_eq!(eta_secs(10.0, 0, 10), 0.0);
        assert_eq!(eta_secs(10.0, 10, 10), 0.0);
    }

    #[test]
    fn test_timestamp_suffix_shape() {
        let suffix = timestamp_suffix();
        assert_eq!(suffix.len(), 15);
        assert_eq!(suffix.as_bytes()[8], b'_');
    }

    #[test]
    fn test_format_mmss() {
        assert_eq!(format_mmss(0.0), "00:00");
        assert_eq!(format_mmss(65.9), "01:05");
        assert_eq!(format_mmss(3600.0), "60:00");
    }
}
