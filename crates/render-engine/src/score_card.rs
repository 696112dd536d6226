//! Score-card images.
//!
//! A score card is drawn with the style's `ui_font` on top of
//! `score_card_bg`. All positions are fractions of the background size, so
//! any background resolution works. Output is deterministic: the same
//! inputs always produce the same PNG bytes.

use std::path::Path;

use b50reel_common::error::{ReelError, ReelResult};
use b50reel_project_model::{title_from_clip_name, warn_if_masked, ScoreRecord, StyleConfig};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as PixelRect;

use crate::compositor::load_rgba;
use crate::outcome::OperationResult;
use crate::text::{FontCache, FontFace};

const WHITE: [u8; 4] = [255, 255, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];
const GOLD: [u8; 4] = [255, 214, 64, 255];
const DX_BADGE: [u8; 3] = [255, 136, 0];
const SD_BADGE: [u8; 3] = [58, 141, 218];

/// Song titles longer than this are cut and suffixed with an ellipsis.
const MAX_TITLE_CHARS: usize = 30;

/// Render the score card for `record` headed by `title_text`.
pub fn render_score_card(
    style: &StyleConfig,
    record: &ScoreRecord,
    title_text: &str,
    fonts: &FontCache,
) -> ReelResult<RgbaImage> {
    let mut card = load_rgba(&style.asset_paths.score_card_bg)?;
    let font = fonts.get(&style.asset_paths.ui_font)?;
    let (w, h) = (card.width() as f32, card.height() as f32);
    let painter = Painter { font: &font, w, h };

    painter.text(&mut card, 0.04, 0.05, 0.10, title_text, WHITE, true);
    painter.text(&mut card, 0.04, 0.20, 0.08, &truncate_title(&record.title), WHITE, true);

    let badge_x = painter.badge(
        &mut card,
        0.04,
        0.34,
        0.11,
        record.difficulty_label(),
        record.difficulty_color(),
    );
    let type_color = if record.chart_type.eq_ignore_ascii_case("DX") {
        DX_BADGE
    } else {
        SD_BADGE
    };
    painter.badge(&mut card, badge_x + 0.015, 0.34, 0.11, &record.chart_type, type_color);

    painter.text(&mut card, 0.04, 0.50, 0.18, &record.achievement_text(), WHITE, true);
    if let Some(rank) = record.rank_text() {
        painter.text(&mut card, 0.64, 0.50, 0.18, &rank, GOLD, true);
    }

    let marks: Vec<&str> = [record.combo_text(), record.sync_text()]
        .into_iter()
        .flatten()
        .collect();
    if !marks.is_empty() {
        painter.text(&mut card, 0.64, 0.34, 0.09, &marks.join("  "), GOLD, true);
    }

    let stats = format!(
        "Lv {}   DS {:.1}   RA {}   DX {}",
        record.level, record.ds, record.ra, record.dx_score
    );
    painter.text(&mut card, 0.04, 0.80, 0.08, &stats, WHITE, true);

    Ok(card)
}

/// Render a score card and write it as PNG to `path`.
pub fn write_score_card(
    style: &StyleConfig,
    record: &ScoreRecord,
    title_text: &str,
    fonts: &FontCache,
    path: &Path,
) -> ReelResult<()> {
    let card = render_score_card(style, record, title_text, fonts)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    card.save_with_format(path, ImageFormat::Png)
        .map_err(|e| ReelError::invalid_asset(path, e.to_string()))?;
    tracing::debug!(clip_id = %record.clip_id, path = %path.display(), "Wrote score card");
    Ok(())
}

/// Render `<clip_id>.png` into `image_dir` for every record.
///
/// One result per record, in input order. A failure on one record does not
/// stop the others.
pub fn render_score_cards(
    records: &[ScoreRecord],
    style: &StyleConfig,
    image_dir: &Path,
    fonts: &FontCache,
) -> Vec<(String, OperationResult)> {
    warn_if_masked(records);

    records
        .iter()
        .map(|record| {
            let path = image_dir.join(format!("{}.png", record.clip_id));
            let title = title_from_clip_name(&record.clip_name);
            let result = match write_score_card(style, record, &title, fonts, &path) {
                Ok(()) => OperationResult::success(path.display().to_string()),
                Err(e) => {
                    tracing::error!(clip_id = %record.clip_id, error = %e, "Score card failed");
                    OperationResult::from_error(&record.clip_id, &e)
                }
            };
            (record.clip_id.clone(), result)
        })
        .collect()
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title.to_string();
    }
    let mut cut: String = title.chars().take(MAX_TITLE_CHARS - 1).collect();
    cut.push('…');
    cut
}

struct Painter<'a> {
    font: &'a FontFace,
    w: f32,
    h: f32,
}

impl Painter<'_> {
    /// Draw text at fractional position with a size relative to card height.
    #[allow(clippy::too_many_arguments)]
    fn text(
        &self,
        card: &mut RgbaImage,
        fx: f32,
        fy: f32,
        size_frac: f32,
        text: &str,
        color: [u8; 4],
        outlined: bool,
    ) {
        let size = (self.h * size_frac).max(1.0);
        let stroke = outlined.then(|| (BLACK, ((size / 16.0).round() as u32).max(1)));
        self.font.draw_stroked(
            card,
            (self.w * fx).round() as i32,
            (self.h * fy).round() as i32,
            text,
            size,
            color,
            stroke,
        );
    }

    /// Draw a filled badge with centered label. Returns the badge's right
    /// edge as a fraction of card width.
    fn badge(
        &self,
        card: &mut RgbaImage,
        fx: f32,
        fy: f32,
        height_frac: f32,
        label: &str,
        color: [u8; 3],
    ) -> f32 {
        let height = (self.h * height_frac).round().max(1.0);
        let size = height * 0.75;
        let padding = (height * 0.4).round() as i32;
        let text_w = self.font.measure(label, size);
        let width = (text_w + 2 * padding).max(1) as u32;
        let x = (self.w * fx).round() as i32;
        let y = (self.h * fy).round() as i32;

        draw_filled_rect_mut(
            card,
            PixelRect::at(x, y).of_size(width, height as u32),
            Rgba([color[0], color[1], color[2], 255]),
        );
        let text_y = y + ((height - size) / 2.0).round() as i32;
        self.font
            .draw_stroked(card, x + padding, text_y, label, size, WHITE, None);

        (x + width as i32) as f32 / self.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use b50reel_project_model::{AssetPaths, StyleOptions, TextStyle};
    use std::path::PathBuf;

    /// A font installed on most Linux systems, if any.
    fn find_system_font() -> Option<PathBuf> {
        [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
            "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
        ]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
    }

    fn record() -> ScoreRecord {
        serde_json::from_value(serde_json::json!({
            "achievements": 100.5,
            "ds": 13.7,
            "dxScore": 2100,
            "fc": "fcp",
            "fs": "",
            "level": "13+",
            "level_index": 2,
            "level_label": "",
            "ra": 301,
            "rate": "sssp",
            "song_id": 42,
            "title": "An Exceptionally Long Song Title That Needs Cutting",
            "type": "SD",
            "clip_name": "Clip_7",
            "clip_id": "clip_7"
        }))
        .unwrap()
    }

    fn style(dir: &Path, font: PathBuf) -> StyleConfig {
        StyleConfig {
            asset_paths: AssetPaths {
                intro_video_bg: dir.join("intro.mp4"),
                intro_text_bg: dir.join("panel.png"),
                content_bg: dir.join("content.png"),
                intro_bgm: None,
                ui_font: font.clone(),
                comment_font: font,
                score_card_bg: dir.join("card_bg.png"),
            },
            options: StyleOptions::default(),
            intro_text_style: TextStyle::intro_default(),
            content_text_style: TextStyle::content_default(),
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("b50reel_score_card_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_truncate_title() {
        assert_eq!(truncate_title("Short"), "Short");
        let cut = truncate_title(&"x".repeat(40));
        assert_eq!(cut.chars().count(), MAX_TITLE_CHARS);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_missing_background_names_path() {
        let dir = temp_dir("missing_bg");
        let style = style(&dir, dir.join("ui.ttf"));
        let err = render_score_card(&style, &record(), "Clip 7", &FontCache::new()).unwrap_err();
        assert!(matches!(err, ReelError::MissingAsset { .. }));
        assert!(err.to_string().contains("card_bg.png"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_font_fails_loudly() {
        let dir = temp_dir("missing_font");
        RgbaImage::from_pixel(64, 32, Rgba([0, 0, 0, 255]))
            .save(dir.join("card_bg.png"))
            .unwrap();
        let style = style(&dir, dir.join("ui.ttf"));
        let err = render_score_card(&style, &record(), "Clip 7", &FontCache::new()).unwrap_err();
        assert!(err.to_string().contains("ui.ttf"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_score_cards_are_deterministic() {
        let Some(font) = find_system_font() else {
            return;
        };
        let dir = temp_dir("deterministic");
        RgbaImage::from_pixel(800, 300, Rgba([20, 20, 40, 255]))
            .save(dir.join("card_bg.png"))
            .unwrap();
        let style = style(&dir, font);
        let fonts = FontCache::new();

        let results = render_score_cards(&[record()], &style, &dir.join("a"), &fonts);
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_ok(), "{:?}", results[0].1);
        render_score_cards(&[record()], &style, &dir.join("b"), &fonts);

        let a = std::fs::read(dir.join("a").join("clip_7.png")).unwrap();
        let b = std::fs::read(dir.join("b").join("clip_7.png")).unwrap();
        assert_eq!(a, b);

        let card = image::open(dir.join("a").join("clip_7.png")).unwrap();
        assert_eq!((card.width(), card.height()), (800, 300));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_batch_reports_each_record() {
        let dir = temp_dir("batch");
        let style = style(&dir, dir.join("ui.ttf"));
        let mut second = record();
        second.clip_id = "clip_8".to_string();
        let results = render_score_cards(&[record(), second], &style, &dir, &FontCache::new());
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].0, "clip_8");
        assert!(results.iter().all(|(_, r)| !r.is_ok()));
        std::fs::remove_dir_all(&dir).ok();
    }
}
