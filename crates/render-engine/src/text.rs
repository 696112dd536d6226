//! TrueType text layout and drawing.
//!
//! Glyphs are rasterised with rusttype and blended straight into an RGBA
//! canvas, which may itself be transparent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use b50reel_common::error::{ReelError, ReelResult};
use b50reel_project_model::{HorizontalAlign, TextStyle};
use image::{Rgba, RgbaImage};
use rusttype::{point, Font, Scale};

use crate::compositor::Rect;

/// A loaded font file.
pub struct FontFace {
    font: Font<'static>,
    path: PathBuf,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace").field("path", &self.path).finish()
    }
}

impl FontFace {
    pub fn load(path: &Path) -> ReelResult<Self> {
        if !path.exists() {
            return Err(ReelError::missing(path));
        }
        let bytes = std::fs::read(path)?;
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| ReelError::invalid_asset(path, "not a TrueType/OpenType font"))?;
        Ok(Self {
            font,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Advance width of `text` in pixels.
    pub fn measure(&self, text: &str, size: f32) -> i32 {
        let scale = Scale::uniform(size);
        let ascent = self.font.v_metrics(scale).ascent;
        self.font
            .layout(text, scale, point(0.0, ascent))
            .last()
            .map(|g| {
                let advance = g.unpositioned().h_metrics().advance_width;
                (g.position().x + advance).ceil() as i32
            })
            .unwrap_or(0)
    }

    /// Draw one line with its top-left corner at `(x, y)`.
    pub fn draw(&self, canvas: &mut RgbaImage, x: i32, y: i32, text: &str, size: f32, color: [u8; 4]) {
        let scale = Scale::uniform(size);
        let ascent = self.font.v_metrics(scale).ascent;
        let (width, height) = canvas.dimensions();

        for glyph in self.font.layout(text, scale, point(x as f32, y as f32 + ascent)) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = bb.min.x + gx as i32;
                let py = bb.min.y + gy as i32;
                if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                    return;
                }
                blend_pixel(canvas.get_pixel_mut(px as u32, py as u32), color, coverage);
            });
        }
    }

    /// Draw with an 8-direction outline of `stroke_width` pixels under the fill.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_stroked(
        &self,
        canvas: &mut RgbaImage,
        x: i32,
        y: i32,
        text: &str,
        size: f32,
        fill: [u8; 4],
        stroke: Option<([u8; 4], u32)>,
    ) {
        if let Some((stroke_color, stroke_width)) = stroke {
            let w = stroke_width as i32;
            if w > 0 {
                for (dx, dy) in STROKE_OFFSETS {
                    self.draw(canvas, x + dx * w, y + dy * w, text, size, stroke_color);
                }
            }
        }
        self.draw(canvas, x, y, text, size, fill);
    }
}

const STROKE_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Source-over blend of `color` at `coverage` onto a straight-alpha pixel.
pub fn blend_pixel(dst: &mut Rgba<u8>, color: [u8; 4], coverage: f32) {
    let src_a = coverage.clamp(0.0, 1.0) * color[3] as f32 / 255.0;
    if src_a <= 0.0 {
        return;
    }
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let value =
            (color[c] as f32 * src_a + dst[c] as f32 * dst_a * (1.0 - src_a)) / out_a;
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Fonts shared across a batch, loaded on first use.
#[derive(Debug, Default, Clone)]
pub struct FontCache {
    fonts: Arc<Mutex<HashMap<PathBuf, Arc<FontFace>>>>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> ReelResult<Arc<FontFace>> {
        let mut fonts = self
            .fonts
            .lock()
            .map_err(|_| ReelError::Other(anyhow::anyhow!("font cache lock poisoned")))?;
        if let Some(font) = fonts.get(path) {
            return Ok(Arc::clone(font));
        }
        let font = Arc::new(FontFace::load(path)?);
        fonts.insert(path.to_path_buf(), Arc::clone(&font));
        tracing::debug!(path = %path.display(), "Loaded font");
        Ok(font)
    }
}

/// Split on `\n`, then wrap every line longer than `max_chars` characters
/// at a character boundary.
pub fn wrap_lines(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let chars: Vec<char> = line.chars().collect();
        if chars.len() <= max_chars {
            lines.push(line.to_string());
            continue;
        }
        for chunk in chars.chunks(max_chars) {
            lines.push(chunk.iter().collect());
        }
    }
    lines
}

/// A wrapped line positioned inside its region.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
}

/// Wrap `text` and position each line inside `region`.
///
/// Lines whose block would extend below the region are dropped.
/// `measure` returns a line's width in pixels.
pub fn layout_block(
    text: &str,
    style: &TextStyle,
    region: Rect,
    measure: impl Fn(&str) -> i32,
) -> Vec<PlacedLine> {
    let line_height = style.line_height();
    let mut lines = wrap_lines(text, style.inline_max_chara);
    let fitting = (0..=lines.len())
        .rev()
        .find(|&n| block_height(n, style) <= region.height as f64 + 0.5)
        .unwrap_or(0);
    if fitting < lines.len() {
        tracing::debug!(
            lines = lines.len(),
            kept = fitting,
            region_height = region.height,
            "Text block taller than its region, dropping overflow lines"
        );
        lines.truncate(fitting);
    }
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let slack = region.width as i32 - measure(&line);
            let offset = match style.horizontal_align {
                HorizontalAlign::Left => 0,
                HorizontalAlign::Center => slack / 2,
                HorizontalAlign::Right => slack,
            };
            PlacedLine {
                x: region.x + offset,
                y: region.y + (i as f64 * line_height).round() as i32,
                text: line,
            }
        })
        .collect()
}

/// Height of a laid-out block: `lines * font_size * interline_factor`.
pub fn block_height(line_count: usize, style: &TextStyle) -> f64 {
    line_count as f64 * style.font_size as f64 * style.interline_factor()
}

/// Draw wrapped text into `region` of `canvas` using `style`.
pub fn draw_text_block(
    canvas: &mut RgbaImage,
    font: &FontFace,
    text: &str,
    style: &TextStyle,
    region: Rect,
) {
    let size = style.font_size as f32;
    let stroke = style
        .enable_stroke
        .then(|| (style.effective_stroke_color().to_rgba(), style.stroke_width));
    let fill = style.font_color.to_rgba();
    for line in layout_block(text, style, region, |l| font.measure(l, size)) {
        font.draw_stroked(canvas, line.x, line.y, &line.text, size, fill, stroke);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_width(line: &str) -> i32 {
        line.chars().count() as i32 * 10
    }

    #[test]
    fn test_wrap_respects_newlines_and_limit() {
        let lines = wrap_lines("abcdefgh\nxy", 3);
        assert_eq!(lines, vec!["abc", "def", "gh", "xy"]);
        assert!(wrap_lines("", 10).is_empty());
        assert_eq!(wrap_lines("a\n\nb", 10), vec!["a", "", "b"]);
    }

    #[test]
    fn test_wrap_is_char_safe_for_cjk() {
        let lines = wrap_lines("今日は良い天気ですね", 4);
        assert_eq!(lines, vec!["今日は良", "い天気で", "すね"]);
    }

    #[test]
    fn test_zero_limit_does_not_loop() {
        assert_eq!(wrap_lines("abc", 0), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_layout_alignment() {
        let mut style = TextStyle::content_default();
        style.inline_max_chara = 100;
        let region = Rect::new(100, 50, 200, 400);

        style.horizontal_align = HorizontalAlign::Center;
        let lines = layout_block("abcd\nab", &style, region, fixed_width);
        assert_eq!(lines[0].x, 100 + (200 - 40) / 2);
        assert_eq!(lines[1].x, 100 + (200 - 20) / 2);
        assert_eq!(lines[1].y, 50 + (28.0f64 + 6.5).round() as i32);

        style.horizontal_align = HorizontalAlign::Right;
        let lines = layout_block("abcd", &style, region, fixed_width);
        assert_eq!(lines[0].x, 100 + 200 - 40);
    }

    #[test]
    fn test_layout_drops_lines_below_region() {
        let mut style = TextStyle::content_default();
        style.inline_max_chara = 2;
        // 34.5 px per line: three lines fit in 110 px, a fourth does not.
        let region = Rect::new(0, 0, 200, 110);
        let lines = layout_block("aabbccddee", &style, region, fixed_width);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].text, "cc");
        assert!(block_height(lines.len(), &style) <= 110.0);

        let tiny = Rect::new(0, 0, 200, 10);
        assert!(layout_block("aa", &style, tiny, fixed_width).is_empty());
    }

    #[test]
    fn test_block_height_formula() {
        let style = TextStyle::intro_default();
        let expected = 3.0 * 44.0 * (1.0 + 6.5 / 44.0);
        assert!((block_height(3, &style) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_blend_onto_transparent_keeps_colour() {
        let mut px = Rgba([0, 0, 0, 0]);
        blend_pixel(&mut px, [255, 255, 255, 255], 0.5);
        assert_eq!(px, Rgba([255, 255, 255, 128]));

        let mut opaque = Rgba([0, 0, 0, 255]);
        blend_pixel(&mut opaque, [255, 255, 255, 255], 1.0);
        assert_eq!(opaque, Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_missing_font_names_path() {
        let err = FontFace::load(Path::new("/nonexistent/fonts/comment.ttf")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/fonts/comment.ttf"));
    }

    #[test]
    fn test_invalid_font_is_rejected() {
        let path = std::env::temp_dir().join("b50reel_test_not_a_font.ttf");
        std::fs::write(&path, b"definitely not a font").unwrap();
        let err = FontFace::load(&path).unwrap_err();
        assert!(matches!(err, ReelError::InvalidAsset { .. }));
        std::fs::remove_file(&path).ok();
    }

    proptest! {
        #[test]
        fn prop_wrapped_lines_respect_limit(text in "[a-z\u{3040}-\u{30ff} \n]{0,120}", limit in 1usize..40) {
            let lines = wrap_lines(&text, limit);
            for line in &lines {
                prop_assert!(line.chars().count() <= limit);
            }
            let joined: String = lines.concat();
            let original: String = text.chars().filter(|c| *c != '\n').collect();
            prop_assert_eq!(joined, original);
        }

        #[test]
        fn prop_long_line_splits(len in 2usize..200, limit in 1usize..50) {
            prop_assume!(len > limit);
            let text: String = std::iter::repeat('x').take(len).collect();
            prop_assert!(wrap_lines(&text, limit).len() >= 2);
        }
    }
}
