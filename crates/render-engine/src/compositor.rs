//! Frame compositor: places video, score card, panels and text on a canvas.
//!
//! A [`ClipScene`] is built once per clip. It holds the pre-rendered static
//! layers and the rectangle the decoded video occupies, and turns each
//! decoded frame into an output frame. Still previews go through the same
//! scene, so a preview matches frame 0 of the rendered clip.

use std::path::Path;

use b50reel_common::error::{ReelError, ReelResult};
use b50reel_project_model::{MainClipConfig, PageConfig, Resolution, StyleConfig, TextStyle};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::text::{draw_text_block, FontCache, FontFace};

/// Normalized `(x, y, w, h)` regions of the main-clip layout.
pub const MAIN_VIDEO_REGION: (f64, f64, f64, f64) = (0.05, 0.25, 0.55, 0.55);
pub const MAIN_CARD_REGION: (f64, f64, f64, f64) = (0.05, 0.03, 0.55, 0.20);
pub const MAIN_TEXT_REGION: (f64, f64, f64, f64) = (0.64, 0.25, 0.32, 0.60);

/// Normalized regions of the intro/outro layout.
pub const PAGE_PANEL_REGION: (f64, f64, f64, f64) = (0.10, 0.10, 0.80, 0.80);
pub const PAGE_TEXT_REGION: (f64, f64, f64, f64) = (0.15, 0.16, 0.70, 0.68);

/// Brightness multiplier of the blurred score-card background.
const BACKGROUND_DIM: f32 = 0.45;
const BACKGROUND_BLUR_SIGMA: f32 = 6.0;
/// The blurred background is computed at this fraction of the frame size.
const BACKGROUND_BLUR_SCALE: u32 = 8;

/// Pixel rectangle on the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_normalized(resolution: Resolution, region: (f64, f64, f64, f64)) -> Self {
        let (x, y, w, h) = resolution.scale_region(region);
        // Even sizes keep the decoder's scale/pad filter exact.
        Self::new(x as i32, y as i32, (w & !1).max(2), (h & !1).max(2))
    }

    pub fn full(resolution: Resolution) -> Self {
        Self::new(0, 0, resolution.width, resolution.height)
    }
}

/// Largest rectangle with the source aspect ratio that fits inside
/// `target`, centered.
pub fn fit_rect(src_width: u32, src_height: u32, target: Rect) -> Rect {
    if src_width == 0 || src_height == 0 {
        return target;
    }
    let scale = (target.width as f64 / src_width as f64)
        .min(target.height as f64 / src_height as f64);
    let w = ((src_width as f64 * scale).round() as u32).clamp(1, target.width.max(1));
    let h = ((src_height as f64 * scale).round() as u32).clamp(1, target.height.max(1));
    Rect::new(
        target.x + (target.width - w) as i32 / 2,
        target.y + (target.height - h) as i32 / 2,
        w,
        h,
    )
}

/// Scale `image` to cover `width`x`height` and crop the overflow evenly.
pub fn cover_resize(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
        return RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    }
    let scale = (width as f64 / src_w as f64).max(height as f64 / src_h as f64);
    let scaled_w = ((src_w as f64 * scale).ceil() as u32).max(width);
    let scaled_h = ((src_h as f64 * scale).ceil() as u32).max(height);
    let scaled = imageops::resize(image, scaled_w, scaled_h, FilterType::Triangle);
    let x = (scaled_w - width) / 2;
    let y = (scaled_h - height) / 2;
    imageops::crop_imm(&scaled, x, y, width, height).to_image()
}

/// Blend `overlay`, scaled to fit `region` with its aspect ratio, onto `base`.
pub fn compose_frame(base: &mut RgbaImage, overlay: &RgbaImage, region: Rect) {
    let placed = fit_rect(overlay.width(), overlay.height(), region);
    if placed.width == overlay.width() && placed.height == overlay.height() {
        imageops::overlay(base, overlay, placed.x as i64, placed.y as i64);
        return;
    }
    let scaled = imageops::resize(overlay, placed.width, placed.height, FilterType::Lanczos3);
    imageops::overlay(base, &scaled, placed.x as i64, placed.y as i64);
}

/// Draw a wrapped text block into `region` of `base`.
pub fn compose_text_block(
    base: &mut RgbaImage,
    font: &FontFace,
    text: &str,
    style: &TextStyle,
    region: Rect,
) {
    draw_text_block(base, font, text, style, region);
}

/// A pre-rendered layer drawn over every frame, or over frames inside
/// `visible` when set.
#[derive(Debug, Clone)]
pub struct OverlayLayer {
    pub image: RgbaImage,
    pub x: i64,
    pub y: i64,
    /// `[from, to)` in seconds from the start of the clip.
    pub visible: Option<(f64, f64)>,
}

impl OverlayLayer {
    pub fn is_visible_at(&self, t: f64) -> bool {
        match self.visible {
            Some((from, to)) => t >= from && t < to,
            None => true,
        }
    }
}

#[derive(Debug, Clone)]
enum SceneBase {
    /// A fixed background with the video placed in a window.
    Static(RgbaImage),
    /// The decoded video fills the frame.
    FullFrameVideo,
}

/// Everything needed to turn decoded video frames into output frames.
#[derive(Debug, Clone)]
pub struct ClipScene {
    resolution: Resolution,
    base: SceneBase,
    video_window: Rect,
    layers: Vec<OverlayLayer>,
}

impl ClipScene {
    /// Main-content scene: background, windowed video, score card, commentary.
    pub fn main(
        clip: &MainClipConfig,
        style: &StyleConfig,
        resolution: Resolution,
        fonts: &FontCache,
    ) -> ReelResult<Self> {
        let card = load_rgba(&clip.main_image)?;

        let background = if style.options.override_content_default_bg {
            let bg = load_rgba(&style.asset_paths.content_bg)?;
            cover_resize(&bg, resolution.width, resolution.height)
        } else {
            blurred_background(&card, resolution)
        };

        let card_rect = fit_rect(
            card.width(),
            card.height(),
            Rect::from_normalized(resolution, MAIN_CARD_REGION),
        );
        let card_image = imageops::resize(&card, card_rect.width, card_rect.height, FilterType::Lanczos3);
        let card_visible = style
            .options
            .score_card_display_secs
            .filter(|secs| *secs > 0.0)
            .map(|secs| (0.0, secs));

        let mut layers = vec![OverlayLayer {
            image: card_image,
            x: card_rect.x as i64,
            y: card_rect.y as i64,
            visible: card_visible,
        }];
        if let Some(text) = text_layer(
            &clip.text,
            &style.content_text_style,
            &style.asset_paths.comment_font,
            Rect::from_normalized(resolution, MAIN_TEXT_REGION),
            fonts,
        )? {
            layers.push(text);
        }

        Ok(Self {
            resolution,
            base: SceneBase::Static(background),
            video_window: Rect::from_normalized(resolution, MAIN_VIDEO_REGION),
            layers,
        })
    }

    /// Intro/outro scene: full-frame background video, text panel, text.
    pub fn page(
        page: &PageConfig,
        style: &StyleConfig,
        resolution: Resolution,
        fonts: &FontCache,
    ) -> ReelResult<Self> {
        let panel = load_rgba(&style.asset_paths.intro_text_bg)?;
        let panel_rect = Rect::from_normalized(resolution, PAGE_PANEL_REGION);
        let panel_image = imageops::resize(&panel, panel_rect.width, panel_rect.height, FilterType::Lanczos3);

        let mut layers = vec![OverlayLayer {
            image: panel_image,
            x: panel_rect.x as i64,
            y: panel_rect.y as i64,
            visible: None,
        }];
        if let Some(text) = text_layer(
            &page.text,
            &style.intro_text_style,
            &style.asset_paths.comment_font,
            Rect::from_normalized(resolution, PAGE_TEXT_REGION),
            fonts,
        )? {
            layers.push(text);
        }

        Ok(Self {
            resolution,
            base: SceneBase::FullFrameVideo,
            video_window: Rect::full(resolution),
            layers,
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Size and position the decoder output must have.
    pub fn video_window(&self) -> Rect {
        self.video_window
    }

    pub fn layers(&self) -> &[OverlayLayer] {
        &self.layers
    }

    /// Composite one output frame at `t` seconds into the clip.
    ///
    /// `video` must be `video_window()` sized; when absent the window is black.
    pub fn render_frame(&self, video: Option<&RgbaImage>, t: f64) -> RgbaImage {
        let Resolution { width, height } = self.resolution;
        let mut canvas = match &self.base {
            SceneBase::Static(bg) => bg.clone(),
            SceneBase::FullFrameVideo => match video {
                Some(frame) if frame.dimensions() == (width, height) => frame.clone(),
                _ => RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
            },
        };

        if let SceneBase::Static(_) = self.base {
            let window = self.video_window;
            match video {
                Some(frame) => {
                    imageops::replace(&mut canvas, frame, window.x as i64, window.y as i64)
                }
                None => {
                    let black = RgbaImage::from_pixel(window.width, window.height, Rgba([0, 0, 0, 255]));
                    imageops::replace(&mut canvas, &black, window.x as i64, window.y as i64);
                }
            }
        }

        for layer in self.layers.iter().filter(|l| l.is_visible_at(t)) {
            imageops::overlay(&mut canvas, &layer.image, layer.x, layer.y);
        }
        canvas
    }
}

/// Render wrapped text onto a transparent layer covering `region`.
fn text_layer(
    text: &str,
    style: &TextStyle,
    font_path: &Path,
    region: Rect,
    fonts: &FontCache,
) -> ReelResult<Option<OverlayLayer>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let font = fonts.get(font_path)?;
    // Leave room for the stroke so outlines at the region edge are kept.
    let margin = if style.enable_stroke {
        style.stroke_width as i32
    } else {
        0
    };
    let mut image = RgbaImage::new(
        region.width + 2 * margin as u32,
        region.height + 2 * margin as u32,
    );
    let local = Rect::new(margin, margin, region.width, region.height);
    compose_text_block(&mut image, &font, text, style, local);
    Ok(Some(OverlayLayer {
        image,
        x: (region.x - margin) as i64,
        y: (region.y - margin) as i64,
        visible: None,
    }))
}

/// Score card scaled to cover the frame, blurred and darkened.
pub fn blurred_background(card: &RgbaImage, resolution: Resolution) -> RgbaImage {
    let small_w = (resolution.width / BACKGROUND_BLUR_SCALE).max(1);
    let small_h = (resolution.height / BACKGROUND_BLUR_SCALE).max(1);
    let small = cover_resize(card, small_w, small_h);
    let mut blurred = imageops::blur(&small, BACKGROUND_BLUR_SIGMA);
    for px in blurred.pixels_mut() {
        for c in 0..3 {
            px[c] = (px[c] as f32 * BACKGROUND_DIM).round() as u8;
        }
        px[3] = 255;
    }
    imageops::resize(&blurred, resolution.width, resolution.height, FilterType::Triangle)
}

/// Load an image as RGBA, naming the path in any error.
pub fn load_rgba(path: &Path) -> ReelResult<RgbaImage> {
    if !path.exists() {
        return Err(ReelError::missing(path));
    }
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|e| ReelError::invalid_asset(path, e.to_string()))
}
