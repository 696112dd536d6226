//! Video style configuration.
//!
//! A style is loaded once per render session and shared read-only by every
//! clip in the batch. It selects background assets, fonts, and the text
//! styles used for intro/outro pages and clip commentary.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::job::ModelError;

/// Top-level style file (`video_style_config.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Background media, fonts, and music.
    pub asset_paths: AssetPaths,

    /// Behaviour toggles.
    #[serde(default)]
    pub options: StyleOptions,

    /// Text style for intro and outro pages.
    #[serde(default = "TextStyle::intro_default")]
    pub intro_text_style: TextStyle,

    /// Text style for main-clip commentary.
    #[serde(default = "TextStyle::content_default")]
    pub content_text_style: TextStyle,
}

/// Paths to every asset a render may touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPaths {
    /// Looping background video behind intro/outro pages.
    pub intro_video_bg: PathBuf,

    /// Text panel image drawn over the intro/outro background.
    pub intro_text_bg: PathBuf,

    /// Shared main-clip background, used when overriding the default.
    pub content_bg: PathBuf,

    /// Background music for intro/outro pages.
    #[serde(default)]
    pub intro_bgm: Option<PathBuf>,

    /// Font for score cards.
    pub ui_font: PathBuf,

    /// Font for intro/outro text and commentary.
    pub comment_font: PathBuf,

    /// Base image the score card is drawn on.
    pub score_card_bg: PathBuf,
}

/// Style options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOptions {
    /// Use `content_bg` for every main clip instead of the blurred score card.
    pub override_content_default_bg: bool,

    /// Show the score card only during the first N seconds of a main clip.
    pub score_card_display_secs: Option<f64>,
}

/// Horizontal alignment of each line inside a text region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Text rendering parameters for a block of wrapped text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Font size in pixels.
    pub font_size: u32,

    /// Extra pixels between consecutive lines.
    pub interline: f64,

    /// Alignment of each line inside the text region.
    #[serde(default)]
    pub horizontal_align: HorizontalAlign,

    /// Lines longer than this many characters wrap.
    pub inline_max_chara: usize,

    /// Fill colour.
    pub font_color: HexColor,

    /// Whether glyphs get an outline.
    #[serde(default)]
    pub enable_stroke: bool,

    /// Outline colour (black when absent).
    #[serde(default)]
    pub stroke_color: Option<HexColor>,

    /// Outline width in pixels.
    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,
}

fn default_stroke_width() -> u32 {
    2
}

impl TextStyle {
    /// Defaults for intro/outro pages.
    pub fn intro_default() -> Self {
        Self {
            font_size: 44,
            interline: 6.5,
            horizontal_align: HorizontalAlign::Left,
            inline_max_chara: 26,
            font_color: HexColor::WHITE,
            enable_stroke: true,
            stroke_color: Some(HexColor::BLACK),
            stroke_width: 2,
        }
    }

    /// Defaults for clip commentary.
    pub fn content_default() -> Self {
        Self {
            font_size: 28,
            inline_max_chara: 24,
            ..Self::intro_default()
        }
    }

    /// Ratio of line pitch to font size.
    ///
    /// A block of `n` lines is `n * font_size * interline_factor` pixels tall.
    pub fn interline_factor(&self) -> f64 {
        let size = self.font_size.max(1) as f64;
        1.0 + self.interline.max(0.0) / size
    }

    /// Distance between consecutive baselines in pixels.
    pub fn line_height(&self) -> f64 {
        self.font_size as f64 * self.interline_factor()
    }

    /// Stroke colour, defaulting to black.
    pub fn effective_stroke_color(&self) -> HexColor {
        self.stroke_color.unwrap_or(HexColor::BLACK)
    }
}

impl StyleConfig {
    /// Load a style from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        crate::job::read_json(path.as_ref())
    }

    /// Save the style to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        crate::job::write_json(path.as_ref(), self)
    }

    /// List every required asset path that does not exist on disk.
    pub fn missing_assets(&self) -> Vec<PathBuf> {
        let a = &self.asset_paths;
        let mut required = vec![
            &a.intro_video_bg,
            &a.intro_text_bg,
            &a.ui_font,
            &a.comment_font,
            &a.score_card_bg,
        ];
        if self.options.override_content_default_bg {
            required.push(&a.content_bg);
        }
        if let Some(bgm) = &a.intro_bgm {
            required.push(bgm);
        }
        required
            .into_iter()
            .filter(|p| !p.exists())
            .cloned()
            .collect()
    }
}

/// An sRGB colour written as `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl HexColor {
    pub const WHITE: HexColor = HexColor::rgb(255, 255, 255);
    pub const BLACK: HexColor = HexColor::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// RGBA channel array.
    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl FromStr for HexColor {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::Validation {
            message: format!("invalid colour '{s}', expected #RRGGBB or #RRGGBBAA"),
        };
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if hex.len() == 8 { channel(6)? } else { 255 },
        })
    }
}

impl TryFrom<String> for HexColor {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.to_string()
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_style() -> StyleConfig {
        StyleConfig {
            asset_paths: AssetPaths {
                intro_video_bg: "static/assets/bg_clips/intro.mp4".into(),
                intro_text_bg: "static/assets/backgrounds/intro_text_bg.png".into(),
                content_bg: "static/assets/backgrounds/content_bg.png".into(),
                intro_bgm: None,
                ui_font: "static/assets/fonts/ui.ttf".into(),
                comment_font: "static/assets/fonts/comment.ttf".into(),
                score_card_bg: "static/assets/backgrounds/card.png".into(),
            },
            options: StyleOptions::default(),
            intro_text_style: TextStyle::intro_default(),
            content_text_style: TextStyle::content_default(),
        }
    }

    #[test]
    fn test_hex_color_parsing() {
        assert_eq!("#FFFFFF".parse::<HexColor>().unwrap(), HexColor::WHITE);
        assert_eq!(
            "#10203080".parse::<HexColor>().unwrap(),
            HexColor {
                r: 0x10,
                g: 0x20,
                b: 0x30,
                a: 0x80
            }
        );
        assert!("FFFFFF".parse::<HexColor>().is_err());
        assert!("#FFF".parse::<HexColor>().is_err());
        assert!("#GG0000".parse::<HexColor>().is_err());
    }

    #[test]
    fn test_interline_factor_matches_line_pitch() {
        let style = TextStyle::content_default();
        let block = 3.0 * style.font_size as f64 * style.interline_factor();
        assert!((block - 3.0 * (28.0 + 6.5)).abs() < 1e-9);
    }

    #[test]
    fn test_style_roundtrip_keeps_colours_as_strings() {
        let style = sample_style();
        let json = serde_json::to_value(&style).unwrap();
        assert_eq!(json["intro_text_style"]["font_color"], "#FFFFFF");
        let parsed: StyleConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, style);
    }

    #[test]
    fn test_style_with_malformed_colour_is_rejected() {
        let mut json = serde_json::to_value(sample_style()).unwrap();
        json["content_text_style"]["font_color"] = "white".into();
        assert!(serde_json::from_value::<StyleConfig>(json).is_err());
    }

    #[test]
    fn test_missing_text_styles_fall_back_to_defaults() {
        let mut json = serde_json::to_value(sample_style()).unwrap();
        let object = json.as_object_mut().unwrap();
        object.remove("intro_text_style");
        object.remove("content_text_style");
        object.remove("options");

        let parsed: StyleConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.intro_text_style.font_size, 44);
        assert_eq!(parsed.content_text_style.inline_max_chara, 24);
        assert!(!parsed.options.override_content_default_bg);
    }

    #[test]
    fn test_missing_assets_lists_nonexistent_paths() {
        let style = sample_style();
        let missing = style.missing_assets();
        assert!(missing.contains(&PathBuf::from("static/assets/fonts/ui.ttf")));
        assert!(!missing.contains(&PathBuf::from(
            "static/assets/backgrounds/content_bg.png"
        )));
    }
}
