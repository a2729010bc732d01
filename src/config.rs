//! Configuration types for image composition.
//!
//! Every layout knob (overlay box, trimming, centering, font size, text
//! position, line spacing, alignment, color) lives in [`ComposeConfig`],
//! built via its [`ComposeConfigBuilder`] or loaded from a JSON layout file.
//! One struct means a layout can be saved, diffed and reused across single,
//! batch and county runs.
//!
//! Defaults reproduce the layout the survey outreach template was designed
//! for (overlay box at 400,1060 sized 225×175; text at 650,1075, 54 px,
//! centered, `#2B4396`).

use crate::error::ImprintError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Configuration for composing one or more images.
///
/// # Example
/// ```rust
/// use imprint::{ComposeConfig, TextAlign};
///
/// let config = ComposeConfig::builder()
///     .overlay_box(400, 1060, 225, 175)
///     .font_size(48.0)
///     .align(TextAlign::Left)
///     .build()
///     .unwrap();
/// assert_eq!(config.text.font_size, 48.0);
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Where and how large the overlay may be.
    pub overlay: OverlayPlacement,

    /// Text position and appearance.
    pub text: TextStyle,

    /// Crop transparent borders from overlays before fitting. Default: true.
    ///
    /// Logos exported with generous transparent padding otherwise shrink to
    /// a fraction of the box and sit off-center.
    pub trim_whitespace: bool,

    /// Center the fitted overlay inside its box. Default: true.
    ///
    /// When false the overlay's top-left corner sits on the box origin.
    pub center_overlay: bool,

    /// Attach a [`crate::output::WhitespaceReport`] to every generated image.
    /// Default: false.
    pub analyze_whitespace: bool,

    /// Make pixels near this color transparent before trimming. Default: None.
    ///
    /// Useful for JPEG logos on a flat white background, which have no alpha
    /// channel to trim on.
    pub color_key: Option<ColorKey>,

    /// Batch progress events. Not part of the layout file.
    #[serde(skip)]
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            overlay: OverlayPlacement::default(),
            text: TextStyle::default(),
            trim_whitespace: true,
            center_overlay: true,
            analyze_whitespace: false,
            color_key: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ComposeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposeConfig")
            .field("overlay", &self.overlay)
            .field("text", &self.text)
            .field("trim_whitespace", &self.trim_whitespace)
            .field("center_overlay", &self.center_overlay)
            .field("analyze_whitespace", &self.analyze_whitespace)
            .field("color_key", &self.color_key)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ComposeConfig {
    /// Create a new builder for `ComposeConfig`.
    pub fn builder() -> ComposeConfigBuilder {
        ComposeConfigBuilder {
            config: Self::default(),
        }
    }

    /// Start a builder from an existing config, e.g. one loaded from a layout file.
    pub fn to_builder(&self) -> ComposeConfigBuilder {
        ComposeConfigBuilder {
            config: self.clone(),
        }
    }

    /// Parse a JSON layout. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ImprintError> {
        let config: ComposeConfig = serde_json::from_str(json)
            .map_err(|e| ImprintError::InvalidConfig(format!("layout: {e}")))?;
        config.to_builder().build()
    }

    /// Read and parse a JSON layout file.
    pub fn from_json_file(path: &Path) -> Result<Self, ImprintError> {
        let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ImprintError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => ImprintError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => ImprintError::InvalidConfig(format!("{}: {e}", path.display())),
        })?;
        Self::from_json_str(&json)
    }

    /// Serialise the layout (without the progress callback) as pretty JSON.
    pub fn to_json(&self) -> Result<String, ImprintError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ImprintError::Internal(format!("layout serialisation: {e}")))
    }
}

/// Builder for [`ComposeConfig`].
#[derive(Debug)]
pub struct ComposeConfigBuilder {
    config: ComposeConfig,
}

impl ComposeConfigBuilder {
    /// Overlay box origin and maximum size in template pixels.
    pub fn overlay_box(mut self, x: i64, y: i64, max_width: u32, max_height: u32) -> Self {
        self.config.overlay = OverlayPlacement {
            x,
            y,
            max_width,
            max_height,
        };
        self
    }

    pub fn trim_whitespace(mut self, v: bool) -> Self {
        self.config.trim_whitespace = v;
        self
    }

    pub fn center_overlay(mut self, v: bool) -> Self {
        self.config.center_overlay = v;
        self
    }

    pub fn analyze_whitespace(mut self, v: bool) -> Self {
        self.config.analyze_whitespace = v;
        self
    }

    pub fn color_key(mut self, key: ColorKey) -> Self {
        self.config.color_key = Some(key);
        self
    }

    pub fn text_position(mut self, x: i32, y: i32) -> Self {
        self.config.text.x = x;
        self.config.text.y = y;
        self
    }

    pub fn font_size(mut self, px: f32) -> Self {
        self.config.text.font_size = px.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        self
    }

    pub fn line_spacing(mut self, px: u32) -> Self {
        self.config.text.line_spacing = px.min(MAX_LINE_SPACING);
        self
    }

    pub fn align(mut self, align: TextAlign) -> Self {
        self.config.text.align = align;
        self
    }

    pub fn text_color(mut self, color: HexColor) -> Self {
        self.config.text.color = color;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ComposeConfig, ImprintError> {
        let c = &self.config;
        if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&c.text.font_size) {
            return Err(ImprintError::InvalidConfig(format!(
                "Font size must be {MIN_FONT_SIZE}–{MAX_FONT_SIZE}, got {}",
                c.text.font_size
            )));
        }
        if c.text.line_spacing > MAX_LINE_SPACING {
            return Err(ImprintError::InvalidConfig(format!(
                "Line spacing must be 0–{MAX_LINE_SPACING}, got {}",
                c.text.line_spacing
            )));
        }
        if c.overlay.max_width == 0 || c.overlay.max_height == 0 {
            return Err(ImprintError::InvalidConfig(
                "Overlay box must be at least 1×1".into(),
            ));
        }
        if let Some(key) = &c.color_key {
            if !key.threshold.is_finite() || key.threshold < 0.0 {
                return Err(ImprintError::InvalidConfig(format!(
                    "Color key threshold must be ≥ 0, got {}",
                    key.threshold
                )));
            }
        }
        Ok(self.config)
    }
}

pub const MIN_FONT_SIZE: f32 = 10.0;
pub const MAX_FONT_SIZE: f32 = 200.0;
pub const MAX_LINE_SPACING: u32 = 50;

// ── Value types ──────────────────────────────────────────────────────────

/// Overlay bounding box in template pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayPlacement {
    pub x: i64,
    pub y: i64,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for OverlayPlacement {
    fn default() -> Self {
        Self {
            x: 400,
            y: 1060,
            max_width: 225,
            max_height: 175,
        }
    }
}

/// Position and appearance of the text block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Left edge of the text block.
    pub x: i32,
    /// Top edge of the first line.
    pub y: i32,
    /// Em size in pixels. Range: 10–200. Default: 54.
    pub font_size: f32,
    /// Extra pixels between lines. Range: 0–50. Default: 6.
    pub line_spacing: u32,
    pub align: TextAlign,
    pub color: HexColor,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            x: 650,
            y: 1075,
            font_size: 54.0,
            line_spacing: 6,
            align: TextAlign::Center,
            color: HexColor([0x2B, 0x43, 0x96]),
        }
    }
}

/// Horizontal alignment of each line within the text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl FromStr for TextAlign {
    type Err = ImprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(TextAlign::Left),
            "center" | "centre" => Ok(TextAlign::Center),
            "right" => Ok(TextAlign::Right),
            other => Err(ImprintError::InvalidConfig(format!(
                "Unknown alignment '{other}': use left, center or right"
            ))),
        }
    }
}

/// Target color and Euclidean RGB distance for background removal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorKey {
    pub color: HexColor,
    pub threshold: f32,
}

/// An opaque RGB color written as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(pub [u8; 3]);

impl HexColor {
    pub fn rgb(self) -> [u8; 3] {
        self.0
    }

    /// The color as an RGBA pixel with the given alpha.
    pub fn to_rgba(self, alpha: u8) -> image::Rgba<u8> {
        let [r, g, b] = self.0;
        image::Rgba([r, g, b, alpha])
    }
}

impl FromStr for HexColor {
    type Err = ImprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || ImprintError::InvalidColor {
            value: s.to_string(),
        };
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(HexColor([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02X}{g:02X}{b:02X}")
    }
}

impl TryFrom<String> for HexColor {
    type Error = ImprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(c: HexColor) -> Self {
        c.to_string()
    }
}

// ── County maps ──────────────────────────────────────────────────────────

/// Settings for the per-county choropleth batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountyConfig {
    /// Attribute names in the shapefile's `.dbf` table.
    pub fields: CountyFields,
    /// Map raster appearance.
    pub map: MapStyle,
    /// Text drawn on each image. `{name}`, `{id}` and `{state}` are replaced.
    pub text_pattern: String,
    /// Archive entry stem for each image, same placeholders. Stems shared by
    /// several counties get `_{id}` appended.
    pub name_pattern: String,
}

impl Default for CountyConfig {
    fn default() -> Self {
        Self {
            fields: CountyFields::default(),
            map: MapStyle::default(),
            text_pattern: "{name} County".to_string(),
            name_pattern: "{name}".to_string(),
        }
    }
}

/// Which `.dbf` columns hold the county id, display name and state code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountyFields {
    pub id: String,
    pub name: String,
    pub state: String,
}

impl Default for CountyFields {
    fn default() -> Self {
        Self {
            id: "GEOID".to_string(),
            name: "NAME".to_string(),
            state: "STATEFP".to_string(),
        }
    }
}

/// Size and colors of a rendered choropleth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapStyle {
    pub width: u32,
    pub height: u32,
    /// Empty border around the projected shapes, in pixels.
    pub margin: u32,
    pub base_fill: HexColor,
    pub highlight_fill: HexColor,
    /// Outline color; `None` disables outlines.
    pub outline: Option<HexColor>,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 700,
            margin: 8,
            base_fill: HexColor([0xD9, 0xD9, 0xD9]),
            highlight_fill: HexColor([0x2B, 0x43, 0x96]),
            outline: Some(HexColor([0xFF, 0xFF, 0xFF])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_template_layout() {
        let c = ComposeConfig::default();
        assert_eq!(c.overlay, OverlayPlacement { x: 400, y: 1060, max_width: 225, max_height: 175 });
        assert_eq!((c.text.x, c.text.y), (650, 1075));
        assert_eq!(c.text.font_size, 54.0);
        assert_eq!(c.text.line_spacing, 6);
        assert_eq!(c.text.align, TextAlign::Center);
        assert_eq!(c.text.color.to_string(), "#2B4396");
        assert!(c.trim_whitespace);
        assert!(c.center_overlay);
        assert!(!c.analyze_whitespace);
    }

    #[test]
    fn builder_clamps_font_size_and_spacing() {
        let c = ComposeConfig::builder()
            .font_size(500.0)
            .line_spacing(99)
            .build()
            .unwrap();
        assert_eq!(c.text.font_size, MAX_FONT_SIZE);
        assert_eq!(c.text.line_spacing, MAX_LINE_SPACING);
    }

    #[test]
    fn builder_rejects_empty_overlay_box() {
        let err = ComposeConfig::builder().overlay_box(0, 0, 0, 10).build();
        assert!(matches!(err, Err(ImprintError::InvalidConfig(_))));
    }

    #[test]
    fn builder_rejects_negative_threshold() {
        let err = ComposeConfig::builder()
            .color_key(ColorKey {
                color: HexColor([255, 255, 255]),
                threshold: -1.0,
            })
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn hex_color_parses_with_and_without_hash() {
        assert_eq!("#2B4396".parse::<HexColor>().unwrap().rgb(), [0x2B, 0x43, 0x96]);
        assert_eq!("ffffff".parse::<HexColor>().unwrap().rgb(), [255, 255, 255]);
        assert!("#12345".parse::<HexColor>().is_err());
        assert!("#GG0000".parse::<HexColor>().is_err());
        assert!("#ééé".parse::<HexColor>().is_err());
    }

    #[test]
    fn align_parses_case_insensitively() {
        assert_eq!("Right".parse::<TextAlign>().unwrap(), TextAlign::Right);
        assert_eq!("centre".parse::<TextAlign>().unwrap(), TextAlign::Center);
        assert!("justify".parse::<TextAlign>().is_err());
    }

    #[test]
    fn layout_json_fills_missing_fields_with_defaults() {
        let c = ComposeConfig::from_json_str(
            r##"{"text": {"font_size": 30, "color": "#FF0000", "align": "left"}, "trim_whitespace": false}"##,
        )
        .unwrap();
        assert_eq!(c.text.font_size, 30.0);
        assert_eq!(c.text.color.rgb(), [255, 0, 0]);
        assert_eq!(c.text.align, TextAlign::Left);
        assert_eq!(c.text.x, 650);
        assert!(!c.trim_whitespace);
        assert_eq!(c.overlay, OverlayPlacement::default());
    }

    #[test]
    fn layout_json_round_trips_through_to_json() {
        let c = ComposeConfig::builder()
            .overlay_box(10, 20, 30, 40)
            .analyze_whitespace(true)
            .build()
            .unwrap();
        let back = ComposeConfig::from_json_str(&c.to_json().unwrap()).unwrap();
        assert_eq!(back.overlay, c.overlay);
        assert!(back.analyze_whitespace);
    }

    #[test]
    fn layout_json_rejects_bad_color() {
        let err = ComposeConfig::from_json_str(r#"{"text": {"color": "blue"}}"#);
        assert!(matches!(err, Err(ImprintError::InvalidConfig(_))));
    }

    #[test]
    fn county_defaults_use_census_field_names() {
        let c = CountyConfig::default();
        assert_eq!(c.fields.id, "GEOID");
        assert_eq!(c.fields.name, "NAME");
        assert_eq!(c.fields.state, "STATEFP");
        assert_eq!(c.text_pattern, "{name} County");
    }
}
