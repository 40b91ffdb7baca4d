//! Design snapshot model and design-file loading.
//!
//! The editor owns all of this state; the export pipeline only ever reads an
//! immutable [`StudioDocument`] snapshot. Design files are YAML or JSON,
//! picked by extension.

use crate::result::{ExportError, ExportResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Maximum characters in a tweet body
pub const MAX_TWEET_CHARS: usize = 280;

/// An opaque RGB color, written as `#rrggbb` or `#rgb` in design files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    /// White
    pub const WHITE: Self = Self([255, 255, 255]);

    /// Parse a hex color
    pub fn parse(hex: &str) -> ExportResult<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.is_ascii() {
            return Err(ExportError::config(format!("Invalid color '{hex}'")));
        }
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => {
                return Err(ExportError::config(format!("Invalid color '{hex}'")));
            }
        };
        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map_err(|_| ExportError::config(format!("Invalid color '{hex}'")))
        };
        Ok(Self([channel(0)?, channel(2)?, channel(4)?]))
    }

    /// As an opaque RGBA pixel
    #[must_use]
    pub const fn rgba(self) -> [u8; 4] {
        [self.0[0], self.0[1], self.0[2], 255]
    }

    /// As an RGBA pixel with the given alpha
    #[must_use]
    pub const fn with_alpha(self, alpha: u8) -> [u8; 4] {
        [self.0[0], self.0[1], self.0[2], alpha]
    }

    /// Linear interpolation between two colors
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Self([
            mix(self.0[0], other.0[0]),
            mix(self.0[1], other.0[1]),
            mix(self.0[2], other.0[2]),
        ])
    }
}

impl TryFrom<String> for Rgb {
    type Error = ExportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

/// Direction of a linear gradient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GradientDirection {
    /// Bottom to top
    #[serde(rename = "to-t")]
    ToTop,
    /// Bottom-left to top-right
    #[serde(rename = "to-tr")]
    ToTopRight,
    /// Left to right
    #[serde(rename = "to-r")]
    ToRight,
    /// Top-left to bottom-right
    #[serde(rename = "to-br")]
    ToBottomRight,
    /// Top to bottom
    #[default]
    #[serde(rename = "to-b")]
    ToBottom,
    /// Top-right to bottom-left
    #[serde(rename = "to-bl")]
    ToBottomLeft,
    /// Right to left
    #[serde(rename = "to-l")]
    ToLeft,
    /// Bottom-right to top-left
    #[serde(rename = "to-tl")]
    ToTopLeft,
}

impl GradientDirection {
    /// Unit-ish direction vector in screen space (y grows downward)
    #[must_use]
    pub const fn vector(self) -> (f64, f64) {
        match self {
            Self::ToTop => (0.0, -1.0),
            Self::ToTopRight => (1.0, -1.0),
            Self::ToRight => (1.0, 0.0),
            Self::ToBottomRight => (1.0, 1.0),
            Self::ToBottom => (0.0, 1.0),
            Self::ToBottomLeft => (-1.0, 1.0),
            Self::ToLeft => (-1.0, 0.0),
            Self::ToTopLeft => (-1.0, -1.0),
        }
    }
}

/// Backdrop behind the card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackgroundSpec {
    /// Flat color
    Solid {
        /// Fill color
        color: Rgb,
    },
    /// Linear gradient through evenly spaced stops
    Gradient {
        /// Color stops (at least two)
        colors: Vec<Rgb>,
        /// Gradient direction
        #[serde(default)]
        direction: GradientDirection,
    },
}

impl Default for BackgroundSpec {
    fn default() -> Self {
        Self::Gradient {
            colors: vec![
                Rgb([0x3b, 0x82, 0xf6]),
                Rgb([0x8b, 0x5c, 0xf6]),
            ],
            direction: GradientDirection::ToBottomRight,
        }
    }
}

impl BackgroundSpec {
    /// Color at normalized position `t` along the gradient axis
    #[must_use]
    pub fn color_at(&self, t: f64) -> Rgb {
        match self {
            Self::Solid { color } => *color,
            Self::Gradient { colors, .. } => match colors.as_slice() {
                [] => Rgb::WHITE,
                [only] => *only,
                stops => {
                    let t = t.clamp(0.0, 1.0);
                    let span = (stops.len() - 1) as f64;
                    let pos = t * span;
                    let idx = (pos.floor() as usize).min(stops.len() - 2);
                    stops[idx].lerp(stops[idx + 1], pos - idx as f64)
                }
            },
        }
    }

    fn validate(&self) -> ExportResult<()> {
        if let Self::Gradient { colors, .. } = self {
            if colors.len() < 2 {
                return Err(ExportError::config(
                    "Gradient background needs at least two colors",
                ));
            }
        }
        Ok(())
    }
}

/// Card color theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// White card
    #[default]
    Light,
    /// Near-black card
    Dark,
    /// Blue-grey card
    Dim,
}

/// Resolved theme colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemePalette {
    /// Card plate
    pub card: Rgb,
    /// Primary text
    pub text: Rgb,
    /// Secondary text (handle, metrics)
    pub muted: Rgb,
    /// Separator lines
    pub border: Rgb,
}

impl Theme {
    /// Colors used to paint a card in this theme
    #[must_use]
    pub const fn palette(self) -> ThemePalette {
        match self {
            Self::Light => ThemePalette {
                card: Rgb([0xff, 0xff, 0xff]),
                text: Rgb([0x0f, 0x14, 0x19]),
                muted: Rgb([0x53, 0x64, 0x71]),
                border: Rgb([0xef, 0xf3, 0xf4]),
            },
            Self::Dark => ThemePalette {
                card: Rgb([0x00, 0x00, 0x00]),
                text: Rgb([0xe7, 0xe9, 0xea]),
                muted: Rgb([0x71, 0x76, 0x7b]),
                border: Rgb([0x2f, 0x33, 0x36]),
            },
            Self::Dim => ThemePalette {
                card: Rgb([0x15, 0x20, 0x2b]),
                text: Rgb([0xf7, 0xf9, 0xf9]),
                muted: Rgb([0x8b, 0x98, 0xa5]),
                border: Rgb([0x38, 0x44, 0x4d]),
            },
        }
    }
}

/// Card-level styling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardStyle {
    /// Color theme
    pub theme: Theme,
    /// Space between canvas edge and card, in export pixels at 1080 wide
    pub padding: u32,
    /// Corner radius of the card plate
    pub border_radius: u32,
    /// Relative card size (1.0 = fill the padded area)
    pub card_scale: f64,
}

impl Default for CardStyle {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            padding: 80,
            border_radius: 16,
            card_scale: 1.0,
        }
    }
}

/// Typewriter animation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSpec {
    /// Characters revealed per second
    pub speed: f64,
    /// Nominal frames per second
    pub fps: u32,
    /// Loop the GIF forever
    #[serde(rename = "loop")]
    pub looped: bool,
    /// Show a caret while typing
    pub show_cursor: bool,
}

impl Default for AnimationSpec {
    fn default() -> Self {
        Self {
            speed: 50.0,
            fps: 20,
            looped: false,
            show_cursor: true,
        }
    }
}

/// Named export sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportPreset {
    /// 1080 x 1080
    #[default]
    Instagram,
    /// 1080 x 1920
    Story,
    /// 1200 x 627
    Linkedin,
    /// 1600 x 900
    Twitter,
    /// User-chosen size (defaults to 1080 x 1080)
    Custom,
}

impl ExportPreset {
    /// All presets in display order
    pub const ALL: [Self; 5] = [
        Self::Instagram,
        Self::Story,
        Self::Linkedin,
        Self::Twitter,
        Self::Custom,
    ];

    /// Pixel size of the preset
    #[must_use]
    pub const fn size(self) -> (u32, u32) {
        match self {
            Self::Instagram | Self::Custom => (1080, 1080),
            Self::Story => (1080, 1920),
            Self::Linkedin => (1200, 627),
            Self::Twitter => (1600, 900),
        }
    }

    /// Human-readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Instagram => "Instagram Post",
            Self::Story => "Instagram Story",
            Self::Linkedin => "LinkedIn Post",
            Self::Twitter => "Twitter/X Post",
            Self::Custom => "Custom Size",
        }
    }

    /// Parse a preset name (case-insensitive)
    pub fn from_name(name: &str) -> ExportResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "instagram" => Ok(Self::Instagram),
            "story" => Ok(Self::Story),
            "linkedin" => Ok(Self::Linkedin),
            "twitter" => Ok(Self::Twitter),
            "custom" => Ok(Self::Custom),
            other => Err(ExportError::config(format!("Unknown export preset '{other}'"))),
        }
    }
}

/// Editor snapshot consumed by the export pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignState {
    /// Raster width
    pub export_width: u32,
    /// Raster height
    pub export_height: u32,
    /// Backdrop
    #[serde(default)]
    pub background: BackgroundSpec,
    /// Card styling
    #[serde(default)]
    pub card_style: CardStyle,
    /// Typewriter settings
    #[serde(default)]
    pub animation: AnimationSpec,
}

impl Default for DesignState {
    fn default() -> Self {
        let (export_width, export_height) = ExportPreset::Instagram.size();
        Self {
            export_width,
            export_height,
            background: BackgroundSpec::default(),
            card_style: CardStyle::default(),
            animation: AnimationSpec::default(),
        }
    }
}

impl DesignState {
    /// Apply a preset's dimensions
    #[must_use]
    pub fn with_preset(mut self, preset: ExportPreset) -> Self {
        (self.export_width, self.export_height) = preset.size();
        self
    }
}

/// Author block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TweetProfile {
    /// Display name
    pub display_name: String,
    /// Handle without the `@`
    pub username: String,
    /// Path or `http(s)` URL of an avatar image (PNG or JPEG)
    pub avatar: Option<String>,
    /// Verified badge
    pub verified: bool,
}

impl Default for TweetProfile {
    fn default() -> Self {
        Self {
            display_name: "Postloom".to_string(),
            username: "postloom".to_string(),
            avatar: None,
            verified: false,
        }
    }
}

/// Tweet body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TweetContent {
    /// Body text
    pub text: String,
    /// Username being replied to
    pub reply_to: Option<String>,
    /// Render the timestamp line
    pub show_timestamp: bool,
    /// Posting time
    pub timestamp: DateTime<Utc>,
}

impl Default for TweetContent {
    fn default() -> Self {
        Self {
            text: String::new(),
            reply_to: None,
            show_timestamp: true,
            timestamp: DateTime::<Utc>::default(),
        }
    }
}

/// Engagement counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TweetMetrics {
    /// Render the metrics row
    pub show_metrics: bool,
    /// Reply count
    pub replies: u64,
    /// Repost count
    pub reposts: u64,
    /// Like count
    pub likes: u64,
    /// Bookmark count
    pub bookmarks: u64,
    /// View count
    pub views: u64,
}

impl Default for TweetMetrics {
    fn default() -> Self {
        Self {
            show_metrics: true,
            replies: 0,
            reposts: 0,
            likes: 0,
            bookmarks: 0,
            views: 0,
        }
    }
}

/// Everything rendered on the card
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tweet {
    /// Author
    pub profile: TweetProfile,
    /// Body
    pub content: TweetContent,
    /// Counters
    pub metrics: TweetMetrics,
}

/// A design file: editor snapshot plus card content
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StudioDocument {
    /// Export and styling snapshot
    #[serde(default)]
    pub design: DesignState,
    /// Card content
    #[serde(default)]
    pub tweet: Tweet,
}

impl StudioDocument {
    /// Parse a YAML document
    pub fn from_yaml(source: &str) -> ExportResult<Self> {
        let doc: Self = serde_yaml_ng::from_str(source)
            .map_err(|e| ExportError::config(format!("Invalid YAML design: {e}")))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Parse a JSON document
    pub fn from_json(source: &str) -> ExportResult<Self> {
        let doc: Self = serde_json::from_str(source)
            .map_err(|e| ExportError::config(format!("Invalid JSON design: {e}")))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Load a design file, choosing the format from the extension
    pub fn load(path: &Path) -> ExportResult<Self> {
        let source = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&source),
            Some("yaml" | "yml") => Self::from_yaml(&source),
            _ => Err(ExportError::config(format!(
                "Unsupported design file '{}': expected .yaml, .yml or .json",
                path.display()
            ))),
        }
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> ExportResult<()> {
        if self.design.export_width == 0 || self.design.export_height == 0 {
            return Err(ExportError::config("Export size must be non-zero"));
        }
        self.design.background.validate()?;
        if self.design.card_style.card_scale <= 0.0 {
            return Err(ExportError::config("card_scale must be positive"));
        }
        let chars = self.tweet.content.text.chars().count();
        if chars > MAX_TWEET_CHARS {
            return Err(ExportError::config(format!(
                "Tweet text is {chars} characters; the limit is {MAX_TWEET_CHARS}"
            )));
        }
        Ok(())
    }
}

/// Compact engagement count: `1.2K`, `45.6K`, `1.2M`
#[must_use]
pub fn format_count(num: u64) -> String {
    fn compact(value: f64, suffix: &str) -> String {
        let text = format!("{value:.1}");
        let text = text.strip_suffix(".0").unwrap_or(&text);
        format!("{text}{suffix}")
    }
    if num >= 1_000_000 {
        compact(num as f64 / 1_000_000.0, "M")
    } else if num >= 1_000 {
        compact(num as f64 / 1_000.0, "K")
    } else {
        num.to_string()
    }
}
