//! Render surfaces: the scratch rendering context an export borrows.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  RenderSurface (trait)                                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌────────────────┐  │
//! │  │  CardSurface     │  │  BrowserSurface  │  │  MockSurface   │  │
//! │  │  (software)      │  │  (CDP, optional) │  │  (tests)       │  │
//! │  └──────────────────┘  └──────────────────┘  └────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A surface owns one root box (the card) and one text node inside it. The
//! pipeline mutates both while it holds `&mut` access and puts them back
//! before returning.

#[cfg(feature = "browser")]
pub mod browser;
pub mod mock;
pub mod software;

#[cfg(feature = "browser")]
pub use browser::{BrowserSurface, BrowserSurfaceConfig};
pub use mock::{MockSurface, SurfaceCall};
pub use software::CardSurface;

use crate::bitmap::Bitmap;
use crate::result::ExportResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default selector of the tweet text node
pub const DEFAULT_TEXT_SELECTOR: &str = "[data-tweet-text]";

/// Handle to the text node the typewriter rewrites
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextTarget {
    selector: String,
}

impl TextTarget {
    /// Create a target from a CSS selector
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    /// The selector identifying the node
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

impl Default for TextTarget {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_SELECTOR)
    }
}

/// Inline style properties of the root box that capture overrides.
///
/// `None` means the property is not set inline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxStyle {
    /// CSS `transform`
    pub transform: Option<String>,
    /// CSS `width`
    pub width: Option<String>,
    /// CSS `height`
    pub height: Option<String>,
    /// CSS `transition`; a stylesheet transition on `transform` would
    /// otherwise animate the capture override
    #[serde(default)]
    pub transition: Option<String>,
}

impl BoxStyle {
    /// Style forcing the box to `width x height` device pixels at 1:1
    #[must_use]
    pub fn capture(width: u32, height: u32) -> Self {
        Self {
            transform: Some("none".to_string()),
            width: Some(format!("{width}px")),
            height: Some(format!("{height}px")),
            transition: Some("none".to_string()),
        }
    }

    /// Style of an on-screen preview shrunk by `scale`
    #[must_use]
    pub fn preview(scale: f64) -> Self {
        Self {
            transform: Some(format!("scale({scale})")),
            width: None,
            height: None,
            transition: None,
        }
    }

    /// Uniform scale applied by `transform`; 1.0 when absent or unrecognized
    #[must_use]
    pub fn scale_factor(&self) -> f64 {
        let Some(transform) = self.transform.as_deref() else {
            return 1.0;
        };
        let transform = transform.trim();
        transform
            .strip_prefix("scale(")
            .and_then(|rest| rest.strip_suffix(')'))
            .and_then(|inner| inner.split(',').next())
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(1.0)
    }

    /// Width in pixels when set as `Npx`
    #[must_use]
    pub fn pixel_width(&self) -> Option<u32> {
        parse_px(self.width.as_deref())
    }

    /// Height in pixels when set as `Npx`
    #[must_use]
    pub fn pixel_height(&self) -> Option<u32> {
        parse_px(self.height.as_deref())
    }
}

fn parse_px(value: Option<&str>) -> Option<u32> {
    value?.trim().strip_suffix("px")?.trim().parse().ok()
}

/// A live render target the export pipeline may mutate and rasterize.
///
/// Implementations must treat text and style writes as transient: the
/// pipeline always writes the original values back.
#[async_trait]
pub trait RenderSurface: Send {
    /// Whether the root box is still part of a document
    async fn is_attached(&mut self) -> ExportResult<bool>;

    /// Locate the text node, if the card has one
    async fn find_text_target(&mut self) -> ExportResult<Option<TextTarget>>;

    /// Current content of the text node
    async fn read_text(&mut self, target: &TextTarget) -> ExportResult<String>;

    /// Replace the content of the text node
    async fn write_text(&mut self, target: &TextTarget, text: &str) -> ExportResult<()>;

    /// Serialized content of the text node, child markup included
    async fn snapshot_text(&mut self, target: &TextTarget) -> ExportResult<String> {
        self.read_text(target).await
    }

    /// Put back a value taken by [`RenderSurface::snapshot_text`]
    async fn restore_text(&mut self, target: &TextTarget, snapshot: &str) -> ExportResult<()> {
        self.write_text(target, snapshot).await
    }

    /// Snapshot of the root box's inline style
    async fn box_style(&mut self) -> ExportResult<BoxStyle>;

    /// Overwrite the root box's inline style
    async fn apply_box_style(&mut self, style: &BoxStyle) -> ExportResult<()>;

    /// Yield until at least one paint cycle has run
    async fn next_paint(&mut self) -> ExportResult<()>;

    /// Wait for embedded resources (images) to settle, bounded by `timeout`
    async fn await_resources(&mut self, timeout: Duration) -> ExportResult<()>;

    /// Rasterize the root box as currently styled
    async fn rasterize(&mut self) -> ExportResult<Bitmap>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod box_style_tests {
        use super::*;

        #[test]
        fn test_capture_style() {
            let style = BoxStyle::capture(1080, 1350);
            assert_eq!(style.transform.as_deref(), Some("none"));
            assert_eq!(style.pixel_width(), Some(1080));
            assert_eq!(style.pixel_height(), Some(1350));
            assert_eq!(style.transition.as_deref(), Some("none"));
            assert!((style.scale_factor() - 1.0).abs() < f64::EPSILON);
        }

        #[test]
        fn test_preview_scale_factor() {
            assert!((BoxStyle::preview(0.5).scale_factor() - 0.5).abs() < f64::EPSILON);
            let style = BoxStyle {
                transform: Some(" scale(0.25, 0.25) ".to_string()),
                ..BoxStyle::default()
            };
            assert!((style.scale_factor() - 0.25).abs() < f64::EPSILON);
        }

        #[test]
        fn test_unrecognized_transform_is_identity() {
            for transform in ["rotate(10deg)", "scale(-1)", "scale(abc)", "none"] {
                let style = BoxStyle {
                    transform: Some(transform.to_string()),
                    ..BoxStyle::default()
                };
                assert!((style.scale_factor() - 1.0).abs() < f64::EPSILON, "{transform}");
            }
        }

        #[test]
        fn test_style_without_transition_deserializes() {
            let style: BoxStyle =
                serde_json::from_str(r#"{"transform":"scale(0.5)","width":null,"height":null}"#)
                    .unwrap();
            assert_eq!(style, BoxStyle::preview(0.5));
        }

        #[test]
        fn test_pixel_dimensions_ignore_other_units() {
            let style = BoxStyle {
                transform: None,
                width: Some("50%".to_string()),
                height: Some("12em".to_string()),
                transition: None,
            };
            assert_eq!(style.pixel_width(), None);
            assert_eq!(style.pixel_height(), None);
        }
    }

    mod text_target_tests {
        use super::*;

        #[test]
        fn test_default_selector() {
            assert_eq!(TextTarget::default().selector(), DEFAULT_TEXT_SELECTOR);
            assert_eq!(TextTarget::new("#body").selector(), "#body");
        }
    }
}
