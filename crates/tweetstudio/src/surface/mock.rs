//! Scriptable in-memory surface for tests.

use super::{BoxStyle, RenderSurface, TextTarget};
use crate::bitmap::Bitmap;
use crate::glyphs;
use crate::result::{ExportError, ExportResult};
use async_trait::async_trait;
use std::time::Duration;

/// One interaction recorded by [`MockSurface`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    /// `is_attached`
    IsAttached,
    /// `find_text_target`
    FindTextTarget,
    /// `read_text`
    ReadText,
    /// `write_text` with the written content
    WriteText(String),
    /// `snapshot_text`
    SnapshotText,
    /// `restore_text` with the restored markup
    RestoreText(String),
    /// `box_style`
    ReadStyle,
    /// `apply_box_style` with the applied style
    ApplyStyle(BoxStyle),
    /// `next_paint`
    NextPaint,
    /// `await_resources`
    AwaitResources,
    /// `rasterize`, with the text shown at that moment
    Rasterize(String),
}

/// Deterministic test double for [`RenderSurface`].
///
/// Rasterizes to a flat color derived from the current text length with the
/// text drawn on top, so consecutive typewriter frames differ. Honors the
/// inline box style: explicit `Npx` sizes win over the natural size, and a
/// `scale(..)` transform shrinks the output like a preview would.
#[derive(Debug, Clone)]
pub struct MockSurface {
    /// Current text node content
    pub text: String,
    /// Current text node markup
    pub markup: String,
    /// Natural box size
    pub natural_size: (u32, u32),
    /// Current inline style
    pub style: BoxStyle,
    /// Whether the box is in a document
    pub attached: bool,
    /// Whether the card has a text node
    pub has_text_target: bool,
    /// Alpha of rasterized pixels
    pub alpha: u8,
    /// Recorded interactions
    pub history: Vec<SurfaceCall>,
    captures: usize,
    writes: usize,
    fail_capture_at: Option<usize>,
    detach_at: Option<usize>,
    fail_writes_after: Option<usize>,
    stall_resources: bool,
    ignore_box_size: bool,
    transform_transition: bool,
    animating_from: Option<BoxStyle>,
}

impl MockSurface {
    /// Create an attached surface showing `text` at `width x height`
    #[must_use]
    pub fn new(text: impl Into<String>, width: u32, height: u32) -> Self {
        let text = text.into();
        Self {
            markup: text.clone(),
            text,
            natural_size: (width, height),
            style: BoxStyle::default(),
            attached: true,
            has_text_target: true,
            alpha: 255,
            history: Vec::new(),
            captures: 0,
            writes: 0,
            fail_capture_at: None,
            detach_at: None,
            fail_writes_after: None,
            stall_resources: false,
            ignore_box_size: false,
            transform_transition: false,
            animating_from: None,
        }
    }

    /// Start with a preview `scale(..)` transform on the box
    #[must_use]
    pub fn with_preview_scale(mut self, scale: f64) -> Self {
        self.style = BoxStyle::preview(scale);
        self
    }

    /// Start with an arbitrary inline style
    #[must_use]
    pub fn with_style(mut self, style: BoxStyle) -> Self {
        self.style = style;
        self
    }

    /// Text node holding child elements; `text` becomes its text content
    #[must_use]
    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = markup.into();
        self.text = text_content(&self.markup);
        self
    }

    /// Box carries a stylesheet transition on `transform`.
    ///
    /// A transform change under that transition leaves the previous
    /// transform in effect for rasterization, unless the inline style sets
    /// `transition: none`.
    #[must_use]
    pub const fn with_transform_transition(mut self) -> Self {
        self.transform_transition = true;
        self
    }

    /// Card without a text node
    #[must_use]
    pub const fn without_text_target(mut self) -> Self {
        self.has_text_target = false;
        self
    }

    /// Rasterize with translucent pixels
    #[must_use]
    pub const fn with_alpha(mut self, alpha: u8) -> Self {
        self.alpha = alpha;
        self
    }

    /// Fail the `n`-th rasterization (zero-based)
    #[must_use]
    pub const fn fail_capture_at(mut self, n: usize) -> Self {
        self.fail_capture_at = Some(n);
        self
    }

    /// Detach the box right before the `n`-th rasterization (zero-based)
    #[must_use]
    pub const fn detach_at(mut self, n: usize) -> Self {
        self.detach_at = Some(n);
        self
    }

    /// Reject every text write after the first `n`
    #[must_use]
    pub const fn fail_writes_after(mut self, n: usize) -> Self {
        self.fail_writes_after = Some(n);
        self
    }

    /// Never let embedded resources settle
    #[must_use]
    pub const fn stall_resources(mut self) -> Self {
        self.stall_resources = true;
        self
    }

    /// Rasterize at the natural size whatever the inline style says
    #[must_use]
    pub const fn ignore_box_size(mut self) -> Self {
        self.ignore_box_size = true;
        self
    }

    /// Number of rasterizations so far
    #[must_use]
    pub const fn capture_count(&self) -> usize {
        self.captures
    }

    /// Every text written, in order
    #[must_use]
    pub fn written_texts(&self) -> Vec<&str> {
        self.history
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::WriteText(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text shown at each rasterization, in order
    #[must_use]
    pub fn captured_texts(&self) -> Vec<&str> {
        self.history
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Rasterize(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Check whether a call of the given kind was recorded
    #[must_use]
    pub fn was_called(&self, kind: &SurfaceCall) -> bool {
        self.history
            .iter()
            .any(|call| std::mem::discriminant(call) == std::mem::discriminant(kind))
    }

    fn output_size(&self) -> (u32, u32) {
        if self.ignore_box_size {
            return self.natural_size;
        }
        let width = self.style.pixel_width().unwrap_or(self.natural_size.0);
        let height = self.style.pixel_height().unwrap_or(self.natural_size.1);
        let scale = self
            .animating_from
            .as_ref()
            .unwrap_or(&self.style)
            .scale_factor();
        (
            ((f64::from(width) * scale).round() as u32).max(1),
            ((f64::from(height) * scale).round() as u32).max(1),
        )
    }

    fn shade(&self) -> [u8; 4] {
        let n = self.text.chars().count() as u32;
        [
            (40 + n * 7 % 200) as u8,
            (90 + n * 13 % 160) as u8,
            (160 + n * 3 % 90) as u8,
            self.alpha,
        ]
    }
}

/// Text content of `markup` with element tags dropped
fn text_content(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut in_tag = false;
    for c in markup.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

impl Default for MockSurface {
    fn default() -> Self {
        Self::new("", 64, 64)
    }
}

#[async_trait]
impl RenderSurface for MockSurface {
    async fn is_attached(&mut self) -> ExportResult<bool> {
        self.history.push(SurfaceCall::IsAttached);
        Ok(self.attached)
    }

    async fn find_text_target(&mut self) -> ExportResult<Option<TextTarget>> {
        self.history.push(SurfaceCall::FindTextTarget);
        Ok(self.has_text_target.then(TextTarget::default))
    }

    async fn read_text(&mut self, _target: &TextTarget) -> ExportResult<String> {
        self.history.push(SurfaceCall::ReadText);
        Ok(self.text.clone())
    }

    async fn write_text(&mut self, _target: &TextTarget, text: &str) -> ExportResult<()> {
        if self.fail_writes_after.is_some_and(|limit| self.writes >= limit) {
            return Err(ExportError::capture("Mock text node rejected the write"));
        }
        self.writes += 1;
        self.history.push(SurfaceCall::WriteText(text.to_string()));
        self.text = text.to_string();
        self.markup = text.to_string();
        Ok(())
    }

    async fn snapshot_text(&mut self, _target: &TextTarget) -> ExportResult<String> {
        self.history.push(SurfaceCall::SnapshotText);
        Ok(self.markup.clone())
    }

    async fn restore_text(&mut self, _target: &TextTarget, snapshot: &str) -> ExportResult<()> {
        if self.fail_writes_after.is_some_and(|limit| self.writes >= limit) {
            return Err(ExportError::capture("Mock text node rejected the write"));
        }
        self.writes += 1;
        self.history.push(SurfaceCall::RestoreText(snapshot.to_string()));
        self.markup = snapshot.to_string();
        self.text = text_content(snapshot);
        Ok(())
    }

    async fn box_style(&mut self) -> ExportResult<BoxStyle> {
        self.history.push(SurfaceCall::ReadStyle);
        Ok(self.style.clone())
    }

    async fn apply_box_style(&mut self, style: &BoxStyle) -> ExportResult<()> {
        self.history.push(SurfaceCall::ApplyStyle(style.clone()));
        let animates = self.transform_transition
            && style.transition.as_deref() != Some("none")
            && style.transform != self.style.transform;
        self.animating_from = animates.then(|| self.style.clone());
        self.style = style.clone();
        Ok(())
    }

    async fn next_paint(&mut self) -> ExportResult<()> {
        self.history.push(SurfaceCall::NextPaint);
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn await_resources(&mut self, timeout: Duration) -> ExportResult<()> {
        self.history.push(SurfaceCall::AwaitResources);
        if self.stall_resources {
            return Err(ExportError::capture(format!(
                "Embedded resource did not load within {}ms",
                timeout.as_millis()
            )));
        }
        Ok(())
    }

    async fn rasterize(&mut self) -> ExportResult<Bitmap> {
        let index = self.captures;
        self.captures += 1;
        self.history.push(SurfaceCall::Rasterize(self.text.clone()));

        if self.detach_at == Some(index) {
            self.attached = false;
        }
        if !self.attached {
            return Err(ExportError::capture("Element is detached from the document"));
        }
        if self.fail_capture_at == Some(index) {
            return Err(ExportError::capture(format!(
                "Mock rasterizer failed on capture {index}"
            )));
        }

        let (width, height) = self.output_size();
        let mut bitmap = Bitmap::filled(width, height, self.shade());
        glyphs::draw_text(&mut bitmap, 2, 2, &self.text, 1, [0, 0, 0, self.alpha]);
        Ok(bitmap)
    }
}
