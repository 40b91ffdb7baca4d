//! Headless software renderer for the tweet card.
//!
//! Paints the same structure the editor shows: backdrop, rounded card plate,
//! avatar, author header, word-wrapped body, timestamp and metrics. Sizes are
//! laid out against a 1080 px reference and scaled to the box size, so a
//! capture at 2160x2160 is a sharper version of the 1080x1080 one rather than
//! a larger canvas with a small card in it.

use super::{BoxStyle, RenderSurface, TextTarget};
use crate::bitmap::Bitmap;
use crate::design::{format_count, BackgroundSpec, Rgb, StudioDocument};
use crate::glyphs::{self, GLYPH_SIZE};
use crate::result::{ExportError, ExportResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const REFERENCE_EDGE: f64 = 1080.0;
const VERIFIED_BLUE: Rgb = Rgb([0x1d, 0x9b, 0xf0]);

#[derive(Debug, Clone)]
enum AvatarState {
    Absent,
    Pending(PathBuf),
    Remote(String),
    Loaded(Bitmap),
}

/// Software [`RenderSurface`] over a [`StudioDocument`]
#[derive(Debug, Clone)]
pub struct CardSurface {
    document: StudioDocument,
    text: String,
    style: BoxStyle,
    attached: bool,
    target: TextTarget,
    avatar: AvatarState,
}

impl CardSurface {
    /// Create an attached surface rendering `document`
    #[must_use]
    pub fn new(document: StudioDocument) -> Self {
        let avatar = match document.tweet.profile.avatar.as_deref() {
            None | Some("") => AvatarState::Absent,
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                AvatarState::Remote(url.to_string())
            }
            Some(path) => AvatarState::Pending(PathBuf::from(path)),
        };
        Self {
            text: document.tweet.content.text.clone(),
            document,
            style: BoxStyle::default(),
            attached: true,
            target: TextTarget::default(),
            avatar,
        }
    }

    /// Resolve a relative avatar path against `root`
    #[must_use]
    pub fn with_asset_root(mut self, root: &Path) -> Self {
        if let AvatarState::Pending(path) = &self.avatar {
            if path.is_relative() {
                self.avatar = AvatarState::Pending(root.join(path));
            }
        }
        self
    }

    /// Use an already decoded avatar image
    #[must_use]
    pub fn with_avatar(mut self, avatar: Bitmap) -> Self {
        self.avatar = AvatarState::Loaded(avatar);
        self
    }

    /// Shrink the box for on-screen preview, as the editor does
    #[must_use]
    pub fn with_preview_scale(mut self, scale: f64) -> Self {
        self.style = BoxStyle::preview(scale);
        self
    }

    /// Remove the box from its document
    pub fn detach(&mut self) {
        self.attached = false;
    }

    /// The document being rendered
    #[must_use]
    pub const fn document(&self) -> &StudioDocument {
        &self.document
    }

    /// Current text node content
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Current inline style
    #[must_use]
    pub const fn style(&self) -> &BoxStyle {
        &self.style
    }

    fn natural_size(&self) -> (u32, u32) {
        (
            self.document.design.export_width,
            self.document.design.export_height,
        )
    }

    fn avatar_bitmap(&self) -> Option<&Bitmap> {
        match &self.avatar {
            AvatarState::Loaded(bitmap) => Some(bitmap),
            _ => None,
        }
    }

    fn render(&self, width: u32, height: u32) -> Bitmap {
        let mut canvas = paint_background(&self.document.design.background, width, height);
        let layout = CardLayout::new(self, width, height);
        layout.paint(self, &mut canvas);
        canvas
    }
}

#[async_trait]
impl RenderSurface for CardSurface {
    async fn is_attached(&mut self) -> ExportResult<bool> {
        Ok(self.attached)
    }

    async fn find_text_target(&mut self) -> ExportResult<Option<TextTarget>> {
        Ok(Some(self.target.clone()))
    }

    async fn read_text(&mut self, target: &TextTarget) -> ExportResult<String> {
        self.check_target(target)?;
        Ok(self.text.clone())
    }

    async fn write_text(&mut self, target: &TextTarget, text: &str) -> ExportResult<()> {
        self.check_target(target)?;
        text.clone_into(&mut self.text);
        Ok(())
    }

    async fn box_style(&mut self) -> ExportResult<BoxStyle> {
        Ok(self.style.clone())
    }

    async fn apply_box_style(&mut self, style: &BoxStyle) -> ExportResult<()> {
        self.style = style.clone();
        Ok(())
    }

    async fn next_paint(&mut self) -> ExportResult<()> {
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn await_resources(&mut self, timeout: Duration) -> ExportResult<()> {
        let (source, bytes) = match &self.avatar {
            AvatarState::Pending(path) => {
                let source = path.display().to_string();
                let read = tokio::fs::read(path);
                let bytes = bounded(&source, timeout, read)
                    .await?
                    .map_err(|e| {
                        ExportError::capture(format!("Failed to load avatar '{source}': {e}"))
                    })?;
                (source, bytes)
            }
            AvatarState::Remote(url) => {
                let source = url.clone();
                let bytes = bounded(&source, timeout, fetch_remote(url)).await??;
                (source, bytes)
            }
            AvatarState::Absent | AvatarState::Loaded(_) => return Ok(()),
        };
        let img = image::load_from_memory(&bytes).map_err(|e| {
            ExportError::capture(format!("Failed to decode avatar '{source}': {e}"))
        })?;
        debug!(%source, bytes = bytes.len(), "avatar loaded");
        self.avatar = AvatarState::Loaded(Bitmap::from(img.to_rgba8()));
        Ok(())
    }

    async fn rasterize(&mut self) -> ExportResult<Bitmap> {
        if !self.attached {
            return Err(ExportError::capture("Element is detached from the document"));
        }
        let (natural_w, natural_h) = self.natural_size();
        let width = self.style.pixel_width().unwrap_or(natural_w);
        let height = self.style.pixel_height().unwrap_or(natural_h);
        if width == 0 || height == 0 {
            return Err(ExportError::capture("Element has an empty box"));
        }

        let full = self.render(width, height);
        let scale = self.style.scale_factor();
        if (scale - 1.0).abs() < f64::EPSILON {
            return Ok(full);
        }
        let shown_w = (f64::from(width) * scale).round() as u32;
        let shown_h = (f64::from(height) * scale).round() as u32;
        Ok(full.resized(shown_w, shown_h))
    }
}

async fn bounded<T>(
    source: &str,
    timeout: Duration,
    fut: impl std::future::Future<Output = T>,
) -> ExportResult<T> {
    tokio::time::timeout(timeout, fut).await.map_err(|_| {
        ExportError::capture(format!(
            "Avatar '{source}' did not load within {}ms",
            timeout.as_millis()
        ))
    })
}

/// Fetch a cross-origin avatar; any non-success status is a capture failure
async fn fetch_remote(url: &str) -> ExportResult<Vec<u8>> {
    let fail =
        |e: reqwest::Error| ExportError::capture(format!("Failed to fetch avatar '{url}': {e}"));
    let resp = reqwest::get(url)
        .await
        .map_err(fail)?
        .error_for_status()
        .map_err(fail)?;
    let bytes = resp.bytes().await.map_err(fail)?;
    Ok(bytes.to_vec())
}

impl CardSurface {
    fn check_target(&self, target: &TextTarget) -> ExportResult<()> {
        if *target == self.target {
            Ok(())
        } else {
            Err(ExportError::validation(format!(
                "No text node matches '{}'",
                target.selector()
            )))
        }
    }
}

fn paint_background(background: &BackgroundSpec, width: u32, height: u32) -> Bitmap {
    match background {
        BackgroundSpec::Solid { color } => Bitmap::filled(width, height, color.rgba()),
        BackgroundSpec::Gradient { direction, .. } => {
            let mut canvas = Bitmap::filled(width, height, [0, 0, 0, 255]);
            let (dx, dy) = direction.vector();
            let norm = dx.abs() + dy.abs();
            let span_x = f64::from(width.saturating_sub(1).max(1));
            let span_y = f64::from(height.saturating_sub(1).max(1));
            for y in 0..height {
                let ny = f64::from(y) / span_y - 0.5;
                for x in 0..width {
                    let nx = f64::from(x) / span_x - 0.5;
                    let t = (nx * dx + ny * dy) / norm + 0.5;
                    canvas.put_pixel(x, y, background.color_at(t).rgba());
                }
            }
            canvas
        }
    }
}

fn fill_circle(canvas: &mut Bitmap, cx: f64, cy: f64, radius: f64, rgba: [u8; 4]) {
    let x0 = (cx - radius).floor().max(0.0) as u32;
    let y0 = (cy - radius).floor().max(0.0) as u32;
    let x1 = (cx + radius).ceil() as u32;
    let y1 = (cy + radius).ceil() as u32;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let ddx = f64::from(x) + 0.5 - cx;
            let ddy = f64::from(y) + 0.5 - cy;
            if ddx * ddx + ddy * ddy <= radius * radius {
                canvas.put_pixel(x, y, rgba);
            }
        }
    }
}

fn fill_rounded_rect(canvas: &mut Bitmap, x: u32, y: u32, w: u32, h: u32, r: u32, rgba: [u8; 4]) {
    let r = r.min(w / 2).min(h / 2);
    if r == 0 {
        canvas.fill_rect(x, y, w, h, rgba);
        return;
    }
    canvas.fill_rect(x + r, y, w - 2 * r, h, rgba);
    canvas.fill_rect(x, y + r, r, h - 2 * r, rgba);
    canvas.fill_rect(x + w - r, y + r, r, h - 2 * r, rgba);
    let rf = f64::from(r);
    for (cx, cy) in [
        (x + r, y + r),
        (x + w - r, y + r),
        (x + r, y + h - r),
        (x + w - r, y + h - r),
    ] {
        fill_circle(canvas, f64::from(cx), f64::from(cy), rf, rgba);
    }
}

/// Resolved geometry of one card paint
struct CardLayout {
    unit: f64,
    card_x: u32,
    card_y: u32,
    card_w: u32,
    card_h: u32,
    inset: u32,
    avatar: u32,
    body_scale: u32,
    small_scale: u32,
    line_height: u32,
    lines: Vec<String>,
    reply_line: Option<String>,
    timestamp_line: Option<String>,
    metrics_line: Option<String>,
}

impl CardLayout {
    fn new(surface: &CardSurface, width: u32, height: u32) -> Self {
        let doc = &surface.document;
        let unit = f64::from(width.min(height)) / REFERENCE_EDGE;
        let px = |v: f64| ((v * unit).round() as u32).max(1);

        let padding = px(f64::from(doc.design.card_style.padding)).min(width / 4);
        let card_scale = doc.design.card_style.card_scale.clamp(0.1, 1.0);
        let card_w = ((f64::from(width.saturating_sub(2 * padding)) * card_scale).round() as u32).max(8);
        let inset = px(32.0);
        let avatar = px(96.0);
        let body_scale = px(3.0);
        let small_scale = px(2.0);
        let line_height = GLYPH_SIZE * body_scale + px(10.0);
        let small_line = GLYPH_SIZE * small_scale + px(10.0);

        let cols = (card_w.saturating_sub(2 * inset) / (GLYPH_SIZE * body_scale)).max(1);
        let mut lines = glyphs::wrap(&surface.text, cols as usize);

        let content = &doc.tweet.content;
        let reply_line = content
            .reply_to
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| format!("Replying to @{u}"));
        let timestamp_line = content
            .show_timestamp
            .then(|| content.timestamp.format("%H:%M - %b %d, %Y").to_string());
        let metrics = &doc.tweet.metrics;
        let metrics_line = metrics.show_metrics.then(|| {
            format!(
                "{} Replies  {} Reposts  {} Likes  {} Views",
                format_count(metrics.replies),
                format_count(metrics.reposts),
                format_count(metrics.likes),
                format_count(metrics.views)
            )
        });

        let extras = [&reply_line, &timestamp_line, &metrics_line]
            .iter()
            .filter(|l| l.is_some())
            .count() as u32;
        let fixed = inset * 3 + avatar + extras * (small_line + inset / 2);
        let max_card_h = height.saturating_sub(2 * padding).max(fixed + line_height);
        let max_lines = ((max_card_h - fixed) / line_height).max(1) as usize;
        lines.truncate(max_lines);
        let card_h = fixed + line_height * lines.len() as u32;

        Self {
            unit,
            card_x: width.saturating_sub(card_w) / 2,
            card_y: height.saturating_sub(card_h) / 2,
            card_w,
            card_h,
            inset,
            avatar,
            body_scale,
            small_scale,
            line_height,
            lines,
            reply_line,
            timestamp_line,
            metrics_line,
        }
    }

    fn paint(&self, surface: &CardSurface, canvas: &mut Bitmap) {
        let doc = &surface.document;
        let theme = doc.design.card_style.theme.palette();
        let radius = ((f64::from(doc.design.card_style.border_radius) * self.unit).round()) as u32;
        let border = ((2.0 * self.unit).round() as u32).max(1);

        fill_rounded_rect(
            canvas,
            self.card_x,
            self.card_y,
            self.card_w,
            self.card_h,
            radius,
            theme.border.rgba(),
        );
        fill_rounded_rect(
            canvas,
            self.card_x + border,
            self.card_y + border,
            self.card_w.saturating_sub(2 * border),
            self.card_h.saturating_sub(2 * border),
            radius.saturating_sub(border),
            theme.card.rgba(),
        );

        let left = self.card_x + self.inset;
        let mut cursor_y = self.card_y + self.inset;

        self.paint_avatar(surface, canvas, left, cursor_y, theme.muted, theme.card);
        let header_x = left + self.avatar + self.inset / 2;
        let profile = &doc.tweet.profile;
        let name_y = (cursor_y + self.avatar / 2).saturating_sub(GLYPH_SIZE * self.body_scale);
        glyphs::draw_text(
            canvas,
            header_x,
            name_y,
            &profile.display_name,
            self.body_scale,
            theme.text.rgba(),
        );
        if profile.verified {
            let badge = f64::from(GLYPH_SIZE * self.body_scale) / 2.0;
            let badge_x = f64::from(
                header_x
                    + glyphs::text_width(&profile.display_name, self.body_scale)
                    + self.inset / 4,
            );
            fill_circle(
                canvas,
                badge_x + badge,
                f64::from(name_y) + badge,
                badge,
                VERIFIED_BLUE.rgba(),
            );
        }
        glyphs::draw_text(
            canvas,
            header_x,
            cursor_y + self.avatar / 2 + self.inset / 4,
            &format!("@{}", profile.username),
            self.small_scale,
            theme.muted.rgba(),
        );
        cursor_y += self.avatar + self.inset;

        let small_step = GLYPH_SIZE * self.small_scale + self.inset / 2;
        if let Some(reply) = &self.reply_line {
            glyphs::draw_text(canvas, left, cursor_y, reply, self.small_scale, theme.muted.rgba());
            cursor_y += small_step;
        }
        for line in &self.lines {
            glyphs::draw_text(canvas, left, cursor_y, line, self.body_scale, theme.text.rgba());
            cursor_y += self.line_height;
        }
        cursor_y += self.inset / 2;
        for line in [&self.timestamp_line, &self.metrics_line].into_iter().flatten() {
            glyphs::draw_text(canvas, left, cursor_y, line, self.small_scale, theme.muted.rgba());
            cursor_y += small_step;
        }
    }

    fn paint_avatar(
        &self,
        surface: &CardSurface,
        canvas: &mut Bitmap,
        x: u32,
        y: u32,
        placeholder: Rgb,
        ink: Rgb,
    ) {
        let radius = f64::from(self.avatar) / 2.0;
        let (cx, cy) = (f64::from(x) + radius, f64::from(y) + radius);
        match surface.avatar_bitmap() {
            Some(image) => {
                let image = image.resized(self.avatar, self.avatar);
                for py in 0..self.avatar {
                    for px in 0..self.avatar {
                        let ddx = f64::from(px) + 0.5 - radius;
                        let ddy = f64::from(py) + 0.5 - radius;
                        if ddx * ddx + ddy * ddy <= radius * radius {
                            canvas.blend_pixel(x + px, y + py, image.pixel(px, py));
                        }
                    }
                }
            }
            None => {
                fill_circle(canvas, cx, cy, radius, placeholder.rgba());
                let initial: String = surface
                    .document
                    .tweet
                    .profile
                    .display_name
                    .chars()
                    .next()
                    .map(|c| c.to_uppercase().collect())
                    .unwrap_or_default();
                let scale = (self.avatar / (GLYPH_SIZE * 2)).max(1);
                let glyph_edge = GLYPH_SIZE * scale;
                glyphs::draw_text(
                    canvas,
                    x + (self.avatar.saturating_sub(glyph_edge)) / 2,
                    y + (self.avatar.saturating_sub(glyph_edge)) / 2,
                    &initial,
                    scale,
                    ink.rgba(),
                );
            }
        }
    }
}
