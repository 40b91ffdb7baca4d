//! Export orchestration.
//!
//! ```text
//! still:     surface ─► capture ─► PngFinisher ─► filename ─► Downloader
//! animated:  surface ─► FrameSequencer ─► build_palette ─► quantize+GifWriter ─► Downloader
//! ```
//!
//! Every failure aborts the whole export, surfaces one [`ExportError`] and
//! leaves the downloader untouched. The animated path runs under a
//! wall-clock budget checked between captures and between encoded frames.

use crate::capture::{capture, CaptureSettings, ExportOptions, DEFAULT_RESOURCE_TIMEOUT};
use crate::clock::{Clock, Deadline, SystemClock};
use crate::design::{DesignState, Rgb};
use crate::download::{Downloader, EncodedOutput, ExportFormat};
use crate::gif_encoder::{GifWriter, IndexedFrame};
use crate::naming::generate_filename;
use crate::palette::{build_palette, quantize, MAX_PALETTE_COLORS};
use crate::png_finisher::{CompressionLevel, PngFinisher, Watermark};
use crate::progress::{ProgressCallback, ProgressReporter, CAPTURE_SHARE, ENCODE_SHARE, PALETTE_SHARE};
use crate::result::{ExportError, ExportResult};
use crate::sequencer::{FrameSequencer, SequenceOptions, DEFAULT_STEP_COUNT};
use crate::surface::{RenderSurface, TextTarget};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Product prefix of generated filenames
pub const DEFAULT_PRODUCT: &str = "tweet-studio";
/// Default wall-clock budget of an export
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(20);

/// Exporter-wide settings
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Filename prefix
    pub product: String,
    /// Default number of typewriter steps
    pub step_count: usize,
    /// Wall-clock budget per export
    pub budget: Duration,
    /// Bound on waiting for embedded resources per capture
    pub resource_timeout: Duration,
    /// Color translucent pixels are flattened onto
    pub matte: Rgb,
    /// Watermark stamped on stills
    pub watermark: Option<Watermark>,
    /// PNG compression
    pub compression: CompressionLevel,
    /// GIF palette size
    pub max_colors: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            product: DEFAULT_PRODUCT.to_string(),
            step_count: DEFAULT_STEP_COUNT,
            budget: DEFAULT_BUDGET,
            resource_timeout: DEFAULT_RESOURCE_TIMEOUT,
            matte: Rgb::WHITE,
            watermark: None,
            compression: CompressionLevel::default(),
            max_colors: MAX_PALETTE_COLORS,
        }
    }
}

impl ExportConfig {
    /// Default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set filename prefix
    #[must_use]
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = product.into();
        self
    }

    /// Set default typewriter step count
    #[must_use]
    pub const fn with_step_count(mut self, step_count: usize) -> Self {
        self.step_count = step_count;
        self
    }

    /// Set wall-clock budget
    #[must_use]
    pub const fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Set the resource wait bound
    #[must_use]
    pub const fn with_resource_timeout(mut self, timeout: Duration) -> Self {
        self.resource_timeout = timeout;
        self
    }

    /// Set matte color
    #[must_use]
    pub const fn with_matte(mut self, matte: Rgb) -> Self {
        self.matte = matte;
        self
    }

    /// Set still watermark
    #[must_use]
    pub fn with_watermark(mut self, watermark: Option<Watermark>) -> Self {
        self.watermark = watermark;
        self
    }

    /// Set PNG compression
    #[must_use]
    pub const fn with_compression(mut self, compression: CompressionLevel) -> Self {
        self.compression = compression;
        self
    }

    /// Set GIF palette size
    #[must_use]
    pub const fn with_max_colors(mut self, max_colors: usize) -> Self {
        self.max_colors = max_colors;
        self
    }

    /// Check settings
    ///
    /// # Errors
    ///
    /// Returns a config error for a zero budget or palette size out of range
    pub fn validate(&self) -> ExportResult<()> {
        if self.budget.is_zero() {
            return Err(ExportError::config("Export budget must be positive"));
        }
        if self.max_colors == 0 || self.max_colors > MAX_PALETTE_COLORS {
            return Err(ExportError::config(format!(
                "max_colors must be between 1 and {MAX_PALETTE_COLORS}"
            )));
        }
        Ok(())
    }

    fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            resource_timeout: self.resource_timeout,
            matte: self.matte,
        }
    }
}

/// Parameters of one animated export
pub struct AnimationOptions {
    /// Full text to type out
    pub text: String,
    /// Output resolution
    pub size: ExportOptions,
    /// Characters per second
    pub speed: f64,
    /// Nominal frame rate
    pub fps: u32,
    /// Loop forever instead of playing once
    pub looped: bool,
    /// Show a caret while typing
    pub show_cursor: bool,
    /// Override of the configured step count
    pub step_count: Option<usize>,
    /// Progress callback, values in `[0, 1]`
    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for AnimationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationOptions")
            .field("text", &self.text)
            .field("size", &self.size)
            .field("speed", &self.speed)
            .field("fps", &self.fps)
            .field("looped", &self.looped)
            .field("show_cursor", &self.show_cursor)
            .field("step_count", &self.step_count)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl AnimationOptions {
    /// Type `text` at `size` with default animation settings
    #[must_use]
    pub fn new(text: impl Into<String>, size: ExportOptions) -> Self {
        let defaults = crate::design::AnimationSpec::default();
        Self {
            text: text.into(),
            size,
            speed: defaults.speed,
            fps: defaults.fps,
            looped: defaults.looped,
            show_cursor: defaults.show_cursor,
            step_count: None,
            on_progress: None,
        }
    }

    /// Options taken from a design snapshot
    #[must_use]
    pub fn from_design(design: &DesignState, text: impl Into<String>) -> Self {
        Self {
            speed: design.animation.speed,
            fps: design.animation.fps,
            looped: design.animation.looped,
            show_cursor: design.animation.show_cursor,
            ..Self::new(
                text,
                ExportOptions::new(design.export_width, design.export_height),
            )
        }
    }

    /// Set typing speed
    #[must_use]
    pub const fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Set nominal frame rate
    #[must_use]
    pub const fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Loop forever
    #[must_use]
    pub const fn with_loop(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }

    /// Show or hide the caret
    #[must_use]
    pub const fn with_cursor(mut self, show_cursor: bool) -> Self {
        self.show_cursor = show_cursor;
        self
    }

    /// Override the step count
    #[must_use]
    pub const fn with_step_count(mut self, step_count: usize) -> Self {
        self.step_count = Some(step_count);
        self
    }

    /// Receive progress updates
    #[must_use]
    pub fn with_progress(mut self, callback: impl FnMut(f64) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Reject options that cannot produce an animation
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty text, a non-positive speed or
    /// frame rate, or an empty resolution
    pub fn validate(&self) -> ExportResult<()> {
        self.size.validate()?;
        if self.text.trim().is_empty() {
            return Err(ExportError::validation("Animated export needs non-empty text"));
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(ExportError::validation(format!(
                "Typing speed must be positive, got {}",
                self.speed
            )));
        }
        if self.fps == 0 {
            return Err(ExportError::validation("Frame rate must be positive"));
        }
        if self.step_count == Some(0) {
            return Err(ExportError::validation("Step count must be positive"));
        }
        Ok(())
    }
}

/// What a successful export produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReceipt {
    /// Filename handed to the downloader
    pub filename: String,
    /// Container format
    pub format: ExportFormat,
    /// Encoded size in bytes
    pub byte_len: usize,
    /// Frames in the output (1 for stills)
    pub frame_count: usize,
    /// Output resolution
    pub size: ExportOptions,
    /// Wall-clock time spent
    pub elapsed: Duration,
}

/// Public entry point of the export pipeline.
///
/// Holds no per-export state: one exporter may serve concurrent exports of
/// different surfaces. Each export borrows its surface mutably, so two
/// exports can never interleave on the same surface.
pub struct Exporter<D, C = SystemClock> {
    config: ExportConfig,
    downloader: D,
    clock: C,
    fixed_timestamp: Option<DateTime<Utc>>,
}

impl<D: fmt::Debug, C: fmt::Debug> fmt::Debug for Exporter<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("config", &self.config)
            .field("downloader", &self.downloader)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl<D: Downloader> Exporter<D, SystemClock> {
    /// Exporter delivering to `downloader` on the system clock
    ///
    /// # Errors
    ///
    /// Returns a config error if `config` is invalid
    pub fn new(config: ExportConfig, downloader: D) -> ExportResult<Self> {
        Self::with_clock(config, downloader, SystemClock::new())
    }
}

impl<D: Downloader, C: Clock> Exporter<D, C> {
    /// Exporter measuring its budget on `clock`
    ///
    /// # Errors
    ///
    /// Returns a config error if `config` is invalid
    pub fn with_clock(config: ExportConfig, downloader: D, clock: C) -> ExportResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            downloader,
            clock,
            fixed_timestamp: None,
        })
    }

    /// Stamp every filename with `at` instead of the current time
    #[must_use]
    pub const fn with_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.fixed_timestamp = Some(at);
        self
    }

    /// Settings in use
    #[must_use]
    pub const fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// The delivery collaborator
    #[must_use]
    pub const fn downloader(&self) -> &D {
        &self.downloader
    }

    fn filename(&self, base_name: &str, format: ExportFormat) -> String {
        let at = self.fixed_timestamp.unwrap_or_else(Utc::now);
        generate_filename(&self.config.product, base_name, format.extension(), at)
    }

    fn deliver(
        &self,
        output: &EncodedOutput,
        base_name: &str,
        frame_count: usize,
        size: ExportOptions,
        deadline: &Deadline,
    ) -> ExportResult<ExportReceipt> {
        let filename = self.filename(base_name, output.format);
        self.downloader.deliver(output, &filename)?;
        let receipt = ExportReceipt {
            filename,
            format: output.format,
            byte_len: output.bytes.len(),
            frame_count,
            size,
            elapsed: deadline.elapsed(&self.clock),
        };
        info!(
            filename = %receipt.filename,
            bytes = receipt.byte_len,
            frames = receipt.frame_count,
            elapsed_ms = receipt.elapsed.as_millis() as u64,
            "export complete"
        );
        Ok(receipt)
    }

    /// Capture the surface once and deliver it as PNG.
    ///
    /// # Errors
    ///
    /// - Validation: no surface, or an empty resolution
    /// - Capture: the surface could not be rasterized
    /// - Encoding: the PNG encoder failed
    /// - Timeout: the budget was spent before delivery
    #[tracing::instrument(skip_all, fields(base_name = %base_name, width = options.width, height = options.height))]
    pub async fn export_as_image<S>(
        &self,
        surface: Option<&mut S>,
        base_name: &str,
        options: ExportOptions,
    ) -> ExportResult<ExportReceipt>
    where
        S: RenderSurface + ?Sized,
    {
        let surface = surface.ok_or_else(|| ExportError::validation("No element to export"))?;
        options.validate()?;

        let deadline = Deadline::start(&self.clock, self.config.budget);
        let bitmap = capture(surface, options, &self.config.capture_settings()).await?;
        let bytes = PngFinisher::new()
            .with_compression(self.config.compression)
            .with_watermark(self.config.watermark.clone())
            .with_software(self.config.product.clone())
            .finish(bitmap)?;
        deadline.check(&self.clock)?;

        let output = EncodedOutput::new(bytes, ExportFormat::Png);
        self.deliver(&output, base_name, 1, options, &deadline)
    }

    /// Type the text out on the surface and deliver the frames as a GIF.
    ///
    /// Progress is split between capture (0.7), palette (0.1) and encoding
    /// (0.2) and ends at exactly 1.0 after delivery. Nothing is reported
    /// when validation fails.
    ///
    /// # Errors
    ///
    /// - Validation: no surface, no text node, or invalid options
    /// - Capture: a frame could not be rasterized
    /// - Encoding: palette or bitstream failure
    /// - Timeout: the budget ran out; the text node is restored regardless
    #[tracing::instrument(
        skip_all,
        fields(base_name = %base_name, width = options.size.width, height = options.size.height)
    )]
    pub async fn export_as_animation<S>(
        &self,
        surface: Option<&mut S>,
        base_name: &str,
        mut options: AnimationOptions,
    ) -> ExportResult<ExportReceipt>
    where
        S: RenderSurface + ?Sized,
    {
        let surface = surface.ok_or_else(|| ExportError::validation("No element to export"))?;
        options.validate()?;
        let target = surface
            .find_text_target()
            .await?
            .ok_or_else(|| ExportError::validation("Element has no text node to animate"))?;

        let mut callback = options.on_progress.take();
        let mut progress = ProgressReporter::from_callback(callback.as_mut());
        let deadline = Deadline::start(&self.clock, self.config.budget);

        let frames = FrameSequencer::new(
            SequenceOptions {
                step_count: options.step_count.unwrap_or(self.config.step_count),
                speed: options.speed,
                show_cursor: options.show_cursor,
            },
            options.size,
            self.config.capture_settings(),
        )
        .with_deadline(&self.clock, deadline)
        .run(surface, &target, &options.text, &mut progress)
        .await?;

        let bytes = self
            .encode_animation(&frames, &options, &deadline, &mut progress, &target)
            .await?;
        deadline.check(&self.clock)?;

        let output = EncodedOutput::new(bytes, ExportFormat::Gif);
        let receipt = self.deliver(&output, base_name, frames.len(), options.size, &deadline)?;
        progress.finish();
        Ok(receipt)
    }

    async fn encode_animation(
        &self,
        frames: &[crate::sequencer::Frame],
        options: &AnimationOptions,
        deadline: &Deadline,
        progress: &mut ProgressReporter<'_>,
        target: &TextTarget,
    ) -> ExportResult<Vec<u8>> {
        deadline.check(&self.clock)?;
        let palette = build_palette(frames.iter().map(|f| &f.bitmap), self.config.max_colors)?;
        progress.report(CAPTURE_SHARE + PALETTE_SHARE);
        debug!(colors = palette.len(), selector = target.selector(), "palette built");
        tokio::task::yield_now().await;

        let mut writer = GifWriter::new(
            Vec::new(),
            options.size.width,
            options.size.height,
            &palette,
            options.looped,
        )?;
        let total = frames.len();
        for (n, frame) in frames.iter().enumerate() {
            deadline.check(&self.clock)?;
            let indexed = IndexedFrame {
                indices: quantize(&frame.bitmap, &palette),
                delay_ms: frame.delay_ms,
            };
            writer.write_frame(&indexed)?;
            progress.report_stage(CAPTURE_SHARE + PALETTE_SHARE, ENCODE_SHARE, n + 1, total);
            debug!(frame = n + 1, total, "frame encoded");
            tokio::task::yield_now().await;
        }
        writer.finish()
    }
}
