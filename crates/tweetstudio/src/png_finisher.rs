//! Still-image output: optional watermark, then lossless PNG.

use crate::bitmap::Bitmap;
use crate::glyphs::{self, GLYPH_SIZE};
use crate::result::{ExportError, ExportResult};
use serde::{Deserialize, Serialize};

/// Default watermark text
pub const DEFAULT_WATERMARK: &str = "postloom.com";

/// PNG compression level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Fast compression, larger files
    Fast,
    /// Default compression
    #[default]
    Default,
    /// Best compression (slowest, smallest files)
    Best,
}

impl CompressionLevel {
    fn to_png_compression(self) -> png::Compression {
        match self {
            Self::Fast => png::Compression::Fast,
            Self::Default => png::Compression::Balanced,
            Self::Best => png::Compression::High,
        }
    }
}

/// Translucent label stamped in the bottom-right corner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// Label text
    pub label: String,
    /// Opacity of the backing plate
    pub plate_alpha: u8,
    /// Opacity of the label glyphs
    pub text_alpha: u8,
}

impl Default for Watermark {
    fn default() -> Self {
        Self {
            label: DEFAULT_WATERMARK.to_string(),
            plate_alpha: 96,
            text_alpha: 200,
        }
    }
}

impl Watermark {
    /// Watermark with a custom label
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Plate rectangle `(x, y, w, h)` for an image of `width x height`.
    ///
    /// Glyph scale and margin follow the shorter side so the label keeps
    /// the same relative size at every resolution.
    #[must_use]
    pub fn plate_rect(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let (_, margin, pad) = self.metrics(width, height);
        let (text_w, text_h) = self.text_size(width, height);
        let plate_w = text_w + 2 * pad;
        let plate_h = text_h + 2 * pad;
        (
            width.saturating_sub(margin + plate_w),
            height.saturating_sub(margin + plate_h),
            plate_w,
            plate_h,
        )
    }

    fn metrics(&self, width: u32, height: u32) -> (u32, u32, u32) {
        let shorter = width.min(height);
        let scale = (shorter / 360).max(1);
        let margin = (shorter / 54).max(2);
        (scale, margin, scale * 4)
    }

    fn text_size(&self, width: u32, height: u32) -> (u32, u32) {
        let (scale, _, _) = self.metrics(width, height);
        (glyphs::text_width(&self.label, scale), GLYPH_SIZE * scale)
    }

    /// Composite the watermark onto `bitmap`
    pub fn apply(&self, bitmap: &mut Bitmap) {
        let (width, height) = bitmap.dimensions();
        let (scale, _, pad) = self.metrics(width, height);
        let (x, y, w, h) = self.plate_rect(width, height);
        bitmap.blend_rect(x, y, w, h, [0, 0, 0, self.plate_alpha]);
        glyphs::draw_text(
            bitmap,
            x + pad,
            y + pad,
            &self.label,
            scale,
            [255, 255, 255, self.text_alpha],
        );
    }
}

/// Encodes captured stills as PNG
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PngFinisher {
    compression: CompressionLevel,
    watermark: Option<Watermark>,
    software: Option<String>,
}

impl PngFinisher {
    /// Finisher with default compression and no watermark
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set compression level
    #[must_use]
    pub const fn with_compression(mut self, compression: CompressionLevel) -> Self {
        self.compression = compression;
        self
    }

    /// Stamp a watermark on every image
    #[must_use]
    pub fn with_watermark(mut self, watermark: Option<Watermark>) -> Self {
        self.watermark = watermark;
        self
    }

    /// Record the producing software in a `tEXt` chunk
    #[must_use]
    pub fn with_software(mut self, software: impl Into<String>) -> Self {
        self.software = Some(software.into());
        self
    }

    /// Configured compression
    #[must_use]
    pub const fn compression(&self) -> CompressionLevel {
        self.compression
    }

    /// Configured watermark
    #[must_use]
    pub const fn watermark(&self) -> Option<&Watermark> {
        self.watermark.as_ref()
    }

    /// Watermark (if any) and encode at the bitmap's exact resolution
    ///
    /// # Errors
    ///
    /// Returns an encoding error if the PNG encoder fails
    pub fn finish(&self, mut bitmap: Bitmap) -> ExportResult<Vec<u8>> {
        if let Some(watermark) = &self.watermark {
            watermark.apply(&mut bitmap);
        }
        self.encode(&bitmap)
    }

    fn encode(&self, bitmap: &Bitmap) -> ExportResult<Vec<u8>> {
        let (width, height) = bitmap.dimensions();
        let mut output = Vec::new();

        {
            let mut encoder = png::Encoder::new(&mut output, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_compression(self.compression.to_png_compression());
            if let Some(software) = &self.software {
                encoder
                    .add_text_chunk("Software".to_string(), software.clone())
                    .map_err(|e| ExportError::encoding(format!("Failed to add PNG text: {e}")))?;
            }

            let mut writer = encoder
                .write_header()
                .map_err(|e| ExportError::encoding(format!("Failed to write PNG header: {e}")))?;

            writer
                .write_image_data(bitmap.as_rgba())
                .map_err(|e| ExportError::encoding(format!("Failed to write PNG data: {e}")))?;
            writer
                .finish()
                .map_err(|e| ExportError::encoding(format!("Failed to finish PNG: {e}")))?;
        }

        Ok(output)
    }
}
