//! Decoded RGBA pixel buffers.
//!
//! Every stage of the pipeline hands bitmaps around by value: the rasterizer
//! produces them, the palette builder pools them, the PNG finisher draws on
//! them. Pixels are row-major, four bytes per pixel, straight (not
//! premultiplied) alpha.

use crate::result::{ExportError, ExportResult};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};

/// An RGBA pixel buffer with known dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// Wrap raw RGBA data
    ///
    /// # Errors
    ///
    /// Returns a capture error if the buffer length does not match the dimensions
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> ExportResult<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(ExportError::capture(format!(
                "Buffer size mismatch: expected {expected} bytes for {width}x{height}, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Create a bitmap filled with one color
    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Decode PNG bytes (e.g. a CDP screenshot) into a bitmap
    pub fn from_png_bytes(bytes: &[u8]) -> ExportResult<Self> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Png).map_err(|e| {
            ExportError::capture(format!("Failed to decode captured PNG: {e}"))
        })?;
        Ok(Self::from(img.to_rgba8()))
    }

    /// Width in pixels
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of pixels
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.data.len() / 4
    }

    /// Raw RGBA bytes
    #[must_use]
    pub fn as_rgba(&self) -> &[u8] {
        &self.data
    }

    /// Consume into raw RGBA bytes
    #[must_use]
    pub fn into_rgba(self) -> Vec<u8> {
        self.data
    }

    /// Iterate over pixels as `[r, g, b, a]`
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.data
            .chunks_exact(4)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(((y as usize) * (self.width as usize) + (x as usize)) * 4)
    }

    /// Read a pixel; out-of-bounds reads return transparent black
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.offset(x, y).map_or([0; 4], |i| {
            [
                self.data[i],
                self.data[i + 1],
                self.data[i + 2],
                self.data[i + 3],
            ]
        })
    }

    /// Overwrite a pixel; out-of-bounds writes are ignored
    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(i) = self.offset(x, y) {
            self.data[i..i + 4].copy_from_slice(&rgba);
        }
    }

    /// Source-over blend a pixel onto the buffer
    pub fn blend_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let Some(i) = self.offset(x, y) else {
            return;
        };
        let dst = [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ];
        self.data[i..i + 4].copy_from_slice(&source_over(rgba, dst));
    }

    /// Fill a rectangle, clipped to the buffer
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, rgba: [u8; 4]) {
        let x_end = x.saturating_add(w).min(self.width);
        let y_end = y.saturating_add(h).min(self.height);
        for py in y..y_end {
            for px in x..x_end {
                self.put_pixel(px, py, rgba);
            }
        }
    }

    /// Blend a rectangle, clipped to the buffer
    pub fn blend_rect(&mut self, x: u32, y: u32, w: u32, h: u32, rgba: [u8; 4]) {
        let x_end = x.saturating_add(w).min(self.width);
        let y_end = y.saturating_add(h).min(self.height);
        for py in y..y_end {
            for px in x..x_end {
                self.blend_pixel(px, py, rgba);
            }
        }
    }

    /// Flatten every pixel onto an opaque matte color
    pub fn composite_over(&mut self, matte: [u8; 3]) {
        let backdrop = [matte[0], matte[1], matte[2], 255];
        for px in self.data.chunks_exact_mut(4) {
            if px[3] == 255 {
                continue;
            }
            let out = source_over([px[0], px[1], px[2], px[3]], backdrop);
            px.copy_from_slice(&out);
        }
    }

    /// Whether every pixel is fully opaque
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        self.data.chunks_exact(4).all(|px| px[3] == 255)
    }

    /// Resample to `width x height` (bilinear); a no-op when already that size
    #[must_use]
    pub fn resized(&self, width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == self.dimensions() {
            return self.clone();
        }
        match RgbaImage::from_raw(self.width, self.height, self.data.clone()) {
            Some(img) => Self::from(imageops::resize(&img, width, height, FilterType::Triangle)),
            None => Self::filled(width, height, [0; 4]),
        }
    }

    /// Copy another bitmap into this one at `(x, y)`, blending by alpha
    pub fn draw_bitmap(&mut self, x: u32, y: u32, src: &Self) {
        for sy in 0..src.height {
            for sx in 0..src.width {
                self.blend_pixel(x + sx, y + sy, src.pixel(sx, sy));
            }
        }
    }
}

impl From<RgbaImage> for Bitmap {
    fn from(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }
}

/// Porter-Duff source-over on straight alpha
fn source_over(src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    let sa = u32::from(src[3]);
    if sa == 255 {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let da = u32::from(dst[3]);
    // out_a = sa + da * (1 - sa), all scaled by 255
    let out_a = sa * 255 + da * (255 - sa);
    if out_a == 0 {
        return [0; 4];
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let sc = u32::from(src[c]);
        let dc = u32::from(dst[c]);
        let num = sc * sa * 255 + dc * da * (255 - sa);
        out[c] = ((num + out_a / 2) / out_a).min(255) as u8;
    }
    out[3] = ((out_a + 127) / 255).min(255) as u8;
    out
}
