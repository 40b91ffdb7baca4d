//! GIF bitstream serialization of palette-indexed frames.
//!
//! The encoder performs no color reduction: frames arrive as indices into
//! the one global palette and are written in the order given.

use crate::palette::Palette;
use crate::result::{ExportError, ExportResult};
use gif::{Encoder, Frame, Repeat};
use std::borrow::Cow;
use std::io::Write;

/// Shortest delay most viewers honor, in centiseconds
pub const MIN_DELAY_CS: u16 = 2;

/// A frame already mapped onto the shared palette
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFrame {
    /// One palette index per pixel, row-major
    pub indices: Vec<u8>,
    /// Display time in milliseconds
    pub delay_ms: u32,
}

/// Convert milliseconds to GIF centiseconds, rounding, floored at
/// [`MIN_DELAY_CS`]
#[must_use]
pub fn delay_to_centiseconds(delay_ms: u32) -> u16 {
    let cs = (u64::from(delay_ms) + 5) / 10;
    u16::try_from(cs).unwrap_or(u16::MAX).max(MIN_DELAY_CS)
}

fn dimension(value: u32, axis: &str) -> ExportResult<u16> {
    u16::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| {
            ExportError::encoding(format!(
                "GIF {axis} must be between 1 and {}, got {value}",
                u16::MAX
            ))
        })
}

/// Incremental GIF writer with one global color table
pub struct GifWriter<W: Write> {
    encoder: Encoder<W>,
    width: u16,
    height: u16,
    palette_len: usize,
    frames_written: usize,
}

impl<W: Write> std::fmt::Debug for GifWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GifWriter")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("palette_len", &self.palette_len)
            .field("frames_written", &self.frames_written)
            .finish_non_exhaustive()
    }
}

impl<W: Write> GifWriter<W> {
    /// Write the header, global palette and, when `looped`, the
    /// NETSCAPE2.0 infinite-loop extension. Without it viewers play once.
    ///
    /// # Errors
    ///
    /// Returns an encoding error for sizes outside the GIF range or a
    /// failing writer
    pub fn new(
        writer: W,
        width: u32,
        height: u32,
        palette: &Palette,
        looped: bool,
    ) -> ExportResult<Self> {
        let width = dimension(width, "width")?;
        let height = dimension(height, "height")?;
        let mut encoder = Encoder::new(writer, width, height, &palette.to_rgb_table())
            .map_err(|e| ExportError::encoding(format!("Failed to create GIF encoder: {e}")))?;
        if looped {
            encoder
                .set_repeat(Repeat::Infinite)
                .map_err(|e| ExportError::encoding(format!("Failed to set GIF loop: {e}")))?;
        }
        Ok(Self {
            encoder,
            width,
            height,
            palette_len: palette.len(),
            frames_written: 0,
        })
    }

    /// Append one frame
    ///
    /// # Errors
    ///
    /// Returns an encoding error when the index buffer does not cover the
    /// canvas, references a color outside the palette, or the writer fails
    pub fn write_frame(&mut self, frame: &IndexedFrame) -> ExportResult<()> {
        let expected = usize::from(self.width) * usize::from(self.height);
        if frame.indices.len() != expected {
            return Err(ExportError::encoding(format!(
                "Frame {} has {} indices, expected {expected}",
                self.frames_written,
                frame.indices.len()
            )));
        }
        if let Some(bad) = frame
            .indices
            .iter()
            .find(|&&i| usize::from(i) >= self.palette_len)
        {
            return Err(ExportError::encoding(format!(
                "Frame {} references palette index {bad} but the palette has {} colors",
                self.frames_written, self.palette_len
            )));
        }

        let gif_frame = Frame {
            width: self.width,
            height: self.height,
            buffer: Cow::Borrowed(&frame.indices),
            delay: delay_to_centiseconds(frame.delay_ms),
            ..Frame::default()
        };
        self.encoder
            .write_frame(&gif_frame)
            .map_err(|e| ExportError::encoding(format!("Failed to write GIF frame: {e}")))?;
        self.frames_written += 1;
        Ok(())
    }

    /// Frames written so far
    #[must_use]
    pub const fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Write the trailer and return the underlying writer
    ///
    /// # Errors
    ///
    /// Returns an encoding error when no frame was written or the writer fails
    pub fn finish(self) -> ExportResult<W> {
        if self.frames_written == 0 {
            return Err(ExportError::encoding("GIF has no frames"));
        }
        self.encoder
            .into_inner()
            .map_err(|e| ExportError::encoding(format!("Failed to finish GIF: {e}")))
    }
}

/// Encode a complete frame list into GIF bytes
///
/// # Errors
///
/// Returns an encoding error for an empty frame list or any invalid frame
pub fn encode_gif(
    frames: &[IndexedFrame],
    palette: &Palette,
    width: u32,
    height: u32,
    looped: bool,
) -> ExportResult<Vec<u8>> {
    let mut writer = GifWriter::new(Vec::new(), width, height, palette, looped)?;
    for frame in frames {
        writer.write_frame(frame)?;
    }
    writer.finish()
}
