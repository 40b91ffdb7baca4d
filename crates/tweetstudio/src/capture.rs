//! Rasterizer adapter: resolution-exact captures of a render surface.
//!
//! The live box may carry a preview-only `scale(..)` transform. For the
//! duration of one capture the adapter overrides the box to exactly
//! `width x height` pixels at 1:1, rasterizes, and puts the original inline
//! style back on every exit path.

use crate::bitmap::Bitmap;
use crate::design::Rgb;
use crate::result::{ExportError, ExportResult};
use crate::surface::{BoxStyle, RenderSurface};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on waiting for embedded images
pub const DEFAULT_RESOURCE_TIMEOUT: Duration = Duration::from_secs(2);

/// Authoritative raster resolution of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
}

impl ExportOptions {
    /// Create options for `width x height`
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Reject empty resolutions
    ///
    /// # Errors
    ///
    /// Returns a validation error when either side is zero
    pub fn validate(&self) -> ExportResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ExportError::validation(format!(
                "Export size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Number of pixels per frame
    #[must_use]
    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Knobs shared by every capture of one export
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    /// Bound on waiting for embedded resources
    pub resource_timeout: Duration,
    /// Opaque color translucent pixels are flattened onto
    pub matte: Rgb,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            resource_timeout: DEFAULT_RESOURCE_TIMEOUT,
            matte: Rgb::WHITE,
        }
    }
}

/// Capture the surface at exactly `options.width x options.height`.
///
/// The returned bitmap is opaque: translucent pixels are composited over
/// `settings.matte`.
///
/// # Errors
///
/// Returns a capture error when the surface is detached, a resource does
/// not load in time, or the surface produces a bitmap of the wrong size.
#[tracing::instrument(skip(surface, settings), fields(width = options.width, height = options.height))]
pub async fn capture<S>(
    surface: &mut S,
    options: ExportOptions,
    settings: &CaptureSettings,
) -> ExportResult<Bitmap>
where
    S: RenderSurface + ?Sized,
{
    options.validate()?;
    if !surface.is_attached().await? {
        return Err(ExportError::capture("Element is detached from the document"));
    }

    let original = surface.box_style().await?;
    let outcome = capture_with_override(surface, options, settings).await;
    let restored = surface.apply_box_style(&original).await;

    let mut bitmap = match (outcome, restored) {
        (Ok(bitmap), Ok(())) => bitmap,
        (Ok(_), Err(restore_err)) => return Err(restore_err),
        (Err(err), Ok(())) => return Err(err),
        (Err(err), Err(restore_err)) => {
            warn!(error = %restore_err, "failed to restore box style after capture error");
            return Err(err);
        }
    };

    bitmap.composite_over(settings.matte.0);
    Ok(bitmap)
}

async fn capture_with_override<S>(
    surface: &mut S,
    options: ExportOptions,
    settings: &CaptureSettings,
) -> ExportResult<Bitmap>
where
    S: RenderSurface + ?Sized,
{
    surface
        .apply_box_style(&BoxStyle::capture(options.width, options.height))
        .await?;
    surface.next_paint().await?;
    surface.await_resources(settings.resource_timeout).await?;
    let bitmap = surface.rasterize().await?;

    if bitmap.dimensions() != (options.width, options.height) {
        return Err(ExportError::capture(format!(
            "Captured {}x{} but {}x{} was requested",
            bitmap.width(),
            bitmap.height(),
            options.width,
            options.height
        )));
    }
    debug!(pixels = bitmap.pixel_count(), "captured");
    Ok(bitmap)
}
