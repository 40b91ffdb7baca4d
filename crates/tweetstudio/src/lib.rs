//! Tweetstudio: resolution-exact export of tweet cards
//!
//! Turns a rendered tweet card into a downloadable PNG still or a
//! typewriter-style animated GIF. The card lives on a [`RenderSurface`]
//! (a software renderer, a headless browser page, or a test double); the
//! pipeline borrows it exclusively for the length of one export.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     TWEETSTUDIO Export Pipeline                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Render     │    │ Frame      │    │ Palette    │            │
//! │   │ Surface    │───►│ Sequencer  │───►│ Builder    │──┐         │
//! │   └────────────┘    └────────────┘    └────────────┘  │         │
//! │         │                                              ▼         │
//! │         │           ┌────────────┐    ┌────────────┐            │
//! │         └──────────►│ PNG        │    │ GIF        │            │
//! │          (still)    │ Finisher   │    │ Encoder    │            │
//! │                     └─────┬──────┘    └─────┬──────┘            │
//! │                           └───► Downloader ◄┘                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use tweetstudio::prelude::*;
//!
//! # async fn run() -> ExportResult<()> {
//! let document = StudioDocument::load(std::path::Path::new("card.yaml"))?;
//! let mut surface = CardSurface::new(document);
//! let exporter = Exporter::new(ExportConfig::default(), DirectoryDownloader::new("out"))?;
//! let receipt = exporter
//!     .export_as_image(Some(&mut surface), "@jack", ExportOptions::new(1080, 1080))
//!     .await?;
//! println!("wrote {}", receipt.filename);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod bitmap;
pub mod capture;
mod clock;
pub mod design;
pub mod download;
pub mod estimate;
pub mod export;
pub mod gif_encoder;
mod glyphs;
pub mod naming;
pub mod palette;
pub mod png_finisher;
mod progress;
mod result;
pub mod sequencer;
pub mod surface;

pub use bitmap::Bitmap;
pub use capture::{capture, CaptureSettings, ExportOptions, DEFAULT_RESOURCE_TIMEOUT};
pub use clock::{Clock, Deadline, FakeClock, SystemClock};
pub use design::{
    AnimationSpec, BackgroundSpec, CardStyle, DesignState, ExportPreset, GradientDirection, Rgb,
    StudioDocument, Theme, Tweet, TweetContent, TweetMetrics, TweetProfile, MAX_TWEET_CHARS,
};
pub use download::{
    Delivery, DirectoryDownloader, Downloader, EncodedOutput, ExportFormat, MemoryDownloader,
};
pub use estimate::{estimate_file_size, format_bytes};
pub use export::{
    AnimationOptions, ExportConfig, ExportReceipt, Exporter, DEFAULT_BUDGET, DEFAULT_PRODUCT,
};
pub use gif_encoder::{encode_gif, GifWriter, IndexedFrame};
pub use naming::{generate_filename, sanitize_base_name};
pub use palette::{build_palette, quantize, Palette, MAX_PALETTE_COLORS};
pub use png_finisher::{CompressionLevel, PngFinisher, Watermark};
pub use progress::{ProgressCallback, ProgressReporter};
pub use result::{ExportError, ExportResult};
pub use sequencer::{Frame, FrameSequencer, SequenceOptions, SequencePlan};
#[cfg(feature = "browser")]
pub use surface::{BrowserSurface, BrowserSurfaceConfig};
pub use surface::{BoxStyle, CardSurface, MockSurface, RenderSurface, TextTarget};

/// Common imports for export callers
pub mod prelude {
    pub use super::{
        AnimationOptions, Bitmap, CardSurface, CompressionLevel, DesignState,
        DirectoryDownloader, Downloader, ExportConfig, ExportError, ExportFormat, ExportOptions,
        ExportPreset, ExportReceipt, ExportResult, Exporter, MemoryDownloader, RenderSurface,
        StudioDocument, Watermark,
    };
}
