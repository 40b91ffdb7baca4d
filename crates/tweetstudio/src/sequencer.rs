//! Typewriter frame sequencing.
//!
//! The number of captures is bounded by a step count rather than the text
//! length, so a 280 character tweet costs about as much as a 20 character
//! one. Each step writes a prefix of the text into the surface's text node,
//! waits for a paint and captures. The node's original content is written
//! back whether sequencing succeeds or fails.

use crate::bitmap::Bitmap;
use crate::capture::{capture, CaptureSettings, ExportOptions};
use crate::clock::{Clock, Deadline};
use crate::progress::{ProgressReporter, CAPTURE_SHARE};
use crate::result::ExportResult;
use crate::surface::{RenderSurface, TextTarget};
use tracing::{debug, warn};

/// Caret appended while the text is still being typed
pub const CARET: char = '|';
/// Shortest per-step delay in milliseconds
pub const MIN_STEP_DELAY_MS: u32 = 20;
/// Longest per-step delay; twice this still fits a GIF frame delay
pub const MAX_STEP_DELAY_MS: u32 = u16::MAX as u32 * 10 / 2;
/// Shortest hold on the completed text in milliseconds
pub const MIN_FINAL_HOLD_MS: u32 = 1000;
/// Default number of typewriter steps
pub const DEFAULT_STEP_COUNT: usize = 10;

/// One captured animation frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Opaque RGBA pixels at the export resolution
    pub bitmap: Bitmap,
    /// Display time in milliseconds
    pub delay_ms: u32,
}

/// Typewriter parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceOptions {
    /// Requested number of reveal steps
    pub step_count: usize,
    /// Characters revealed per second
    pub speed: f64,
    /// Append [`CARET`] to partial text
    pub show_cursor: bool,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self {
            step_count: DEFAULT_STEP_COUNT,
            speed: 50.0,
            show_cursor: true,
        }
    }
}

/// Step geometry and timing derived from the text length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencePlan {
    /// Text length in characters
    pub len: usize,
    /// Characters revealed per step
    pub char_step: usize,
    /// Delay of every step frame
    pub step_delay_ms: u32,
    /// Delay of the final, completed frame
    pub final_delay_ms: u32,
}

impl SequencePlan {
    /// Plan a reveal of `len` characters.
    ///
    /// The step count is clamped to `1..=len`, so there is never more than
    /// one step per character.
    #[must_use]
    pub fn new(len: usize, step_count: usize, speed: f64) -> Self {
        let steps = step_count.clamp(1, len.max(1));
        let char_step = len.div_ceil(steps).max(1);
        let speed = if speed.is_finite() && speed > 0.0 {
            speed
        } else {
            1.0
        };
        let raw = (1000.0 * char_step as f64 / speed).round();
        let step_delay_ms = if raw >= f64::from(MAX_STEP_DELAY_MS) {
            MAX_STEP_DELAY_MS
        } else {
            (raw as u32).max(MIN_STEP_DELAY_MS)
        };
        let final_delay_ms = MIN_FINAL_HOLD_MS.max(step_delay_ms * 2);
        Self {
            len,
            char_step,
            step_delay_ms,
            final_delay_ms,
        }
    }

    /// Character counts shown by the step frames: `0, step, 2·step, … ≤ len`.
    ///
    /// Empty text has no step frames.
    #[must_use]
    pub fn reveal_points(&self) -> Vec<usize> {
        if self.len == 0 {
            return Vec::new();
        }
        (0..=self.len).step_by(self.char_step).collect()
    }

    /// Total frames including the held final frame
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.reveal_points().len() + 1
    }

    /// Sum of all frame delays in milliseconds
    #[must_use]
    pub fn total_duration_ms(&self) -> u64 {
        self.reveal_points().len() as u64 * u64::from(self.step_delay_ms)
            + u64::from(self.final_delay_ms)
    }
}

/// The first `chars` characters of `text`
fn prefix(text: &str, chars: usize) -> &str {
    text.char_indices()
        .nth(chars)
        .map_or(text, |(byte, _)| &text[..byte])
}

/// Drives a surface through the typewriter reveal and captures each state
pub struct FrameSequencer<'a> {
    options: SequenceOptions,
    size: ExportOptions,
    capture: CaptureSettings,
    budget: Option<(&'a dyn Clock, Deadline)>,
}

impl std::fmt::Debug for FrameSequencer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSequencer")
            .field("options", &self.options)
            .field("size", &self.size)
            .field("capture", &self.capture)
            .field("deadline", &self.budget.map(|(_, d)| d))
            .finish()
    }
}

impl<'a> FrameSequencer<'a> {
    /// Sequence at `size` with the given capture settings
    #[must_use]
    pub const fn new(options: SequenceOptions, size: ExportOptions, capture: CaptureSettings) -> Self {
        Self {
            options,
            size,
            capture,
            budget: None,
        }
    }

    /// Abort between captures once `deadline` has passed on `clock`
    #[must_use]
    pub fn with_deadline(mut self, clock: &'a dyn Clock, deadline: Deadline) -> Self {
        self.budget = Some((clock, deadline));
        self
    }

    /// Plan for `full_text` under these options
    #[must_use]
    pub fn plan(&self, full_text: &str) -> SequencePlan {
        SequencePlan::new(
            full_text.chars().count(),
            self.options.step_count,
            self.options.speed,
        )
    }

    /// Capture the reveal of `full_text` into frames.
    ///
    /// Progress after each capture is `i / len` of the capture share; the
    /// final frame reports the full share.
    ///
    /// # Errors
    ///
    /// Propagates capture failures and timeouts after restoring the text node.
    #[tracing::instrument(skip_all, fields(chars = full_text.chars().count()))]
    pub async fn run<S>(
        &self,
        surface: &mut S,
        target: &TextTarget,
        full_text: &str,
        progress: &mut ProgressReporter<'_>,
    ) -> ExportResult<Vec<Frame>>
    where
        S: RenderSurface + ?Sized,
    {
        let original = surface.snapshot_text(target).await?;
        let outcome = self.capture_all(surface, target, full_text, progress).await;
        let restored = surface.restore_text(target, &original).await;

        match (outcome, restored) {
            (Ok(frames), Ok(())) => Ok(frames),
            (Ok(_), Err(restore_err)) => Err(restore_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(restore_err)) => {
                warn!(error = %restore_err, "failed to restore text after sequencing error");
                Err(err)
            }
        }
    }

    fn check_deadline(&self) -> ExportResult<()> {
        match self.budget {
            Some((clock, deadline)) => deadline.check(clock),
            None => Ok(()),
        }
    }

    async fn capture_all<S>(
        &self,
        surface: &mut S,
        target: &TextTarget,
        full_text: &str,
        progress: &mut ProgressReporter<'_>,
    ) -> ExportResult<Vec<Frame>>
    where
        S: RenderSurface + ?Sized,
    {
        let plan = self.plan(full_text);
        let mut frames = Vec::with_capacity(plan.frame_count());

        for i in plan.reveal_points() {
            self.check_deadline()?;
            let mut shown = prefix(full_text, i).to_string();
            if i < plan.len && self.options.show_cursor {
                shown.push(CARET);
            }
            let bitmap = self.capture_text(surface, target, &shown).await?;
            frames.push(Frame {
                bitmap,
                delay_ms: plan.step_delay_ms,
            });
            progress.report(i as f64 / plan.len as f64 * CAPTURE_SHARE);
            debug!(frame = frames.len(), revealed = i, "step captured");
        }

        self.check_deadline()?;
        let bitmap = self.capture_text(surface, target, full_text).await?;
        frames.push(Frame {
            bitmap,
            delay_ms: plan.final_delay_ms,
        });
        progress.report(CAPTURE_SHARE);
        debug!(frames = frames.len(), "sequence complete");
        Ok(frames)
    }

    async fn capture_text<S>(
        &self,
        surface: &mut S,
        target: &TextTarget,
        text: &str,
    ) -> ExportResult<Bitmap>
    where
        S: RenderSurface + ?Sized,
    {
        surface.write_text(target, text).await?;
        surface.next_paint().await?;
        capture(surface, self.size, &self.capture).await
    }
}
