//! Monotonic progress channel.
//!
//! Stages report against their own share of `[0, 1]`; the reporter clamps,
//! drops regressions and guarantees the last value on success is exactly 1.0.

use std::fmt;

/// Caller-supplied progress callback
pub type ProgressCallback = Box<dyn FnMut(f64) + Send>;

/// Share of the progress range spent capturing frames
pub const CAPTURE_SHARE: f64 = 0.7;
/// Share spent building the palette
pub const PALETTE_SHARE: f64 = 0.1;
/// Share spent quantizing and encoding frames
pub const ENCODE_SHARE: f64 = 0.2;

/// Forwards non-decreasing progress values to an optional callback
pub struct ProgressReporter<'a> {
    sink: Option<&'a mut (dyn FnMut(f64) + Send)>,
    last: f64,
    finished: bool,
}

impl fmt::Debug for ProgressReporter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_sink", &self.sink.is_some())
            .field("last", &self.last)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<'a> ProgressReporter<'a> {
    /// Report into `sink`
    #[must_use]
    pub fn new(sink: Option<&'a mut (dyn FnMut(f64) + Send)>) -> Self {
        Self {
            sink,
            last: 0.0,
            finished: false,
        }
    }

    /// Report into an owned boxed callback
    #[must_use]
    pub fn from_callback(callback: Option<&'a mut ProgressCallback>) -> Self {
        Self::new(callback.map(|cb| &mut **cb as &mut (dyn FnMut(f64) + Send)))
    }

    /// A reporter that discards everything
    #[must_use]
    pub fn silent() -> Self {
        Self::new(None)
    }

    /// Report an absolute progress value.
    ///
    /// Values are clamped into `[0, 1)`; anything lower than the previous
    /// report is raised to it. 1.0 is reserved for [`Self::finish`].
    pub fn report(&mut self, value: f64) {
        if self.finished {
            return;
        }
        let value = if value.is_nan() { 0.0 } else { value };
        let value = value.clamp(0.0, 1.0).max(self.last);
        if value >= 1.0 {
            return;
        }
        self.last = value;
        if let Some(sink) = self.sink.as_mut() {
            sink(value);
        }
    }

    /// Report `done / total` of a stage occupying `[offset, offset + share]`
    pub fn report_stage(&mut self, offset: f64, share: f64, done: usize, total: usize) {
        let fraction = if total == 0 {
            1.0
        } else {
            done as f64 / total as f64
        };
        self.report(offset + share * fraction.clamp(0.0, 1.0));
    }

    /// Emit the terminal 1.0
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.last = 1.0;
        if let Some(sink) = self.sink.as_mut() {
            sink(1.0);
        }
    }

    /// Last value reported
    #[must_use]
    pub const fn last(&self) -> f64 {
        self.last
    }
}
