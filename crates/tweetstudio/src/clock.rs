//! Time sources for the export budget.
//!
//! Production exports read a monotonic [`SystemClock`]; tests install a
//! [`FakeClock`] and move it forward by hand so timeouts are deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic time source
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Wall-clock time measured from construction
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually driven clock for deterministic tests
#[derive(Debug, Default)]
pub struct FakeClock {
    current_ms: AtomicU64,
    /// Added to the clock on every read
    tick_ms: AtomicU64,
}

impl FakeClock {
    /// Create a paused clock at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock that advances by `tick_ms` each time it is read
    #[must_use]
    pub fn ticking(tick_ms: u64) -> Self {
        Self {
            current_ms: AtomicU64::new(0),
            tick_ms: AtomicU64::new(tick_ms),
        }
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        self.current_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute time
    pub fn set(&self, time: Duration) {
        self.current_ms
            .store(time.as_millis() as u64, Ordering::SeqCst);
    }

    /// Current time without ticking
    #[must_use]
    pub fn peek(&self) -> Duration {
        Duration::from_millis(self.current_ms.load(Ordering::SeqCst))
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        let tick = self.tick_ms.load(Ordering::SeqCst);
        let before = self.current_ms.fetch_add(tick, Ordering::SeqCst);
        Duration::from_millis(before)
    }
}

/// A wall-clock budget measured against a [`Clock`]
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Duration,
    budget: Duration,
}

impl Deadline {
    /// Start a budget now
    pub fn start(clock: &dyn Clock, budget: Duration) -> Self {
        Self {
            started: clock.now(),
            budget,
        }
    }

    /// Time spent since the budget started
    pub fn elapsed(&self, clock: &dyn Clock) -> Duration {
        clock.now().saturating_sub(self.started)
    }

    /// The configured budget
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Fail with a timeout once the budget is spent
    pub fn check(&self, clock: &dyn Clock) -> crate::ExportResult<()> {
        let elapsed = self.elapsed(clock);
        if elapsed > self.budget {
            return Err(crate::ExportError::Timeout {
                elapsed_ms: elapsed.as_millis() as u64,
                budget_ms: self.budget.as_millis() as u64,
            });
        }
        Ok(())
    }
}
