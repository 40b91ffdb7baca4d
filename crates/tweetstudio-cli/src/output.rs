//! Terminal output and export progress

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tweetstudio::ExportReceipt;

/// Resolution of the progress bar
const PROGRESS_TICKS: u64 = 1000;

/// Terminal reporter for export commands
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start the export progress bar and return the callback that drives it
    pub fn start_progress(&mut self, message: &str) -> impl FnMut(f64) + Send + 'static {
        let pb = if self.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(PROGRESS_TICKS)
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        self.progress_bar = Some(pb.clone());
        move |value: f64| pb.set_position(ticks(value))
    }

    /// Finish the progress bar
    pub fn finish_progress(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    /// Abandon the progress bar after a failure
    pub fn abandon_progress(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.abandon();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // failures print even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "ERROR".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an informational line
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line(message);
    }

    /// Summarize a finished export
    pub fn receipt(&self, receipt: &ExportReceipt) {
        let name = if self.use_color {
            style(&receipt.filename).cyan().bold().to_string()
        } else {
            receipt.filename.clone()
        };
        self.success(&format!(
            "{name} ({}x{}, {} frame{}, {}) in {:.1}s",
            receipt.size.width,
            receipt.size.height,
            receipt.frame_count,
            if receipt.frame_count == 1 { "" } else { "s" },
            tweetstudio::format_bytes(receipt.byte_len as u64),
            receipt.elapsed.as_secs_f64()
        ));
    }
}

fn ticks(value: f64) -> u64 {
    (value.clamp(0.0, 1.0) * PROGRESS_TICKS as f64).round() as u64
}
