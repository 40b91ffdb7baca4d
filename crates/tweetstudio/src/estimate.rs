//! Rough output size hints for the UI. Not used by the pipeline itself.

use crate::download::ExportFormat;

/// Largest GIF estimate reported
pub const GIF_ESTIMATE_CAP: u64 = 8 * 1024 * 1024;

/// Reference typing speed the GIF estimate assumes, in chars/sec
const REFERENCE_SPEED: f64 = 50.0;

/// Seconds of frames assumed when there is no text yet
const EMPTY_TEXT_SECONDS: u64 = 5;

/// Estimated size in bytes of an export
#[must_use]
pub fn estimate_file_size(
    width: u32,
    height: u32,
    format: ExportFormat,
    text_len: usize,
    fps: u32,
) -> u64 {
    let pixels = f64::from(width) * f64::from(height);
    match format {
        ExportFormat::Png => (pixels * 1.5).round() as u64,
        ExportFormat::Gif => {
            let frames = if text_len > 0 {
                (text_len as f64 / REFERENCE_SPEED * f64::from(fps)).ceil()
            } else {
                (u64::from(fps) * EMPTY_TEXT_SECONDS) as f64
            };
            ((frames * pixels * 0.25).round() as u64).min(GIF_ESTIMATE_CAP)
        }
    }
}

/// Human readable size: `512 B`, `1.5 KB`, `3.2 MB`
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    }
}

/// Seconds needed to type `text_len` characters at `speed` chars/sec
#[must_use]
pub fn animation_duration(text_len: usize, speed: f64) -> f64 {
    if speed <= 0.0 || !speed.is_finite() {
        return 0.0;
    }
    text_len as f64 / speed
}

/// Frames a constant-rate recording of the typing would need
#[must_use]
pub fn animation_frame_count(text_len: usize, speed: f64, fps: u32) -> u64 {
    (animation_duration(text_len, speed) * f64::from(fps)).ceil() as u64
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_png_estimate() {
        assert_eq!(estimate_file_size(1080, 1080, ExportFormat::Png, 0, 20), 1_749_600);
        assert_eq!(format_bytes(1_749_600), "1.7 MB");
    }

    #[test]
    fn test_gif_estimate_and_cap() {
        // 25 chars at 20 fps -> 10 frames
        assert_eq!(estimate_file_size(100, 100, ExportFormat::Gif, 25, 20), 25_000);
        // empty text assumes five seconds
        assert_eq!(estimate_file_size(100, 100, ExportFormat::Gif, 0, 20), 250_000);
        assert_eq!(
            estimate_file_size(1080, 1080, ExportFormat::Gif, 280, 20),
            GIF_ESTIMATE_CAP
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(GIF_ESTIMATE_CAP), "8.0 MB");
    }

    #[test]
    fn test_animation_helpers() {
        assert!((animation_duration(100, 50.0) - 2.0).abs() < f64::EPSILON);
        assert!(animation_duration(100, 0.0).abs() < f64::EPSILON);
        assert_eq!(animation_frame_count(100, 50.0, 20), 40);
        assert_eq!(animation_frame_count(5, 50.0, 20), 2);
        assert_eq!(animation_frame_count(0, 50.0, 20), 0);
    }
}
