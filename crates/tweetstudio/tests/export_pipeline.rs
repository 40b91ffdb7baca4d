//! End-to-end export tests against software and scripted surfaces.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{TimeZone, Utc};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tweetstudio::surface::SurfaceCall;
use tweetstudio::{
    AnimationOptions, Bitmap, BoxStyle, CardSurface, ExportConfig, ExportFormat, ExportOptions,
    Exporter, FakeClock, MemoryDownloader, MockSurface, StudioDocument, Watermark,
};

fn exporter() -> Exporter<MemoryDownloader, Arc<FakeClock>> {
    exporter_with(ExportConfig::default(), Arc::new(FakeClock::new()))
}

fn exporter_with(
    config: ExportConfig,
    clock: Arc<FakeClock>,
) -> Exporter<MemoryDownloader, Arc<FakeClock>> {
    Exporter::with_clock(config, MemoryDownloader::new(), clock)
        .unwrap()
        .with_timestamp(Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap())
}

fn document(text: &str) -> StudioDocument {
    let mut doc = StudioDocument::default();
    doc.tweet.content.text = text.to_string();
    doc.tweet.profile.display_name = "Ada".to_string();
    doc.tweet.profile.username = "ada".to_string();
    doc
}

struct DecodedGif {
    frames: usize,
    delays: Vec<u16>,
    palette_len: usize,
    size: (u16, u16),
}

fn decode_gif(bytes: &[u8]) -> DecodedGif {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(Cursor::new(bytes)).unwrap();
    let palette_len = decoder.global_palette().unwrap().len() / 3;
    let size = (decoder.width(), decoder.height());
    let mut delays = Vec::new();
    while let Some(frame) = decoder.read_next_frame().unwrap() {
        delays.push(frame.delay);
    }
    DecodedGif {
        frames: delays.len(),
        delays,
        palette_len,
        size,
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

mod still_export {
    use super::*;

    #[tokio::test]
    async fn card_surface_exports_at_requested_size_despite_preview_scale() {
        let exporter = exporter();
        let mut surface = CardSurface::new(document("Shipping it")).with_preview_scale(0.35);

        let receipt = exporter
            .export_as_image(Some(&mut surface), "ada", ExportOptions::new(1200, 627))
            .await
            .unwrap();

        assert_eq!(receipt.filename, "tweet-studio_ada_20250314150926.png");
        let delivered = &exporter.downloader().deliveries()[0];
        assert_eq!(delivered.output.format, ExportFormat::Png);
        assert_eq!(delivered.output.mime(), "image/png");
        let bitmap = Bitmap::from_png_bytes(&delivered.output.bytes).unwrap();
        assert_eq!(bitmap.dimensions(), (1200, 627));
        assert!(bitmap.is_opaque());

        assert_eq!(surface.style(), &BoxStyle::preview(0.35));
        assert_eq!(surface.text(), "Shipping it");
    }

    #[tokio::test]
    async fn translucent_surface_is_flattened() {
        let exporter = exporter();
        let mut surface = MockSurface::new("", 16, 16).with_alpha(0);
        exporter
            .export_as_image(Some(&mut surface), "", ExportOptions::new(16, 16))
            .await
            .unwrap();
        let delivered = &exporter.downloader().deliveries()[0];
        assert!(delivered.filename.starts_with("tweet-studio_tweet_"));
        let bitmap = Bitmap::from_png_bytes(&delivered.output.bytes).unwrap();
        assert!(bitmap.is_opaque());
        assert_eq!(bitmap.pixel(15, 15), [255, 255, 255, 255]);
    }

    #[tokio::test]
    async fn watermark_is_stamped_when_configured() {
        let config = ExportConfig::default().with_watermark(Some(Watermark::default()));
        let exporter = exporter_with(config, Arc::new(FakeClock::new()));
        let mut surface = MockSurface::new("", 360, 360).with_alpha(0);
        exporter
            .export_as_image(Some(&mut surface), "x", ExportOptions::new(360, 360))
            .await
            .unwrap();
        let bytes = &exporter.downloader().deliveries()[0].output.bytes;
        let bitmap = Bitmap::from_png_bytes(bytes).unwrap();
        let (x, y, _, _) = Watermark::default().plate_rect(360, 360);
        assert_ne!(bitmap.pixel(x, y), [255, 255, 255, 255]);
        assert_eq!(bitmap.pixel(0, 0), [255, 255, 255, 255]);
    }

    #[tokio::test]
    async fn missing_surface_is_a_validation_error() {
        let exporter = exporter();
        let err = exporter
            .export_as_image(None::<&mut CardSurface>, "ada", ExportOptions::new(1080, 1080))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(exporter.downloader().is_empty());
    }

    #[tokio::test]
    async fn detached_surface_is_a_capture_error() {
        let exporter = exporter();
        let mut surface = CardSurface::new(document("x"));
        surface.detach();
        let err = exporter
            .export_as_image(Some(&mut surface), "ada", ExportOptions::new(100, 100))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "capture");
        assert!(exporter.downloader().is_empty());
    }
}

mod animated_export {
    use super::*;

    #[tokio::test]
    async fn full_length_tweet_produces_twelve_frames() {
        let exporter = exporter();
        let text = "a".repeat(280);
        let mut surface = MockSurface::new("original", 1080, 1080).with_preview_scale(0.5);

        let receipt = exporter
            .export_as_animation(
                Some(&mut surface),
                "ada",
                AnimationOptions::new(text, ExportOptions::new(1080, 1080)).with_loop(true),
            )
            .await
            .unwrap();

        assert_eq!(receipt.frame_count, 12);
        assert_eq!(receipt.format, ExportFormat::Gif);
        let bytes = &exporter.downloader().deliveries()[0].output.bytes;
        let gif = decode_gif(bytes);
        assert_eq!(gif.frames, 12);
        assert_eq!(gif.size, (1080, 1080));
        assert!(gif.palette_len <= 256);
        assert!(contains(bytes, b"NETSCAPE2.0"));

        assert_eq!(surface.text, "original");
        assert_eq!(surface.style, BoxStyle::preview(0.5));
    }

    #[tokio::test]
    async fn delays_follow_typing_speed() {
        let exporter = exporter();
        let mut surface = MockSurface::new("", 20, 20);
        // 5 chars, 10 steps clamps to 5: one char per frame at 10 cps
        let options = AnimationOptions::new("Hello", ExportOptions::new(20, 20)).with_speed(10.0);

        exporter
            .export_as_animation(Some(&mut surface), "ada", options)
            .await
            .unwrap();

        let bytes = &exporter.downloader().deliveries()[0].output.bytes;
        let gif = decode_gif(bytes);
        assert_eq!(gif.frames, 7);
        assert_eq!(&gif.delays[..6], &[10, 10, 10, 10, 10, 10]);
        assert_eq!(gif.delays[6], 100);
        assert!(!contains(bytes, b"NETSCAPE2.0"));
        assert_eq!(
            surface.captured_texts(),
            vec!["|", "H|", "He|", "Hel|", "Hell|", "Hello", "Hello"]
        );
    }

    #[tokio::test]
    async fn frame_count_is_bounded_by_steps_and_length() {
        for (text, steps) in [("ab", 10), ("the quick brown fox", 3), ("x".repeat(100).as_str(), 10)] {
            let exporter = exporter();
            let mut surface = MockSurface::new("", 8, 8);
            let options = AnimationOptions::new(text, ExportOptions::new(8, 8))
                .with_step_count(steps)
                .with_cursor(false);
            let receipt = exporter
                .export_as_animation(Some(&mut surface), "x", options)
                .await
                .unwrap();
            let len = text.chars().count();
            assert!(receipt.frame_count >= 2);
            assert!(receipt.frame_count <= steps.min(len) + 2);
        }
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_ends_at_one() {
        let exporter = exporter();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut surface = CardSurface::new(document("draft"));
        let options = AnimationOptions::new("Typing this out", ExportOptions::new(200, 200))
            .with_progress(move |v| sink.lock().unwrap().push(v));

        exporter
            .export_as_animation(Some(&mut surface), "ada", options)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[1] >= w[0]));
        assert!(seen.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(seen.iter().filter(|v| **v == 1.0).count(), 1);
        assert_eq!(seen.last().copied(), Some(1.0));
        assert_eq!(surface.text(), "draft");
    }

    #[tokio::test]
    async fn capture_failure_restores_text_and_delivers_nothing() {
        let exporter = exporter();
        let mut surface = MockSurface::new("keep me", 8, 8).fail_capture_at(2);
        let err = exporter
            .export_as_animation(
                Some(&mut surface),
                "x",
                AnimationOptions::new("some text", ExportOptions::new(8, 8)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "capture");
        assert_eq!(surface.text, "keep me");
        assert!(exporter.downloader().is_empty());
    }

    #[tokio::test]
    async fn budget_exhausted_during_encoding_times_out() {
        let clock = Arc::new(FakeClock::new());
        let exporter = exporter_with(ExportConfig::default(), Arc::clone(&clock));
        let mut surface = MockSurface::new("untouched", 16, 16);
        let ticker = Arc::clone(&clock);
        let options = AnimationOptions::new("A slow export", ExportOptions::new(16, 16))
            .with_progress(move |v| {
                if v > 0.8 {
                    ticker.advance(Duration::from_secs(30));
                }
            });

        let err = exporter
            .export_as_animation(Some(&mut surface), "x", options)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().contains("smaller export resolution"));
        assert_eq!(surface.text, "untouched");
        assert!(exporter.downloader().is_empty());
    }

    #[tokio::test]
    async fn budget_exhausted_during_capture_times_out() {
        let clock = Arc::new(FakeClock::ticking(3_000));
        let exporter = exporter_with(ExportConfig::default(), clock);
        let mut surface = MockSurface::new("untouched", 8, 8);
        let err = exporter
            .export_as_animation(
                Some(&mut surface),
                "x",
                AnimationOptions::new("x".repeat(200), ExportOptions::new(8, 8))
                    .with_step_count(50),
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(surface.text, "untouched");
        assert!(surface.capture_count() < 50);
    }

    #[tokio::test]
    async fn validation_failures_report_no_progress() {
        let exporter = exporter();
        let calls = Arc::new(Mutex::new(0usize));

        for options in [
            AnimationOptions::new("", ExportOptions::new(8, 8)),
            AnimationOptions::new("hi", ExportOptions::new(0, 8)),
            AnimationOptions::new("hi", ExportOptions::new(8, 8)).with_speed(-1.0),
        ] {
            let sink = Arc::clone(&calls);
            let mut surface = MockSurface::new("", 8, 8);
            let options = options.with_progress(move |_| *sink.lock().unwrap() += 1);
            let err = exporter
                .export_as_animation(Some(&mut surface), "x", options)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "validation");
            assert!(!surface.was_called(&SurfaceCall::WriteText(String::new())));
        }

        let err = exporter
            .export_as_animation(
                None::<&mut MockSurface>,
                "x",
                AnimationOptions::new("hi", ExportOptions::new(8, 8)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        assert_eq!(*calls.lock().unwrap(), 0);
        assert!(exporter.downloader().is_empty());
    }

    #[tokio::test]
    async fn concurrent_exports_of_different_surfaces() {
        let exporter = exporter();
        let mut first = MockSurface::new("one", 12, 12);
        let mut second = CardSurface::new(document("two"));

        let (a, b) = tokio::join!(
            exporter.export_as_animation(
                Some(&mut first),
                "first",
                AnimationOptions::new("first card", ExportOptions::new(12, 12)),
            ),
            exporter.export_as_image(Some(&mut second), "second", ExportOptions::new(64, 64)),
        );

        assert_eq!(a.unwrap().format, ExportFormat::Gif);
        assert_eq!(b.unwrap().format, ExportFormat::Png);
        assert_eq!(exporter.downloader().len(), 2);
        assert_eq!(first.text, "one");
        assert_eq!(second.text(), "two");
    }
}
