//! Command execution

use crate::commands::{EstimateArgs, GifArgs, PngArgs, SourceArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
#[cfg(feature = "browser")]
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tweetstudio::{
    estimate_file_size, format_bytes, AnimationOptions, CardSurface, DirectoryDownloader,
    ExportConfig, ExportFormat, ExportOptions, ExportPreset, ExportReceipt, Exporter,
    StudioDocument, Watermark,
};

/// Install the stderr `tracing` subscriber.
///
/// `RUST_LOG` wins over the verbosity flags when set.
pub fn init_tracing(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.color.should_color())
        .with_target(false)
        .try_init();
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::runtime(e.to_string()))
}

fn reporter(config: &CliConfig) -> Reporter {
    Reporter::new(config.color.should_color(), config.verbosity.is_quiet())
}

fn announce(
    config: &CliConfig,
    reporter: &Reporter,
    kind: &str,
    source: &ResolvedSource,
    out: &Path,
) {
    if config.verbosity.is_verbose() {
        reporter.info(&format!(
            "Exporting {kind} {}x{} to {}",
            source.size.width,
            source.size.height,
            out.display()
        ));
    }
}

/// Design file, output size and base name resolved from the source arguments
#[derive(Debug)]
struct ResolvedSource {
    document: Option<StudioDocument>,
    size: ExportOptions,
    base_name: String,
}

fn resolve_source(args: &SourceArgs) -> CliResult<ResolvedSource> {
    if !(args.preview_scale.is_finite() && args.preview_scale > 0.0) {
        return Err(CliError::invalid_argument(format!(
            "--preview-scale must be positive, got {}",
            args.preview_scale
        )));
    }

    let document = args
        .design
        .as_deref()
        .map(StudioDocument::load)
        .transpose()?;

    let size = match (args.preset.as_deref(), args.width, args.height) {
        (Some(name), _, _) => {
            let (w, h) = ExportPreset::from_name(name)?.size();
            ExportOptions::new(w, h)
        }
        (None, Some(w), Some(h)) => ExportOptions::new(w, h),
        _ => document.as_ref().map_or_else(
            || {
                let (w, h) = ExportPreset::default().size();
                ExportOptions::new(w, h)
            },
            |doc| ExportOptions::new(doc.design.export_width, doc.design.export_height),
        ),
    };

    let base_name = args.name.clone().unwrap_or_else(|| {
        document
            .as_ref()
            .map(|doc| doc.tweet.profile.username.clone())
            .unwrap_or_default()
    });

    Ok(ResolvedSource {
        document,
        size,
        base_name,
    })
}

fn card_surface(document: StudioDocument, args: &SourceArgs) -> CardSurface {
    let root = args
        .design
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));
    let surface = CardSurface::new(document).with_asset_root(root);
    if (args.preview_scale - 1.0).abs() > f64::EPSILON {
        surface.with_preview_scale(args.preview_scale)
    } else {
        surface
    }
}

#[cfg(feature = "browser")]
async fn browser_surface(url: &str, args: &SourceArgs) -> CliResult<tweetstudio::BrowserSurface> {
    let config = tweetstudio::BrowserSurfaceConfig::new(url)
        .with_root_selector(args.selector.clone())
        .with_no_sandbox();
    Ok(tweetstudio::BrowserSurface::launch(config).await?)
}

/// Export a still PNG
pub fn run_png(config: &CliConfig, args: &PngArgs) -> CliResult<()> {
    let source = resolve_source(&args.source)?;
    let export_config = ExportConfig::default()
        .with_compression(args.compression.into())
        .with_watermark(args.watermark.then(Watermark::default));
    let exporter = Exporter::new(export_config, DirectoryDownloader::new(&args.source.out))?;
    let reporter = reporter(config);
    debug!(size = ?source.size, base_name = %source.base_name, "png export");
    announce(config, &reporter, "PNG", &source, &args.source.out);

    let receipt = runtime()?.block_on(async {
        #[cfg(feature = "browser")]
        if let Some(url) = args.source.url.as_deref() {
            let mut surface = browser_surface(url, &args.source).await?;
            let result = exporter
                .export_as_image(Some(&mut surface), &source.base_name, source.size)
                .await;
            if let Err(e) = surface.close().await {
                warn!(error = %e, "failed to close browser");
            }
            return Ok::<_, CliError>(result?);
        }

        let document = source
            .document
            .clone()
            .ok_or_else(|| CliError::invalid_argument("--design is required"))?;
        let mut surface = card_surface(document, &args.source);
        Ok::<_, CliError>(
            exporter
                .export_as_image(Some(&mut surface), &source.base_name, source.size)
                .await?,
        )
    });

    finish(&reporter, receipt)
}

/// Export a typewriter GIF
pub fn run_gif(config: &CliConfig, args: &GifArgs) -> CliResult<()> {
    if args.steps == 0 {
        return Err(CliError::invalid_argument("--steps must be at least 1"));
    }
    let source = resolve_source(&args.source)?;
    let export_config = ExportConfig::default()
        .with_step_count(args.steps)
        .with_budget(Duration::from_secs(args.budget_secs));
    let exporter = Exporter::new(export_config, DirectoryDownloader::new(&args.source.out))?;
    let mut reporter = reporter(config);
    announce(config, &reporter, "GIF", &source, &args.source.out);
    let design = source
        .document
        .as_ref()
        .map(|doc| doc.design.clone())
        .unwrap_or_default();

    let receipt = runtime()?.block_on(async {
        #[cfg(feature = "browser")]
        if let Some(url) = args.source.url.as_deref() {
            let mut surface = browser_surface(url, &args.source).await?;
            let text = match args.text.clone() {
                Some(text) => text,
                None => read_surface_text(&mut surface).await?,
            };
            let options = animation_options(&design, text, source.size, args)
                .with_progress(reporter.start_progress("typing"));
            let result = exporter
                .export_as_animation(Some(&mut surface), &source.base_name, options)
                .await;
            if let Err(e) = surface.close().await {
                warn!(error = %e, "failed to close browser");
            }
            return Ok::<_, CliError>(result?);
        }

        let document = source
            .document
            .clone()
            .ok_or_else(|| CliError::invalid_argument("--design is required"))?;
        let text = args
            .text
            .clone()
            .unwrap_or_else(|| document.tweet.content.text.clone());
        let mut surface = card_surface(document, &args.source);
        let options = animation_options(&design, text, source.size, args)
            .with_progress(reporter.start_progress("typing"));
        Ok::<_, CliError>(
            exporter
                .export_as_animation(Some(&mut surface), &source.base_name, options)
                .await?,
        )
    });

    finish(&reporter, receipt)
}

fn animation_options(
    design: &tweetstudio::DesignState,
    text: String,
    size: ExportOptions,
    args: &GifArgs,
) -> AnimationOptions {
    let mut options = AnimationOptions::from_design(design, text);
    options.size = size;
    if let Some(looped) = flag_pair(args.looped, args.no_loop) {
        options.looped = looped;
    }
    if let Some(show) = flag_pair(args.cursor, args.no_cursor) {
        options.show_cursor = show;
    }
    if let Some(speed) = args.speed {
        options.speed = speed;
    }
    if let Some(fps) = args.fps {
        options.fps = fps;
    }
    options
}

/// `--x` / `--no-x` pair; `None` leaves the design's value
const fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

#[cfg(feature = "browser")]
async fn read_surface_text<S: tweetstudio::RenderSurface>(surface: &mut S) -> CliResult<String> {
    let target = surface
        .find_text_target()
        .await?
        .ok_or_else(|| CliError::invalid_argument("Page has no text node to animate"))?;
    Ok(surface.read_text(&target).await?)
}

fn finish(reporter: &Reporter, receipt: CliResult<ExportReceipt>) -> CliResult<()> {
    match receipt {
        Ok(receipt) => {
            reporter.finish_progress();
            info!(filename = %receipt.filename, bytes = receipt.byte_len, "exported");
            reporter.receipt(&receipt);
            Ok(())
        }
        Err(e) => {
            reporter.abandon_progress();
            if let CliError::Export(ref inner) = e {
                reporter.failure(&format!("{} error", inner.kind()));
            }
            Err(e)
        }
    }
}

/// Print the estimated output size
pub fn run_estimate(config: &CliConfig, args: &EstimateArgs) -> CliResult<()> {
    let format: ExportFormat = args.format.into();
    let bytes = estimate_file_size(args.width, args.height, format, args.text_length, args.fps);
    if args.json {
        let value = serde_json::json!({
            "width": args.width,
            "height": args.height,
            "format": format,
            "text_length": args.text_length,
            "fps": args.fps,
            "bytes": bytes,
            "display": format_bytes(bytes),
        });
        println!("{value}");
    } else if config.verbosity.is_quiet() {
        println!("{bytes}");
    } else {
        println!(
            "{}x{} {format}: ~{}",
            args.width,
            args.height,
            format_bytes(bytes)
        );
    }
    Ok(())
}

/// List export presets
pub fn run_presets(_config: &CliConfig) {
    for preset in ExportPreset::ALL {
        let (w, h) = preset.size();
        let name = serde_json::to_value(preset)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        println!("{name:<10} {w:>5} x {h:<5} {}", preset.label());
    }
}
