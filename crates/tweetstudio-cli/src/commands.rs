//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tweetstudio: export tweet cards as PNG stills and typewriter GIFs
#[derive(Parser, Debug)]
#[command(name = "tweetstudio")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export a still PNG
    Png(PngArgs),

    /// Export a typewriter GIF
    Gif(GifArgs),

    /// Estimate the output file size
    Estimate(EstimateArgs),

    /// List export presets
    Presets,
}

/// Where the card comes from and how large the output is
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Design file (.yaml, .yml or .json)
    #[cfg_attr(feature = "browser", arg(short, long, required_unless_present = "url"))]
    #[cfg_attr(not(feature = "browser"), arg(short, long, required = true))]
    pub design: Option<PathBuf>,

    /// Live page hosting the card
    #[cfg(feature = "browser")]
    #[arg(long, conflicts_with = "design")]
    pub url: Option<String>,

    /// Selector of the card element on the live page
    #[cfg(feature = "browser")]
    #[arg(long, requires = "url", default_value = "[data-export-root]")]
    pub selector: String,

    /// Named export size (instagram, story, linkedin, twitter)
    #[arg(short, long, conflicts_with_all = ["width", "height"])]
    pub preset: Option<String>,

    /// Output width in pixels
    #[arg(long, requires = "height")]
    pub width: Option<u32>,

    /// Output height in pixels
    #[arg(long, requires = "width")]
    pub height: Option<u32>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    /// Base filename component (defaults to the author's username)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Preview scale the card is shown at before export
    #[arg(long, default_value = "1.0")]
    pub preview_scale: f64,
}

/// Arguments for the png command
#[derive(Args, Debug, Clone)]
pub struct PngArgs {
    /// Card source and size
    #[command(flatten)]
    pub source: SourceArgs,

    /// Stamp the postloom.com watermark
    #[arg(long)]
    pub watermark: bool,

    /// PNG compression
    #[arg(long, default_value = "default")]
    pub compression: CompressionArg,
}

/// Arguments for the gif command
#[derive(Args, Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct GifArgs {
    /// Card source and size
    #[command(flatten)]
    pub source: SourceArgs,

    /// Characters revealed per second (defaults to the design's speed)
    #[arg(long)]
    pub speed: Option<f64>,

    /// Nominal frame rate (defaults to the design's fps)
    #[arg(long)]
    pub fps: Option<u32>,

    /// Loop forever (overrides the design)
    #[arg(long = "loop", overrides_with = "no_loop")]
    pub looped: bool,

    /// Play once (overrides the design)
    #[arg(long, overrides_with = "looped")]
    pub no_loop: bool,

    /// Number of typewriter steps
    #[arg(long, default_value = "10")]
    pub steps: usize,

    /// Hide the caret while typing (overrides the design)
    #[arg(long, overrides_with = "cursor")]
    pub no_cursor: bool,

    /// Show the caret while typing (overrides the design)
    #[arg(long, overrides_with = "no_cursor")]
    pub cursor: bool,

    /// Wall-clock budget in seconds
    #[arg(long, default_value = "20")]
    pub budget_secs: u64,

    /// Text to type (defaults to the design's tweet text)
    #[arg(long)]
    pub text: Option<String>,
}

/// Arguments for the estimate command
#[derive(Args, Debug, Clone)]
pub struct EstimateArgs {
    /// Output width in pixels
    #[arg(long, default_value = "1080")]
    pub width: u32,

    /// Output height in pixels
    #[arg(long, default_value = "1080")]
    pub height: u32,

    /// Output format
    #[arg(short, long, default_value = "png")]
    pub format: FormatArg,

    /// Tweet text length in characters
    #[arg(long, default_value = "0")]
    pub text_length: usize,

    /// Nominal frame rate
    #[arg(long, default_value = "20")]
    pub fps: u32,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Still PNG
    #[default]
    Png,
    /// Animated GIF
    Gif,
}

impl From<FormatArg> for tweetstudio::ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => Self::Png,
            FormatArg::Gif => Self::Gif,
        }
    }
}

/// PNG compression argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompressionArg {
    /// Fast compression, larger files
    Fast,
    /// Default compression
    #[default]
    Default,
    /// Best compression
    Best,
}

impl From<CompressionArg> for tweetstudio::CompressionLevel {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::Fast => Self::Fast,
            CompressionArg::Default => Self::Default,
            CompressionArg::Best => Self::Best,
        }
    }
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_png_command() {
            let cli = Cli::parse_from(["tweetstudio", "png", "--design", "card.yaml"]);
            if let Commands::Png(args) = cli.command {
                assert_eq!(args.source.design, Some(PathBuf::from("card.yaml")));
                assert_eq!(args.source.out, PathBuf::from("."));
                assert!(!args.watermark);
                assert_eq!(args.compression, CompressionArg::Default);
            } else {
                panic!("expected Png command");
            }
        }

        #[test]
        fn test_parse_png_with_size() {
            let cli = Cli::parse_from([
                "tweetstudio", "png", "-d", "card.yaml", "--width", "1200", "--height", "627",
            ]);
            if let Commands::Png(args) = cli.command {
                assert_eq!(args.source.width, Some(1200));
                assert_eq!(args.source.height, Some(627));
            } else {
                panic!("expected Png command");
            }
        }

        #[test]
        fn test_width_requires_height() {
            let result =
                Cli::try_parse_from(["tweetstudio", "png", "-d", "card.yaml", "--width", "100"]);
            assert!(result.is_err());
        }

        #[test]
        fn test_preset_conflicts_with_size() {
            let result = Cli::try_parse_from([
                "tweetstudio", "png", "-d", "c.yaml", "--preset", "story", "--width", "1",
                "--height", "1",
            ]);
            assert!(result.is_err());
        }

        #[test]
        fn test_parse_gif_command() {
            let cli = Cli::parse_from([
                "tweetstudio", "gif", "-d", "card.json", "--loop", "--steps", "6", "--no-cursor",
                "--speed", "25",
            ]);
            if let Commands::Gif(args) = cli.command {
                assert!(args.looped);
                assert!(args.no_cursor);
                assert_eq!(args.steps, 6);
                assert_eq!(args.speed, Some(25.0));
                assert_eq!(args.budget_secs, 20);
            } else {
                panic!("expected Gif command");
            }
        }

        #[test]
        fn test_parse_gif_negated_flags_last_wins() {
            let cli = Cli::parse_from([
                "tweetstudio", "gif", "-d", "card.json", "--loop", "--no-loop", "--no-cursor",
                "--cursor",
            ]);
            if let Commands::Gif(args) = cli.command {
                assert!(!args.looped);
                assert!(args.no_loop);
                assert!(!args.no_cursor);
                assert!(args.cursor);
            } else {
                panic!("expected Gif command");
            }
        }

        #[test]
        fn test_parse_estimate_command() {
            let cli = Cli::parse_from([
                "tweetstudio", "estimate", "--format", "gif", "--text-length", "120",
            ]);
            if let Commands::Estimate(args) = cli.command {
                assert_eq!(args.format, FormatArg::Gif);
                assert_eq!(args.text_length, 120);
                assert_eq!((args.width, args.height), (1080, 1080));
            } else {
                panic!("expected Estimate command");
            }
        }

        #[test]
        fn test_global_flags() {
            let cli = Cli::parse_from(["tweetstudio", "-vv", "--color", "never", "presets"]);
            assert_eq!(cli.verbose, 2);
            assert!(matches!(cli.color, ColorArg::Never));
            assert!(matches!(cli.command, Commands::Presets));
        }

        #[cfg(not(feature = "browser"))]
        #[test]
        fn test_design_required() {
            assert!(Cli::try_parse_from(["tweetstudio", "png"]).is_err());
        }
    }

    mod conversion_tests {
        use super::*;
        use crate::config::ColorChoice;

        #[test]
        fn test_color_arg_conversion() {
            assert_eq!(ColorChoice::from(ColorArg::Auto), ColorChoice::Auto);
            assert_eq!(ColorChoice::from(ColorArg::Always), ColorChoice::Always);
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
        }

        #[test]
        fn test_format_arg_conversion() {
            assert_eq!(
                tweetstudio::ExportFormat::from(FormatArg::Gif),
                tweetstudio::ExportFormat::Gif
            );
        }

        #[test]
        fn test_compression_arg_conversion() {
            assert_eq!(
                tweetstudio::CompressionLevel::from(CompressionArg::Best),
                tweetstudio::CompressionLevel::Best
            );
        }
    }
}
