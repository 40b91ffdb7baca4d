//! Tweetstudio CLI Library
//!
//! Command-line front end for the tweet card export pipeline.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
mod output;
mod runner;

pub use commands::{
    Cli, ColorArg, Commands, CompressionArg, EstimateArgs, FormatArg, GifArgs, PngArgs,
    SourceArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::Reporter;
pub use runner::{init_tracing, run_estimate, run_gif, run_png, run_presets};
