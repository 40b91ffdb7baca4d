//! Tweetstudio CLI: export tweet cards from the command line
//!
//! ## Usage
//!
//! ```bash
//! tweetstudio png --design card.yaml --preset story --out exports/
//! tweetstudio gif --design card.yaml --loop --steps 12
//! tweetstudio estimate --format gif --text-length 140
//! tweetstudio presets
//! ```

use clap::Parser;
use std::process::ExitCode;
use tweetstudio_cli::{
    init_tracing, run_estimate, run_gif, run_png, run_presets, Cli, CliConfig, CliResult,
    ColorChoice, Commands, Verbosity,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(&config);

    match cli.command {
        Commands::Png(args) => run_png(&config, &args),
        Commands::Gif(args) => run_gif(&config, &args),
        Commands::Estimate(args) => run_estimate(&config, &args),
        Commands::Presets => {
            run_presets(&config);
            Ok(())
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new().with_verbosity(verbosity).with_color(color)
}
