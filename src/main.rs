//! routewalk - command-line front end.
//!
//! # Usage
//!
//! ```bash
//! routewalk [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! Dump the service model of a crate as YAML:
//! ```bash
//! routewalk ./my-service -o model.yaml
//! ```
//!
//! Two-phase run: discover routes first, expand the named types later:
//! ```bash
//! routewalk ./my-service --defer -f json -o partial.json
//! routewalk ./my-service --resume partial.json -o model.yaml
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use routewalk::cli;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("routewalk starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("Service model written successfully");

    Ok(())
}
