//! Show an SDF model in the browser until "Stop Simulation" is pressed.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use meshsdf::inspect;
use meshsdf_cli::{init_logging, InspectArgs};
use tracing::{error, info, warn};

fn main() -> Result<ExitCode> {
    let args = InspectArgs::parse();
    init_logging(args.loglevel);

    if !args.sdf_file.exists() {
        error!("no SDF found at {}", args.sdf_file.display());
        return Ok(ExitCode::FAILURE);
    }

    let options = args.options()?;
    inspect(&args.sdf_file, &options, |url| {
        println!("{url}");
        if args.noopen {
            return;
        }
        if let Err(e) = open::that(url) {
            warn!("could not open a browser: {e}");
        }
    })?;
    info!("inspection finished");
    Ok(ExitCode::SUCCESS)
}
