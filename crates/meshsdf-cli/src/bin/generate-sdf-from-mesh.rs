//! Convert a mesh into an SDF model with convex collision pieces.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use meshsdf::{create_sdf_with, ConvertReport, NoPreview, Preview, VhacdDecomposer, ViewerPreview};
use meshsdf_cli::{init_logging, ConvertArgs};
use tracing::{error, info, warn};

fn main() -> Result<ExitCode> {
    let args = ConvertArgs::parse();
    init_logging(args.loglevel);

    if !args.mesh_file.exists() {
        error!("no mesh found at {}", args.mesh_file.display());
        return Ok(ExitCode::FAILURE);
    }

    let config = args.load_config()?;
    let options = args.apply(config.convert);
    let decomposer = VhacdDecomposer::new(options.decomposition.clone());
    let mut preview: Box<dyn Preview> = if args.preview {
        let preview = ViewerPreview::start(&config.inspect.viewer)?;
        let url = preview.web_url();
        info!("preview at {url}");
        if let Err(e) = open::that(&url) {
            warn!("could not open a browser: {e}");
        }
        Box::new(preview)
    } else {
        Box::new(NoPreview)
    };

    let report = create_sdf_with(&args.mesh_file, &options, &decomposer, preview.as_mut())?;
    summarize(&report);
    Ok(ExitCode::SUCCESS)
}

fn summarize(report: &ConvertReport) {
    if report.decomposition_failed {
        warn!("{} written without collision geometry", report.sdf_path.display());
    }
    info!(
        mass = report.inertial.mass,
        pieces = report.piece_paths.len(),
        "done: {}",
        report.sdf_path.display()
    );
}
