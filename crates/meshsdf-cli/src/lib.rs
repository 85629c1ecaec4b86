//! Shared pieces of the `generate-sdf-from-mesh` and `inspect-sdf` binaries:
//! argument definitions, config merging and logging setup.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use meshsdf::{Config, ConvertOptions, InspectOptions};
use tracing_subscriber::EnvFilter;

/// Log verbosity accepted by `--loglevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    /// Errors only.
    #[value(name = "CRITICAL")]
    Critical,
    /// Errors only.
    #[value(name = "ERROR")]
    Error,
    /// Warnings and errors.
    #[value(name = "WARNING")]
    Warning,
    /// Progress messages.
    #[default]
    #[value(name = "INFO")]
    Info,
    /// Everything.
    #[value(name = "DEBUG")]
    Debug,
}

impl LogLevel {
    /// The equivalent `tracing` filter directive.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Critical | LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive())),
        )
        .with_target(false)
        .init();
}

/// Arguments of `generate-sdf-from-mesh`.
#[derive(Debug, Parser)]
#[command(name = "generate-sdf-from-mesh")]
#[command(about = "Convert a mesh into an SDF model with convex collision pieces", long_about = None)]
pub struct ConvertArgs {
    /// Input mesh (.obj or .stl)
    pub mesh_file: PathBuf,

    /// Show the mesh and its decomposition in the browser before writing
    #[arg(long)]
    pub preview: bool,

    /// Uniform scale applied to the mesh [default: 1.0]
    #[arg(long)]
    pub scale: Option<f64>,

    /// Density in kg/m^3 [default: 2000]
    #[arg(long)]
    pub density: Option<f64>,

    /// Write a decimated visual mesh and reference it instead of the input
    #[arg(long, alias = "do_visual_simplification")]
    pub do_visual_simplification: bool,

    /// Triangle budget for the decimated visual [default: 1000]
    #[arg(long, alias = "target_tris")]
    pub target_tris: Option<usize>,

    /// Voxel budget for the decomposition [default: 100000]
    #[arg(long)]
    pub resolution: Option<u32>,

    /// Maximum number of convex pieces [default: 12]
    #[arg(long)]
    pub maxhulls: Option<u32>,

    /// Minimum piece volume as a fraction of the convex hull [default: 0.001]
    #[arg(long, alias = "minVolumePerCH")]
    pub min_volume_per_ch: Option<f64>,

    /// Maximum vertices per convex piece [default: 12]
    #[arg(long, alias = "maxNumVerticesPerCH")]
    pub max_num_vertices_per_ch: Option<usize>,

    /// Log verbosity
    #[arg(long, value_enum, ignore_case = true, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// TOML file with default settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ConvertArgs {
    /// Overlay the flags that were given onto `options`.
    pub fn apply(&self, mut options: ConvertOptions) -> ConvertOptions {
        if let Some(scale) = self.scale {
            options.scale = scale;
        }
        if let Some(density) = self.density {
            options.density = density;
        }
        if self.do_visual_simplification {
            options.do_visual_simplification = true;
        }
        if let Some(target_tris) = self.target_tris {
            options.target_tris = target_tris;
        }
        let decomposition = &mut options.decomposition;
        if let Some(resolution) = self.resolution {
            decomposition.resolution = resolution;
        }
        if let Some(max_hulls) = self.maxhulls {
            decomposition.max_hulls = max_hulls;
        }
        if let Some(min_volume) = self.min_volume_per_ch {
            decomposition.min_hull_volume = min_volume;
        }
        if let Some(max_vertices) = self.max_num_vertices_per_ch {
            decomposition.max_vertices_per_hull = max_vertices;
        }
        options
    }

    /// The config file named by `--config`, or defaults.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        Ok(Config::load_or_default(self.config.as_deref())?)
    }
}

/// Arguments of `inspect-sdf`.
#[derive(Debug, Parser)]
#[command(name = "inspect-sdf")]
#[command(about = "Show an SDF model's visual and collision geometry in the browser", long_about = None)]
pub struct InspectArgs {
    /// SDF file to inspect
    pub sdf_file: PathBuf,

    /// Print the viewer URL without opening a browser
    #[arg(long)]
    pub noopen: bool,

    /// First port to try for the viewer [default: 7000]
    #[arg(long)]
    pub port: Option<u16>,

    /// Log verbosity
    #[arg(long, value_enum, ignore_case = true, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// TOML file with default settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl InspectArgs {
    /// Overlay the flags that were given onto `options`.
    pub fn apply(&self, mut options: InspectOptions) -> InspectOptions {
        if let Some(port) = self.port {
            options.viewer.port = port;
        }
        options
    }

    /// Settings from the config file, if any, with flags on top.
    pub fn options(&self) -> anyhow::Result<InspectOptions> {
        let config = Config::load_or_default(self.config.as_deref())?;
        Ok(self.apply(config.inspect))
    }
}
