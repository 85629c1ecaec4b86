#![warn(missing_docs)]

//! Turn triangle meshes into SDF model descriptors and inspect the result.
//!
//! Two workflows live here:
//!
//! - **Convert.** [`create_sdf_with_convex_decomp`] loads a mesh, computes its
//!   mass properties, splits it into convex collision pieces and writes an
//!   SDF file next to the input.
//! - **Inspect.** [`inspect`] loads an SDF file into a physics world with every
//!   body welded in place and shows visual and collision geometry in a
//!   browser until the "Stop Simulation" button is pressed.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use meshsdf::{create_sdf_with_convex_decomp, ConvertOptions};
//!
//! let options = ConvertOptions {
//!     scale: 0.001,
//!     ..Default::default()
//! };
//! let report = create_sdf_with_convex_decomp(Path::new("mug.obj"), &options).unwrap();
//! println!("wrote {}", report.sdf_path.display());
//! ```

mod config;
mod convert;
mod error;
mod inspect;
mod preview;

pub use config::Config;
pub use convert::{
    create_sdf_with, create_sdf_with_convex_decomp, simplify_visual_mesh, ConvertOptions,
    ConvertReport,
};
pub use error::{ConfigError, ConvertError, InspectError};
pub use inspect::{inspect, InspectOptions, Inspector, VisualizerParams, STOP_BUTTON};
pub use preview::{piece_color, NoPreview, Preview, ViewerPreview, PROCEED_BUTTON};

pub use meshsdf_collision::{
    ConvexDecomposer, Decomposition, DecompositionError, DecompositionParams, InertialProperties,
    VhacdDecomposer,
};
pub use meshsdf_mesh::TriangleMesh;
pub use meshsdf_viewer::ViewerConfig;
