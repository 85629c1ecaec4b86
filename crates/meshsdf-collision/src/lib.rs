#![warn(missing_docs)]

//! Collision geometry and mass properties for meshsdf.
//!
//! - [`VhacdDecomposer`] splits a mesh into convex pieces with parry's V-HACD.
//! - [`compute_inertia`] integrates mass and the inertia tensor of a closed
//!   mesh under uniform density.
//!
//! # Example
//!
//! ```ignore
//! use meshsdf_collision::{compute_inertia, Decomposition, DecompositionParams, VhacdDecomposer};
//!
//! let decomposer = VhacdDecomposer::new(DecompositionParams::default());
//! match Decomposition::run(&decomposer, &mesh) {
//!     Decomposition::Pieces(pieces) => println!("{} pieces", pieces.len()),
//!     Decomposition::Failed(e) => println!("no collision geometry: {e}"),
//! }
//! let props = compute_inertia(&mesh, 2000.0);
//! ```

mod decompose;
mod error;
mod hull;
mod inertia;

pub use decompose::{
    ConvexDecomposer, Decomposition, DecompositionParams, PrincipalFrame, VhacdDecomposer,
};
pub use error::DecompositionError;
pub use hull::{convex_hull_mesh, reduce_hull_vertices};
pub use inertia::{compute_inertia, InertialProperties};
