#![warn(missing_docs)]

//! SDF descriptors for meshsdf.
//!
//! A [`Descriptor`] holds one model made of rigid links, each with optional
//! inertia, visual geometry and collision geometry. [`to_string`] renders it
//! as an indented SDF 1.5 document and [`parse`] reads one back.
//!
//! # Example
//!
//! ```rust,no_run
//! let descriptor = meshsdf_sdf::load("mug.sdf").unwrap();
//! for link in &descriptor.model.links {
//!     println!("{}: {} collision elements", link.name, link.collisions.len());
//! }
//! ```

mod error;
mod format;
mod reader;
mod writer;

use std::fmt;
use std::path::{Path, PathBuf};

use nalgebra::{Matrix3, Vector3};

pub use error::{Result, SdfError};
pub use format::format_sci;
pub use reader::parse;
pub use writer::{to_string, write};

/// SDF version produced by the writer.
pub const SDF_VERSION: &str = "1.5";
/// Namespace bound to the `drake:` prefix.
pub const DRAKE_NAMESPACE: &str = "drake.mit.edu";

/// A parsed or generated `.sdf` document.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    /// Value of the root `version` attribute.
    pub version: String,
    /// The single model described.
    pub model: Model,
}

impl Descriptor {
    /// Descriptor with the default version.
    pub fn new(model: Model) -> Self {
        Self {
            version: SDF_VERSION.to_string(),
            model,
        }
    }
}

/// A named collection of links.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Model name.
    pub name: String,
    /// Rigid bodies of the model.
    pub links: Vec<Link>,
}

/// A rigid body.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Link name.
    pub name: String,
    /// Pose of the link in the model frame.
    pub pose: Pose,
    /// Mass properties, when declared.
    pub inertial: Option<Inertial>,
    /// Geometry drawn for illustration.
    pub visuals: Vec<Visual>,
    /// Geometry used for contact.
    pub collisions: Vec<Collision>,
}

impl Link {
    /// Link at the model origin with no geometry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pose: Pose::identity(),
            inertial: None,
            visuals: Vec::new(),
            collisions: Vec::new(),
        }
    }
}

/// Position and roll-pitch-yaw orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Translation.
    pub position: Vector3<f64>,
    /// Roll, pitch and yaw in radians.
    pub rpy: Vector3<f64>,
}

impl Pose {
    /// The zero pose.
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rpy: Vector3::zeros(),
        }
    }

    /// Rigid transform of this pose.
    pub fn isometry(&self) -> nalgebra::Isometry3<f64> {
        nalgebra::Isometry3::from_parts(
            nalgebra::Translation3::from(self.position),
            nalgebra::UnitQuaternion::from_euler_angles(self.rpy.x, self.rpy.y, self.rpy.z),
        )
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.position;
        let r = self.rpy;
        write!(f, "{} {} {} {} {} {}", p.x, p.y, p.z, r.x, r.y, r.z)
    }
}

/// Mass and rotational inertia of a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inertial {
    /// Mass in kg.
    pub mass: f64,
    /// Inertia tensor in kg m^2.
    pub inertia: Inertia,
}

/// Upper triangle of a symmetric inertia tensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[allow(missing_docs)]
pub struct Inertia {
    pub ixx: f64,
    pub ixy: f64,
    pub ixz: f64,
    pub iyy: f64,
    pub iyz: f64,
    pub izz: f64,
}

impl Inertia {
    /// Take the upper triangle of `m`; the lower triangle is ignored.
    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        Self {
            ixx: m[(0, 0)],
            ixy: m[(0, 1)],
            ixz: m[(0, 2)],
            iyy: m[(1, 1)],
            iyz: m[(1, 2)],
            izz: m[(2, 2)],
        }
    }

    /// Full symmetric matrix.
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.ixx, self.ixy, self.ixz, //
            self.ixy, self.iyy, self.iyz, //
            self.ixz, self.iyz, self.izz,
        )
    }

    /// Components in document order.
    pub fn components(&self) -> [(&'static str, f64); 6] {
        [
            ("ixx", self.ixx),
            ("ixy", self.ixy),
            ("ixz", self.ixz),
            ("iyy", self.iyy),
            ("iyz", self.iyz),
            ("izz", self.izz),
        ]
    }
}

/// Illustration geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Visual {
    /// Element name.
    pub name: String,
    /// Offset from the link frame.
    pub pose: Option<Pose>,
    /// Shape.
    pub geometry: Geometry,
}

/// Contact geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    /// Element name.
    pub name: String,
    /// Offset from the link frame.
    pub pose: Option<Pose>,
    /// Shape.
    pub geometry: Geometry,
}

/// Shapes an SDF geometry element can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// External mesh file.
    Mesh(MeshGeometry),
    /// Axis-aligned box with full side lengths.
    Box {
        /// Side lengths.
        size: Vector3<f64>,
    },
    /// Sphere.
    Sphere {
        /// Radius.
        radius: f64,
    },
    /// Cylinder along the local z axis.
    Cylinder {
        /// Radius.
        radius: f64,
        /// Length along z.
        length: f64,
    },
}

/// Reference to a mesh file.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGeometry {
    /// Mesh location, relative to the descriptor's directory unless absolute.
    pub uri: String,
    /// Per-axis scale applied when loading.
    pub scale: Option<Vector3<f64>>,
    /// Whether the mesh should be treated as its convex hull.
    pub declare_convex: bool,
}

impl MeshGeometry {
    /// Mesh reference without scale.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            scale: None,
            declare_convex: false,
        }
    }

    /// Resolve the URI to a local path.
    ///
    /// `file://` prefixes are stripped and relative paths are joined to
    /// `base_dir`. `model://` and `package://` URIs are not supported.
    pub fn resolve(&self, base_dir: &Path) -> Result<PathBuf> {
        resolve_uri(&self.uri, base_dir)
    }
}

fn resolve_uri(uri: &str, base_dir: &Path) -> Result<PathBuf> {
    let local = uri.strip_prefix("file://").unwrap_or(uri);
    if local.contains("://") {
        return Err(SdfError::UnsupportedUri(uri.to_string()));
    }
    let path = Path::new(local);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(base_dir.join(path))
    }
}

/// Read and parse a descriptor file.
pub fn load(path: impl AsRef<Path>) -> Result<Descriptor> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| SdfError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text)
}

/// Render and write a descriptor file.
pub fn save(path: impl AsRef<Path>, descriptor: &Descriptor) -> Result<()> {
    let path = path.as_ref();
    let text = to_string(descriptor)?;
    std::fs::write(path, text).map_err(|source| SdfError::Io {
        path: path.to_path_buf(),
        source,
    })
}
