//! Mesh to SDF conversion.

use std::path::{Path, PathBuf};

use meshsdf_collision::{
    compute_inertia, ConvexDecomposer, Decomposition, DecompositionParams, InertialProperties,
    VhacdDecomposer,
};
use meshsdf_decimate::decimate_mesh;
use meshsdf_mesh::{load_mesh, save_mesh};
use meshsdf_sdf::{
    Collision, Descriptor, Geometry, Inertia, Inertial, Link, MeshGeometry, Model, Visual,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConvertError;
use crate::preview::{NoPreview, Preview};

/// Settings for [`create_sdf_with_convex_decomp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Uniform scale applied to the mesh before anything is computed.
    pub scale: f64,
    /// Density in kg/m^3 used for the inertia calculation.
    pub density: f64,
    /// Write a decimated copy of the mesh and use it as the visual.
    pub do_visual_simplification: bool,
    /// Triangle budget for the decimated visual.
    pub target_tris: usize,
    /// Convex decomposition settings.
    pub decomposition: DecompositionParams,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            density: 2000.0,
            do_visual_simplification: false,
            target_tris: 1000,
            decomposition: DecompositionParams::default(),
        }
    }
}

/// What a conversion produced.
#[derive(Debug, Clone)]
pub struct ConvertReport {
    /// The written descriptor.
    pub sdf_path: PathBuf,
    /// Mesh referenced by the visual element.
    pub visual_path: PathBuf,
    /// Directory holding the collision pieces.
    pub parts_dir: PathBuf,
    /// One file per `<collision>` element, in order.
    pub piece_paths: Vec<PathBuf>,
    /// Mass properties of the scaled mesh.
    pub inertial: InertialProperties,
    /// Whether convex decomposition failed.
    pub decomposition_failed: bool,
}

/// Where the outputs for one input mesh go.
struct OutputLayout {
    dir: PathBuf,
    stem: String,
}

impl OutputLayout {
    fn for_input(input: &Path) -> Result<Self, ConvertError> {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConvertError::InvalidInputName(input.to_path_buf()))?
            .to_string();
        let dir = match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self { dir, stem })
    }

    fn sdf_path(&self) -> PathBuf {
        self.dir.join(format!("{}.sdf", self.stem))
    }

    fn parts_dir_name(&self) -> String {
        format!("{}_parts", self.stem)
    }

    fn piece_name(&self, k: usize) -> String {
        format!("{}_convex_piece_{k:03}.obj", self.stem)
    }

    fn link_name(&self) -> String {
        format!("{}_body_link", self.stem)
    }

    /// `path` relative to the descriptor directory, with `/` separators.
    fn uri(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.dir).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Decimate the mesh at `path` to at most `target_tris` triangles and write it
/// next to the original as `<stem>_simple_vis.<ext>`.
pub fn simplify_visual_mesh(path: &Path, target_tris: usize) -> Result<PathBuf, ConvertError> {
    let mesh = load_mesh(path)?;
    let simplified = decimate_mesh(&mesh, target_tris);
    let layout = OutputLayout::for_input(path)?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("obj");
    let out = layout.dir.join(format!("{}_simple_vis.{ext}", layout.stem));
    info!(
        from = mesh.num_triangles(),
        to = simplified.num_triangles(),
        path = %out.display(),
        "simplified visual mesh"
    );
    save_mesh(&out, &simplified)?;
    Ok(out)
}

/// Convert `input` into `<stem>.sdf` with V-HACD collision pieces and no
/// preview.
pub fn create_sdf_with_convex_decomp(
    input: &Path,
    options: &ConvertOptions,
) -> Result<ConvertReport, ConvertError> {
    let decomposer = VhacdDecomposer::new(options.decomposition.clone());
    create_sdf_with(input, options, &decomposer, &mut NoPreview)
}

/// Convert `input` using the given decomposer and preview.
///
/// Outputs land next to the input: `<stem>.sdf` and `<stem>_parts/` holding
/// one OBJ per convex piece. A failed decomposition is logged and the
/// descriptor is written without collision elements. Any I/O failure aborts
/// the run.
pub fn create_sdf_with(
    input: &Path,
    options: &ConvertOptions,
    decomposer: &dyn ConvexDecomposer,
    preview: &mut dyn Preview,
) -> Result<ConvertReport, ConvertError> {
    if !input.exists() {
        return Err(ConvertError::MissingInput(input.to_path_buf()));
    }
    let layout = OutputLayout::for_input(input)?;
    let sdf_path = layout.sdf_path();
    debug!(?options, input = %input.display(), "converting mesh");

    let mut mesh = load_mesh(input)?;
    mesh.apply_scale(options.scale as f32);

    let inertial = compute_inertia(&mesh, options.density);
    debug!(mass = inertial.mass, "computed inertia");

    let visual_path = if options.do_visual_simplification {
        simplify_visual_mesh(input, options.target_tris)?
    } else {
        input.to_path_buf()
    };
    warn!("{} -> {}", visual_path.display(), sdf_path.display());

    let parts_dir = layout.dir.join(layout.parts_dir_name());
    std::fs::create_dir_all(&parts_dir).map_err(|source| ConvertError::Io {
        path: parts_dir.clone(),
        source,
    })?;

    info!("showing mesh before decomposition");
    preview.show_mesh(&mesh);
    let decomposition = Decomposition::run(decomposer, &mesh);
    info!(
        "showing mesh convex decomposition into {} parts",
        decomposition.pieces().len()
    );
    preview.show_pieces(decomposition.pieces());

    let mut piece_paths = Vec::with_capacity(decomposition.pieces().len());
    for (k, piece) in decomposition.pieces().iter().enumerate() {
        let path = parts_dir.join(layout.piece_name(k));
        save_mesh(&path, piece)?;
        piece_paths.push(path);
    }
    info!(pieces = piece_paths.len(), dir = %parts_dir.display(), "wrote collision pieces");

    let descriptor = build_descriptor(&layout, options.scale, &inertial, &visual_path, &piece_paths);
    info!("writing SDF to {}", sdf_path.display());
    meshsdf_sdf::save(&sdf_path, &descriptor)?;

    Ok(ConvertReport {
        sdf_path,
        visual_path,
        parts_dir,
        piece_paths,
        inertial,
        decomposition_failed: decomposition.is_failed(),
    })
}

fn build_descriptor(
    layout: &OutputLayout,
    scale: f64,
    inertial: &InertialProperties,
    visual_path: &Path,
    piece_paths: &[PathBuf],
) -> Descriptor {
    let mut link = Link::new(layout.link_name());
    link.inertial = Some(Inertial {
        mass: inertial.mass,
        inertia: Inertia::from_matrix(&inertial.inertia),
    });
    link.visuals.push(Visual {
        name: "visual".to_string(),
        pose: None,
        geometry: Geometry::Mesh(MeshGeometry {
            uri: layout.uri(visual_path),
            scale: Some(Vector3::repeat(scale)),
            declare_convex: false,
        }),
    });
    for (k, path) in piece_paths.iter().enumerate() {
        link.collisions.push(Collision {
            name: format!("collision_{k:04}"),
            pose: None,
            geometry: Geometry::Mesh(MeshGeometry {
                uri: layout.uri(path),
                scale: None,
                declare_convex: true,
            }),
        });
    }
    Descriptor::new(Model {
        name: layout.stem.clone(),
        links: vec![link],
    })
}
