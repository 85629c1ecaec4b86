#![warn(missing_docs)]

//! Triangle meshes for meshsdf.
//!
//! Holds geometry as flat `f32`/`u32` buffers and reads or writes it as OBJ
//! or STL. Everything downstream (decimation, decomposition, physics, the
//! viewer) works on [`TriangleMesh`].
//!
//! # Example
//!
//! ```rust,no_run
//! use meshsdf_mesh::{load_mesh, save_mesh};
//!
//! let mut mesh = load_mesh("mug.obj").unwrap();
//! mesh.apply_scale(0.001);
//! save_mesh("mug_scaled.obj", &mesh).unwrap();
//! ```

mod error;
mod primitives;
mod stl;
mod wavefront;

use std::path::Path;

use nalgebra::{Point3, Vector3};

pub use error::{MeshError, Result};
pub use stl::{read_stl, write_stl};
pub use wavefront::{read_obj, write_obj};

/// Triangle mesh with flat vertex and index buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]`.
    pub vertices: Vec<f32>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]`.
    pub indices: Vec<u32>,
    /// Flat array of vertex normals. Either empty or the same length as `vertices`.
    pub normals: Vec<f32>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            normals: Vec::new(),
        }
    }

    /// Build a mesh from points and triangles.
    pub fn from_parts(points: &[Point3<f32>], triangles: &[[u32; 3]]) -> Self {
        Self {
            vertices: points.iter().flat_map(|p| [p.x, p.y, p.z]).collect(),
            indices: triangles.iter().flatten().copied().collect(),
            normals: Vec::new(),
        }
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// True when the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Vertex `i` as a point.
    pub fn point(&self, i: usize) -> Point3<f32> {
        Point3::new(
            self.vertices[i * 3],
            self.vertices[i * 3 + 1],
            self.vertices[i * 3 + 2],
        )
    }

    /// All vertices as points.
    pub fn points(&self) -> Vec<Point3<f32>> {
        self.vertices
            .chunks_exact(3)
            .map(|v| Point3::new(v[0], v[1], v[2]))
            .collect()
    }

    /// All triangles as index triplets.
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect()
    }

    /// Merge another mesh into this one.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.num_vertices() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.extend_from_slice(&other.normals);
        self.indices.extend(other.indices.iter().map(|&i| i + offset));
    }

    /// Uniformly scale every vertex about the origin.
    ///
    /// A factor of exactly `1.0` leaves the buffers untouched.
    pub fn apply_scale(&mut self, factor: f32) {
        if factor == 1.0 {
            return;
        }
        for v in &mut self.vertices {
            *v *= factor;
        }
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for a mesh without vertices.
    pub fn bounds(&self) -> Option<(Point3<f32>, Point3<f32>)> {
        let mut points = self.vertices.chunks_exact(3);
        let first = points.next()?;
        let mut min = Point3::new(first[0], first[1], first[2]);
        let mut max = min;
        for v in points {
            for axis in 0..3 {
                min[axis] = min[axis].min(v[axis]);
                max[axis] = max[axis].max(v[axis]);
            }
        }
        Some((min, max))
    }

    /// Whether every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.vertices.iter().all(|v| v.is_finite())
    }

    /// Check that every index refers to an existing vertex.
    pub fn validate(&self) -> Result<()> {
        if self.indices.len() % 3 != 0 {
            return Err(MeshError::Malformed(format!(
                "index buffer length {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        let count = self.num_vertices();
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= count) {
            return Err(MeshError::IndexOutOfRange {
                index: bad as usize,
                count,
            });
        }
        Ok(())
    }

    /// Signed volume enclosed by the mesh (positive for outward-facing triangles).
    pub fn signed_volume(&self) -> f32 {
        self.indices
            .chunks_exact(3)
            .map(|tri| {
                let v0 = self.point(tri[0] as usize).coords;
                let v1 = self.point(tri[1] as usize).coords;
                let v2 = self.point(tri[2] as usize).coords;
                v0.dot(&v1.cross(&v2)) / 6.0
            })
            .sum()
    }

    /// Recompute area-weighted vertex normals.
    pub fn compute_normals(&mut self) {
        let mut acc = vec![Vector3::<f32>::zeros(); self.num_vertices()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let n = (self.point(b) - self.point(a)).cross(&(self.point(c) - self.point(a)));
            acc[a] += n;
            acc[b] += n;
            acc[c] += n;
        }
        self.normals = acc
            .into_iter()
            .flat_map(|n| {
                let n = n.try_normalize(1e-12).unwrap_or_else(Vector3::z);
                [n.x, n.y, n.z]
            })
            .collect();
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk mesh formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    /// Wavefront OBJ.
    Obj,
    /// STL, ASCII or binary on read, binary on write.
    Stl,
}

impl MeshFormat {
    /// Guess the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("obj") => Ok(MeshFormat::Obj),
            Some("stl") => Ok(MeshFormat::Stl),
            _ => Err(MeshError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Load a mesh from disk, choosing the reader by extension.
pub fn load_mesh(path: impl AsRef<Path>) -> Result<TriangleMesh> {
    let path = path.as_ref();
    let format = MeshFormat::from_path(path)?;
    let file = std::fs::File::open(path).map_err(|e| MeshError::io(path, e))?;
    let mut reader = std::io::BufReader::new(file);
    let mesh = match format {
        MeshFormat::Obj => read_obj(reader)?,
        MeshFormat::Stl => read_stl(&mut reader)?,
    };
    mesh.validate()?;
    Ok(mesh)
}

/// Save a mesh to disk, choosing the writer by extension.
pub fn save_mesh(path: impl AsRef<Path>, mesh: &TriangleMesh) -> Result<()> {
    let path = path.as_ref();
    let format = MeshFormat::from_path(path)?;
    let file = std::fs::File::create(path).map_err(|e| MeshError::io(path, e))?;
    let mut writer = std::io::BufWriter::new(file);
    let written = match format {
        MeshFormat::Obj => write_obj(&mut writer, mesh),
        MeshFormat::Stl => write_stl(&mut writer, mesh),
    };
    written.map_err(|e| match e {
        MeshError::Io { source, .. } => MeshError::io(path, source),
        other => other,
    })
}

#[cfg(test)]
pub(crate) mod test_shapes {
    use super::TriangleMesh;

    /// Unit cube spanning `[0, 1]^3` with outward-facing triangles.
    pub fn unit_cube() -> TriangleMesh {
        TriangleMesh {
            vertices: vec![
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, // bottom
                0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0, // top
            ],
            indices: vec![
                0, 2, 1, 0, 3, 2, // -z
                4, 5, 6, 4, 6, 7, // +z
                0, 1, 5, 0, 5, 4, // -y
                2, 3, 7, 2, 7, 6, // +y
                1, 2, 6, 1, 6, 5, // +x
                0, 4, 7, 0, 7, 3, // -x
            ],
            normals: vec![],
        }
    }
}
