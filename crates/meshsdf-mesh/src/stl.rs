//! STL reading and writing via `stl_io`.

use std::io::{Read, Seek, Write};

use stl_io::{Normal, Triangle, Vertex};

use crate::error::{MeshError, Result};
use crate::TriangleMesh;

/// Read an ASCII or binary STL stream into an indexed triangle mesh.
pub fn read_stl<R: Read + Seek>(reader: &mut R) -> Result<TriangleMesh> {
    let stl = stl_io::read_stl(reader).map_err(MeshError::stream)?;

    let vertices = stl
        .vertices
        .iter()
        .flat_map(|v| [v[0], v[1], v[2]])
        .collect();
    let indices = stl
        .faces
        .iter()
        .flat_map(|f| f.vertices.map(|i| i as u32))
        .collect();

    Ok(TriangleMesh {
        vertices,
        indices,
        normals: Vec::new(),
    })
}

/// Write a triangle mesh as binary STL with per-face normals.
pub fn write_stl<W: Write>(writer: &mut W, mesh: &TriangleMesh) -> Result<()> {
    let triangles: Vec<Triangle> = mesh
        .indices
        .chunks_exact(3)
        .map(|tri| {
            let [a, b, c] = [0, 1, 2].map(|k| mesh.point(tri[k] as usize));
            let n = (b - a)
                .cross(&(c - a))
                .try_normalize(1e-10)
                .unwrap_or_else(nalgebra::Vector3::z);
            Triangle {
                normal: Normal::new([n.x, n.y, n.z]),
                vertices: [a, b, c].map(|p| Vertex::new([p.x, p.y, p.z])),
            }
        })
        .collect();

    stl_io::write_stl(writer, triangles.iter()).map_err(MeshError::stream)
}
