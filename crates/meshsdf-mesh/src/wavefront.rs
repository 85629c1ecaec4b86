//! Wavefront OBJ reading and writing.
//!
//! Only positions and faces are kept. Texture coordinates, normals and
//! material libraries are ignored on read; polygons are fan-triangulated.

use std::io::{Read, Write};

use crate::error::{MeshError, Result};
use crate::TriangleMesh;

/// Read an OBJ stream into a triangle mesh.
pub fn read_obj<R: Read>(reader: R) -> Result<TriangleMesh> {
    let data = ::obj::ObjData::load_buf(reader).map_err(|e| MeshError::Obj(e.to_string()))?;

    let vertices: Vec<f32> = data.position.iter().flatten().copied().collect();
    let mut indices = Vec::new();

    for object in &data.objects {
        for group in &object.groups {
            for poly in &group.polys {
                let corners: Vec<u32> = poly.0.iter().map(|t| t.0 as u32).collect();
                if corners.len() < 3 {
                    continue;
                }
                for k in 1..corners.len() - 1 {
                    indices.extend_from_slice(&[corners[0], corners[k], corners[k + 1]]);
                }
            }
        }
    }

    Ok(TriangleMesh {
        vertices,
        indices,
        normals: Vec::new(),
    })
}

/// Write a triangle mesh as OBJ text (positions and faces only).
///
/// Coordinates use fixed 8-decimal formatting so output is stable across runs.
pub fn write_obj<W: Write>(writer: &mut W, mesh: &TriangleMesh) -> Result<()> {
    let mut out = String::with_capacity(mesh.vertices.len() * 14 + mesh.indices.len() * 6);
    out.push_str("# meshsdf\n");
    for v in mesh.vertices.chunks_exact(3) {
        out.push_str(&format!("v {:.8} {:.8} {:.8}\n", v[0], v[1], v[2]));
    }
    for tri in mesh.indices.chunks_exact(3) {
        out.push_str(&format!("f {} {} {}\n", tri[0] + 1, tri[1] + 1, tri[2] + 1));
    }
    writer.write_all(out.as_bytes()).map_err(MeshError::stream)?;
    writer.flush().map_err(MeshError::stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_shapes::unit_cube;

    #[test]
    fn test_quad_is_fan_triangulated() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = read_obj(src.as_bytes()).unwrap();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_texture_and_normal_indices_ignored() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvn 0 0 1\nf 1/1/1 2/1/1 3/1/1\n";
        let mesh = read_obj(src.as_bytes()).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_written_obj_is_one_based() {
        let mut buf = Vec::new();
        write_obj(&mut buf, &unit_cube()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("# meshsdf\nv 0.00000000 0.00000000 0.00000000\n"));
        assert!(text.contains("\nf 1 3 2\n"));
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 12);
    }

    #[test]
    fn test_write_then_read_preserves_geometry() {
        let mut buf = Vec::new();
        write_obj(&mut buf, &unit_cube()).unwrap();
        let mesh = read_obj(buf.as_slice()).unwrap();
        assert_eq!(mesh.vertices, unit_cube().vertices);
        assert_eq!(mesh.indices, unit_cube().indices);
    }
}
