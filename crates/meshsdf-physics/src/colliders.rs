//! Collision shape generation from descriptor geometry.

use meshsdf_mesh::TriangleMesh;
use nalgebra::{Isometry3, Vector3};
use parry3d::shape::{ConvexPolyhedron, SharedShape, TriMesh};

use crate::error::{PhysicsError, Result};

/// Strategy for turning a mesh into a collision shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColliderStrategy {
    /// Convex hull of the vertices.
    ConvexHull,
    /// Exact triangle mesh.
    #[default]
    TriMesh,
}

/// A collision shape together with the mesh that shows it.
pub struct ColliderShape {
    /// Shape handed to rapier.
    pub shape: SharedShape,
    /// Offset of `shape` relative to the geometry frame. `display` is
    /// already expressed in the geometry frame.
    pub offset: Isometry3<f32>,
    /// Triangles describing the same surface, for display.
    pub display: TriangleMesh,
}

/// Generate a collision shape from a triangle mesh.
///
/// With [`ColliderStrategy::ConvexHull`] the display mesh is the hull itself,
/// so what is drawn matches what collides.
pub fn mesh_to_collider(
    mesh: &TriangleMesh,
    strategy: ColliderStrategy,
    name: &str,
) -> Result<ColliderShape> {
    if mesh.vertices.is_empty() || mesh.indices.is_empty() {
        return Err(PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: "empty mesh".to_string(),
        });
    }

    match strategy {
        ColliderStrategy::ConvexHull => create_convex_hull(mesh, name),
        ColliderStrategy::TriMesh => create_trimesh(mesh, name),
    }
}

fn create_convex_hull(mesh: &TriangleMesh, name: &str) -> Result<ColliderShape> {
    let points = mesh.points();
    if points.len() < 4 {
        return Err(PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: "need at least 4 points for a convex hull".to_string(),
        });
    }

    let hull = ConvexPolyhedron::from_convex_hull(&points).ok_or_else(|| {
        PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: "degenerate convex hull".to_string(),
        }
    })?;
    let (vertices, triangles) = hull.to_trimesh();
    Ok(ColliderShape {
        shape: SharedShape::new(hull),
        offset: Isometry3::identity(),
        display: TriangleMesh::from_parts(&vertices, &triangles),
    })
}

fn create_trimesh(mesh: &TriangleMesh, name: &str) -> Result<ColliderShape> {
    match TriMesh::new(mesh.points(), mesh.triangles()) {
        Ok(trimesh) => Ok(ColliderShape {
            shape: SharedShape::new(trimesh),
            offset: Isometry3::identity(),
            display: mesh.clone(),
        }),
        Err(e) => Err(PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: format!("failed to create trimesh: {e:?}"),
        }),
    }
}

/// Box collider with full side lengths `size`.
pub fn cuboid(size: Vector3<f32>) -> ColliderShape {
    let half = size / 2.0;
    ColliderShape {
        shape: SharedShape::cuboid(half.x, half.y, half.z),
        offset: Isometry3::identity(),
        display: TriangleMesh::cuboid(size),
    }
}

/// Sphere collider.
pub fn ball(radius: f32) -> ColliderShape {
    ColliderShape {
        shape: SharedShape::ball(radius),
        offset: Isometry3::identity(),
        display: TriangleMesh::uv_sphere(radius, 16, 32),
    }
}

/// Cylinder collider along the geometry's z axis.
pub fn cylinder(radius: f32, length: f32) -> ColliderShape {
    // Parry cylinders run along y.
    ColliderShape {
        shape: SharedShape::cylinder(length / 2.0, radius),
        offset: Isometry3::rotation(Vector3::x() * std::f32::consts::FRAC_PI_2),
        display: TriangleMesh::cylinder(radius, length, 32),
    }
}
