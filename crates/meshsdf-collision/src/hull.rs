//! Convex hull helpers.

use meshsdf_mesh::TriangleMesh;
use nalgebra::Point3;
use parry3d::transformation::convex_hull;

/// Convex hull of a point set, as an outward-facing triangle mesh.
///
/// Parry panics on degenerate (coplanar or coincident) input; callers that
/// cannot rule that out run this under `catch_unwind`.
pub fn convex_hull_mesh(points: &[Point3<f32>]) -> TriangleMesh {
    let (vertices, triangles) = convex_hull(points);
    TriangleMesh::from_parts(&vertices, &triangles)
}

/// Keep at most `max_vertices` points, chosen by farthest-point sampling.
///
/// Sampling starts from the point farthest from the centroid, so the result
/// always contains the extreme points of the set first. Ties go to the lowest
/// index.
pub fn reduce_hull_vertices(points: &[Point3<f32>], max_vertices: usize) -> Vec<Point3<f32>> {
    if points.len() <= max_vertices {
        return points.to_vec();
    }
    if max_vertices == 0 {
        return Vec::new();
    }

    let n = points.len() as f32;
    let centroid = Point3::from(points.iter().fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords) / n);

    let mut first = 0;
    let mut best = f32::NEG_INFINITY;
    for (i, p) in points.iter().enumerate() {
        let d = (p - centroid).norm_squared();
        if d > best {
            best = d;
            first = i;
        }
    }

    let mut chosen = vec![first];
    let mut min_dist: Vec<f32> = points
        .iter()
        .map(|p| (p - points[first]).norm_squared())
        .collect();

    while chosen.len() < max_vertices {
        let mut next = 0;
        let mut best = f32::NEG_INFINITY;
        for (i, &d) in min_dist.iter().enumerate() {
            if d > best {
                best = d;
                next = i;
            }
        }
        if best <= 0.0 {
            break;
        }
        chosen.push(next);
        for (i, p) in points.iter().enumerate() {
            min_dist[i] = min_dist[i].min((p - points[next]).norm_squared());
        }
    }

    chosen.into_iter().map(|i| points[i]).collect()
}
