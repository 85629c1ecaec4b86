//! Tessellated primitive shapes, centred on the origin.

use std::f32::consts::PI;

use nalgebra::{Point3, Vector3};

use crate::TriangleMesh;

impl TriangleMesh {
    /// Box with full side lengths `size`.
    pub fn cuboid(size: Vector3<f32>) -> Self {
        let h = size / 2.0;
        let corners = [
            [-h.x, -h.y, -h.z],
            [h.x, -h.y, -h.z],
            [h.x, h.y, -h.z],
            [-h.x, h.y, -h.z],
            [-h.x, -h.y, h.z],
            [h.x, -h.y, h.z],
            [h.x, h.y, h.z],
            [-h.x, h.y, h.z],
        ];
        Self {
            vertices: corners.iter().flatten().copied().collect(),
            indices: vec![
                0, 2, 1, 0, 3, 2, // -z
                4, 5, 6, 4, 6, 7, // +z
                0, 1, 5, 0, 5, 4, // -y
                2, 3, 7, 2, 7, 6, // +y
                1, 2, 6, 1, 6, 5, // +x
                0, 4, 7, 0, 7, 3, // -x
            ],
            normals: Vec::new(),
        }
    }

    /// Latitude-longitude sphere. `stacks` is clamped to at least 2 and
    /// `slices` to at least 3.
    pub fn uv_sphere(radius: f32, stacks: u32, slices: u32) -> Self {
        let stacks = stacks.max(2);
        let slices = slices.max(3);
        let mut points = vec![Point3::new(0.0, 0.0, radius)];
        for i in 1..stacks {
            let theta = PI * i as f32 / stacks as f32;
            for j in 0..slices {
                let phi = 2.0 * PI * j as f32 / slices as f32;
                points.push(Point3::new(
                    radius * theta.sin() * phi.cos(),
                    radius * theta.sin() * phi.sin(),
                    radius * theta.cos(),
                ));
            }
        }
        let bottom = points.len() as u32;
        points.push(Point3::new(0.0, 0.0, -radius));

        let ring = |i: u32, j: u32| 1 + (i - 1) * slices + j % slices;
        let mut triangles = Vec::new();
        for j in 0..slices {
            triangles.push([0, ring(1, j), ring(1, j + 1)]);
        }
        for i in 1..stacks - 1 {
            for j in 0..slices {
                let (a, b, c, d) = (ring(i, j), ring(i + 1, j), ring(i + 1, j + 1), ring(i, j + 1));
                triangles.push([a, b, c]);
                triangles.push([a, c, d]);
            }
        }
        for j in 0..slices {
            triangles.push([bottom, ring(stacks - 1, j + 1), ring(stacks - 1, j)]);
        }
        Self::from_parts(&points, &triangles)
    }

    /// Capped cylinder along z. `segments` is clamped to at least 3.
    pub fn cylinder(radius: f32, length: f32, segments: u32) -> Self {
        let n = segments.max(3);
        let half = length / 2.0;
        let mut points = vec![Point3::new(0.0, 0.0, half), Point3::new(0.0, 0.0, -half)];
        for z in [half, -half] {
            for j in 0..n {
                let phi = 2.0 * PI * j as f32 / n as f32;
                points.push(Point3::new(radius * phi.cos(), radius * phi.sin(), z));
            }
        }
        let top = |j: u32| 2 + j % n;
        let bot = |j: u32| 2 + n + j % n;
        let mut triangles = Vec::new();
        for j in 0..n {
            triangles.push([0, top(j), top(j + 1)]);
            triangles.push([1, bot(j + 1), bot(j)]);
            triangles.push([top(j), bot(j), bot(j + 1)]);
            triangles.push([top(j), bot(j + 1), top(j + 1)]);
        }
        Self::from_parts(&points, &triangles)
    }
}
