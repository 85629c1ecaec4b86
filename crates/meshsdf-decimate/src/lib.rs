#![warn(missing_docs)]

//! Mesh decimation using quadric error metrics.
//!
//! Used to produce lighter visual meshes. Edges are collapsed cheapest-first
//! until the triangle budget is met; each collapse moves the surviving vertex
//! to the position minimising the summed plane quadrics of both endpoints.
//!
//! Output is deterministic: edges are enumerated in sorted order and ties in
//! the queue are broken by vertex index.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use meshsdf_mesh::TriangleMesh;
use nalgebra::{Matrix4, Point3, Vector3, Vector4};
use tracing::debug;

type Quadric = Matrix4<f64>;

/// Decimate a mesh down to at most `target_triangles` triangles.
///
/// Stops early if no valid collapse remains. A mesh already within budget is
/// returned unchanged apart from recomputed normals.
pub fn decimate_mesh(mesh: &TriangleMesh, target_triangles: usize) -> TriangleMesh {
    if mesh.num_triangles() <= target_triangles {
        let mut out = mesh.clone();
        out.compute_normals();
        return out;
    }

    let mut decimator = Decimator::new(mesh);
    decimator.run(target_triangles);
    let mut out = decimator.into_mesh();
    out.compute_normals();

    debug!(
        from = mesh.num_triangles(),
        to = out.num_triangles(),
        target = target_triangles,
        "decimated mesh"
    );
    out
}

/// Queued edge collapse. Stale when either endpoint's stamp has moved on.
struct Candidate {
    cost: f64,
    a: u32,
    b: u32,
    stamp_a: u32,
    stamp_b: u32,
    target: Point3<f64>,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| (other.a, other.b).cmp(&(self.a, self.b)))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

struct Decimator {
    positions: Vec<Point3<f64>>,
    quadrics: Vec<Quadric>,
    triangles: Vec<[u32; 3]>,
    active: Vec<bool>,
    active_count: usize,
    vertex_map: Vec<u32>,
    stamps: Vec<u32>,
    vertex_faces: Vec<Vec<usize>>,
    neighbors: Vec<BTreeSet<u32>>,
    heap: BinaryHeap<Candidate>,
}

impl Decimator {
    fn new(mesh: &TriangleMesh) -> Self {
        let positions: Vec<Point3<f64>> = mesh.points().iter().map(|p| p.cast::<f64>()).collect();
        let triangles = mesh.triangles();
        let n = positions.len();

        let mut quadrics = vec![Quadric::zeros(); n];
        let mut vertex_faces = vec![Vec::new(); n];
        let mut neighbors = vec![BTreeSet::new(); n];
        let mut edges = BTreeSet::new();
        let mut active = vec![true; triangles.len()];

        for (f, tri) in triangles.iter().enumerate() {
            let [i0, i1, i2] = *tri;
            if i0 == i1 || i1 == i2 || i2 == i0 {
                active[f] = false;
                continue;
            }
            let q = face_quadric(&positions[i0 as usize], &positions[i1 as usize], &positions[i2 as usize]);
            for &v in tri {
                quadrics[v as usize] += q;
                vertex_faces[v as usize].push(f);
            }
            for (u, v) in [(i0, i1), (i1, i2), (i2, i0)] {
                neighbors[u as usize].insert(v);
                neighbors[v as usize].insert(u);
                // Add edges in canonical order (smaller index first)
                edges.insert(if u < v { (u, v) } else { (v, u) });
            }
        }

        let active_count = active.iter().filter(|&&a| a).count();
        let mut decimator = Self {
            positions,
            quadrics,
            triangles,
            active,
            active_count,
            vertex_map: (0..n as u32).collect(),
            stamps: vec![0; n],
            vertex_faces,
            neighbors,
            heap: BinaryHeap::new(),
        };
        for (a, b) in edges {
            decimator.push_candidate(a, b);
        }
        decimator
    }

    fn canonical(&self, mut idx: u32) -> u32 {
        while self.vertex_map[idx as usize] != idx {
            idx = self.vertex_map[idx as usize];
        }
        idx
    }

    fn push_candidate(&mut self, a: u32, b: u32) {
        let q = self.quadrics[a as usize] + self.quadrics[b as usize];
        let (cost, target) =
            collapse_target(&q, &self.positions[a as usize], &self.positions[b as usize]);
        self.heap.push(Candidate {
            cost,
            a,
            b,
            stamp_a: self.stamps[a as usize],
            stamp_b: self.stamps[b as usize],
            target,
        });
    }

    fn run(&mut self, target_triangles: usize) {
        while self.active_count > target_triangles {
            let Some(c) = self.heap.pop() else {
                break;
            };
            let (a, b) = (self.canonical(c.a), self.canonical(c.b));
            if a == b
                || a != c.a
                || b != c.b
                || self.stamps[a as usize] != c.stamp_a
                || self.stamps[b as usize] != c.stamp_b
            {
                continue;
            }
            if self.collapse_flips(a, b, &c.target) {
                continue;
            }
            self.collapse(a, b, c.target);
        }
    }

    /// Whether moving `a` and `b` to `target` would turn any surviving face over.
    fn collapse_flips(&self, a: u32, b: u32, target: &Point3<f64>) -> bool {
        for (v, other) in [(a, b), (b, a)] {
            for &f in &self.vertex_faces[v as usize] {
                if !self.active[f] {
                    continue;
                }
                let tri = self.triangles[f].map(|i| self.canonical(i));
                if tri.contains(&other) || !tri.contains(&v) {
                    continue;
                }
                let before = tri.map(|i| self.positions[i as usize]);
                let after = tri.map(|i| if i == v { *target } else { self.positions[i as usize] });
                let n0 = (before[1] - before[0]).cross(&(before[2] - before[0]));
                let n1 = (after[1] - after[0]).cross(&(after[2] - after[0]));
                if n0.norm_squared() <= f64::EPSILON {
                    continue;
                }
                if n0.dot(&n1) <= 0.0 {
                    return true;
                }
            }
        }
        false
    }

    /// Collapse `b` into `a`.
    fn collapse(&mut self, a: u32, b: u32, target: Point3<f64>) {
        let (ai, bi) = (a as usize, b as usize);
        self.vertex_map[bi] = a;
        self.positions[ai] = target;
        let qb = self.quadrics[bi];
        self.quadrics[ai] += qb;
        self.stamps[ai] += 1;
        self.stamps[bi] += 1;

        let moved = std::mem::take(&mut self.vertex_faces[bi]);
        self.vertex_faces[ai].extend(moved);

        // Mark degenerate triangles
        let mut kept = Vec::with_capacity(self.vertex_faces[ai].len());
        for &f in &self.vertex_faces[ai] {
            if !self.active[f] {
                continue;
            }
            let tri = self.triangles[f].map(|i| self.canonical(i));
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
                self.active[f] = false;
                self.active_count -= 1;
            } else if !kept.contains(&f) {
                kept.push(f);
            }
        }
        self.vertex_faces[ai] = kept;

        let merged: BTreeSet<u32> = std::mem::take(&mut self.neighbors[bi])
            .into_iter()
            .chain(std::mem::take(&mut self.neighbors[ai]))
            .map(|v| self.canonical(v))
            .filter(|&v| v != a)
            .collect();
        for &v in &merged {
            let nv = &mut self.neighbors[v as usize];
            nv.remove(&b);
            nv.insert(a);
        }
        self.neighbors[ai] = merged.clone();
        for v in merged {
            if a < v {
                self.push_candidate(a, v);
            } else {
                self.push_candidate(v, a);
            }
        }
    }

    fn into_mesh(self) -> TriangleMesh {
        let mut remap: HashMap<u32, u32> = HashMap::new();
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for (f, tri) in self.triangles.iter().enumerate() {
            if !self.active[f] {
                continue;
            }
            for &i in tri {
                let old = self.canonical(i);
                let new = *remap.entry(old).or_insert_with(|| {
                    let p = self.positions[old as usize];
                    vertices.extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
                    (vertices.len() / 3 - 1) as u32
                });
                indices.push(new);
            }
        }

        TriangleMesh {
            vertices,
            indices,
            normals: Vec::new(),
        }
    }
}

/// Area-weighted plane quadric of a triangle.
fn face_quadric(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Quadric {
    let cross: Vector3<f64> = (b - a).cross(&(c - a));
    let area = cross.norm() * 0.5;
    let Some(n) = cross.try_normalize(1e-18) else {
        return Quadric::zeros();
    };
    let p = Vector4::new(n.x, n.y, n.z, -n.dot(&a.coords));
    p * p.transpose() * area
}

fn quadric_error(q: &Quadric, p: &Point3<f64>) -> f64 {
    let v = p.to_homogeneous();
    (v.transpose() * q * v)[(0, 0)].max(0.0)
}

/// Cheapest collapse position among the quadric optimum, both endpoints and the midpoint.
fn collapse_target(q: &Quadric, pa: &Point3<f64>, pb: &Point3<f64>) -> (f64, Point3<f64>) {
    let mid = nalgebra::center(pa, pb);
    let mut candidates = vec![*pa, *pb, mid];

    let mut m = *q;
    m[(3, 0)] = 0.0;
    m[(3, 1)] = 0.0;
    m[(3, 2)] = 0.0;
    m[(3, 3)] = 1.0;
    if let Some(inv) = m.try_inverse() {
        let v = inv * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let optimum = Point3::new(v.x, v.y, v.z);
        // Ill-conditioned systems can throw the optimum far off the surface.
        if optimum.coords.iter().all(|c| c.is_finite())
            && (optimum - mid).norm() <= (pb - pa).norm() * 2.0
        {
            candidates.push(optimum);
        }
    }

    candidates
        .into_iter()
        .map(|p| (quadric_error(q, &p), p))
        .fold((f64::INFINITY, mid), |best, cur| {
            if cur.0 < best.0 {
                cur
            } else {
                best
            }
        })
}
