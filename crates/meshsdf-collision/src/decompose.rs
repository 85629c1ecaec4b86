//! Approximate convex decomposition.

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};

use meshsdf_mesh::TriangleMesh;
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use parry3d::transformation::vhacd::{VHACDParameters, VHACD};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::DecompositionError;
use crate::hull::{convex_hull_mesh, reduce_hull_vertices};

/// Smallest per-axis voxel resolution handed to V-HACD.
const MIN_AXIS_RESOLUTION: u32 = 8;
/// Largest per-axis voxel resolution handed to V-HACD.
const MAX_AXIS_RESOLUTION: u32 = 512;
/// Relative extent below which a mesh is considered flat.
const FLAT_TOLERANCE: f64 = 1e-6;

/// Tuning knobs for [`VhacdDecomposer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionParams {
    /// Total voxel budget for the mesh bounding box.
    pub resolution: u32,
    /// Maximum number of convex pieces.
    pub max_hulls: u32,
    /// Pieces smaller than this fraction of the mesh's convex hull volume are dropped.
    pub min_hull_volume: f64,
    /// Maximum vertex count of a single piece.
    pub max_vertices_per_hull: usize,
    /// Voxelize in the mesh's principal frame instead of its native axes.
    pub pca: bool,
}

impl Default for DecompositionParams {
    fn default() -> Self {
        Self {
            resolution: 100_000,
            max_hulls: 12,
            min_hull_volume: 0.001,
            max_vertices_per_hull: 12,
            pca: true,
        }
    }
}

/// Splits a mesh into convex pieces.
pub trait ConvexDecomposer {
    /// Decompose `mesh`. Pieces are outward-facing closed meshes in the
    /// same frame as the input.
    fn decompose(&self, mesh: &TriangleMesh) -> Result<Vec<TriangleMesh>, DecompositionError>;
}

/// Outcome of a decomposition attempt.
#[derive(Debug, Clone)]
pub enum Decomposition {
    /// Decomposition succeeded, possibly with zero pieces.
    Pieces(Vec<TriangleMesh>),
    /// Decomposition failed; callers carry on without collision geometry.
    Failed(DecompositionError),
}

impl Decomposition {
    /// Run `decomposer` on `mesh`, logging failures at error level.
    pub fn run(decomposer: &dyn ConvexDecomposer, mesh: &TriangleMesh) -> Self {
        match decomposer.decompose(mesh) {
            Ok(pieces) => {
                debug!(pieces = pieces.len(), "convex decomposition finished");
                Decomposition::Pieces(pieces)
            }
            Err(e) => {
                error!("convex decomposition failed: {e}");
                Decomposition::Failed(e)
            }
        }
    }

    /// Pieces produced, empty on failure.
    pub fn pieces(&self) -> &[TriangleMesh] {
        match self {
            Decomposition::Pieces(pieces) => pieces,
            Decomposition::Failed(_) => &[],
        }
    }

    /// Whether the decomposition failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Decomposition::Failed(_))
    }
}

/// Principal axes of a point cloud.
///
/// Columns of `rotation` are the axes sorted by decreasing variance and form a
/// right-handed basis. `extents` are the bounding box sizes along those axes.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalFrame {
    /// Centroid of the points.
    pub center: Point3<f64>,
    /// Local-to-world rotation.
    pub rotation: Matrix3<f64>,
    /// Bounding box size along each principal axis.
    pub extents: Vector3<f64>,
}

impl PrincipalFrame {
    /// Compute the frame of `points`, or `None` if there are none.
    pub fn of_points(points: &[Point3<f32>]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let center = Point3::from(
            points
                .iter()
                .fold(Vector3::zeros(), |acc, p| acc + p.coords.cast::<f64>())
                / n,
        );

        let mut covariance = Matrix3::zeros();
        for p in points {
            let d = p.coords.cast::<f64>() - center.coords;
            covariance += d * d.transpose();
        }
        covariance /= n;

        let eigen = SymmetricEigen::new(covariance);
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

        let e0 = canonical_sign(eigen.eigenvectors.column(order[0]).into_owned());
        let e1 = canonical_sign(eigen.eigenvectors.column(order[1]).into_owned());
        let e2 = e0.cross(&e1);
        let rotation = Matrix3::from_columns(&[e0, e1, e2]);

        let mut frame = Self {
            center,
            rotation,
            extents: Vector3::zeros(),
        };
        let mut min = Vector3::repeat(f64::INFINITY);
        let mut max = Vector3::repeat(f64::NEG_INFINITY);
        for p in points {
            let local = frame.local_f64(p);
            min = min.inf(&local);
            max = max.sup(&local);
        }
        frame.extents = max - min;
        Some(frame)
    }

    fn local_f64(&self, p: &Point3<f32>) -> Vector3<f64> {
        self.rotation.transpose() * (p.coords.cast::<f64>() - self.center.coords)
    }

    /// Express a world point in the principal frame.
    pub fn to_local(&self, p: &Point3<f32>) -> Point3<f32> {
        Point3::from(self.local_f64(p).cast::<f32>())
    }

    /// Express a principal-frame point in the world.
    pub fn to_world(&self, p: &Point3<f32>) -> Point3<f32> {
        Point3::from((self.rotation * p.coords.cast::<f64>() + self.center.coords).cast::<f32>())
    }

    /// Whether the points have (almost) no thickness along some axis.
    pub fn is_flat(&self) -> bool {
        let largest = self.extents.max();
        largest <= 0.0 || self.extents.min() <= largest * FLAT_TOLERANCE
    }
}

/// Flip `v` so its largest component is positive.
fn canonical_sign(v: Vector3<f64>) -> Vector3<f64> {
    let i = v.iamax();
    if v[i] < 0.0 {
        -v
    } else {
        v
    }
}

/// Convert a total voxel budget into a longest-axis resolution for a box
/// with the given extents.
pub(crate) fn axis_resolution(budget: u32, extents: [f64; 3]) -> u32 {
    let mut sorted = extents;
    sorted.sort_by(|a, b| b.total_cmp(a));
    let longest = sorted[0];
    if longest <= 0.0 || !longest.is_finite() {
        return MIN_AXIS_RESOLUTION;
    }
    let b = sorted[1].max(longest * 1e-3);
    let c = sorted[2].max(longest * 1e-3);
    let voxel = (longest * b * c / f64::from(budget.max(1))).cbrt();
    let per_axis = (longest / voxel).ceil();
    (per_axis as u32).clamp(MIN_AXIS_RESOLUTION, MAX_AXIS_RESOLUTION)
}

fn distinct_vertices(points: &[Point3<f32>]) -> usize {
    points
        .iter()
        .map(|p| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
        .collect::<BTreeSet<_>>()
        .len()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// [`ConvexDecomposer`] backed by parry's V-HACD.
#[derive(Debug, Clone, Default)]
pub struct VhacdDecomposer {
    params: DecompositionParams,
}

impl VhacdDecomposer {
    /// Create a decomposer with the given parameters.
    pub fn new(params: DecompositionParams) -> Self {
        Self { params }
    }

    /// Parameters in use.
    pub fn params(&self) -> &DecompositionParams {
        &self.params
    }

    fn check(&self, mesh: &TriangleMesh) -> Result<PrincipalFrame, DecompositionError> {
        if mesh.is_empty() {
            return Err(DecompositionError::EmptyMesh);
        }
        mesh.validate()
            .map_err(|e| DecompositionError::InvalidMesh(e.to_string()))?;
        if !mesh.is_finite() {
            return Err(DecompositionError::NonFinite);
        }
        let points = mesh.points();
        let distinct = distinct_vertices(&points);
        if distinct < 4 {
            return Err(DecompositionError::TooFewVertices(distinct));
        }
        let frame = PrincipalFrame::of_points(&points).ok_or(DecompositionError::EmptyMesh)?;
        if frame.is_flat() {
            let e = frame.extents;
            return Err(DecompositionError::Degenerate([e.x as f32, e.y as f32, e.z as f32]));
        }
        Ok(frame)
    }
}

impl ConvexDecomposer for VhacdDecomposer {
    fn decompose(&self, mesh: &TriangleMesh) -> Result<Vec<TriangleMesh>, DecompositionError> {
        let frame = self.check(mesh)?;
        let points = mesh.points();
        let triangles = mesh.triangles();

        let (working, extents) = if self.params.pca {
            let local: Vec<_> = points.iter().map(|p| frame.to_local(p)).collect();
            let e = frame.extents;
            (local, [e.x, e.y, e.z])
        } else {
            let (min, max) = mesh.bounds().ok_or(DecompositionError::EmptyMesh)?;
            let e = (max - min).cast::<f64>();
            (points.clone(), [e.x, e.y, e.z])
        };

        let resolution = axis_resolution(self.params.resolution, extents);
        let vhacd_params = VHACDParameters {
            resolution,
            max_convex_hulls: self.params.max_hulls.max(1),
            ..Default::default()
        };
        debug!(
            resolution,
            max_hulls = vhacd_params.max_convex_hulls,
            pca = self.params.pca,
            "running V-HACD"
        );

        let hulls = catch_unwind(AssertUnwindSafe(|| {
            VHACD::decompose(&vhacd_params, &working, &triangles, false)
                .compute_convex_hulls(vhacd_params.convex_hull_downsampling)
        }))
        .map_err(|p| DecompositionError::Library(panic_message(p)))?;

        let reference = catch_unwind(AssertUnwindSafe(|| convex_hull_mesh(&points)))
            .map_err(|p| DecompositionError::Library(panic_message(p)))?
            .signed_volume()
            .abs() as f64;
        let min_volume = self.params.min_hull_volume * reference;
        let max_vertices = self.params.max_vertices_per_hull.max(4);

        let mut pieces = Vec::with_capacity(hulls.len());
        for (i, (hull_points, hull_triangles)) in hulls.into_iter().enumerate() {
            if hull_triangles.is_empty() {
                continue;
            }
            let hull_points: Vec<_> = if self.params.pca {
                hull_points.iter().map(|p| frame.to_world(p)).collect()
            } else {
                hull_points
            };
            let piece = TriangleMesh::from_parts(&hull_points, &hull_triangles);
            let volume = piece.signed_volume().abs() as f64;
            if volume < min_volume {
                debug!(hull = i, volume, min_volume, "dropping small hull");
                continue;
            }
            pieces.push(piece);
        }

        let max_hulls = self.params.max_hulls.max(1) as usize;
        merge_down_to(&mut pieces, max_hulls)?;

        for (i, piece) in pieces.iter_mut().enumerate() {
            if piece.num_vertices() > max_vertices {
                let kept = reduce_hull_vertices(&piece.points(), max_vertices);
                match catch_unwind(AssertUnwindSafe(|| convex_hull_mesh(&kept))) {
                    Ok(reduced) if !reduced.is_empty() => *piece = reduced,
                    _ => debug!(hull = i, "vertex reduction failed, keeping full hull"),
                }
            }
        }
        Ok(pieces)
    }
}

fn hull_of(points: &[Point3<f32>]) -> Result<TriangleMesh, DecompositionError> {
    catch_unwind(AssertUnwindSafe(|| convex_hull_mesh(points)))
        .map_err(|p| DecompositionError::Library(panic_message(p)))
}

/// Merge pieces pairwise until at most `max_pieces` remain.
///
/// Each round joins the pair whose combined convex hull adds the least volume
/// over the two pieces; ties go to the lowest index pair. The merged hull
/// takes the first piece's slot.
fn merge_down_to(
    pieces: &mut Vec<TriangleMesh>,
    max_pieces: usize,
) -> Result<(), DecompositionError> {
    if pieces.len() <= max_pieces {
        return Ok(());
    }
    debug!(from = pieces.len(), to = max_pieces, "merging convex pieces");

    let mut volumes: Vec<f64> = pieces.iter().map(|p| p.signed_volume().abs() as f64).collect();
    while pieces.len() > max_pieces {
        let mut best: Option<(f64, usize, usize, TriangleMesh)> = None;
        for i in 0..pieces.len() {
            for j in i + 1..pieces.len() {
                let mut points = pieces[i].points();
                points.extend(pieces[j].points());
                let merged = hull_of(&points)?;
                let cost = merged.signed_volume().abs() as f64 - volumes[i] - volumes[j];
                let better = match &best {
                    Some((best_cost, ..)) => cost < *best_cost,
                    None => true,
                };
                if better {
                    best = Some((cost, i, j, merged));
                }
            }
        }
        let Some((cost, i, j, merged)) = best else {
            break;
        };
        debug!(i, j, cost, "merged pieces");
        volumes[i] = merged.signed_volume().abs() as f64;
        pieces[i] = merged;
        pieces.remove(j);
        volumes.remove(j);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn boxed(sx: f32, sy: f32, sz: f32) -> TriangleMesh {
        let corners = [
            [0.0, 0.0, 0.0],
            [sx, 0.0, 0.0],
            [sx, sy, 0.0],
            [0.0, sy, 0.0],
            [0.0, 0.0, sz],
            [sx, 0.0, sz],
            [sx, sy, sz],
            [0.0, sy, sz],
        ];
        TriangleMesh {
            vertices: corners.iter().flatten().copied().collect(),
            indices: vec![
                0, 2, 1, 0, 3, 2, 4, 5, 6, 4, 6, 7, 0, 1, 5, 0, 5, 4, 2, 3, 7, 2, 7, 6, 1, 2, 6,
                1, 6, 5, 0, 4, 7, 0, 7, 3,
            ],
            normals: vec![],
        }
    }

    fn small_params() -> DecompositionParams {
        DecompositionParams {
            resolution: 4096,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_params() {
        let p = DecompositionParams::default();
        assert_eq!(p.resolution, 100_000);
        assert_eq!(p.max_hulls, 12);
        assert_eq!(p.max_vertices_per_hull, 12);
        assert!(p.pca);
    }

    #[test]
    fn test_axis_resolution() {
        assert_eq!(axis_resolution(100_000, [1.0, 1.0, 1.0]), 47);
        assert_eq!(axis_resolution(4000, [2.0, 2.0, 2.0]), 16);
        // Long thin shapes get more voxels along their length.
        assert!(axis_resolution(100_000, [10.0, 1.0, 1.0]) > 47);
        assert_eq!(axis_resolution(1, [1.0, 1.0, 1.0]), MIN_AXIS_RESOLUTION);
        assert_eq!(axis_resolution(u32::MAX, [1.0, 1.0, 1.0]), MAX_AXIS_RESOLUTION);
    }

    #[test]
    fn test_principal_frame_of_long_box() {
        let mesh = boxed(4.0, 1.0, 0.5);
        let frame = PrincipalFrame::of_points(&mesh.points()).unwrap();
        assert_relative_eq!(frame.rotation.column(0).x.abs(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(frame.extents.x, 4.0, epsilon = 1e-6);
        assert_relative_eq!(frame.extents.z, 0.5, epsilon = 1e-6);
        assert_relative_eq!(frame.rotation.determinant(), 1.0, epsilon = 1e-9);
        assert!(!frame.is_flat());

        let p = Point3::new(3.0, 0.25, 0.1);
        let back = frame.to_world(&frame.to_local(&p));
        assert_relative_eq!(back, p, epsilon = 1e-5);
    }

    #[test]
    fn test_rejects_empty() {
        let d = VhacdDecomposer::default();
        assert_eq!(d.decompose(&TriangleMesh::new()), Err(DecompositionError::EmptyMesh));
    }

    #[test]
    fn test_rejects_bad_index() {
        let mut mesh = boxed(1.0, 1.0, 1.0);
        mesh.indices[3] = 99;
        assert!(matches!(
            VhacdDecomposer::default().decompose(&mesh),
            Err(DecompositionError::InvalidMesh(_))
        ));
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut mesh = boxed(1.0, 1.0, 1.0);
        mesh.vertices[4] = f32::NAN;
        assert_eq!(
            VhacdDecomposer::default().decompose(&mesh),
            Err(DecompositionError::NonFinite)
        );
    }

    #[test]
    fn test_rejects_single_triangle() {
        let mesh = TriangleMesh::from_parts(
            &[Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            &[[0, 1, 2]],
        );
        assert_eq!(
            VhacdDecomposer::default().decompose(&mesh),
            Err(DecompositionError::TooFewVertices(3))
        );
    }

    #[test]
    fn test_rejects_flat_quad() {
        let mesh = TriangleMesh::from_parts(
            &[
                Point3::origin(),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(1.0, 1.0, 1.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2], [0, 2, 3]],
        );
        assert!(matches!(
            VhacdDecomposer::default().decompose(&mesh),
            Err(DecompositionError::Degenerate(_))
        ));
    }

    #[test]
    fn test_box_decomposes_into_bounded_hulls() {
        let mesh = boxed(1.0, 0.5, 0.25);
        let pieces = VhacdDecomposer::new(small_params()).decompose(&mesh).unwrap();
        assert!(!pieces.is_empty());
        assert!(pieces.len() <= 12);
        let (min, max) = mesh.bounds().unwrap();
        for piece in &pieces {
            assert!(piece.num_vertices() <= 12);
            assert!(piece.signed_volume() > 0.0);
            let (pmin, pmax) = piece.bounds().unwrap();
            for axis in 0..3 {
                assert!(pmin[axis] >= min[axis] - 0.1);
                assert!(pmax[axis] <= max[axis] + 0.1);
            }
        }
    }

    #[test]
    fn test_piece_count_respects_max_hulls() {
        let mesh = TriangleMesh::cuboid(Vector3::new(0.1, 0.1, 0.1));
        for max_hulls in [1, 2, 4] {
            let params = DecompositionParams {
                resolution: 4000,
                max_hulls,
                ..Default::default()
            };
            let pieces = VhacdDecomposer::new(params).decompose(&mesh).unwrap();
            assert!(!pieces.is_empty());
            assert!(
                pieces.len() <= max_hulls as usize,
                "{} pieces for max_hulls {max_hulls}",
                pieces.len()
            );
            for piece in &pieces {
                assert!(piece.num_vertices() <= 12);
                assert!(piece.signed_volume() > 0.0);
            }
        }
    }

    #[test]
    fn test_single_hull_covers_box() {
        let mesh = TriangleMesh::cuboid(Vector3::new(0.1, 0.1, 0.1));
        let params = DecompositionParams {
            resolution: 4000,
            max_hulls: 1,
            ..Default::default()
        };
        let pieces = VhacdDecomposer::new(params).decompose(&mesh).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_relative_eq!(pieces[0].signed_volume(), 0.001, max_relative = 0.5);
    }

    #[test]
    fn test_merge_prefers_adjacent_pieces() {
        let at = |x: f32| {
            let mut piece = TriangleMesh::cuboid(Vector3::new(1.0, 1.0, 1.0));
            for v in piece.vertices.chunks_exact_mut(3) {
                v[0] += x;
            }
            piece
        };
        let mut pieces = vec![at(0.0), at(10.0), at(1.5)];
        merge_down_to(&mut pieces, 2).unwrap();
        assert_eq!(pieces.len(), 2);
        // The two near cubes become one 2.5x1x1 hull in the first slot.
        assert_relative_eq!(pieces[0].signed_volume(), 2.5, epsilon = 1e-4);
        assert_relative_eq!(pieces[1].signed_volume(), 1.0, epsilon = 1e-4);
        let (min, _) = pieces[1].bounds().unwrap();
        assert_relative_eq!(min.x, 9.5, epsilon = 1e-5);
    }

    #[test]
    fn test_is_deterministic() {
        let mesh = boxed(1.0, 0.5, 0.25);
        let d = VhacdDecomposer::new(small_params());
        assert_eq!(d.decompose(&mesh).unwrap(), d.decompose(&mesh).unwrap());
    }

    #[test]
    fn test_min_volume_drops_everything() {
        let params = DecompositionParams {
            min_hull_volume: 2.0,
            ..small_params()
        };
        let pieces = VhacdDecomposer::new(params)
            .decompose(&boxed(1.0, 1.0, 1.0))
            .unwrap();
        assert!(pieces.is_empty());
    }

    #[test]
    fn test_run_reports_failure() {
        let outcome = Decomposition::run(&VhacdDecomposer::default(), &TriangleMesh::new());
        assert!(outcome.is_failed());
        assert!(outcome.pieces().is_empty());
    }

    #[test]
    fn test_params_from_partial_toml_like_json() {
        let p: DecompositionParams = serde_json::from_str(r#"{"max_hulls": 3}"#).unwrap();
        assert_eq!(p.max_hulls, 3);
        assert_eq!(p.resolution, 100_000);
    }
}
