//! Mass and inertia of a closed mesh under uniform density.

use meshsdf_mesh::TriangleMesh;
use nalgebra::{Matrix3, Point3, Vector3};
use tracing::warn;

/// Mass properties of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InertialProperties {
    /// Total mass in kg.
    pub mass: f64,
    /// Centre of mass in the mesh frame.
    pub center_of_mass: Point3<f64>,
    /// Inertia tensor about the centre of mass, mesh-frame axes.
    pub inertia: Matrix3<f64>,
}

impl InertialProperties {
    /// No mass, no inertia.
    pub fn zero() -> Self {
        Self {
            mass: 0.0,
            center_of_mass: Point3::origin(),
            inertia: Matrix3::zeros(),
        }
    }
}

/// Off-diagonal and diagonal terms smaller than this fraction of the largest
/// diagonal term are rounding residue and are stored as zero.
const RELATIVE_ZERO: f64 = 1e-12;

/// Integrate mass and inertia of `mesh` at `density` (kg/m^3).
///
/// The mesh should be closed. Inward-facing meshes are flipped before
/// integration so mass is never negative. Integration runs in `f64` over the
/// divergence-theorem polynomial integrals of each triangle.
pub fn compute_inertia(mesh: &TriangleMesh, density: f64) -> InertialProperties {
    if mesh.is_empty() || !mesh.is_finite() {
        warn!("mesh encloses no volume; mass properties are zero");
        return InertialProperties::zero();
    }

    let mut integrals = VolumeIntegrals::of(mesh);
    if integrals.0[0] == 0.0 || !integrals.0[0].is_finite() {
        warn!("mesh encloses no volume; mass properties are zero");
        return InertialProperties::zero();
    }
    if integrals.0[0] < 0.0 {
        warn!("mesh triangles face inward; flipping winding for mass properties");
        for v in &mut integrals.0 {
            *v = -*v;
        }
    }

    let [volume, x, y, z, xx, yy, zz, xy, yz, zx] = integrals.0;
    let mass = density * volume;
    let c = Vector3::new(x, y, z) / volume;

    let ixx = density * (yy + zz) - mass * (c.y * c.y + c.z * c.z);
    let iyy = density * (zz + xx) - mass * (c.z * c.z + c.x * c.x);
    let izz = density * (xx + yy) - mass * (c.x * c.x + c.y * c.y);
    let ixy = -(density * xy - mass * c.x * c.y);
    let iyz = -(density * yz - mass * c.y * c.z);
    let ixz = -(density * zx - mass * c.z * c.x);

    let mut inertia = Matrix3::new(ixx, ixy, ixz, ixy, iyy, iyz, ixz, iyz, izz);
    let scale = ixx.abs().max(iyy.abs()).max(izz.abs());
    inertia.apply(|v| {
        if v.abs() <= scale * RELATIVE_ZERO {
            *v = 0.0;
        }
    });

    InertialProperties {
        mass,
        center_of_mass: Point3::from(c),
        inertia,
    }
}

/// Integrals over the enclosed volume of
/// `1, x, y, z, x^2, y^2, z^2, xy, yz, zx`, in that order.
struct VolumeIntegrals([f64; 10]);

impl VolumeIntegrals {
    const WEIGHTS: [f64; 10] = [
        1.0 / 6.0,
        1.0 / 24.0,
        1.0 / 24.0,
        1.0 / 24.0,
        1.0 / 60.0,
        1.0 / 60.0,
        1.0 / 60.0,
        1.0 / 120.0,
        1.0 / 120.0,
        1.0 / 120.0,
    ];

    fn of(mesh: &TriangleMesh) -> Self {
        let mut sums = [0.0f64; 10];
        for tri in mesh.triangles() {
            let [p0, p1, p2] = tri.map(|i| mesh.point(i as usize).coords.cast::<f64>());
            let d = (p1 - p0).cross(&(p2 - p0));
            let sx = Subexpressions::new(p0.x, p1.x, p2.x);
            let sy = Subexpressions::new(p0.y, p1.y, p2.y);
            let sz = Subexpressions::new(p0.z, p1.z, p2.z);

            sums[0] += d.x * sx.f1;
            sums[1] += d.x * sx.f2;
            sums[2] += d.y * sy.f2;
            sums[3] += d.z * sz.f2;
            sums[4] += d.x * sx.f3;
            sums[5] += d.y * sy.f3;
            sums[6] += d.z * sz.f3;
            sums[7] += d.x * (p0.y * sx.g[0] + p1.y * sx.g[1] + p2.y * sx.g[2]);
            sums[8] += d.y * (p0.z * sy.g[0] + p1.z * sy.g[1] + p2.z * sy.g[2]);
            sums[9] += d.z * (p0.x * sz.g[0] + p1.x * sz.g[1] + p2.x * sz.g[2]);
        }
        for (sum, weight) in sums.iter_mut().zip(Self::WEIGHTS) {
            *sum *= weight;
        }
        Self(sums)
    }
}

/// Per-axis polynomial terms shared by the volume integrals of one triangle.
struct Subexpressions {
    f1: f64,
    f2: f64,
    f3: f64,
    g: [f64; 3],
}

impl Subexpressions {
    fn new(w0: f64, w1: f64, w2: f64) -> Self {
        let t0 = w0 + w1;
        let f1 = t0 + w2;
        let t1 = w0 * w0;
        let t2 = t1 + w1 * t0;
        let f2 = t2 + w2 * f1;
        let f3 = w0 * t1 + w1 * t2 + w2 * f2;
        Self {
            f1,
            f2,
            f3,
            g: [f2 + w0 * (f1 + w0), f2 + w1 * (f1 + w1), f2 + w2 * (f1 + w2)],
        }
    }
}
