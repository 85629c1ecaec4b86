//! Physics world management using Rapier3d.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use meshsdf_mesh::{load_mesh, TriangleMesh};
use meshsdf_sdf::{Descriptor, Geometry, Inertial, Link, MeshGeometry, Pose};
use nalgebra::{Isometry3, Matrix3, Point3, Vector3};
use rapier3d::dynamics::{
    CCDSolver, FixedJointBuilder, ImpulseJointSet, IntegrationParameters, IslandManager,
    MassProperties, MultibodyJointSet, RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
};
use rapier3d::geometry::{BroadPhaseMultiSap, ColliderBuilder, ColliderSet, NarrowPhase};
use rapier3d::pipeline::{PhysicsPipeline, QueryPipeline};
use tracing::debug;

use crate::colliders::{self, mesh_to_collider, ColliderShape, ColliderStrategy};
use crate::error::{PhysicsError, Result};

/// Which purpose a piece of geometry serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Drawn only.
    Illustration,
    /// Used for contact.
    Proximity,
}

/// Geometry attached to a link, ready for display.
#[derive(Debug, Clone)]
pub struct SceneGeometry {
    /// Owning link.
    pub link: String,
    /// Element name from the descriptor.
    pub name: String,
    /// Visual or collision.
    pub role: Role,
    /// Pose relative to the link frame.
    pub pose: Isometry3<f32>,
    /// Surface in the geometry frame, scale applied.
    pub mesh: TriangleMesh,
}

/// Physics simulation world.
pub struct PhysicsWorld {
    // Rapier components
    pipeline: PhysicsPipeline,
    gravity: Vector3<f32>,
    integration_params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    model_name: String,
    links: Vec<(String, RigidBodyHandle)>,
    geometries: Vec<SceneGeometry>,
}

/// Loads each mesh file once and hands out scaled copies.
struct MeshCache<'a> {
    base_dir: &'a Path,
    loaded: HashMap<PathBuf, TriangleMesh>,
}

impl MeshCache<'_> {
    fn get(&mut self, geometry: &MeshGeometry) -> Result<TriangleMesh> {
        let path = geometry.resolve(self.base_dir)?;
        let mut mesh = match self.loaded.get(&path) {
            Some(mesh) => mesh.clone(),
            None => {
                let mesh = load_mesh(&path).map_err(|source| PhysicsError::Mesh {
                    path: path.clone(),
                    source,
                })?;
                debug!(path = %path.display(), triangles = mesh.num_triangles(), "loaded mesh");
                self.loaded.insert(path, mesh.clone());
                mesh
            }
        };
        if let Some(scale) = geometry.scale {
            scale_mesh(&mut mesh, &scale.cast::<f32>());
        }
        Ok(mesh)
    }
}

fn scale_mesh(mesh: &mut TriangleMesh, scale: &Vector3<f32>) {
    if scale.x == scale.y && scale.y == scale.z {
        mesh.apply_scale(scale.x);
        return;
    }
    for v in mesh.vertices.chunks_exact_mut(3) {
        v[0] *= scale.x;
        v[1] *= scale.y;
        v[2] *= scale.z;
    }
    if !mesh.normals.is_empty() {
        mesh.compute_normals();
    }
}

fn isometry(pose: &Pose) -> Isometry3<f32> {
    pose.isometry().cast::<f32>()
}

/// Mass properties declared by `<inertial>`, or the SDF default of unit mass
/// and unit inertia.
fn mass_properties(inertial: Option<&Inertial>) -> MassProperties {
    match inertial {
        Some(inertial) => MassProperties::with_inertia_matrix(
            Point3::origin(),
            inertial.mass as f32,
            inertial.inertia.to_matrix().cast::<f32>(),
        ),
        None => MassProperties::with_inertia_matrix(Point3::origin(), 1.0, Matrix3::identity()),
    }
}

impl PhysicsWorld {
    /// Read a descriptor file and build its world. Mesh URIs resolve against
    /// the descriptor's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let descriptor = meshsdf_sdf::load(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_descriptor(&descriptor, base_dir)
    }

    /// Build a world holding every link of the descriptor's model, each
    /// welded to the world at its declared pose.
    ///
    /// Colliders carry zero density, so body mass comes only from the
    /// declared `<inertial>` blocks.
    pub fn from_descriptor(descriptor: &Descriptor, base_dir: &Path) -> Result<Self> {
        let mut world = Self::new();
        world.model_name = descriptor.model.name.clone();

        let ground = world.bodies.insert(RigidBodyBuilder::fixed().build());
        let mut cache = MeshCache {
            base_dir,
            loaded: HashMap::new(),
        };

        for link in &descriptor.model.links {
            let handle = world.add_link(link, &mut cache)?;
            let weld = FixedJointBuilder::new()
                .local_frame1(isometry(&link.pose))
                .local_frame2(Isometry3::identity())
                .build();
            world
                .multibody_joints
                .insert(ground, handle, weld, true)
                .ok_or_else(|| PhysicsError::Weld(link.name.clone()))?;
        }

        debug!(
            model = %world.model_name,
            links = world.links.len(),
            geometries = world.geometries.len(),
            "built physics world"
        );
        Ok(world)
    }

    fn add_link(&mut self, link: &Link, cache: &mut MeshCache<'_>) -> Result<RigidBodyHandle> {
        let body = RigidBodyBuilder::dynamic()
            .position(isometry(&link.pose))
            .additional_mass_properties(mass_properties(link.inertial.as_ref()))
            .build();
        let handle = self.bodies.insert(body);
        self.links.push((link.name.clone(), handle));

        for visual in &link.visuals {
            let mesh = match &visual.geometry {
                Geometry::Mesh(mesh) => cache.get(mesh)?,
                primitive => primitive_shape(primitive, &visual.name)?.display,
            };
            self.geometries.push(SceneGeometry {
                link: link.name.clone(),
                name: visual.name.clone(),
                role: Role::Illustration,
                pose: visual.pose.as_ref().map(isometry).unwrap_or_else(Isometry3::identity),
                mesh,
            });
        }

        for collision in &link.collisions {
            let shape = match &collision.geometry {
                Geometry::Mesh(mesh) => {
                    let strategy = if mesh.declare_convex {
                        ColliderStrategy::ConvexHull
                    } else {
                        ColliderStrategy::TriMesh
                    };
                    mesh_to_collider(&cache.get(mesh)?, strategy, &collision.name)?
                }
                primitive => primitive_shape(primitive, &collision.name)?,
            };
            let pose = collision
                .pose
                .as_ref()
                .map(isometry)
                .unwrap_or_else(Isometry3::identity);
            let collider = ColliderBuilder::new(shape.shape)
                .position(pose * shape.offset)
                .density(0.0)
                .friction(0.5)
                .build();
            self.colliders
                .insert_with_parent(collider, handle, &mut self.bodies);
            self.geometries.push(SceneGeometry {
                link: link.name.clone(),
                name: collision.name.clone(),
                role: Role::Proximity,
                pose,
                mesh: shape.display,
            });
        }

        Ok(handle)
    }

    /// Create an empty physics world with z-up gravity.
    fn new() -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: Vector3::new(0.0, 0.0, -9.81),
            integration_params: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            model_name: String::new(),
            links: Vec::new(),
            geometries: Vec::new(),
        }
    }

    /// Step the physics simulation by dt seconds.
    pub fn step(&mut self, dt: f32) {
        self.integration_params.dt = dt;

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Name of the loaded model.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Link names in descriptor order.
    pub fn link_names(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(|(name, _)| name.as_str())
    }

    /// World pose of a link.
    pub fn link_pose(&self, link: &str) -> Option<Isometry3<f32>> {
        let handle = self.handle(link)?;
        self.bodies.get(handle).map(|body| *body.position())
    }

    /// World poses of every link, in descriptor order.
    pub fn link_poses(&self) -> Vec<(&str, Isometry3<f32>)> {
        self.links
            .iter()
            .filter_map(|(name, handle)| {
                self.bodies
                    .get(*handle)
                    .map(|body| (name.as_str(), *body.position()))
            })
            .collect()
    }

    /// Mass of a link's body as seen by the solver.
    pub fn link_mass(&self, link: &str) -> Option<f32> {
        let handle = self.handle(link)?;
        self.bodies.get(handle).map(|body| body.mass())
    }

    /// Geometry serving `role`, in descriptor order.
    pub fn geometries(&self, role: Role) -> impl Iterator<Item = &SceneGeometry> {
        self.geometries.iter().filter(move |g| g.role == role)
    }

    /// Number of colliders in the world.
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    fn handle(&self, link: &str) -> Option<RigidBodyHandle> {
        self.links
            .iter()
            .find(|(name, _)| name == link)
            .map(|(_, handle)| *handle)
    }
}

fn primitive_shape(geometry: &Geometry, name: &str) -> Result<ColliderShape> {
    match geometry {
        Geometry::Box { size } => Ok(colliders::cuboid(size.cast::<f32>())),
        Geometry::Sphere { radius } => Ok(colliders::ball(*radius as f32)),
        Geometry::Cylinder { radius, length } => {
            Ok(colliders::cylinder(*radius as f32, *length as f32))
        }
        Geometry::Mesh(_) => Err(PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: "mesh geometry is not a primitive".to_string(),
        }),
    }
}
