#![warn(missing_docs)]

//! Rapier scenes built from SDF descriptors.
//!
//! [`PhysicsWorld`] turns every link of a descriptor's model into a rigid
//! body welded to the world, attaches its collision geometry and keeps the
//! visual and collision surfaces around for display. [`Simulator`] steps the
//! world at a fixed rate, optionally paced to wall-clock time.

mod colliders;
mod error;
mod simulator;
mod world;

pub use colliders::{mesh_to_collider, ColliderShape, ColliderStrategy};
pub use error::{PhysicsError, Result};
pub use simulator::Simulator;
pub use world::{PhysicsWorld, Role, SceneGeometry};
