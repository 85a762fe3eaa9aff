//! Host scene-graph model: an object arena with parenting, transforms,
//! materials, modifier stacks, LOD level records and game properties.

mod context;
mod material;
mod modifier;
mod object;
mod scene;

pub use context::Selection;
pub use material::Material;
pub use modifier::{DeformModifier, Modifier, ParticleSystem};
pub use object::{DisplayFlags, DrawType, GameProperty, LodLevel, ObjectId, PhysicsType, SceneObject};
pub use scene::{Scene, SceneError, select_lod};
