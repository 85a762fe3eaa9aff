//! Polygon mesh data model and the mesh-editing kernel the section pipeline consumes.
//!
//! [`MeshKernel`] is the contract for the editing primitives (bisection, edge
//! splitting, loose-part separation, cleanup, dissolve, collapse decimation).
//! [`ReferenceKernel`] implements it for triangle and convex-polygon meshes.

pub mod bisect;
pub mod decimate;
pub mod kernel;
pub mod mesh;
pub mod primitives;
pub mod topology;

pub use decimate::{DecimateOptions, DecimateStats};
pub use kernel::{BisectOutcome, MeshKernel, ReferenceKernel};
pub use mesh::{Face, MaterialId, Mesh};
pub use primitives::{cuboid, heightfield};
