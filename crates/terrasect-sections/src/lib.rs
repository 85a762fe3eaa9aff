//! Grid sectioning of a terrain mesh with per-section LOD chains.
//!
//! The authoring side ([`LodSections`]) bakes a source object, cuts it along
//! a regular grid into sections, builds decimated LOD children with protected
//! seams, folds scattered particle instances into the matching sections, and
//! records boundary normals so seams shade continuously. The runtime side
//! ([`SectionsRuntime`]) restores those normals on load and toggles collision
//! on whichever sections are currently at full detail.

pub mod error;
pub mod finalize;
pub mod grid;
pub mod lod;
pub mod names;
pub mod normals;
pub mod operator;
pub mod particles;
pub mod partition;
pub mod record;
pub mod runtime;
pub mod section;

#[cfg(test)]
mod operator_tests;

pub use error::{NormalsError, RecordError, RuntimeError, SectionsError, SelectionError};
pub use grid::{CellId, GridSpec};
pub use normals::{NormalTable, QuantKey};
pub use operator::{Action, ExecuteOutcome, GenerationReport, LodSections};
pub use record::NormalRecord;
pub use runtime::{
    CollisionPolicy, PhysicsTogglePolicy, SectionTracker, SectionsRuntime, TrackerDelta,
    TrackerRegistry,
};
pub use section::Section;
