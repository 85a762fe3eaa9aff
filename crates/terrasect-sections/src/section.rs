//! Handles to the generated section hierarchy.

use terrasect_scene::ObjectId;

use crate::grid::CellId;

/// One generated section and its LOD children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    /// Cell the section covers.
    pub cell: CellId,
    /// The full-detail section object.
    pub object: ObjectId,
    /// Decimated LOD children, finest first.
    pub levels: Vec<ObjectId>,
    /// Child referencing the shared placeholder mesh, when LOD was generated.
    pub terminal: Option<ObjectId>,
}

impl Section {
    /// A section without LOD children.
    pub fn new(cell: CellId, object: ObjectId) -> Self {
        Self {
            cell,
            object,
            levels: Vec::new(),
            terminal: None,
        }
    }

    /// Every LOD child, terminal level last.
    pub fn lod_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.levels.iter().copied().chain(self.terminal)
    }

    /// The section and its decimated levels; the objects that carry geometry
    /// of their own.
    pub fn detail_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        std::iter::once(self.object).chain(self.levels.iter().copied())
    }
}
