//! Object, mesh and property names shared by the generator and the runtime.

use crate::grid::CellId;

/// Vertex group holding a section's cut-boundary vertices.
pub const BOUNDARY_GROUP: &str = "_BOUNDS";
/// Suffix of the temporary baked copy of the source.
pub const BASE_SUFFIX: &str = "_BASE";
/// Infix between the source name and a cell id.
pub const SECT_SUFFIX: &str = "_SECT";
/// Suffix of LOD children and LOD material variants.
pub const LOD_SUFFIX: &str = "_LOD";
/// Infix between the source name and a cell id for particle clusters.
pub const PARTICLES_SUFFIX: &str = "_PARTICLES";
/// Boolean game property marking a generated source; `true` when a normal
/// record was written for it.
pub const MARKER_PROPERTY: &str = "TERRASECT_LOD_SECTIONS";
/// Logic entry point bound to a generated source.
pub const UPDATE_ENTRY: &str = "terrasect_lod_sections.update";
/// Directory, under the data directory, holding normal records.
pub const RECORD_DIR: &str = MARKER_PROPERTY;
/// File extension of normal records.
pub const RECORD_EXTENSION: &str = "nrm";

/// `<source>_SECT<cell>`.
pub fn section_name(source: &str, cell: &CellId) -> String {
    format!("{source}{SECT_SUFFIX}{cell}")
}

/// `<section>_LOD.<level>`.
pub fn lod_name(section: &str, level: u32) -> String {
    format!("{section}{LOD_SUFFIX}.{level}")
}

/// `<source>_PARTICLES<cell>`.
pub fn particles_name(source: &str, cell: &CellId) -> String {
    format!("{source}{PARTICLES_SUFFIX}{cell}")
}

/// Name of the mesh shared by every terminal LOD level:
/// `<source mesh>_SECT<zeros>.<levels - 1>`.
pub fn placeholder_mesh_name(source_mesh: &str, digits: usize, levels: u32) -> String {
    format!(
        "{source_mesh}{SECT_SUFFIX}{:0digits$}.{}",
        0,
        levels.saturating_sub(1)
    )
}

/// Material name of the LOD variant of `material`.
pub fn lod_material_name(material: &str) -> String {
    format!("{material}{LOD_SUFFIX}")
}
