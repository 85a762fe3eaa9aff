//! Cutting the baked base into per-cell section meshes.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use glam::Vec3;
use terrasect_mesh::{BisectOutcome, Mesh, MeshKernel};
use tracing::{debug, info};

use crate::grid::{CENTROID_SCALE, CellId, GridSpec};
use crate::names::BOUNDARY_GROUP;

/// Distance below which vertices of a piece are welded.
pub const MERGE_DISTANCE: f32 = 1e-4;

/// The geometry of one cell, in cell-local coordinates.
#[derive(Clone, Debug)]
pub struct SectionPiece {
    /// Owning cell.
    pub cell: CellId,
    /// Geometry with its origin at the cell centre, carrying the boundary group.
    pub mesh: Mesh,
}

/// Cuts `base` along every grid line and assigns the resulting pieces to cells.
///
/// `base` must be in partition space (grid centred on its origin) and
/// triangulated. Grid lines that miss the mesh are skipped. Each loose piece
/// is cleaned, gets its open boundary stored in the boundary vertex group,
/// and is matched to a cell by its centroid; unmatched pieces are dropped and
/// pieces sharing a cell are joined. Pieces come back in cell order.
pub fn partition<K: MeshKernel + ?Sized>(
    kernel: &K,
    base: &Mesh,
    grid: &GridSpec,
) -> Vec<SectionPiece> {
    let mut cut = base.clone();

    for x in grid.planes_x() {
        cut_along(kernel, &mut cut, Vec3::new(x, 0.0, 0.0), Vec3::X);
    }
    for y in grid.planes_y() {
        cut_along(kernel, &mut cut, Vec3::new(0.0, y, 0.0), Vec3::Y);
    }

    let pieces = kernel.separate_loose(cut);
    let total = pieces.len();
    let mut by_cell: BTreeMap<CellId, Mesh> = BTreeMap::new();

    for mut piece in pieces {
        kernel.remove_doubles(&mut piece, MERGE_DISTANCE);
        kernel.triangulate(&mut piece);
        let boundary = kernel.boundary_loop(&piece);
        piece.set_vertex_group(BOUNDARY_GROUP, boundary);

        let Some(centroid) = piece.centroid() else {
            continue;
        };
        let Some(cell) = grid.locate_cell_scaled(centroid.truncate(), CENTROID_SCALE) else {
            debug!("Discarding piece {} at {centroid}: outside every cell", piece.name);
            continue;
        };
        piece.translate(-grid.center3(&cell));

        match by_cell.entry(cell) {
            Entry::Vacant(slot) => {
                slot.insert(piece);
            }
            Entry::Occupied(mut slot) => {
                debug!("Joining piece {} into cell {cell}", piece.name);
                slot.get_mut().join(piece);
            }
        }
    }

    info!(
        "Assigned {total} pieces to {} of {} cells",
        by_cell.len(),
        grid.cell_count()
    );
    by_cell
        .into_iter()
        .map(|(cell, mesh)| SectionPiece { cell, mesh })
        .collect()
}

fn cut_along<K: MeshKernel + ?Sized>(kernel: &K, mesh: &mut Mesh, point: Vec3, normal: Vec3) {
    match kernel.bisect_plane(mesh, point, normal) {
        BisectOutcome::Cut { cut_edges } => kernel.split_edges(mesh, &cut_edges),
        BisectOutcome::NoIntersection => {
            debug!("Cut plane through {point} along {normal} misses the mesh");
        }
    }
}
