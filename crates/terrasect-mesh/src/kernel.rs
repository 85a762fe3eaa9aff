//! The mesh-editing contract consumed by the section pipeline.

use std::collections::BTreeSet;

use glam::Vec3;

use crate::decimate::{DecimateOptions, DecimateStats};
use crate::mesh::Mesh;
use crate::{bisect, decimate, topology};

/// Result of a plane bisection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BisectOutcome {
    /// The plane crossed (or touched) geometry; these edges lie in the plane.
    Cut {
        /// Undirected edges along the cut, as `[lo, hi]` vertex indices.
        cut_edges: Vec<[u32; 2]>,
    },
    /// The plane misses every face; the mesh is unchanged.
    NoIntersection,
}

/// Mesh-editing primitives.
///
/// Implementations must honour these contracts:
/// - no operation moves an existing vertex in the XY plane, except
///   [`MeshKernel::remove_doubles`], which merges vertices closer than its
///   threshold;
/// - [`MeshKernel::decimate_collapse`] never removes or moves a protected
///   vertex;
/// - [`MeshKernel::split_edges`] only duplicates vertices, it never moves them.
pub trait MeshKernel {
    /// Converts every polygon to triangles.
    fn triangulate(&self, mesh: &mut Mesh);

    /// Cuts the mesh along the plane through `point` with normal `normal`.
    fn bisect_plane(&self, mesh: &mut Mesh, point: Vec3, normal: Vec3) -> BisectOutcome;

    /// Disconnects faces across the given edges.
    fn split_edges(&self, mesh: &mut Mesh, edges: &[[u32; 2]]);

    /// Splits the mesh into face-connected pieces.
    fn separate_loose(&self, mesh: Mesh) -> Vec<Mesh>;

    /// Merges coincident vertices; returns how many were merged.
    fn remove_doubles(&self, mesh: &mut Mesh, threshold: f32) -> usize;

    /// Vertices on the mesh's open boundary loops.
    fn boundary_loop(&self, mesh: &Mesh) -> BTreeSet<u32>;

    /// Removes vertices in regions flat to within `angle_limit` radians,
    /// keeping boundaries; returns how many were dissolved.
    fn dissolve_limited(&self, mesh: &mut Mesh, angle_limit: f32) -> usize;

    /// Collapse-decimates the mesh.
    fn decimate_collapse(&self, mesh: &mut Mesh, options: &DecimateOptions<'_>) -> DecimateStats;
}

/// In-process implementation of [`MeshKernel`] for triangle and convex-polygon meshes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceKernel;

impl MeshKernel for ReferenceKernel {
    fn triangulate(&self, mesh: &mut Mesh) {
        topology::triangulate(mesh);
    }

    fn bisect_plane(&self, mesh: &mut Mesh, point: Vec3, normal: Vec3) -> BisectOutcome {
        bisect::bisect_plane(mesh, point, normal)
    }

    fn split_edges(&self, mesh: &mut Mesh, edges: &[[u32; 2]]) {
        bisect::split_edges(mesh, edges);
    }

    fn separate_loose(&self, mesh: Mesh) -> Vec<Mesh> {
        topology::separate_loose(mesh)
    }

    fn remove_doubles(&self, mesh: &mut Mesh, threshold: f32) -> usize {
        topology::remove_doubles(mesh, threshold)
    }

    fn boundary_loop(&self, mesh: &Mesh) -> BTreeSet<u32> {
        topology::boundary_loop(mesh)
    }

    fn dissolve_limited(&self, mesh: &mut Mesh, angle_limit: f32) -> usize {
        decimate::dissolve_limited(mesh, angle_limit)
    }

    fn decimate_collapse(&self, mesh: &mut Mesh, options: &DecimateOptions<'_>) -> DecimateStats {
        decimate::decimate_collapse(mesh, options)
    }
}
