//! Folding scattered particle instances into the sections they stand on.

use std::collections::{BTreeMap, BTreeSet};

use glam::{Affine3A, Vec3};
use terrasect_mesh::{DecimateOptions, MaterialId, Mesh, MeshKernel};
use terrasect_scene::{Modifier, ObjectId, Scene, SceneError};
use tracing::{debug, info, warn};

use crate::grid::{CellId, GridSpec};
use crate::lod::lod_ratio;
use crate::names::particles_name;
use crate::section::Section;

/// Every particle instance that landed in one cell, merged into one mesh.
#[derive(Clone, Debug)]
pub struct ParticleCluster {
    /// Owning cell.
    pub cell: CellId,
    /// Merged instances in partition space.
    pub mesh: Mesh,
}

/// Realises the visible particle systems of `source` as per-cell clusters.
///
/// Every instance becomes an owned copy of the instance object's mesh, baked
/// into partition space by `partition_transform⁻¹ · world` and assigned to
/// the cell containing its translation. Instances outside the grid are
/// dropped. Converted systems are hidden in the viewport and in renders.
/// The instance meshes' materials are added to `materials`.
pub fn convert_particles(
    scene: &mut Scene,
    source: ObjectId,
    source_name: &str,
    grid: &GridSpec,
    partition_transform: &Affine3A,
    materials: &mut BTreeSet<MaterialId>,
) -> Result<Vec<ParticleCluster>, SceneError> {
    let to_partition = partition_transform.inverse();
    let mut groups: BTreeMap<CellId, Vec<Mesh>> = BTreeMap::new();
    let mut converted = Vec::new();

    for (index, modifier) in scene.object(source)?.modifiers.iter().enumerate() {
        let Modifier::ParticleSystem(system) = modifier else {
            continue;
        };
        if !system.show_viewport {
            continue;
        }
        let Some(instance) = system.instance_object else {
            continue;
        };
        let Some(mesh) = scene.object(instance)?.mesh.as_deref() else {
            warn!("Particle system {} instances an object without mesh", system.name);
            continue;
        };
        materials.extend(mesh.materials.iter().copied());

        let mut placed = 0;
        for world in &system.instances {
            let baked = to_partition * *world;
            let location = Vec3::from(baked.translation).truncate();
            let Some(cell) = grid.locate_cell(location) else {
                debug!("Discarding particle at {location}: outside every cell");
                continue;
            };
            let mut copy = mesh.clone();
            copy.transform(&baked);
            groups.entry(cell).or_default().push(copy);
            placed += 1;
        }
        debug!(
            "{}: {placed} of {} instances placed",
            system.name,
            system.instances.len()
        );
        converted.push(index);
    }

    let object = scene.object_mut(source)?;
    for index in converted {
        if let Some(Modifier::ParticleSystem(system)) = object.modifiers.get_mut(index) {
            system.show_viewport = false;
            system.show_render = false;
        }
    }

    let clusters: Vec<ParticleCluster> = groups
        .into_iter()
        .filter_map(|(cell, meshes)| {
            let mut meshes = meshes.into_iter();
            let mut first = meshes.next()?;
            for mesh in meshes {
                first.join(mesh);
            }
            first.name = particles_name(source_name, &cell);
            Some(ParticleCluster { cell, mesh: first })
        })
        .collect();
    info!("Converted particles into {} clusters", clusters.len());
    Ok(clusters)
}

/// Merges each cluster into its section and every decimated level of it.
///
/// Level `j` receives a copy decimated at `factor / (j + 1)`; the section
/// itself receives the cluster at full detail. Clusters whose cell has no
/// section are dropped. Returns how many clusters were merged.
pub fn join_particles<K: MeshKernel + ?Sized>(
    scene: &mut Scene,
    kernel: &K,
    sections: &[Section],
    clusters: Vec<ParticleCluster>,
    grid: &GridSpec,
    factor: f32,
) -> Result<usize, SceneError> {
    let mut by_cell: BTreeMap<CellId, Mesh> = clusters
        .into_iter()
        .map(|cluster| (cluster.cell, cluster.mesh))
        .collect();
    let mut merged = 0;

    for section in sections {
        let Some(mut cluster) = by_cell.remove(&section.cell) else {
            continue;
        };
        cluster.translate(-grid.center3(&section.cell));

        for (level, &child) in section.levels.iter().enumerate() {
            let mut copy = cluster.clone();
            kernel.decimate_collapse(
                &mut copy,
                &DecimateOptions {
                    ratio: lod_ratio(factor, level as u32),
                    protected: None,
                    triangulate: true,
                },
            );
            scene.mesh_mut(child)?.join(copy);
        }
        debug!("Joining {} into section {}", cluster.name, section.cell);
        scene.mesh_mut(section.object)?.join(cluster);
        merged += 1;
    }

    for cell in by_cell.keys() {
        debug!("Dropping particle cluster of cell {cell}: no section");
    }
    Ok(merged)
}
