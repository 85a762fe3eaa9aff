//! LOD chain generation for sections.

use std::f32::consts::PI;
use std::sync::Arc;

use terrasect_config::LodConfig;
use terrasect_log::Profiler;
use terrasect_mesh::{DecimateOptions, Mesh, MeshKernel};
use terrasect_scene::{DrawType, LodLevel, PhysicsType, Scene, SceneError};
use tracing::{debug, info};

use crate::grid::GridSpec;
use crate::names::{BOUNDARY_GROUP, lod_name, placeholder_mesh_name};
use crate::section::Section;

/// Decimation ratio of `level`: `factor / (level + 1)`.
pub fn lod_ratio(factor: f32, level: u32) -> f32 {
    factor / (level + 1) as f32
}

/// Switch distance of `level`.
///
/// The first distance is `round(pi * sqrt(size.x * size.y) / 2)`, at least 1,
/// and later levels are multiples of it.
pub fn lod_distance(grid: &GridSpec, level: u32) -> f32 {
    let size = grid.size();
    let base = (PI * (size.x * size.y).sqrt() * 0.5).round().max(1.0);
    base * (level + 1) as f32
}

/// Builds the LOD children of every section.
///
/// Level `lod.number - 1` of every section references one shared, empty
/// placeholder mesh; the other levels are boundary-protected decimations of
/// the section's mesh. Returns the placeholder, or `None` when LOD is
/// disabled or a single level was requested.
pub fn generate_lod<K: MeshKernel + ?Sized>(
    scene: &mut Scene,
    kernel: &K,
    sections: &mut [Section],
    grid: &GridSpec,
    lod: &LodConfig,
    source_mesh: &str,
    profiler: &Profiler,
) -> Result<Option<Arc<Mesh>>, SceneError> {
    if !(lod.enabled && lod.number > 1) {
        return Ok(None);
    }
    let terminal = lod.number - 1;
    let placeholder = Arc::new(Mesh::new(placeholder_mesh_name(
        source_mesh,
        grid.digits(),
        lod.number,
    )));

    for level in 0..lod.number {
        info!(
            "{}",
            profiler.timed(&format!("Generating LOD {} of {}", level + 1, lod.number))
        );
        let ratio = lod_ratio(lod.factor, level);
        let distance = lod_distance(grid, level);

        for section in sections.iter_mut() {
            let section_name = scene.object(section.object)?.name.clone();
            let name = lod_name(&section_name, level);

            let child = if level == terminal {
                let child = scene.add_object_with_shared_mesh(&name, placeholder.clone());
                let object = scene.object_mut(child)?;
                object.display.draw_type = DrawType::Bounds;
                object.display.hide_render = true;
                object.display.hide = true;
                section.terminal = Some(child);
                child
            } else {
                let source = scene.mesh(section.object)?;
                let mut mesh = source.clone();
                mesh.name = lod_name(&source.name, level);
                let protected = mesh.vertex_group(BOUNDARY_GROUP).cloned();
                let stats = kernel.decimate_collapse(
                    &mut mesh,
                    &DecimateOptions {
                        ratio,
                        protected: protected.as_ref(),
                        triangulate: false,
                    },
                );
                debug!(
                    "{name}: {} -> {} triangles",
                    stats.triangles_before, stats.triangles_after
                );
                let child = scene.add_object(&name, Some(mesh));
                section.levels.push(child);
                child
            };

            scene.object_mut(child)?.physics = PhysicsType::NoCollision;
            scene.set_parent(child, Some(section.object), false)?;
            scene.object_mut(section.object)?.lod_levels.push(LodLevel {
                object: child,
                distance,
                ratio,
                use_material: true,
            });
        }
    }
    Ok(Some(placeholder))
}
